//! In-memory identity store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use sqrld_proto::{ClientRequest, Tif};

use crate::nut::NutRecord;

use super::{AuthOutcome, IdentityRecord, IdentityStore, StoreError};

/// Reference [`IdentityStore`] backed by a `RwLock<HashMap>`.
#[derive(Default)]
pub struct MemoryIdentityStore {
    identities: RwLock<HashMap<String, IdentityRecord>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an identity directly; test setup convenience.
    pub async fn insert(&self, record: IdentityRecord) {
        let mut identities = self.identities.write().await;
        identities.insert(record.primary_key.clone(), record);
    }

    pub async fn len(&self) -> usize {
        self.identities.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.identities.read().await.is_empty()
    }
}

/// Copy the advisory and unlock material a client message carries onto
/// the stored record. Absent fields leave stored values untouched.
fn absorb_client_material(record: &mut IdentityRecord, request: &ClientRequest) {
    if let Some(suk) = &request.server_unlock_key {
        record.server_unlock_key = Some(suk.clone());
    }
    if let Some(vuk) = &request.verify_unlock_key {
        record.verify_unlock_key = Some(vuk.clone());
    }
    record.sqrl_only = request.opt.sqrl_only;
    record.hard_lock = request.opt.hard_lock;
}

/// Fill the outcome's unlock key when the client asked for it.
fn honor_suk_request(outcome: &mut AuthOutcome, record: &IdentityRecord, request: &ClientRequest) {
    if request.opt.return_session_unlock_key {
        outcome.session_unlock_key = record.server_unlock_key.clone();
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn query(
        &self,
        request: &ClientRequest,
        _nut: &NutRecord,
    ) -> Result<AuthOutcome, StoreError> {
        let identities = self.identities.read().await;
        let idk = &request.primary_identity_key;
        let pidk = request.previous_identity_key.as_deref();

        let mut outcome = AuthOutcome::default();

        let matched = if let Some(record) = identities.get(idk) {
            outcome.tif |= Tif::CURRENT_ID_MATCH;
            if pidk.is_some_and(|p| record.previous_keys.iter().any(|k| k == p)) {
                outcome.tif |= Tif::PREVIOUS_ID_MATCH;
            }
            Some(record)
        } else if let Some(record) = pidk.and_then(|p| identities.get(p)) {
            // the client is rotating: its previous key is still our primary
            outcome.tif |= Tif::PREVIOUS_ID_MATCH;
            Some(record)
        } else if let Some(record) = identities
            .values()
            .find(|r| r.previous_keys.iter().any(|k| k == idk))
        {
            // the client presents a key this identity already rotated away from
            outcome.tif |= Tif::PREVIOUS_ID_MATCH;
            Some(record)
        } else {
            None
        };

        if let Some(record) = matched {
            if record.disabled {
                outcome.tif |= Tif::ID_DISABLED;
            }
            honor_suk_request(&mut outcome, record, request);
            outcome.identity = Some(record.clone());
        }
        Ok(outcome)
    }

    async fn ident(
        &self,
        request: &ClientRequest,
        _nut: &NutRecord,
    ) -> Result<AuthOutcome, StoreError> {
        let mut identities = self.identities.write().await;
        let idk = request.primary_identity_key.clone();
        let pidk = request.previous_identity_key.as_deref();

        let mut outcome = AuthOutcome::default();

        if let Some(record) = identities.get_mut(&idk) {
            if record.disabled {
                outcome.tif |=
                    Tif::CURRENT_ID_MATCH | Tif::ID_DISABLED | Tif::COMMAND_FAILED;
                outcome.identity = Some(record.clone());
                return Ok(outcome);
            }
            absorb_client_material(record, request);
            outcome.tif |= Tif::CURRENT_ID_MATCH;
            honor_suk_request(&mut outcome, record, request);
            outcome.identity = Some(record.clone());
            return Ok(outcome);
        }

        if let Some(pidk) = pidk {
            // key rotation: the presented previous key is a current primary
            if let Some(mut record) = identities.remove(pidk) {
                if record.disabled {
                    outcome.tif |=
                        Tif::PREVIOUS_ID_MATCH | Tif::ID_DISABLED | Tif::COMMAND_FAILED;
                    let snapshot = record.clone();
                    identities.insert(pidk.to_string(), record);
                    outcome.identity = Some(snapshot);
                    return Ok(outcome);
                }
                record.previous_keys.retain(|k| k != &idk);
                if !record.previous_keys.iter().any(|k| k == &record.primary_key) {
                    record.previous_keys.push(record.primary_key.clone());
                }
                record.primary_key = idk.clone();
                absorb_client_material(&mut record, request);
                debug!(previous_keys = record.previous_keys.len(), "Rotated identity key");

                outcome.tif |= Tif::CURRENT_ID_MATCH | Tif::PREVIOUS_ID_MATCH;
                honor_suk_request(&mut outcome, &record, request);
                outcome.identity = Some(record.clone());
                identities.insert(idk, record);
                return Ok(outcome);
            }
        }

        // brand-new identity
        let mut record = IdentityRecord {
            primary_key: idk.clone(),
            ..IdentityRecord::default()
        };
        absorb_client_material(&mut record, request);
        outcome.identity = Some(record.clone());
        identities.insert(idk, record);
        Ok(outcome)
    }

    async fn disable(
        &self,
        request: &ClientRequest,
        _nut: &NutRecord,
    ) -> Result<AuthOutcome, StoreError> {
        let mut identities = self.identities.write().await;
        let mut outcome = AuthOutcome::default();
        match identities.get_mut(&request.primary_identity_key) {
            Some(record) => {
                record.disabled = true;
                outcome.tif |= Tif::CURRENT_ID_MATCH | Tif::ID_DISABLED;
                honor_suk_request(&mut outcome, record, request);
                outcome.identity = Some(record.clone());
            }
            None => outcome.tif |= Tif::COMMAND_FAILED,
        }
        Ok(outcome)
    }

    async fn enable(
        &self,
        request: &ClientRequest,
        _nut: &NutRecord,
    ) -> Result<AuthOutcome, StoreError> {
        let mut identities = self.identities.write().await;
        let mut outcome = AuthOutcome::default();
        match identities.get_mut(&request.primary_identity_key) {
            Some(record) => {
                record.disabled = false;
                outcome.tif |= Tif::CURRENT_ID_MATCH;
                honor_suk_request(&mut outcome, record, request);
                outcome.identity = Some(record.clone());
            }
            None => outcome.tif |= Tif::COMMAND_FAILED,
        }
        Ok(outcome)
    }

    async fn remove(
        &self,
        request: &ClientRequest,
        _nut: &NutRecord,
    ) -> Result<AuthOutcome, StoreError> {
        let mut identities = self.identities.write().await;
        let mut outcome = AuthOutcome::default();
        match identities.get(&request.primary_identity_key) {
            Some(record) if record.disabled => {
                identities.remove(&request.primary_identity_key);
            }
            Some(_) => {
                // removal only applies to a disabled identity
                outcome.tif |= Tif::CURRENT_ID_MATCH | Tif::COMMAND_FAILED;
            }
            // retried removal: already gone counts as done
            None => {}
        }
        Ok(outcome)
    }

    async fn find_identity(&self, primary_key: &str) -> Result<Option<IdentityRecord>, StoreError> {
        let identities = self.identities.read().await;
        Ok(identities.get(primary_key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqrld_proto::{Command, OptFlags};
    use std::time::Instant;

    fn request(command: Command, idk: &str) -> ClientRequest {
        ClientRequest {
            protocol_version: 1,
            command,
            nut: "NUT".to_string(),
            primary_identity_key: idk.to_string(),
            previous_identity_key: None,
            server_unlock_key: None,
            verify_unlock_key: None,
            index_secret: None,
            previous_index_secret: None,
            opt: OptFlags::default(),
            ask_response: None,
        }
    }

    fn nut_record() -> NutRecord {
        NutRecord {
            nut: "NUT".to_string(),
            url: None,
            created_at: Instant::now(),
            original_login_nut: None,
            logged_in: false,
            identity_key: None,
            consumed: false,
        }
    }

    #[tokio::test]
    async fn query_unknown_identity_is_empty() {
        let store = MemoryIdentityStore::new();
        let outcome = store.query(&request(Command::Query, "K1"), &nut_record()).await.unwrap();
        assert!(outcome.tif.is_empty());
        assert!(outcome.identity.is_none());
    }

    #[tokio::test]
    async fn ident_creates_then_query_matches() {
        let store = MemoryIdentityStore::new();
        let nut = nut_record();

        let created = store.ident(&request(Command::Ident, "K1"), &nut).await.unwrap();
        assert!(created.tif.is_empty());
        assert!(created.identity.is_some());

        let probed = store.query(&request(Command::Query, "K1"), &nut).await.unwrap();
        assert_eq!(probed.tif, Tif::CURRENT_ID_MATCH);
    }

    #[tokio::test]
    async fn ident_rotates_keys() {
        let store = MemoryIdentityStore::new();
        let nut = nut_record();
        store
            .insert(IdentityRecord {
                primary_key: "K_old".to_string(),
                server_unlock_key: Some("SUK".to_string()),
                ..IdentityRecord::default()
            })
            .await;

        let mut req = request(Command::Ident, "K_new");
        req.previous_identity_key = Some("K_old".to_string());
        let outcome = store.ident(&req, &nut).await.unwrap();
        assert_eq!(outcome.tif, Tif::CURRENT_ID_MATCH | Tif::PREVIOUS_ID_MATCH);

        let rotated = store.find_identity("K_new").await.unwrap().unwrap();
        assert_eq!(rotated.primary_key, "K_new");
        assert!(rotated.previous_keys.contains(&"K_old".to_string()));
        // unlock material survives rotation
        assert_eq!(rotated.server_unlock_key.as_deref(), Some("SUK"));
        assert!(store.find_identity("K_old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rotation_is_idempotent_under_retry() {
        let store = MemoryIdentityStore::new();
        let nut = nut_record();
        store
            .insert(IdentityRecord {
                primary_key: "K_old".to_string(),
                ..IdentityRecord::default()
            })
            .await;

        let mut req = request(Command::Ident, "K_new");
        req.previous_identity_key = Some("K_old".to_string());
        store.ident(&req, &nut).await.unwrap();
        // the retry lands on the already-rotated record
        let retried = store.ident(&req, &nut).await.unwrap();
        assert!(retried.tif.contains(Tif::CURRENT_ID_MATCH));
        assert!(!retried.tif.contains(Tif::COMMAND_FAILED));

        let record = store.find_identity("K_new").await.unwrap().unwrap();
        assert_eq!(record.previous_keys, vec!["K_old".to_string()]);
    }

    #[tokio::test]
    async fn disable_enable_remove_lifecycle() {
        let store = MemoryIdentityStore::new();
        let nut = nut_record();
        store.ident(&request(Command::Ident, "K1"), &nut).await.unwrap();

        let disabled = store.disable(&request(Command::Disable, "K1"), &nut).await.unwrap();
        assert_eq!(disabled.tif, Tif::CURRENT_ID_MATCH | Tif::ID_DISABLED);
        // idempotent
        let again = store.disable(&request(Command::Disable, "K1"), &nut).await.unwrap();
        assert_eq!(again.tif, Tif::CURRENT_ID_MATCH | Tif::ID_DISABLED);

        // ident while disabled is refused
        let refused = store.ident(&request(Command::Ident, "K1"), &nut).await.unwrap();
        assert!(refused.tif.contains(Tif::COMMAND_FAILED));
        assert!(refused.tif.contains(Tif::ID_DISABLED));

        let enabled = store.enable(&request(Command::Enable, "K1"), &nut).await.unwrap();
        assert_eq!(enabled.tif, Tif::CURRENT_ID_MATCH);

        // removal needs the identity disabled first
        let premature = store.remove(&request(Command::Remove, "K1"), &nut).await.unwrap();
        assert!(premature.tif.contains(Tif::COMMAND_FAILED));
        assert!(store.find_identity("K1").await.unwrap().is_some());

        store.disable(&request(Command::Disable, "K1"), &nut).await.unwrap();
        let removed = store.remove(&request(Command::Remove, "K1"), &nut).await.unwrap();
        assert!(removed.tif.is_empty());
        assert!(store.find_identity("K1").await.unwrap().is_none());

        // retried removal still succeeds
        let retried = store.remove(&request(Command::Remove, "K1"), &nut).await.unwrap();
        assert!(retried.tif.is_empty());
    }

    #[tokio::test]
    async fn suk_returned_only_when_requested() {
        let store = MemoryIdentityStore::new();
        let nut = nut_record();
        store
            .insert(IdentityRecord {
                primary_key: "K1".to_string(),
                server_unlock_key: Some("SUK".to_string()),
                ..IdentityRecord::default()
            })
            .await;

        let plain = store.query(&request(Command::Query, "K1"), &nut).await.unwrap();
        assert!(plain.session_unlock_key.is_none());

        let mut req = request(Command::Query, "K1");
        req.opt.return_session_unlock_key = true;
        let with_suk = store.query(&req, &nut).await.unwrap();
        assert_eq!(with_suk.session_unlock_key.as_deref(), Some("SUK"));
    }

    #[tokio::test]
    async fn query_detects_superseded_key() {
        let store = MemoryIdentityStore::new();
        let nut = nut_record();
        store
            .insert(IdentityRecord {
                primary_key: "K_new".to_string(),
                previous_keys: vec!["K_old".to_string()],
                ..IdentityRecord::default()
            })
            .await;

        // old key presented as current
        let outcome = store.query(&request(Command::Query, "K_old"), &nut).await.unwrap();
        assert_eq!(outcome.tif, Tif::PREVIOUS_ID_MATCH);
    }
}
