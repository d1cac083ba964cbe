#![allow(dead_code)] // not every test binary uses every helper

//! Shared test helpers: a minimal SQRL client and a wired-up engine.
//!
//! The client holds a real Ed25519 keypair, encodes client blocks, echoes
//! server replies, and signs envelopes exactly the way a phone app would.

use std::sync::Arc;

use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;

use sqrld_crypto::RandomNutGenerator;
use sqrld_proto::{base64url, envelope, ServerReply};
use sqrld_server::config::SqrlConfig;
use sqrld_server::engine::ProtocolEngine;
use sqrld_server::nut::NutRegistry;
use sqrld_server::store::{IdentityStore, MemoryIdentityStore};

/// A mock SQRL client identity.
pub struct TestClient {
    signing: SigningKey,
}

impl TestClient {
    pub fn new() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    /// This client's identity public key in wire form.
    pub fn idk(&self) -> String {
        base64url::encode(self.signing.verifying_key().as_bytes())
    }

    /// Sign the envelope payload (the still-encoded client and server
    /// strings, concatenated).
    pub fn sign(&self, client_b64: &str, server_b64: &str) -> String {
        let mut payload = client_b64.as_bytes().to_vec();
        payload.extend_from_slice(server_b64.as_bytes());
        base64url::encode(self.signing.sign(&payload).to_bytes())
    }

    /// Encoded client block: `ver=1`, the command, this identity's `idk`,
    /// plus any extra fields.
    pub fn client_field(&self, cmd: &str, extra: &[(&str, &str)]) -> String {
        let idk = self.idk();
        let mut pairs: Vec<(&str, &str)> = vec![("ver", "1"), ("cmd", cmd), ("idk", &idk)];
        pairs.extend_from_slice(extra);
        base64url::encode(envelope::encode_block(pairs.into_iter()))
    }

    /// Complete signed form body for one message.
    pub fn envelope(&self, cmd: &str, server_b64: &str, extra: &[(&str, &str)]) -> String {
        let client = self.client_field(cmd, extra);
        let ids = self.sign(&client, server_b64);
        format!("client={client}&server={server_b64}&ids={ids}")
    }

    /// Rotation envelope: `self` is the new identity, `previous` the one
    /// being rotated away; both signatures are included.
    pub fn rotation_envelope(
        &self,
        previous: &TestClient,
        cmd: &str,
        server_b64: &str,
        extra: &[(&str, &str)],
    ) -> String {
        let pidk = previous.idk();
        let mut fields: Vec<(&str, &str)> = vec![("pidk", &pidk)];
        fields.extend_from_slice(extra);
        let client = self.client_field(cmd, &fields);
        let ids = self.sign(&client, server_b64);
        let pids = previous.sign(&client, server_b64);
        format!("client={client}&server={server_b64}&ids={ids}&pids={pids}")
    }
}

/// Build a signed envelope from verbatim client-block pairs, for tests
/// that need to omit or mangle individual fields.
pub fn envelope_from_pairs(
    signer: &TestClient,
    pairs: &[(&str, &str)],
    server_b64: &str,
) -> String {
    let client = base64url::encode(envelope::encode_block(pairs.iter().copied()));
    let ids = signer.sign(&client, server_b64);
    format!("client={client}&server={server_b64}&ids={ids}")
}

/// Wire a server reply (or a raw sqrl:// URL) into the next message's
/// `server` field.
pub fn server_field_for_url(url: &str) -> String {
    base64url::encode(url)
}

/// A fully wired engine with its collaborators exposed for assertions.
pub struct TestHarness {
    pub engine: Arc<ProtocolEngine>,
    pub registry: Arc<NutRegistry>,
    pub store: Arc<MemoryIdentityStore>,
    pub config: Arc<SqrlConfig>,
}

pub fn test_config() -> SqrlConfig {
    SqrlConfig {
        local_domain_name: "example.com".to_string(),
        client_login_success_url: "https://example.com/loggedin".to_string(),
        client_cancel_auth_url: Some("https://example.com/cancelled".to_string()),
        ..SqrlConfig::default()
    }
}

pub fn harness() -> TestHarness {
    harness_with_config(test_config())
}

pub fn harness_with_config(config: SqrlConfig) -> TestHarness {
    let config = Arc::new(config);
    let registry = Arc::new(NutRegistry::new(config.nut_ttl()));
    let store = Arc::new(MemoryIdentityStore::new());
    let store_dyn: Arc<dyn IdentityStore> = store.clone();
    let engine = Arc::new(ProtocolEngine::new(
        Arc::clone(&config),
        Arc::clone(&registry),
        store_dyn,
        Arc::new(RandomNutGenerator::default()),
    ));
    TestHarness {
        engine,
        registry,
        store,
        config,
    }
}

/// POST a body to the engine, returning the status, the raw reply body
/// (for echoing into the next message), and the decoded reply.
pub async fn post(engine: &ProtocolEngine, body: &str) -> (u16, String, ServerReply) {
    let response = engine.handle_post(body).await;
    let reply = ServerReply::decode(&response.body).expect("reply should decode");
    (response.status, response.body, reply)
}
