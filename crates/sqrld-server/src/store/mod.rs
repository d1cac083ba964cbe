//! Identity storage seam.
//!
//! The engine dispatches verified commands into an [`IdentityStore`]; what
//! sits behind the trait is a deployment choice. [`MemoryIdentityStore`]
//! is the reference implementation used by tests and the stock binary.
//!
//! Stores own two policies the engine deliberately does not: idempotence
//! of the state-changing commands (clients retry over flaky networks) and
//! the disabled-state rules (`remove` only applies to a disabled
//! identity).

mod memory;

pub use memory::MemoryIdentityStore;

use async_trait::async_trait;

use sqrld_proto::{ClientRequest, Tif};

use crate::nut::NutRecord;

/// Durable state for one SQRL identity, keyed by its primary public key.
#[derive(Debug, Clone, Default)]
pub struct IdentityRecord {
    /// Current identity public key (base64url).
    pub primary_key: String,
    /// Keys this identity rotated away from, oldest first.
    pub previous_keys: Vec<String>,
    /// Opaque unlock material retained on the client's behalf.
    pub server_unlock_key: Option<String>,
    pub verify_unlock_key: Option<String>,
    /// SQRL authentication disabled for this identity.
    pub disabled: bool,
    /// Client advice: refuse non-SQRL authentication.
    pub sqrl_only: bool,
    /// Client advice: refuse out-of-band recovery.
    pub hard_lock: bool,
}

/// What a store operation concluded.
#[derive(Debug, Clone, Default)]
pub struct AuthOutcome {
    /// Flags describing the identity match and command disposition.
    pub tif: Tif,
    /// The identity the command landed on, when one was found or made.
    pub identity: Option<IdentityRecord>,
    /// Stored session unlock key, set only when the client asked for it.
    pub session_unlock_key: Option<String>,
}

/// A store-side failure. The engine renders these as transient errors
/// the client may retry against a fresh nut.
#[derive(Debug, thiserror::Error)]
#[error("identity store unavailable: {0}")]
pub struct StoreError(pub String);

/// The capability set the engine consumes.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Read-only identity probe; never mutates.
    async fn query(
        &self,
        request: &ClientRequest,
        nut: &NutRecord,
    ) -> Result<AuthOutcome, StoreError>;

    /// Create, update, or rotate an identity; completes a login.
    async fn ident(
        &self,
        request: &ClientRequest,
        nut: &NutRecord,
    ) -> Result<AuthOutcome, StoreError>;

    /// Disable SQRL authentication for the identity. Idempotent.
    async fn disable(
        &self,
        request: &ClientRequest,
        nut: &NutRecord,
    ) -> Result<AuthOutcome, StoreError>;

    /// Re-enable a disabled identity. Idempotent.
    async fn enable(
        &self,
        request: &ClientRequest,
        nut: &NutRecord,
    ) -> Result<AuthOutcome, StoreError>;

    /// Remove a disabled identity. Idempotent.
    async fn remove(
        &self,
        request: &ClientRequest,
        nut: &NutRecord,
    ) -> Result<AuthOutcome, StoreError>;

    /// Read-only resolution by primary key, for the login-poll endpoint.
    async fn find_identity(&self, primary_key: &str) -> Result<Option<IdentityRecord>, StoreError>;
}
