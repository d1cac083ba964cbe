//! The protocol engine.
//!
//! One entry point, [`ProtocolEngine::handle_post`], takes a raw POST body
//! and produces a status plus an encoded reply. Failures come back as
//! normally-framed SQRL replies too, always with a fresh nut, so a client
//! that hit a transient failure can retry without restarting the
//! conversation.

pub mod validate;

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use sqrld_crypto::{key_fingerprint, CryptoError, NutGenerator};
use sqrld_proto::{
    base64url, ClientRequest, Command, ServerReply, SqrlUrlFactory, Tif, UrlAndNut, WireError,
};

use crate::config::SqrlConfig;
use crate::nut::{NutRecord, NutRegistry};
use crate::store::{AuthOutcome, IdentityStore, StoreError};

/// Everything a transport needs to answer one SQRL POST.
#[derive(Debug, Clone)]
pub struct EngineResponse {
    /// HTTP status to reply with.
    pub status: u16,
    /// Base64url-encoded reply block.
    pub body: String,
}

/// A failed engine invocation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("signature rejected: {0}")]
    Crypto(#[from] CryptoError),

    #[error("unsupported protocol version {0}: this server speaks protocol revision 1")]
    UnsupportedVersion(u32),

    #[error("unknown nut: {0}")]
    UnknownNut(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Transport disposition: client faults are 400, store trouble is 500.
    pub fn http_status(&self) -> u16 {
        match self {
            EngineError::Store(_) => 500,
            _ => 400,
        }
    }

    /// Flags carried in the failure reply.
    pub fn tif(&self) -> Tif {
        match self {
            EngineError::Store(_) => Tif::COMMAND_FAILED | Tif::TRANSIENT_ERROR,
            _ => Tif::COMMAND_FAILED | Tif::CLIENT_FAILURE,
        }
    }
}

/// The per-request SQRL state machine.
pub struct ProtocolEngine {
    config: Arc<SqrlConfig>,
    registry: Arc<NutRegistry>,
    store: Arc<dyn IdentityStore>,
    generator: Arc<dyn NutGenerator>,
    url_factory: SqrlUrlFactory,
}

impl ProtocolEngine {
    pub fn new(
        config: Arc<SqrlConfig>,
        registry: Arc<NutRegistry>,
        store: Arc<dyn IdentityStore>,
        generator: Arc<dyn NutGenerator>,
    ) -> Self {
        let url_factory = config.url_factory();
        Self {
            config,
            registry,
            store,
            generator,
            url_factory,
        }
    }

    /// Mint an origin nut and the `sqrl://` URL that starts a
    /// conversation: the URL behind the QR code.
    pub async fn issue_login_url(&self) -> UrlAndNut {
        let out = self.url_factory.url_for_bytes(&self.generator.generate());
        self.registry
            .issue(&out.nut, Some(out.url.clone()), None)
            .await;
        debug!(nut = %out.nut, "Issued login URL");
        out
    }

    /// Process one client POST.
    #[instrument(skip(self, body))]
    pub async fn handle_post(&self, body: &str) -> EngineResponse {
        match self.process(body).await {
            Ok(response) => response,
            Err((error, origin)) => self.error_reply(error, origin).await,
        }
    }

    /// The happy path; errors bubble out with whatever conversation
    /// context was established before the failure.
    async fn process(
        &self,
        body: &str,
    ) -> Result<EngineResponse, (EngineError, Option<String>)> {
        let request = validate::validate(body).map_err(|e| (e, None))?;

        if request.protocol_version != 1 {
            return Err((
                EngineError::UnsupportedVersion(request.protocol_version),
                None,
            ));
        }

        info!(
            command = %request.command,
            nut = %request.nut,
            idk = %key_fingerprint(request.primary_identity_key.as_bytes()),
            "Handling SQRL command"
        );

        let (next_nut, next_qry) = self.mint_next();
        let record = self
            .registry
            .consume_and_issue(&request.nut, &next_nut, Some(next_qry.clone()))
            .await
            .ok_or_else(|| (EngineError::UnknownNut(request.nut.clone()), None))?;
        let origin = record.origin_nut().to_string();

        let outcome = self
            .dispatch(&request, &record)
            .await
            .map_err(|e| (EngineError::Store(e), Some(origin.clone())))?;

        if request.command == Command::Ident && !outcome.tif.contains(Tif::COMMAND_FAILED) {
            self.registry
                .mark_logged_in(&origin, &request.primary_identity_key)
                .await;
            info!(
                origin = %origin,
                idk = %key_fingerprint(request.primary_identity_key.as_bytes()),
                "Login completed"
            );
        }

        let mut reply = ServerReply::new(next_nut, outcome.tif, next_qry);
        if request.opt.client_provided_session && request.command != Command::Query {
            reply.url = Some(self.config.client_login_success_url.clone());
        }
        reply.can = self.config.client_cancel_auth_url.clone();
        reply.suk = outcome.session_unlock_key;

        Ok(EngineResponse {
            status: 200,
            body: reply.encode(),
        })
    }

    async fn dispatch(
        &self,
        request: &ClientRequest,
        record: &NutRecord,
    ) -> Result<AuthOutcome, StoreError> {
        match request.command {
            Command::Query => self.store.query(request, record).await,
            Command::Ident => self.store.ident(request, record).await,
            Command::Disable => self.store.disable(request, record).await,
            Command::Enable => self.store.enable(request, record).await,
            Command::Remove => self.store.remove(request, record).await,
        }
    }

    /// Render a failure as a normally-framed reply. The fresh nut keeps
    /// retry possible; when the failing request belonged to a known
    /// conversation, the nut chains to that conversation's origin so a
    /// retried login can still complete the original poll.
    async fn error_reply(&self, error: EngineError, origin: Option<String>) -> EngineResponse {
        warn!(error = %error, status = error.http_status(), "SQRL request failed");

        let (nut, qry) = self.mint_next();
        self.registry.issue(&nut, Some(qry.clone()), origin).await;

        let mut reply = ServerReply::new(nut, error.tif(), qry);
        reply.ask = Some(error.to_string());
        reply.can = self.config.client_cancel_auth_url.clone();

        EngineResponse {
            status: error.http_status(),
            body: reply.encode(),
        }
    }

    /// Mint the follow-up nut and the relative query path carrying it.
    fn mint_next(&self) -> (String, String) {
        let nut = base64url::encode(self.generator.generate());
        let qry = format!("{}?nut={}", self.config.url_path, nut);
        (nut, qry)
    }
}
