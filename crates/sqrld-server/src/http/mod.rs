//! HTTP surface: the SQRL protocol endpoint and the login-poll port.
//!
//! Handlers stay thin; all protocol behavior lives in the engine and the
//! registry. The poll endpoint only reads; it never advances protocol
//! state.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::warn;

use crate::config::SqrlConfig;
use crate::engine::ProtocolEngine;
use crate::nut::NutRegistry;
use crate::store::IdentityStore;

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ProtocolEngine>,
    pub registry: Arc<NutRegistry>,
    pub store: Arc<dyn IdentityStore>,
    pub config: Arc<SqrlConfig>,
}

/// Build the router: the configured SQRL POST path, the poll endpoint,
/// and a health check.
pub fn create_router(state: AppState) -> Router {
    let sqrl_path = if state.config.url_path.starts_with('/') {
        state.config.url_path.clone()
    } else {
        format!("/{}", state.config.url_path)
    };

    Router::new()
        .route(&sqrl_path, post(sqrl_handler))
        .route("/pollNut/{nut}", get(poll_handler))
        .route("/health", get(|| async { "sqrld is healthy" }))
        .with_state(state)
}

async fn sqrl_handler(State(state): State<AppState>, body: String) -> Response {
    let reply = state.engine.handle_post(&body).await;
    let status =
        StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, reply.body).into_response()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PollReply {
    logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_to: Option<String>,
}

/// Report whether the conversation anchored at `nut` has completed login.
///
/// Binding the resolved identity to the caller's browser session is the
/// site's job; this endpoint only says where to send the browser next.
async fn poll_handler(State(state): State<AppState>, Path(nut): Path<String>) -> Response {
    let Some(record) = state.registry.lookup(&nut).await else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let identity_key = match (record.logged_in, record.identity_key) {
        (true, Some(key)) => key,
        _ => {
            return Json(PollReply {
                logged_in: false,
                redirect_to: None,
            })
            .into_response()
        }
    };

    match state.store.find_identity(&identity_key).await {
        Ok(Some(_)) => Json(PollReply {
            logged_in: true,
            redirect_to: Some(state.config.client_login_success_url.clone()),
        })
        .into_response(),
        // the conversation outlived its identity
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(error) => {
            warn!(error = %error, nut = %nut, "Poll could not reach identity store");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
