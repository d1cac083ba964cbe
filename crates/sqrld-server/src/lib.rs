//! SQRL protocol server.
//!
//! The pieces of a server-side SQRL deployment:
//! - the [`engine::ProtocolEngine`] per-request state machine
//! - the [`nut::NutRegistry`] holding single-use nonce ("nut") state
//! - the [`store::IdentityStore`] seam for durable identity records
//! - an axum HTTP surface in [`http`] (protocol POST + login poll)
//!
//! Sites embed this as a library (bring your own store and router) or run
//! the `sqrld` binary, which wires the in-memory store.

pub mod config;
pub mod engine;
pub mod http;
pub mod nut;
pub mod store;
pub mod tracing_init;
