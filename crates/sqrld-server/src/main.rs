//! `sqrld` SQRL authentication daemon.
//!
//! Serves the SQRL protocol endpoint and the login-poll endpoint over
//! plain HTTP; terminate TLS in front of it. Identity storage is
//! in-memory; production sites embed the server crate and put a durable
//! store behind the `IdentityStore` trait.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use sqrld_crypto::RandomNutGenerator;
use sqrld_server::config::SqrlConfig;
use sqrld_server::engine::ProtocolEngine;
use sqrld_server::http::{create_router, AppState};
use sqrld_server::nut::NutRegistry;
use sqrld_server::store::{IdentityStore, MemoryIdentityStore};
use sqrld_server::tracing_init::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "sqrld")]
#[command(version, about = "SQRL authentication server")]
struct Args {
    /// TCP bind address
    #[arg(long, default_value = "127.0.0.1:8000", env = "SQRLD_ADDR")]
    addr: SocketAddr,

    /// Public domain name embedded in issued sqrl:// URLs
    #[arg(long, default_value = "localhost", env = "SQRLD_DOMAIN")]
    domain: String,

    /// Public port embedded in issued sqrl:// URLs (omit when standard)
    #[arg(long, env = "SQRLD_PUBLIC_PORT")]
    public_port: Option<u16>,

    /// Path of the SQRL protocol endpoint
    #[arg(long, default_value = "/sqrl", env = "SQRLD_URL_PATH")]
    url_path: String,

    /// Domain-extension hint (x=): leading path characters included in
    /// the client's per-site key derivation
    #[arg(long, env = "SQRLD_DOMAIN_EXTENSION")]
    domain_extension: Option<usize>,

    /// Where the browser lands after a completed login
    #[arg(long, default_value = "/loggedin", env = "SQRLD_SUCCESS_URL")]
    success_url: String,

    /// Where the browser lands after a cancelled login
    #[arg(long, env = "SQRLD_CANCEL_URL")]
    cancel_url: Option<String>,

    /// Seconds before unredeemed nuts are evicted
    #[arg(long, default_value_t = 12 * 60 * 60, env = "SQRLD_NUT_TTL")]
    nut_ttl_secs: u64,

    /// Log level filter (e.g. "info", "sqrld=debug")
    #[arg(long, default_value = "sqrld=info", env = "SQRLD_LOG_LEVEL")]
    log_level: String,

    /// Output logs as JSON (for structured log aggregation)
    #[arg(long, env = "SQRLD_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level, args.log_json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %args.addr,
        domain = %args.domain,
        "Starting sqrld"
    );

    let config = Arc::new(SqrlConfig {
        local_domain_name: args.domain,
        port: args.public_port,
        url_path: args.url_path,
        domain_extension: args.domain_extension,
        client_login_success_url: args.success_url,
        client_cancel_auth_url: args.cancel_url,
        nut_ttl_secs: args.nut_ttl_secs,
    });

    let registry = Arc::new(NutRegistry::new(config.nut_ttl()));
    let store: Arc<dyn IdentityStore> = Arc::new(MemoryIdentityStore::new());
    let engine = Arc::new(ProtocolEngine::new(
        Arc::clone(&config),
        Arc::clone(&registry),
        Arc::clone(&store),
        Arc::new(RandomNutGenerator::default()),
    ));

    let app = create_router(AppState {
        engine,
        registry,
        store,
        config: Arc::clone(&config),
    });

    let listener = TcpListener::bind(args.addr).await?;
    info!(addr = %args.addr, path = %config.url_path, "sqrld listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("sqrld stopped");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    info!("Received shutdown signal");
}
