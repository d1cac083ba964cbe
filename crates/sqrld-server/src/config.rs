//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqrld_proto::SqrlUrlFactory;

/// Complete SQRL server configuration.
///
/// Everything here is injected; nothing reads the environment directly.
/// The binary fills this from CLI arguments, library consumers construct
/// it however they like.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqrlConfig {
    /// Host placed in issued `sqrl://` URLs.
    pub local_domain_name: String,
    /// Port placed in issued URLs; omitted when the site runs on the
    /// standard port.
    #[serde(default)]
    pub port: Option<u16>,
    /// Path of the SQRL protocol endpoint.
    #[serde(default = "default_url_path")]
    pub url_path: String,
    /// `x=` hint: how many leading path characters participate in the
    /// client's per-site key derivation.
    #[serde(default)]
    pub domain_extension: Option<usize>,
    /// Where the browser is sent after a completed login.
    #[serde(default = "default_success_url")]
    pub client_login_success_url: String,
    /// Where the browser is sent after a cancelled login, when the site
    /// wants a `can=` field in replies.
    #[serde(default)]
    pub client_cancel_auth_url: Option<String>,
    /// Seconds before unredeemed nuts are evicted from the registry.
    #[serde(default = "default_nut_ttl_secs")]
    pub nut_ttl_secs: u64,
}

fn default_url_path() -> String {
    "/sqrl".to_string()
}

fn default_success_url() -> String {
    "/loggedin".to_string()
}

fn default_nut_ttl_secs() -> u64 {
    12 * 60 * 60
}

impl Default for SqrlConfig {
    fn default() -> Self {
        Self {
            local_domain_name: "localhost".to_string(),
            port: None,
            url_path: default_url_path(),
            domain_extension: None,
            client_login_success_url: default_success_url(),
            client_cancel_auth_url: None,
            nut_ttl_secs: default_nut_ttl_secs(),
        }
    }
}

impl SqrlConfig {
    /// URL factory for this site.
    pub fn url_factory(&self) -> SqrlUrlFactory {
        SqrlUrlFactory::new(
            &self.local_domain_name,
            self.port,
            Some(&self.url_path),
            self.domain_extension,
        )
    }

    pub fn nut_ttl(&self) -> Duration {
        Duration::from_secs(self.nut_ttl_secs)
    }
}
