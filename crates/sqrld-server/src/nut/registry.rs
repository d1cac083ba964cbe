//! The nut registry.
//!
//! This is the only shared mutable state the protocol core owns: a
//! TTL-bounded map from nut string to [`NutRecord`]. Conversations hang
//! together through it: every descendant nut points straight back at the
//! origin nut from the QR code, so the poll endpoint can answer "has this
//! login completed?" no matter how many round trips intervened.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

/// Lazy expiry sweep runs once per this many write operations.
const SWEEP_EVERY_OPS: u64 = 256;

/// One issued nut and everything the server remembers about it.
#[derive(Debug, Clone)]
pub struct NutRecord {
    /// Wire form of the nut (primary key).
    pub nut: String,
    /// The URL or query path this nut was handed out in, if any.
    pub url: Option<String>,
    /// Issue time, for TTL eviction.
    pub created_at: Instant,
    /// The earliest ancestor of this conversation. `None` means this
    /// record *is* the origin. Descendants always point directly at the
    /// origin, never at their immediate predecessor.
    pub original_login_nut: Option<String>,
    /// Flipped on the origin record when an `ident` completes.
    pub logged_in: bool,
    /// The identity that completed login, set alongside `logged_in`.
    pub identity_key: Option<String>,
    /// A client message already redeemed this nut. Consumed records stay
    /// in the registry so the poll endpoint can keep reading them; they
    /// are just no longer valid currency for the protocol endpoint.
    pub consumed: bool,
}

impl NutRecord {
    /// The origin nut of this record's conversation.
    pub fn origin_nut(&self) -> &str {
        self.original_login_nut.as_deref().unwrap_or(&self.nut)
    }
}

/// Registry counters, for logs and operational introspection.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryStats {
    pub live: usize,
    pub issued: u64,
    pub consumed: u64,
    pub evicted: u64,
}

/// TTL-bounded nut map, safe for concurrent access.
pub struct NutRegistry {
    records: RwLock<HashMap<String, NutRecord>>,
    ttl: Duration,
    ops: AtomicU64,
    issued: AtomicU64,
    consumed: AtomicU64,
    evicted: AtomicU64,
}

impl NutRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            ttl,
            ops: AtomicU64::new(0),
            issued: AtomicU64::new(0),
            consumed: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    /// Registry with the stock 12-hour retention window.
    pub fn with_defaults() -> Self {
        Self::new(Duration::from_secs(12 * 60 * 60))
    }

    /// Record a freshly minted nut.
    ///
    /// `origin` must already be resolved to the earliest ancestor of the
    /// conversation; pass `None` for an origin (QR-code) nut.
    pub async fn issue(&self, nut: &str, url: Option<String>, origin: Option<String>) {
        let mut records = self.records.write().await;
        self.maybe_sweep(&mut records);
        records.insert(
            nut.to_string(),
            NutRecord {
                nut: nut.to_string(),
                url,
                created_at: Instant::now(),
                original_login_nut: origin,
                logged_in: false,
                identity_key: None,
                consumed: false,
            },
        );
        self.issued.fetch_add(1, Ordering::Relaxed);
    }

    /// Retrieve a record by nut. Expired records read as absent even
    /// before the sweep removes them.
    pub async fn lookup(&self, nut: &str) -> Option<NutRecord> {
        let records = self.records.read().await;
        records
            .get(nut)
            .filter(|record| record.created_at.elapsed() <= self.ttl)
            .cloned()
    }

    /// Atomically redeem `presented` and register its successor.
    ///
    /// Returns a snapshot of the presented record, or `None` when the nut
    /// is unknown, expired, or already redeemed; under concurrent attempts
    /// with the same nut, at most one caller succeeds. The successor
    /// inherits the conversation's origin.
    pub async fn consume_and_issue(
        &self,
        presented: &str,
        next_nut: &str,
        next_url: Option<String>,
    ) -> Option<NutRecord> {
        let mut records = self.records.write().await;
        self.maybe_sweep(&mut records);

        let (origin, snapshot) = {
            let record = records.get_mut(presented)?;
            if record.consumed || record.created_at.elapsed() > self.ttl {
                return None;
            }
            record.consumed = true;
            (record.origin_nut().to_string(), record.clone())
        };

        records.insert(
            next_nut.to_string(),
            NutRecord {
                nut: next_nut.to_string(),
                url: next_url,
                created_at: Instant::now(),
                original_login_nut: Some(origin),
                logged_in: false,
                identity_key: None,
                consumed: false,
            },
        );
        self.consumed.fetch_add(1, Ordering::Relaxed);
        self.issued.fetch_add(1, Ordering::Relaxed);
        Some(snapshot)
    }

    /// Flip `logged_in` on the origin record and bind the identity that
    /// completed the login. Once this returns, every subsequent `lookup`
    /// of the origin observes the flag.
    pub async fn mark_logged_in(&self, origin: &str, identity_key: &str) -> bool {
        let mut records = self.records.write().await;
        match records.get_mut(origin) {
            Some(record) => {
                record.logged_in = true;
                record.identity_key = Some(identity_key.to_string());
                true
            }
            None => false,
        }
    }

    pub async fn stats(&self) -> RegistryStats {
        let records = self.records.read().await;
        RegistryStats {
            live: records.len(),
            issued: self.issued.load(Ordering::Relaxed),
            consumed: self.consumed.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
        }
    }

    /// Drop expired records every [`SWEEP_EVERY_OPS`] write operations.
    /// Runs under the caller's write lock.
    fn maybe_sweep(&self, records: &mut HashMap<String, NutRecord>) {
        let ops = self.ops.fetch_add(1, Ordering::Relaxed);
        if ops % SWEEP_EVERY_OPS != 0 {
            return;
        }
        let before = records.len();
        records.retain(|_, record| record.created_at.elapsed() <= self.ttl);
        let removed = before - records.len();
        if removed > 0 {
            self.evicted.fetch_add(removed as u64, Ordering::Relaxed);
            debug!(removed, live = records.len(), "Swept expired nuts");
        }
    }
}
