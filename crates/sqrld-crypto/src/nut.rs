//! Nut (nonce) generation.
//!
//! Nuts anchor conversational integrity: each reply carries a fresh one
//! and only that one is honored on the next message. Generation is
//! pluggable so deployments can substitute encrypted or structured nuts;
//! the default is 128 bits from the OS CSPRNG.

use rand::rngs::OsRng;
use rand::RngCore;

/// Default nut length in bytes.
pub const DEFAULT_NUT_LEN: usize = 16;

/// A source of nut values.
///
/// Implementations must produce values that are unpredictable and, for
/// practical purposes, never repeat within a registry's retention window.
pub trait NutGenerator: Send + Sync {
    /// Produce the raw bytes of one fresh nut.
    fn generate(&self) -> Vec<u8>;
}

/// CSPRNG-backed generator producing `len` random bytes per nut.
#[derive(Debug, Clone)]
pub struct RandomNutGenerator {
    len: usize,
}

impl RandomNutGenerator {
    pub fn new(len: usize) -> Self {
        Self { len }
    }
}

impl Default for RandomNutGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_NUT_LEN)
    }
}

impl NutGenerator for RandomNutGenerator {
    fn generate(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.len];
        OsRng.fill_bytes(&mut bytes);
        bytes
    }
}
