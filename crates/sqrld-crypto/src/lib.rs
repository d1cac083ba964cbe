//! Cryptographic seam of the SQRL server.
//!
//! Two concerns live here, both deliberately small:
//!
//! - **Envelope verification**: Ed25519 signature checks over the signed
//!   portion of a client envelope, plus raw-byte key/signature decoding.
//! - **Nut generation**: the pluggable [`NutGenerator`] trait and its
//!   CSPRNG-backed default.
//!
//! The server never holds private key material; clients keep theirs, and
//! the unlock keys the protocol transports are opaque strings to us.

pub mod error;
pub mod nut;
pub mod verify;

pub use error::CryptoError;
pub use nut::{NutGenerator, RandomNutGenerator, DEFAULT_NUT_LEN};
pub use verify::{key_fingerprint, signature_from_bytes, verify, verifying_key_from_bytes};
