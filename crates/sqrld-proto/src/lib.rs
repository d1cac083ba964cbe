//! SQRL wire format.
//!
//! Everything that crosses the wire in a SQRL conversation lives here:
//!
//! - base64url framing (unpadded emit, padding-indifferent decode)
//! - the POST envelope (`client`/`server`/`ids`/`pids`/`urs`) and its
//!   CRLF-terminated name=value blocks
//! - the typed [`ClientRequest`] and [`ServerReply`] records
//! - [`Tif`] transaction flags
//! - `sqrl://` URL construction and canonicalization
//!
//! Nothing in this crate does I/O or cryptography; signature verification
//! sits in `sqrld-crypto`, and protocol state in `sqrld-server`.

pub mod base64url;
pub mod envelope;
pub mod error;
pub mod reply;
pub mod request;
pub mod tif;
pub mod url;

pub use envelope::Envelope;
pub use error::WireError;
pub use reply::ServerReply;
pub use request::{ClientRequest, Command, OptFlags};
pub use tif::Tif;
pub use url::{SqrlUrlFactory, UrlAndNut};
