//! Wire-level error types.

use thiserror::Error;

/// Errors produced while decoding or encoding the SQRL wire format.
///
/// Every variant maps to an HTTP 400 at the transport boundary; the
/// distinction between them is what the reply's `ask=` field tells the
/// client (and what the logs tell the operator).
#[derive(Debug, Error)]
pub enum WireError {
    /// The POST body is not parseable as form data, or a structural
    /// piece of the envelope is broken.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(&'static str),

    /// A required name=value field was absent from the client block.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The client block carried no `idk` identity key.
    #[error("client omitted its identity key (idk)")]
    MissingIdentityKey,

    /// The envelope carried no signature where one was required.
    #[error("client omitted a required signature")]
    MissingSignature,

    /// The echoed `server` field could not be resolved to a nut.
    #[error("server field carries no nut")]
    MalformedServerField,

    /// An `opt` flag outside the recognized vocabulary.
    #[error("unknown option flag: {0}")]
    UnknownOption(String),

    /// A `cmd` value outside the recognized vocabulary.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("invalid base64url data: {0}")]
    Base64(String),

    #[error("invalid sqrl url: {0}")]
    Url(String),

    #[error("field {field} is not valid UTF-8")]
    Utf8 { field: &'static str },

    #[error("invalid tif value: {0}")]
    Tif(String),
}
