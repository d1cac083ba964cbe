//! The POST envelope and its CRLF name=value blocks.
//!
//! A SQRL client POSTs three or four form fields: `client` and `server`
//! (base64url-encoded blocks), `ids` (signature over the concatenation of
//! the still-encoded `client` and `server` strings), and optionally `pids`
//! and `urs`. Inside the decoded blocks, lines are `name=value` terminated
//! by `\r\n`, including the last line.

use std::collections::HashMap;

use crate::base64url;
use crate::error::WireError;

/// The raw POST envelope, still in its base64url-encoded form.
///
/// Signatures cover the encoded `client` and `server` strings, so the
/// encoded forms are kept verbatim alongside anything decoded from them.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Encoded client block.
    pub client: String,
    /// Encoded server echo (a sqrl:// URL or a previous reply block).
    pub server: String,
    /// Identity signature, if present.
    pub ids: Option<String>,
    /// Previous-identity signature, if present.
    pub pids: Option<String>,
    /// Unlock-request signature; transported but not verified.
    pub urs: Option<String>,
}

impl Envelope {
    /// Parse a `application/x-www-form-urlencoded` POST body.
    ///
    /// `client` and `server` are required; the signature fields are
    /// checked later so their absence can be reported distinctly.
    pub fn from_form(body: &str) -> Result<Self, WireError> {
        let mut client = None;
        let mut server = None;
        let mut ids = None;
        let mut pids = None;
        let mut urs = None;

        for pair in body.split('&').filter(|p| !p.is_empty()) {
            let (name, value) = pair
                .split_once('=')
                .ok_or(WireError::MalformedEnvelope("form pair without '='"))?;
            let value = percent_decode(value)?;
            match name {
                "client" => client = Some(value),
                "server" => server = Some(value),
                "ids" => ids = Some(value),
                "pids" => pids = Some(value),
                "urs" => urs = Some(value),
                // Unknown form fields are ignored; the signed material is
                // only ever `client` and `server`.
                _ => {}
            }
        }

        Ok(Self {
            client: client.ok_or(WireError::MalformedEnvelope("no client field"))?,
            server: server.ok_or(WireError::MalformedEnvelope("no server field"))?,
            ids,
            pids,
            urs,
        })
    }

    /// The byte string signatures are computed over: the UTF-8
    /// concatenation of the still-encoded `client` and `server` fields.
    pub fn signed_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(self.client.len() + self.server.len());
        payload.extend_from_slice(self.client.as_bytes());
        payload.extend_from_slice(self.server.as_bytes());
        payload
    }

    /// Decode the `client` field into its name=value map.
    pub fn client_fields(&self) -> Result<HashMap<String, String>, WireError> {
        let block = base64url::decode_str(&self.client, "client")?;
        parse_block(&block)
    }

    /// Decode the `server` field into raw text (URL or block).
    pub fn server_text(&self) -> Result<String, WireError> {
        base64url::decode_str(&self.server, "server")
    }
}

/// Parse a CRLF-terminated name=value block.
///
/// Blank lines are skipped; a non-blank line without `=` is an error.
/// Values may themselves contain `=`. Later duplicates win.
pub fn parse_block(block: &str) -> Result<HashMap<String, String>, WireError> {
    let mut fields = HashMap::new();
    for line in block.split("\r\n") {
        if line.is_empty() {
            continue;
        }
        let (name, value) = line
            .split_once('=')
            .ok_or(WireError::MalformedEnvelope("block line without '='"))?;
        fields.insert(name.to_string(), value.to_string());
    }
    Ok(fields)
}

/// Join name=value pairs into a block, CRLF after every line including
/// the last. Emission order is the caller's.
pub fn encode_block<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut block = String::new();
    for (name, value) in pairs {
        block.push_str(name);
        block.push('=');
        block.push_str(value);
        block.push_str("\r\n");
    }
    block
}

/// Minimal percent-decoding for form values.
///
/// base64url text passes through form encoding untouched, but a strict
/// client may still escape `=` padding as `%3D`.
fn percent_decode(value: &str) -> Result<String, WireError> {
    if !value.contains('%') {
        return Ok(value.to_string());
    }
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .ok_or(WireError::MalformedEnvelope("truncated percent escape"))?;
            let hex = std::str::from_utf8(hex)
                .map_err(|_| WireError::MalformedEnvelope("bad percent escape"))?;
            let byte = u8::from_str_radix(hex, 16)
                .map_err(|_| WireError::MalformedEnvelope("bad percent escape"))?;
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| WireError::MalformedEnvelope("form value is not UTF-8"))
}
