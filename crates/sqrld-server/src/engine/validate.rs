//! Request validation: decode the envelope, verify signatures, type the
//! request.
//!
//! Nothing past this module ever sees an unverified client message.

use std::collections::HashMap;

use sqrld_proto::{base64url, envelope, url as sqrl_url, ClientRequest, Envelope, WireError};

use super::EngineError;

/// Decode and verify a raw POST body into a [`ClientRequest`].
pub fn validate(body: &str) -> Result<ClientRequest, EngineError> {
    let envelope = Envelope::from_form(body)?;
    let fields = envelope.client_fields()?;

    let idk = fields
        .get("idk")
        .ok_or(WireError::MissingIdentityKey)?
        .clone();
    let ids = envelope
        .ids
        .as_deref()
        .ok_or(WireError::MissingSignature)?;

    // Signatures cover the still-encoded client and server strings.
    let payload = envelope.signed_payload();
    verify_one(&idk, ids, &payload)?;

    if let Some(pidk) = fields.get("pidk") {
        let pids = envelope
            .pids
            .as_deref()
            .ok_or(WireError::MissingSignature)?;
        verify_one(pidk, pids, &payload)?;
    }

    let nut = nut_from_server_field(&envelope.server_text()?)?;
    Ok(ClientRequest::from_fields(&fields, nut)?)
}

fn verify_one(key_b64: &str, sig_b64: &str, payload: &[u8]) -> Result<(), EngineError> {
    let key_bytes = base64url::decode(key_b64)?;
    let sig_bytes = base64url::decode(sig_b64)?;
    let key = sqrld_crypto::verifying_key_from_bytes(&key_bytes)?;
    let sig = sqrld_crypto::signature_from_bytes(&sig_bytes)?;
    sqrld_crypto::verify(&key, payload, &sig)?;
    Ok(())
}

/// The echoed `server` field is either the original `sqrl://` URL or a
/// previous reply block; both carry the nut the client replies against.
fn nut_from_server_field(text: &str) -> Result<String, WireError> {
    if text.starts_with("sqrl") {
        sqrl_url::nut_from_url(text)
    } else {
        let fields: HashMap<String, String> = envelope::parse_block(text)?;
        fields
            .get("nut")
            .cloned()
            .ok_or(WireError::MalformedServerField)
    }
}
