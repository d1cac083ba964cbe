//! Unpadded base64url framing.
//!
//! Everything on the SQRL wire is base64url: nuts, envelope fields, keys
//! and signatures. Emitted values never carry `=` padding; decoding accepts
//! both padded and unpadded input, since clients in the wild differ.

use base64::alphabet;
use base64::engine::general_purpose::GeneralPurpose;
use base64::engine::{DecodePaddingMode, GeneralPurposeConfig};
use base64::Engine as _;

use crate::error::WireError;

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode bytes as unpadded base64url.
pub fn encode(data: impl AsRef<[u8]>) -> String {
    URL_SAFE_LENIENT.encode(data)
}

/// Decode base64url input, padded or not.
pub fn decode(input: impl AsRef<[u8]>) -> Result<Vec<u8>, WireError> {
    URL_SAFE_LENIENT
        .decode(input)
        .map_err(|e| WireError::Base64(e.to_string()))
}

/// Decode a base64url field that must contain UTF-8 text.
///
/// `field` names the envelope field for error reporting.
pub fn decode_str(input: &str, field: &'static str) -> Result<String, WireError> {
    let bytes = decode(input)?;
    String::from_utf8(bytes).map_err(|_| WireError::Utf8 { field })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let cases: &[&[u8]] = &[b"", b"f", b"fo", b"foo", b"foob", b"fooba", b"foobar"];
        for &data in cases {
            let encoded = encode(data);
            assert!(!encoded.contains('='), "padding leaked: {encoded}");
            assert_eq!(decode(&encoded).unwrap(), data);
        }
    }

    #[test]
    fn accepts_padded_input() {
        // "any carnal pleasure" style vectors, padded and unpadded
        assert_eq!(decode("Zm9v").unwrap(), b"foo");
        assert_eq!(decode("Zm8=").unwrap(), b"fo");
        assert_eq!(decode("Zm8").unwrap(), b"fo");
    }

    #[test]
    fn url_safe_alphabet() {
        // 0xfb 0xff encodes to characters outside the standard alphabet
        let encoded = encode([0xfbu8, 0xff, 0xfe]);
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        assert_eq!(decode(&encoded).unwrap(), vec![0xfb, 0xff, 0xfe]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode("not base64 at all!").is_err());
    }

    #[test]
    fn decode_str_requires_utf8() {
        let encoded = encode([0xff, 0xfe]);
        assert!(matches!(
            decode_str(&encoded, "client"),
            Err(WireError::Utf8 { field: "client" })
        ));
    }
}
