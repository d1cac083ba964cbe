//! Ed25519 envelope signature verification.
//!
//! The client signs the UTF-8 concatenation of the still-encoded `client`
//! and `server` envelope fields. Key handles and signatures are built from
//! raw bytes here and dropped after the verify step; there is no
//! process-wide cryptographic context.

use ed25519_dalek::{Signature, Verifier, VerifyingKey, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};
use sha2::{Digest, Sha256};

use crate::error::CryptoError;

/// Build a verifying key from raw 32-byte public key material.
pub fn verifying_key_from_bytes(bytes: &[u8]) -> Result<VerifyingKey, CryptoError> {
    let arr: &[u8; PUBLIC_KEY_LENGTH] =
        bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength {
                expected: PUBLIC_KEY_LENGTH,
                actual: bytes.len(),
            })?;
    VerifyingKey::from_bytes(arr).map_err(|e| CryptoError::MalformedKey(e.to_string()))
}

/// Build a signature from raw 64-byte material.
pub fn signature_from_bytes(bytes: &[u8]) -> Result<Signature, CryptoError> {
    let arr: &[u8; SIGNATURE_LENGTH] =
        bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidSignatureLength {
                expected: SIGNATURE_LENGTH,
                actual: bytes.len(),
            })?;
    Ok(Signature::from_bytes(arr))
}

/// Verify `signature` over `message` with `key`.
pub fn verify(key: &VerifyingKey, message: &[u8], signature: &Signature) -> Result<(), CryptoError> {
    key.verify(message, signature)
        .map_err(|_| CryptoError::BadSignature)
}

/// Short hex fingerprint of public key material, for log lines.
///
/// SHA-256 of the key, first eight bytes. Never feed this back into any
/// comparison; it exists for humans reading logs.
pub fn key_fingerprint(key_bytes: &[u8]) -> String {
    let digest = Sha256::digest(key_bytes);
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::rngs::OsRng;

    #[test]
    fn verify_accepts_valid_signature() {
        let signing = SigningKey::generate(&mut OsRng);
        let message = b"clientfieldserverfield";
        let signature = signing.sign(message);

        let key = verifying_key_from_bytes(signing.verifying_key().as_bytes()).unwrap();
        let sig = signature_from_bytes(&signature.to_bytes()).unwrap();
        assert!(verify(&key, message, &sig).is_ok());
    }

    #[test]
    fn verify_rejects_flipped_message_bit() {
        let signing = SigningKey::generate(&mut OsRng);
        let message = b"clientfieldserverfield".to_vec();
        let signature = signing.sign(&message);

        let mut tampered = message.clone();
        tampered[0] ^= 0x01;

        let key = signing.verifying_key();
        let sig = signature_from_bytes(&signature.to_bytes()).unwrap();
        assert!(matches!(
            verify(&key, &tampered, &sig),
            Err(CryptoError::BadSignature)
        ));
    }

    #[test]
    fn verify_rejects_flipped_signature_bit() {
        let signing = SigningKey::generate(&mut OsRng);
        let message = b"payload";
        let mut sig_bytes = signing.sign(message).to_bytes();
        sig_bytes[10] ^= 0x80;

        let key = signing.verifying_key();
        let sig = signature_from_bytes(&sig_bytes).unwrap();
        assert!(verify(&key, message, &sig).is_err());
    }

    #[test]
    fn wrong_lengths_are_reported() {
        assert!(matches!(
            verifying_key_from_bytes(&[0u8; 31]),
            Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: 31
            })
        ));
        assert!(matches!(
            signature_from_bytes(&[0u8; 63]),
            Err(CryptoError::InvalidSignatureLength {
                expected: 64,
                actual: 63
            })
        ));
    }

    #[test]
    fn fingerprint_is_stable_and_short() {
        let a = key_fingerprint(b"some key bytes");
        let b = key_fingerprint(b"some key bytes");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }
}
