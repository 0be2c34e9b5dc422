use pqcrypto_dilithium::dilithium2;
use pqcrypto_traits::sign::{DetachedSignature, PublicKey, SecretKey};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid public key length: expected {expected}, got {got}")]
    InvalidPublicKeyLength { expected: usize, got: usize },
}

/// Sign `message` with a Dilithium2 secret key. Returns a detached signature.
pub fn sign(secret_key_bytes: &[u8], message: &[u8]) -> Result<Vec<u8>, SignatureError> {
    let sk = dilithium2::SecretKey::from_bytes(secret_key_bytes)
        .map_err(|_| SignatureError::InvalidSignature)?;
    let sig = dilithium2::detached_sign(message, &sk);
    Ok(sig.as_bytes().to_vec())
}

/// Verify a detached Dilithium2 signature against a raw public key.
pub fn verify_signature(
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<(), SignatureError> {
    let pk = dilithium2::PublicKey::from_bytes(public_key).map_err(|_| {
        SignatureError::InvalidPublicKeyLength {
            expected: dilithium2::public_key_bytes(),
            got: public_key.len(),
        }
    })?;
    let sig = dilithium2::DetachedSignature::from_bytes(signature)
        .map_err(|_| SignatureError::InvalidSignature)?;
    dilithium2::verify_detached_signature(&sig, message, &pk)
        .map_err(|_| SignatureError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_round_trip() {
        let (pk, sk) = dilithium2::keypair();
        let message = b"Alice|knows|Bob|agent1|2026-01-01T00:00:00+00:00";

        let sig = sign(sk.as_bytes(), message).unwrap();
        assert!(verify_signature(pk.as_bytes(), message, &sig).is_ok());
    }

    #[test]
    fn tampered_message_fails() {
        let (pk, sk) = dilithium2::keypair();
        let sig = sign(sk.as_bytes(), b"original").unwrap();
        assert!(verify_signature(pk.as_bytes(), b"tampered", &sig).is_err());
    }

    #[test]
    fn wrong_key_fails() {
        let (_pk1, sk1) = dilithium2::keypair();
        let (pk2, _sk2) = dilithium2::keypair();
        let message = b"some transaction body";
        let sig = sign(sk1.as_bytes(), message).unwrap();
        assert!(verify_signature(pk2.as_bytes(), message, &sig).is_err());
    }
}
