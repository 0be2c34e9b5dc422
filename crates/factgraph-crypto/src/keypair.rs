use pqcrypto_dilithium::dilithium2;
use pqcrypto_traits::sign::{PublicKey, SecretKey};
use zeroize::Zeroizing;

/// A validator's Dilithium2 keypair.
///
/// The secret key is held in a `Zeroizing<Vec<u8>>` to wipe memory on drop.
pub struct KeyPair {
    pub public_key: Vec<u8>,
    secret_key: Vec<u8>,
}

impl KeyPair {
    /// Generate a fresh Dilithium2 keypair.
    pub fn generate() -> Self {
        let (pk, sk) = dilithium2::keypair();
        Self {
            public_key: pk.as_bytes().to_vec(),
            secret_key: sk.as_bytes().to_vec(),
        }
    }

    /// Sign `message` using this keypair's secret key.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let sk = Zeroizing::new(self.secret_key.clone());
        crate::dilithium::sign(&sk, message).expect("sign with valid secret key is infallible")
    }

    /// Raw secret key bytes, for callers that need to persist them (e.g.
    /// `factgraph-node`'s `keygen` subcommand writing a `.sec` file).
    pub fn secret_key_bytes(&self) -> &[u8] {
        &self.secret_key
    }

    /// Restore a KeyPair from raw bytes (e.g. loaded from a wallet file).
    pub fn from_raw(pk_bytes: Vec<u8>, sk_bytes: Vec<u8>) -> Self {
        Self {
            public_key: pk_bytes,
            secret_key: sk_bytes,
        }
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.secret_key.zeroize();
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair {{ public_key: {}b }}", self.public_key.len())
    }
}
