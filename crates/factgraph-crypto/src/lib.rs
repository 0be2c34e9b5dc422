pub mod dilithium;
pub mod hash;
pub mod keypair;

pub use dilithium::{verify_signature, SignatureError};
pub use hash::{timestamp_iso8601, transaction_hash};
pub use keypair::KeyPair;
