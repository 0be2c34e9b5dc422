use serde::{Deserialize, Serialize};

use crate::types::{NodeId, Timestamp, Triple, ValidatorId};

/// An immutable transaction node: one triple plus provenance metadata.
/// Created by the blockchain server on successful ingestion; never mutated
/// or deleted afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub validator: ValidatorId,
    pub signature: Vec<u8>,
    pub timestamp: Timestamp,
    /// SHA-256 of `subject|predicate|object|validator|timestamp-iso8601`.
    pub hash: [u8; 32],
}

impl Node {
    pub fn triple(&self) -> Triple {
        Triple::new(self.subject.clone(), self.predicate.clone(), self.object.clone())
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}
