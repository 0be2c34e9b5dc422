use std::sync::{Arc, Mutex};
use std::time::Instant;

use factgraph_consensus::ValidatorRoster;
use factgraph_core::{Edge, FactGraphError, Node, NodeId, ValidatorId};
use factgraph_crypto::{transaction_hash, verify_signature};
use factgraph_storage::StorageCoordinator;
use tracing::warn;

/// The single logical ingestion state machine per process:
/// `{tx_count, roster_ref}`, advanced one transaction at a time under a
/// single-writer lock.
///
/// Follows a validate → resolve → check → apply → commit pipeline;
/// `tx_count` plays the role of a per-chain nonce, incremented only after a
/// fully successful append.
pub struct BlockchainServer {
    tx_count: Mutex<u64>,
    storage: Arc<StorageCoordinator>,
    roster: Arc<ValidatorRoster>,
}

impl BlockchainServer {
    /// `tx_count` is recovered from the storage coordinator's current node
    /// count, so restarting the process resumes exactly where it left off.
    pub fn new(storage: Arc<StorageCoordinator>, roster: Arc<ValidatorRoster>) -> Self {
        let tx_count = storage.node_count() as u64;
        Self {
            tx_count: Mutex::new(tx_count),
            storage,
            roster,
        }
    }

    /// The validator whose turn it currently is, per `tx_count` — the same
    /// counter `submit_transaction_at` checks against. Used by the
    /// transaction queue to pick who to submit a pending entry as, so the
    /// queue path can never desynchronize from the synchronous path's turn
    /// assignment.
    pub fn roster_current_turn(&self) -> ValidatorId {
        self.roster.validator_at(self.tx_count())
    }

    pub fn tx_count(&self) -> u64 {
        *self.tx_count.lock().expect("tx_count lock poisoned")
    }

    /// Submit using the current wall-clock time as the ingestion timestamp.
    pub fn submit_transaction(
        &self,
        subject: &str,
        predicate: &str,
        object: &str,
        validator_id: &ValidatorId,
        signature: &[u8],
    ) -> Result<NodeId, FactGraphError> {
        self.submit_transaction_at(subject, predicate, object, validator_id, signature, chrono::Utc::now().timestamp())
    }

    /// Run the six-step pipeline for one submission, with the
    /// ingestion timestamp supplied explicitly so tests can reproduce an
    /// exact signed hash. Holds the `tx_count` lock for the whole call —
    /// this is the single-writer discipline that makes the
    /// `tx_count` increment atomic.
    pub fn submit_transaction_at(
        &self,
        subject: &str,
        predicate: &str,
        object: &str,
        validator_id: &ValidatorId,
        signature: &[u8],
        timestamp: i64,
    ) -> Result<NodeId, FactGraphError> {
        let mut tx_count = self.tx_count.lock().expect("tx_count lock poisoned");
        let started = Instant::now();

        // Step 1-2: resolve expected validator, reject unknown ones.
        if !self.roster.validator_exists(validator_id) {
            return Err(FactGraphError::UnknownValidator(validator_id.to_string()));
        }
        let expected = self.roster.validator_at(*tx_count);

        // Step 3: turn check.
        if validator_id != &expected {
            return Err(FactGraphError::NotYourTurn);
        }

        // Step 4: hash + signature check.
        let hash = transaction_hash(subject, predicate, object, validator_id.as_str(), timestamp);
        let pub_key = self
            .roster
            .pub_key_of(validator_id)
            .ok_or_else(|| FactGraphError::UnknownValidator(validator_id.to_string()))?;
        if verify_signature(&pub_key, &hash, signature).is_err() {
            self.roster.record_transaction_performance(
                validator_id,
                false,
                started.elapsed().as_micros() as u64,
                timestamp,
            );
            return Err(FactGraphError::BadSignature);
        }

        // Step 5: allocate id, persist node and confirms edge.
        let id = NodeId::new(*tx_count + 1);
        let node = Node {
            id: id.clone(),
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object: object.to_string(),
            validator: validator_id.clone(),
            signature: signature.to_vec(),
            timestamp,
            hash,
        };
        self.storage.add_node(node)?;
        if *tx_count > 0 {
            let previous = NodeId::new(*tx_count);
            if let Err(e) = self.storage.add_edge(Edge::confirms(id.clone(), previous)) {
                if let Err(rollback_err) = self.storage.remove_node(&id) {
                    warn!(node = %id, error = %rollback_err, "failed to roll back unconfirmed node");
                }
                return Err(e);
            }
        }

        // Step 6: commit.
        *tx_count += 1;
        self.roster.record_transaction_performance(
            validator_id,
            true,
            started.elapsed().as_micros() as u64,
            timestamp,
        );
        Ok(id)
    }
}
