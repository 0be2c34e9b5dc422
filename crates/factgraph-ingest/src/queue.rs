use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use factgraph_core::{FactGraphError, NodeId, Timestamp, ValidatorId};
use tokio::time::{self, Duration};
use tracing::{info, warn};

use crate::server::BlockchainServer;

/// A pending submission awaiting the worker tick.
struct PendingEntry {
    subject: String,
    predicate: String,
    object: String,
    /// The validator suggested by the caller. The worker overrides this with
    /// the coordinator's current turn before invoking the blockchain server
    /// and records both in the outcome.
    requested_validator: ValidatorId,
    signature: Vec<u8>,
}

/// The terminal outcome of a queue entry once the worker has processed it.
#[derive(Clone, Debug)]
pub struct QueueOutcome {
    pub result: Result<NodeId, FactGraphError>,
    pub requested_validator: ValidatorId,
    pub actual_validator: ValidatorId,
    pub completed_at: Timestamp,
}

/// The status of a single submission, keyed by its queue reference.
#[derive(Clone, Debug)]
pub enum EntryStatus {
    Pending,
    Completed(QueueOutcome),
}

/// Aggregate queue counters, returned by `status()`.
#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct QueueStatus {
    pub queue_length: usize,
    pub submitted: u64,
    pub processed: u64,
    pub failed: u64,
    pub last_processed_at: Option<Timestamp>,
}

/// Asynchronous submission front-end over [`BlockchainServer`].
///
/// `submit` is O(1) and never blocks on processing — it only pushes onto an
/// internal `VecDeque` and records a `Pending` status entry. A ticking
/// worker drains up to `batch_size` entries every `interval_ms`, consulting
/// the validator coordinator for the *current* turn for each one.
///
/// The worker ticks on `tokio::time::interval` and drains a plain
/// `VecDeque` rather than an mpsc channel, since `submit` must hand back a
/// reference synchronously and a bounded channel send can't guarantee that
/// under backpressure.
pub struct TransactionQueue {
    server: Arc<BlockchainServer>,
    pending: Mutex<VecDeque<(u64, PendingEntry)>>,
    statuses: Mutex<HashMap<u64, EntryStatus>>,
    next_ref: Mutex<u64>,
    counters: Mutex<QueueStatus>,
    batch_size: Mutex<usize>,
    interval_ms: Mutex<u64>,
}

impl TransactionQueue {
    pub fn new(server: Arc<BlockchainServer>, batch_size: usize, interval_ms: u64) -> Self {
        Self {
            server,
            pending: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(HashMap::new()),
            next_ref: Mutex::new(0),
            counters: Mutex::new(QueueStatus::default()),
            batch_size: Mutex::new(batch_size),
            interval_ms: Mutex::new(interval_ms),
        }
    }

    /// Enqueue a submission. Returns immediately with a reference usable in
    /// `get_transaction_status`.
    pub fn submit(
        &self,
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
        requested_validator: ValidatorId,
        signature: Vec<u8>,
    ) -> u64 {
        let mut next_ref = self.next_ref.lock().expect("next_ref lock poisoned");
        let reference = *next_ref;
        *next_ref += 1;
        drop(next_ref);

        let entry = PendingEntry {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            requested_validator,
            signature,
        };
        self.pending
            .lock()
            .expect("pending lock poisoned")
            .push_back((reference, entry));
        self.statuses
            .lock()
            .expect("statuses lock poisoned")
            .insert(reference, EntryStatus::Pending);
        self.counters.lock().expect("counters lock poisoned").submitted += 1;
        reference
    }

    pub fn get_transaction_status(&self, reference: u64) -> Option<EntryStatus> {
        self.statuses.lock().expect("statuses lock poisoned").get(&reference).cloned()
    }

    pub fn status(&self) -> QueueStatus {
        let mut snapshot = self.counters.lock().expect("counters lock poisoned").clone();
        snapshot.queue_length = self.pending.lock().expect("pending lock poisoned").len();
        snapshot
    }

    pub fn set_processing_rate(&self, batch_size: usize, interval_ms: u64) {
        *self.batch_size.lock().expect("batch_size lock poisoned") = batch_size;
        *self.interval_ms.lock().expect("interval_ms lock poisoned") = interval_ms;
    }

    /// Reset the queue and status map. Intended for test and ops use.
    pub fn clear(&self) {
        self.pending.lock().expect("pending lock poisoned").clear();
        self.statuses.lock().expect("statuses lock poisoned").clear();
        *self.counters.lock().expect("counters lock poisoned") = QueueStatus::default();
    }

    /// Drain up to `batch_size` pending entries, FIFO, isolating per-entry
    /// failures so one bad entry never blocks the rest.
    pub fn drain_tick(&self) {
        let batch_size = *self.batch_size.lock().expect("batch_size lock poisoned");
        let drained: Vec<(u64, PendingEntry)> = {
            let mut pending = self.pending.lock().expect("pending lock poisoned");
            let mut batch = Vec::with_capacity(batch_size);
            for _ in 0..batch_size {
                match pending.pop_front() {
                    Some(entry) => batch.push(entry),
                    None => break,
                }
            }
            batch
        };
        if drained.is_empty() {
            return;
        }

        for (reference, entry) in drained {
            let actual_validator = self.server.roster_current_turn();
            let result = self.server.submit_transaction(
                &entry.subject,
                &entry.predicate,
                &entry.object,
                &actual_validator,
                &entry.signature,
            );
            let completed_at = chrono::Utc::now().timestamp();

            let mut counters = self.counters.lock().expect("counters lock poisoned");
            match &result {
                Ok(id) => {
                    counters.processed += 1;
                    info!(reference, node = %id, "queue entry processed");
                }
                Err(e) => {
                    counters.failed += 1;
                    warn!(reference, error = %e, "queue entry failed");
                }
            }
            counters.last_processed_at = Some(completed_at);
            drop(counters);

            self.statuses.lock().expect("statuses lock poisoned").insert(
                reference,
                EntryStatus::Completed(QueueOutcome {
                    result,
                    requested_validator: entry.requested_validator,
                    actual_validator,
                    completed_at,
                }),
            );
        }
    }

    /// Run the ticking worker forever. Intended for `tokio::spawn`.
    pub async fn run(self: Arc<Self>) {
        loop {
            let interval_ms = *self.interval_ms.lock().expect("interval_ms lock poisoned");
            time::sleep(Duration::from_millis(interval_ms)).await;
            self.drain_tick();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use factgraph_consensus::ValidatorRoster;
    use factgraph_crypto::{transaction_hash, KeyPair};
    use factgraph_storage::StorageCoordinator;

    fn build_with_batch(roster_ids: &[&str], batch_size: usize) -> (Arc<TransactionQueue>, Vec<(ValidatorId, KeyPair)>) {
        let storage = Arc::new(StorageCoordinator::in_memory(300, 10_000, 8_000));
        let keys: Vec<(ValidatorId, KeyPair)> = roster_ids
            .iter()
            .map(|id| (ValidatorId::from(*id), KeyPair::generate()))
            .collect();
        let dir = tempfile::tempdir().unwrap();
        let seed_id = ValidatorId::from(roster_ids[0]);
        std::fs::write(dir.path().join(format!("{}.pub", seed_id.as_str())), &keys[0].1.public_key).unwrap();
        let roster = Arc::new(ValidatorRoster::load(dir.path().to_path_buf(), 100).unwrap());
        for (id, kp) in keys.iter().skip(1) {
            roster.add_validator(id.clone(), kp.public_key.clone(), seed_id.clone()).unwrap();
        }
        let server = Arc::new(BlockchainServer::new(storage, roster));
        let queue = Arc::new(TransactionQueue::new(server, batch_size, 50));
        (queue, keys)
    }

    fn build(roster_ids: &[&str]) -> (Arc<TransactionQueue>, Vec<(ValidatorId, KeyPair)>) {
        build_with_batch(roster_ids, 10)
    }

    #[test]
    fn submit_returns_ascending_references_and_reports_pending() {
        let (queue, keys) = build(&["a"]);
        let (id, _kp) = &keys[0];
        let r1 = queue.submit("s1", "p1", "o1", id.clone(), vec![0u8; 4]);
        let r2 = queue.submit("s2", "p2", "o2", id.clone(), vec![0u8; 4]);
        assert_eq!(r1, 0);
        assert_eq!(r2, 1);
        assert!(matches!(queue.get_transaction_status(r1), Some(EntryStatus::Pending)));
        assert_eq!(queue.status().queue_length, 2);
    }

    #[test]
    fn drain_tick_drains_oldest_entry_first() {
        let (queue, keys) = build_with_batch(&["a"], 1);
        let (id, _kp) = &keys[0];
        let ref1 = queue.submit("s1", "p1", "o1", id.clone(), vec![0u8; 4]);
        let ref2 = queue.submit("s2", "p2", "o2", id.clone(), vec![0u8; 4]);

        queue.drain_tick();
        assert!(matches!(queue.get_transaction_status(ref1), Some(EntryStatus::Completed(_))));
        assert!(matches!(queue.get_transaction_status(ref2), Some(EntryStatus::Pending)));
        assert_eq!(queue.status().queue_length, 1);

        queue.drain_tick();
        assert!(matches!(queue.get_transaction_status(ref2), Some(EntryStatus::Completed(_))));
        assert_eq!(queue.status().queue_length, 0);
    }

    #[test]
    fn requested_validator_mismatch_is_surfaced_in_the_outcome() {
        let (queue, keys) = build(&["a", "b"]);
        let (id_a, kp_a) = &keys[0];
        let (id_b, _kp_b) = &keys[1];

        // Caller assumes "b" will process this, but it's "a"'s turn first.
        let sig = kp_a.sign(&transaction_hash("s1", "p1", "o1", id_a.as_str(), 0));
        let reference = queue.submit("s1", "p1", "o1", id_b.clone(), sig);
        queue.drain_tick();

        match queue.get_transaction_status(reference) {
            Some(EntryStatus::Completed(outcome)) => {
                assert_eq!(&outcome.requested_validator, id_b);
                assert_eq!(&outcome.actual_validator, id_a);
                assert!(outcome.result.is_err());
            }
            other => panic!("expected a completed entry, got {other:?}"),
        }
    }
}
