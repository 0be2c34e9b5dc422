use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, RwLock};

use factgraph_core::{FactGraphError, Timestamp, ValidatorId};
use serde::Serialize;
use tracing::info;

/// One roster entry: identity, public key, and who vouched it in (`None`
/// for the validators provisioned at boot).
#[derive(Clone, Debug)]
pub struct ValidatorRecord {
    pub id: ValidatorId,
    pub pub_key: Vec<u8>,
    pub vouched_by: Option<ValidatorId>,
}

/// Derived performance snapshot over a validator's bounded window.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PerformanceStats {
    pub total_transactions: u64,
    pub successful_transactions: u64,
    pub failure_rate: f64,
    pub avg_tx_time_us: f64,
    pub last_active: Option<Timestamp>,
}

/// A fixed-capacity ring of recent outcomes. Stats are always derived from
/// whatever currently sits in the window, never from an all-time counter —
/// so a validator that was unreliable long ago but healthy for its last
/// `W` transactions reads as healthy.
struct PerformanceWindow {
    capacity: usize,
    entries: VecDeque<(bool, u64)>,
    last_active: Option<Timestamp>,
}

impl PerformanceWindow {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            last_active: None,
        }
    }

    fn record(&mut self, success: bool, elapsed_us: u64, at: Timestamp) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((success, elapsed_us));
        self.last_active = Some(at);
    }

    fn stats(&self) -> PerformanceStats {
        let total = self.entries.len() as u64;
        let successful = self.entries.iter().filter(|(ok, _)| *ok).count() as u64;
        let failure_rate = if total == 0 {
            0.0
        } else {
            (total - successful) as f64 / total as f64
        };
        let avg_tx_time_us = if total == 0 {
            0.0
        } else {
            self.entries.iter().map(|(_, us)| *us as f64).sum::<f64>() / total as f64
        };
        PerformanceStats {
            total_transactions: total,
            successful_transactions: successful,
            failure_rate,
            avg_tx_time_us,
            last_active: self.last_active,
        }
    }
}

/// The active validator roster plus per-validator performance windows.
///
/// There is exactly one turn counter in the system: the blockchain server's
/// `tx_count`. The roster never keeps its own turn pointer — `validator_at`
/// is a pure function of whatever index the caller supplies, so there is
/// nothing here that can drift out of sync with `tx_count`.
///
/// Roster mutation and performance tracking share one logical service and
/// are guarded with plain locks — no sharding, no actor mailbox.
pub struct ValidatorRoster {
    roster: RwLock<Vec<ValidatorRecord>>,
    performance: Mutex<HashMap<ValidatorId, PerformanceWindow>>,
    validators_dir: PathBuf,
    window_capacity: usize,
}

impl ValidatorRoster {
    /// Load the roster from `<validators_dir>/<id>.pub` files. Fails if the
    /// directory holds no validators — the roster invariant requires at
    /// least one to exist at all times.
    pub fn load(validators_dir: PathBuf, window_capacity: usize) -> Result<Self, FactGraphError> {
        fs::create_dir_all(&validators_dir)
            .map_err(|e| FactGraphError::StorageError(e.to_string()))?;

        let mut roster = Vec::new();
        for entry in fs::read_dir(&validators_dir).map_err(|e| FactGraphError::StorageError(e.to_string()))? {
            let entry = entry.map_err(|e| FactGraphError::StorageError(e.to_string()))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("pub") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { continue };
            let pub_key = fs::read(&path).map_err(|e| FactGraphError::StorageError(e.to_string()))?;
            roster.push(ValidatorRecord {
                id: ValidatorId::from(stem),
                pub_key,
                vouched_by: None,
            });
        }
        roster.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));

        if roster.is_empty() {
            return Err(FactGraphError::StorageError(
                "no validators provisioned in validators_dir".to_string(),
            ));
        }

        let performance = roster
            .iter()
            .map(|v| (v.id.clone(), PerformanceWindow::new(window_capacity)))
            .collect();

        Ok(Self {
            roster: RwLock::new(roster),
            performance: Mutex::new(performance),
            validators_dir,
            window_capacity,
        })
    }

    /// Build a roster directly from an in-memory list, skipping the
    /// filesystem entirely (test helper mirroring `factgraph-storage`'s
    /// `in_memory` constructor).
    pub fn bootstrap(validators_dir: PathBuf, ids: &[&str], window_capacity: usize) -> Self {
        let roster: Vec<ValidatorRecord> = ids
            .iter()
            .map(|id| ValidatorRecord {
                id: ValidatorId::from(*id),
                pub_key: Vec::new(),
                vouched_by: None,
            })
            .collect();
        let performance = roster
            .iter()
            .map(|v| (v.id.clone(), PerformanceWindow::new(window_capacity)))
            .collect();
        Self {
            roster: RwLock::new(roster),
            performance: Mutex::new(performance),
            validators_dir,
            window_capacity,
        }
    }

    /// Pure lookup: `roster[index mod |roster|]`. The blockchain server
    /// computes `expected = roster[tx_count mod |roster|]` directly off its
    /// own `tx_count` — this is the only turn-assignment rule in the system.
    pub fn validator_at(&self, index: u64) -> ValidatorId {
        let roster = self.roster.read().expect("roster lock poisoned");
        let idx = (index % roster.len() as u64) as usize;
        roster[idx].id.clone()
    }

    pub fn validator_exists(&self, id: &ValidatorId) -> bool {
        self.roster.read().expect("roster lock poisoned").iter().any(|v| &v.id == id)
    }

    pub fn pub_key_of(&self, id: &ValidatorId) -> Option<Vec<u8>> {
        self.roster
            .read()
            .expect("roster lock poisoned")
            .iter()
            .find(|v| &v.id == id)
            .map(|v| v.pub_key.clone())
    }

    pub fn roster_len(&self) -> usize {
        self.roster.read().expect("roster lock poisoned").len()
    }

    pub fn roster_snapshot(&self) -> Vec<ValidatorId> {
        self.roster
            .read()
            .expect("roster lock poisoned")
            .iter()
            .map(|v| v.id.clone())
            .collect()
    }

    /// Add a validator vouched for by an existing roster member. Idempotent:
    /// re-adding an id already present returns `AlreadyExists` rather than
    /// erroring out the caller's retry loop.
    pub fn add_validator(
        &self,
        id: ValidatorId,
        pub_key: Vec<u8>,
        vouched_by: ValidatorId,
    ) -> Result<(), FactGraphError> {
        if self.validator_exists(&id) {
            return Err(FactGraphError::AlreadyExists(id.to_string()));
        }
        if !self.validator_exists(&vouched_by) {
            return Err(FactGraphError::UnknownValidator(vouched_by.to_string()));
        }

        let path = self.validators_dir.join(format!("{}.pub", id.as_str()));
        fs::write(&path, &pub_key).map_err(|e| FactGraphError::StorageError(e.to_string()))?;

        let mut roster = self.roster.write().expect("roster lock poisoned");
        roster.push(ValidatorRecord {
            id: id.clone(),
            pub_key,
            vouched_by: Some(vouched_by),
        });
        self.performance
            .lock()
            .expect("performance lock poisoned")
            .insert(id.clone(), PerformanceWindow::new(self.window_capacity));
        info!(validator = %id, "added to roster");
        Ok(())
    }

    /// Remove a validator. Refuses if it is the last one left.
    pub fn remove_validator(&self, id: &ValidatorId) -> Result<(), FactGraphError> {
        let mut roster = self.roster.write().expect("roster lock poisoned");
        if roster.len() <= 1 {
            return Err(FactGraphError::CannotRemoveLast);
        }
        let before = roster.len();
        roster.retain(|v| &v.id != id);
        if roster.len() == before {
            return Err(FactGraphError::UnknownValidator(id.to_string()));
        }

        self.performance.lock().expect("performance lock poisoned").remove(id);
        info!(validator = %id, "removed from roster");
        Ok(())
    }

    pub fn record_transaction_performance(
        &self,
        id: &ValidatorId,
        success: bool,
        elapsed_us: u64,
        at: Timestamp,
    ) {
        let mut performance = self.performance.lock().expect("performance lock poisoned");
        let window = performance
            .entry(id.clone())
            .or_insert_with(|| PerformanceWindow::new(self.window_capacity));
        window.record(success, elapsed_us, at);
    }

    pub fn get_performance_metrics(&self) -> HashMap<ValidatorId, PerformanceStats> {
        self.performance
            .lock()
            .expect("performance lock poisoned")
            .iter()
            .map(|(id, window)| (id.clone(), window.stats()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(ids: &[&str]) -> ValidatorRoster {
        ValidatorRoster::bootstrap(PathBuf::from("/tmp/unused"), ids, 100)
    }

    #[test]
    fn round_robin_cycles_exactly() {
        let r = roster(&["a", "b", "c"]);
        let order: Vec<String> = (0..6).map(|i| r.validator_at(i).to_string()).collect();
        assert_eq!(order, vec!["a", "b", "c", "a", "b", "c"]);
    }

    #[test]
    fn remove_last_validator_is_rejected() {
        let r = roster(&["solo"]);
        let err = r.remove_validator(&ValidatorId::from("solo")).unwrap_err();
        assert!(matches!(err, FactGraphError::CannotRemoveLast));
    }

    #[test]
    fn validator_at_rewraps_after_removal() {
        let r = roster(&["a", "b", "c"]);
        r.remove_validator(&ValidatorId::from("c")).unwrap();
        // Index 2 used to be "c"; with only ["a", "b"] left it wraps to "a".
        assert_eq!(r.validator_at(2).to_string(), "a");
    }

    #[test]
    fn add_validator_requires_existing_voucher() {
        let r = roster(&["a"]);
        let err = r
            .add_validator(ValidatorId::from("b"), vec![], ValidatorId::from("ghost"))
            .unwrap_err();
        assert!(matches!(err, FactGraphError::UnknownValidator(_)));
    }

    #[test]
    fn add_validator_is_idempotent_on_duplicate() {
        let r = roster(&["a", "b"]);
        let err = r
            .add_validator(ValidatorId::from("b"), vec![], ValidatorId::from("a"))
            .unwrap_err();
        assert!(matches!(err, FactGraphError::AlreadyExists(_)));
    }

    #[test]
    fn performance_window_derives_failure_rate_and_average() {
        let r = roster(&["a"]);
        let id = ValidatorId::from("a");
        r.record_transaction_performance(&id, true, 100, 1);
        r.record_transaction_performance(&id, true, 200, 2);
        r.record_transaction_performance(&id, false, 300, 3);

        let metrics = r.get_performance_metrics();
        let stats = &metrics[&id];
        assert_eq!(stats.total_transactions, 3);
        assert_eq!(stats.successful_transactions, 2);
        assert!((stats.failure_rate - 1.0 / 3.0).abs() < 1e-9);
        assert!((stats.avg_tx_time_us - 200.0).abs() < 1e-9);
        assert_eq!(stats.last_active, Some(3));
    }

    #[test]
    fn window_is_bounded_and_drops_oldest() {
        let r = ValidatorRoster::bootstrap(PathBuf::from("/tmp/unused"), &["a"], 2);
        let id = ValidatorId::from("a");
        r.record_transaction_performance(&id, false, 10, 1);
        r.record_transaction_performance(&id, true, 20, 2);
        r.record_transaction_performance(&id, true, 30, 3);

        let stats = &r.get_performance_metrics()[&id];
        // oldest (failure) fell out of the window of size 2
        assert_eq!(stats.total_transactions, 2);
        assert_eq!(stats.successful_transactions, 2);
        assert_eq!(stats.failure_rate, 0.0);
    }

    #[test]
    fn load_from_directory_round_trips_added_validator() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("alice.pub"), b"alice-key").unwrap();
        let r = ValidatorRoster::load(dir.path().to_path_buf(), 100).unwrap();
        assert!(r.validator_exists(&ValidatorId::from("alice")));

        r.add_validator(ValidatorId::from("bob"), b"bob-key".to_vec(), ValidatorId::from("alice"))
            .unwrap();
        assert!(dir.path().join("bob.pub").exists());
    }
}
