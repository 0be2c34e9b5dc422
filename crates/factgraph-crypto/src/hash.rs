use chrono::{TimeZone, Utc};
use factgraph_core::types::Timestamp;
use sha2::{Digest, Sha256};

/// Render a Unix timestamp as the canonical ISO-8601 string used in the
/// transaction hash preimage: `subject|predicate|object|validator|timestamp-iso8601`.
pub fn timestamp_iso8601(ts: Timestamp) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

/// Compute the canonical transaction hash: SHA-256 of
/// `subject|predicate|object|validator|timestamp-iso8601`.
///
/// Depends only on these five fields: two
/// nodes with identical inputs always produce the same hash.
pub fn transaction_hash(
    subject: &str,
    predicate: &str,
    object: &str,
    validator: &str,
    timestamp: Timestamp,
) -> [u8; 32] {
    let preimage = format!(
        "{subject}|{predicate}|{object}|{validator}|{}",
        timestamp_iso8601(timestamp)
    );
    let mut hasher = Sha256::new();
    hasher.update(preimage.as_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_for_identical_inputs() {
        let a = transaction_hash("Alice", "knows", "Bob", "agent1", 1_700_000_000);
        let b = transaction_hash("Alice", "knows", "Bob", "agent1", 1_700_000_000);
        assert_eq!(a, b);
    }

    #[test]
    fn hash_changes_with_any_field() {
        let base = transaction_hash("Alice", "knows", "Bob", "agent1", 1_700_000_000);
        let diff_subject = transaction_hash("Alicia", "knows", "Bob", "agent1", 1_700_000_000);
        let diff_validator = transaction_hash("Alice", "knows", "Bob", "agent2", 1_700_000_000);
        let diff_ts = transaction_hash("Alice", "knows", "Bob", "agent1", 1_700_000_001);
        assert_ne!(base, diff_subject);
        assert_ne!(base, diff_validator);
        assert_ne!(base, diff_ts);
    }
}
