use std::collections::HashMap;
use std::time::{Duration, Instant};

use factgraph_core::TriplePattern;

use factgraph_dag::MatchedNode;

/// One cached query result, keyed by the pattern's canonical serialisation.
struct CacheEntry {
    pattern: TriplePattern,
    result: Vec<MatchedNode>,
    inserted_at: Instant,
    last_access: Instant,
}

/// TTL + LRU query-result cache with selective, over-approximating
/// invalidation.
///
/// Cache errors never fail a query: callers are expected to treat a `None`
/// from [`QueryCache::get`] as "scan it yourself", never as a hard failure.
pub struct QueryCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
    max_size: usize,
    prune_threshold: usize,
}

impl QueryCache {
    pub fn new(ttl_seconds: u64, max_size: usize, prune_threshold: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl: Duration::from_secs(ttl_seconds),
            max_size,
            prune_threshold,
        }
    }

    /// Look up `pattern`. Expired entries are dropped and treated as a miss.
    pub fn get(&mut self, pattern: &TriplePattern) -> Option<Vec<MatchedNode>> {
        let key = pattern.cache_key();
        let expired = match self.entries.get(&key) {
            Some(entry) => entry.inserted_at.elapsed() > self.ttl,
            None => return None,
        };
        if expired {
            self.entries.remove(&key);
            return None;
        }
        let entry = self.entries.get_mut(&key)?;
        entry.last_access = Instant::now();
        Some(entry.result.clone())
    }

    pub fn insert(&mut self, pattern: TriplePattern, result: Vec<MatchedNode>) {
        let key = pattern.cache_key();
        let now = Instant::now();
        self.entries.insert(
            key,
            CacheEntry {
                pattern,
                result,
                inserted_at: now,
                last_access: now,
            },
        );
        self.maybe_prune();
    }

    /// Drop every entry whose pattern could have matched a node carrying
    /// `triple` — an over-approximation, not an exact dependency check.
    pub fn invalidate_for_node(&mut self, triple: &factgraph_core::Triple) {
        self.entries.retain(|_, entry| !entry.pattern.matches(triple));
    }

    /// Drop every entry whose pattern subject is a wildcard, or equals
    /// `from` or `to` — a subject-only rule, unlike the node rule above.
    pub fn invalidate_for_edge(&mut self, from: &str, to: &str) {
        self.entries.retain(|_, entry| {
            let subject_could_match = match &entry.pattern.subject {
                None => true,
                Some(s) => s == from || s == to,
            };
            !subject_could_match
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn maybe_prune(&mut self) {
        if self.entries.len() <= self.prune_threshold {
            return;
        }
        let target = self.max_size / 2;
        if self.entries.len() <= target {
            return;
        }
        let mut by_access: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.last_access))
            .collect();
        by_access.sort_by_key(|(_, last_access)| *last_access);
        let to_remove = self.entries.len() - target;
        for (key, _) in by_access.into_iter().take(to_remove) {
            self.entries.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use factgraph_core::{Node, NodeId, Triple, ValidatorId};

    fn row(n: u64, s: &str, p: &str, o: &str) -> MatchedNode {
        MatchedNode {
            node: Node {
                id: NodeId::new(n),
                subject: s.to_string(),
                predicate: p.to_string(),
                object: o.to_string(),
                validator: ValidatorId::from("agent1"),
                signature: vec![],
                timestamp: 0,
                hash: [0u8; 32],
            },
            outgoing_edges: vec![],
        }
    }

    #[test]
    fn hit_then_invalidate_on_matching_node() {
        let mut cache = QueryCache::new(300, 10_000, 8_000);
        let pattern = TriplePattern {
            subject: Some("Alice".into()),
            predicate: None,
            object: None,
        };
        cache.insert(pattern.clone(), vec![row(1, "Alice", "knows", "Bob")]);
        assert!(cache.get(&pattern).is_some());

        cache.invalidate_for_node(&Triple::new("Alice", "knows", "Charlie"));
        assert!(cache.get(&pattern).is_none());
    }

    #[test]
    fn non_matching_node_does_not_invalidate() {
        let mut cache = QueryCache::new(300, 10_000, 8_000);
        let pattern = TriplePattern {
            subject: Some("Alice".into()),
            predicate: None,
            object: None,
        };
        cache.insert(pattern.clone(), vec![row(1, "Alice", "knows", "Bob")]);
        cache.invalidate_for_node(&Triple::new("Zoe", "knows", "Mallory"));
        assert!(cache.get(&pattern).is_some());
    }

    #[test]
    fn prune_evicts_least_recently_used() {
        let mut cache = QueryCache::new(300, 4, 2);
        for i in 0..3 {
            let pattern = TriplePattern {
                subject: Some(format!("s{i}")),
                predicate: None,
                object: None,
            };
            cache.insert(pattern, vec![]);
        }
        // prune_threshold=2, max_size=4 -> target after prune = 2
        assert!(cache.len() <= 2);
    }
}
