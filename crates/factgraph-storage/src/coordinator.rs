use std::sync::{Mutex, RwLock};
use std::time::Instant;

use factgraph_core::{Edge, FactGraphConfig, FactGraphError, Node, NodeId, Triple, TriplePattern};
use factgraph_dag::{InMemoryDag, MatchedNode};
use tracing::{info, warn};

use crate::cache::QueryCache;
use crate::metrics::StorageMetrics;
use crate::mirror::DurableMirror;

/// Unified read/write path over the in-memory DAG, its durable mirror, and
/// the query cache.
///
/// Serialisation is a single `RwLock` around the DAG — mutations take the
/// write half, reads take the read half — matching the "one lock per
/// logical service" concurrency model, not a sharded or actor
/// design.
pub struct StorageCoordinator {
    dag: RwLock<InMemoryDag>,
    mirror: Option<DurableMirror>,
    cache: Mutex<QueryCache>,
    metrics: Mutex<StorageMetrics>,
}

impl StorageCoordinator {
    /// Build a coordinator backed by a durable mirror rooted at
    /// `config.db_path`.
    pub fn open(config: &FactGraphConfig) -> Result<Self, FactGraphError> {
        let mirror = DurableMirror::open(&config.db_path)?;
        let coordinator = Self {
            dag: RwLock::new(InMemoryDag::new()),
            mirror: Some(mirror),
            cache: Mutex::new(QueryCache::new(
                config.cache_ttl_seconds,
                config.cache_max_size,
                config.cache_prune_threshold,
            )),
            metrics: Mutex::new(StorageMetrics::default()),
        };
        coordinator.replay_durable()?;
        Ok(coordinator)
    }

    /// Build an in-memory-only coordinator with no durable mirror, for tests
    /// that don't want filesystem side effects.
    pub fn in_memory(
        cache_ttl_seconds: u64,
        cache_max_size: usize,
        cache_prune_threshold: usize,
    ) -> Self {
        Self {
            dag: RwLock::new(InMemoryDag::new()),
            mirror: None,
            cache: Mutex::new(QueryCache::new(
                cache_ttl_seconds,
                cache_max_size,
                cache_prune_threshold,
            )),
            metrics: Mutex::new(StorageMetrics::default()),
        }
    }

    fn replay_durable(&self) -> Result<(), FactGraphError> {
        let Some(mirror) = &self.mirror else { return Ok(()) };
        let (nodes, edges) = mirror.replay()?;
        if nodes.is_empty() && edges.is_empty() {
            return Ok(());
        }
        let mut dag = self.dag.write().expect("dag lock poisoned");
        for node in nodes {
            let id = node.id.clone();
            if let Err(e) = dag.add_node(node) {
                warn!(node = %id, error = %e, "skipping duplicate node during replay");
            }
        }
        for edge in edges {
            if let Err(e) = dag.add_edge(edge.clone()) {
                warn!(from = %edge.from, to = %edge.to, error = %e, "skipping edge during replay");
            }
        }
        info!(nodes = dag.node_count(), "replayed durable mirror into memory");
        Ok(())
    }

    /// Append `node`: stage in memory, mirror durably, invalidate affected
    /// cache entries. On durable-write failure the in-memory stage is rolled
    /// back and the whole operation fails, rather than leaving the two tiers
    /// diverged.
    pub fn add_node(&self, node: Node) -> Result<(), FactGraphError> {
        let triple = node.triple();
        {
            let mut dag = self.dag.write().expect("dag lock poisoned");
            dag.add_node(node.clone())?;
        }
        if let Some(mirror) = &self.mirror {
            if let Err(e) = mirror.put_node(&node) {
                let mut dag = self.dag.write().expect("dag lock poisoned");
                dag.remove_node_for_rollback(&node.id);
                return Err(e);
            }
        }
        self.cache.lock().expect("cache lock poisoned").invalidate_for_node(&triple);
        Ok(())
    }

    /// Append `edge`: same staged-then-mirrored discipline as `add_node`.
    pub fn add_edge(&self, edge: Edge) -> Result<(), FactGraphError> {
        {
            let mut dag = self.dag.write().expect("dag lock poisoned");
            dag.add_edge(edge.clone())?;
        }
        if let Some(mirror) = &self.mirror {
            if let Err(e) = mirror.put_edge(&edge) {
                let mut dag = self.dag.write().expect("dag lock poisoned");
                dag.remove_edge_for_rollback(&edge.from, &edge.to);
                return Err(e);
            }
        }
        self.cache
            .lock()
            .expect("cache lock poisoned")
            .invalidate_for_edge(edge.from.as_str(), edge.to.as_str());
        Ok(())
    }

    /// Remove a previously appended node from both tiers, for callers that
    /// staged a node and then failed a follow-on write in the same logical
    /// operation (e.g. its confirms edge) and need to undo the whole thing
    /// rather than leave an unconfirmed node observable.
    pub fn remove_node(&self, id: &NodeId) -> Result<(), FactGraphError> {
        {
            let mut dag = self.dag.write().expect("dag lock poisoned");
            dag.remove_node_for_rollback(id);
        }
        if let Some(mirror) = &self.mirror {
            mirror.remove_node(id)?;
        }
        Ok(())
    }

    /// Look up a node by id. Falls back to the durable mirror and re-warms
    /// memory on a miss.
    pub fn get_node(&self, id: &NodeId) -> Result<Node, FactGraphError> {
        {
            let dag = self.dag.read().expect("dag lock poisoned");
            if let Ok(node) = dag.get_node(id) {
                return Ok(node.clone());
            }
        }
        if let Some(mirror) = &self.mirror {
            if let Some(node) = mirror.get_node(id)? {
                let mut dag = self.dag.write().expect("dag lock poisoned");
                let _ = dag.add_node(node.clone());
                return Ok(node);
            }
        }
        Err(FactGraphError::NotFound(id.to_string()))
    }

    /// Enumerate every node. If memory is empty (e.g. immediately after a
    /// restart that skipped replay) and a mirror exists, re-warm from it
    /// first.
    pub fn get_all_nodes(&self) -> Result<Vec<Node>, FactGraphError> {
        {
            let dag = self.dag.read().expect("dag lock poisoned");
            if dag.node_count() > 0 {
                return Ok(dag.get_all_nodes().into_iter().cloned().collect());
            }
        }
        self.replay_durable()?;
        let dag = self.dag.read().expect("dag lock poisoned");
        Ok(dag.get_all_nodes().into_iter().cloned().collect())
    }

    /// Pattern-match query, fronted by the TTL+LRU cache.
    pub fn query(&self, pattern: &TriplePattern) -> Vec<MatchedNode> {
        if let Some(hit) = self.cache.lock().expect("cache lock poisoned").get(pattern) {
            self.metrics.lock().expect("metrics lock poisoned").record_hit();
            return hit;
        }
        self.metrics.lock().expect("metrics lock poisoned").record_miss();

        let started = Instant::now();
        let mut rows = {
            let dag = self.dag.read().expect("dag lock poisoned");
            dag.query(pattern)
        };
        if rows.is_empty() && self.mirror.is_some() {
            let _ = self.replay_durable();
            let dag = self.dag.read().expect("dag lock poisoned");
            rows = dag.query(pattern);
        }
        let elapsed_us = started.elapsed().as_micros() as u64;
        self.metrics.lock().expect("metrics lock poisoned").record_query(elapsed_us);

        self.cache
            .lock()
            .expect("cache lock poisoned")
            .insert(pattern.clone(), rows.clone());
        rows
    }

    pub fn metrics(&self) -> StorageMetrics {
        let mut snapshot = self.metrics.lock().expect("metrics lock poisoned").clone();
        snapshot.cache_entries = self.cache.lock().expect("cache lock poisoned").len();
        snapshot
    }

    pub fn node_count(&self) -> usize {
        self.dag.read().expect("dag lock poisoned").node_count()
    }
}
