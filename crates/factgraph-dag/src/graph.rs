use std::collections::HashMap;

use factgraph_core::{Edge, FactGraphError, Node, NodeId, TriplePattern};

/// A node as returned from a pattern scan, paired with its outgoing edges.
#[derive(Clone, Debug)]
pub struct MatchedNode {
    pub node: Node,
    pub outgoing_edges: Vec<Edge>,
}

impl MatchedNode {
    /// The node this one confirms, if its confirms-edge is among
    /// `outgoing_edges` (every node but the first in the chain has one).
    pub fn confirms_parent(&self) -> Option<&NodeId> {
        self.outgoing_edges
            .iter()
            .find(|e| e.label == factgraph_core::constants::CONFIRMS_EDGE_LABEL)
            .map(|e| &e.to)
    }
}

/// The in-memory, authoritative DAG: an arena of nodes plus a flat edge list.
///
/// No intra-node references are ever held — every edge is a plain
/// `(from_id, to_id, label)` triple, so the structure can never contain a
/// reference cycle.
#[derive(Default)]
pub struct InMemoryDag {
    nodes: HashMap<NodeId, Node>,
    /// Insertion order, preserved so `get_all_nodes` is stable within a read.
    order: Vec<NodeId>,
    edges: Vec<Edge>,
    /// `from_id -> indices into `edges`` for fast outgoing-edge lookup.
    outgoing: HashMap<NodeId, Vec<usize>>,
}

impl InMemoryDag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node. Fails with `AlreadyExists` if `id` is already present.
    pub fn add_node(&mut self, node: Node) -> Result<(), FactGraphError> {
        if self.nodes.contains_key(&node.id) {
            return Err(FactGraphError::AlreadyExists(node.id.to_string()));
        }
        self.order.push(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Insert an edge. Both endpoints must already exist.
    pub fn add_edge(&mut self, edge: Edge) -> Result<(), FactGraphError> {
        if !self.nodes.contains_key(&edge.from) {
            return Err(FactGraphError::UnknownNode(edge.from.to_string()));
        }
        if !self.nodes.contains_key(&edge.to) {
            return Err(FactGraphError::UnknownNode(edge.to.to_string()));
        }
        let idx = self.edges.len();
        self.outgoing.entry(edge.from.clone()).or_default().push(idx);
        self.edges.push(edge);
        Ok(())
    }

    pub fn get_node(&self, id: &NodeId) -> Result<&Node, FactGraphError> {
        self.nodes.get(id).ok_or_else(|| FactGraphError::NotFound(id.to_string()))
    }

    /// Enumerate all `(id, data)` pairs. Order is stable within a single read
    /// (insertion order) but unspecified across process restarts.
    pub fn get_all_nodes(&self) -> Vec<&Node> {
        self.order.iter().filter_map(|id| self.nodes.get(id)).collect()
    }

    pub fn outgoing_edges(&self, id: &NodeId) -> Vec<Edge> {
        self.outgoing
            .get(id)
            .map(|idxs| idxs.iter().map(|&i| self.edges[i].clone()).collect())
            .unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Undo a staged `add_node` whose durable mirror write failed. Only
    /// meant to be called immediately after the matching `add_node` — it
    /// does not attempt to unwind any edges added since.
    pub fn remove_node_for_rollback(&mut self, id: &NodeId) {
        self.nodes.remove(id);
        self.order.retain(|n| n != id);
    }

    /// Undo a staged `add_edge` whose durable mirror write failed. Only
    /// meant to be called immediately after the matching `add_edge` — it
    /// removes the single most recently pushed edge between `from` and `to`.
    pub fn remove_edge_for_rollback(&mut self, from: &NodeId, to: &NodeId) {
        let Some(idx) = self.edges.iter().rposition(|e| &e.from == from && &e.to == to) else {
            return;
        };
        self.edges.remove(idx);
        for indices in self.outgoing.values_mut() {
            indices.retain(|&i| i != idx);
            for i in indices.iter_mut() {
                if *i > idx {
                    *i -= 1;
                }
            }
        }
    }

    /// Linear scan matching `pattern` component-wise; each hit carries its
    /// outgoing edges. Scanning is O(n) by design — the
    /// coordinator's query cache amortises repeated scans.
    pub fn query(&self, pattern: &TriplePattern) -> Vec<MatchedNode> {
        self.order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|node| pattern.matches(&node.triple()))
            .map(|node| MatchedNode {
                node: node.clone(),
                outgoing_edges: self.outgoing_edges(&node.id),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use factgraph_core::ValidatorId;

    fn make_node(n: u64, s: &str, p: &str, o: &str) -> Node {
        Node {
            id: NodeId::new(n),
            subject: s.to_string(),
            predicate: p.to_string(),
            object: o.to_string(),
            validator: ValidatorId::from("agent1"),
            signature: vec![],
            timestamp: 1_700_000_000,
            hash: [0u8; 32],
        }
    }

    #[test]
    fn add_node_rejects_duplicate_id() {
        let mut dag = InMemoryDag::new();
        dag.add_node(make_node(1, "Alice", "knows", "Bob")).unwrap();
        let err = dag.add_node(make_node(1, "Alice", "knows", "Charlie")).unwrap_err();
        assert!(matches!(err, FactGraphError::AlreadyExists(_)));
    }

    #[test]
    fn add_edge_requires_existing_endpoints() {
        let mut dag = InMemoryDag::new();
        dag.add_node(make_node(1, "Alice", "knows", "Bob")).unwrap();
        let err = dag
            .add_edge(Edge::confirms(NodeId::new(2), NodeId::new(1)))
            .unwrap_err();
        assert!(matches!(err, FactGraphError::UnknownNode(_)));
    }

    #[test]
    fn query_matches_wildcards() {
        let mut dag = InMemoryDag::new();
        dag.add_node(make_node(1, "Alice", "knows", "Bob")).unwrap();
        dag.add_node(make_node(2, "Bob", "knows", "Charlie")).unwrap();

        let all = dag.query(&TriplePattern::any());
        assert_eq!(all.len(), 2);

        let by_subject = dag.query(&TriplePattern {
            subject: Some("Alice".to_string()),
            predicate: None,
            object: None,
        });
        assert_eq!(by_subject.len(), 1);
        assert_eq!(by_subject[0].node.object, "Bob");
    }

    #[test]
    fn query_returns_outgoing_edges() {
        let mut dag = InMemoryDag::new();
        dag.add_node(make_node(1, "Alice", "knows", "Bob")).unwrap();
        dag.add_node(make_node(2, "Bob", "knows", "Charlie")).unwrap();
        dag.add_edge(Edge::confirms(NodeId::new(2), NodeId::new(1))).unwrap();

        let rows = dag.query(&TriplePattern::any());
        let tx2 = rows.iter().find(|r| r.node.id == NodeId::new(2)).unwrap();
        assert_eq!(tx2.outgoing_edges.len(), 1);
        assert_eq!(tx2.outgoing_edges[0].label, "confirms");
        assert_eq!(tx2.confirms_parent(), Some(&NodeId::new(1)));

        let tx1 = rows.iter().find(|r| r.node.id == NodeId::new(1)).unwrap();
        assert_eq!(tx1.confirms_parent(), None);
    }
}
