use serde::{Deserialize, Serialize};

use crate::types::NodeId;

/// A directed, labelled, immutable relation between two nodes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub label: String,
}

impl Edge {
    pub fn new(from: NodeId, to: NodeId, label: impl Into<String>) -> Self {
        Self {
            from,
            to,
            label: label.into(),
        }
    }

    pub fn confirms(from: NodeId, to: NodeId) -> Self {
        Self::new(from, to, crate::constants::CONFIRMS_EDGE_LABEL)
    }
}
