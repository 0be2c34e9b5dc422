use std::fs;
use std::path::{Path, PathBuf};

use factgraph_core::{Edge, FactGraphError, Node, NodeId};

/// Durable, content-addressed mirror of the in-memory DAG.
///
/// Nodes live at `<root>/nodes/<tx-id>.bin`, edges at
/// `<root>/edges/<from>_<to>.bin`. Every write lands in a sibling `.tmp` file
/// first and is promoted with a single `rename`, so a crash mid-write can
/// never leave a half-written record behind.
pub struct DurableMirror {
    root: PathBuf,
}

impl DurableMirror {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, FactGraphError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("nodes")).map_err(io_err)?;
        fs::create_dir_all(root.join("edges")).map_err(io_err)?;
        Ok(Self { root })
    }

    pub fn put_node(&self, node: &Node) -> Result<(), FactGraphError> {
        let bytes = bincode::serialize(node)
            .map_err(|e| FactGraphError::Serialization(e.to_string()))?;
        atomic_write(&self.node_path(&node.id), &bytes)
    }

    pub fn get_node(&self, id: &NodeId) -> Result<Option<Node>, FactGraphError> {
        let path = self.node_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).map_err(io_err)?;
        let node = bincode::deserialize(&bytes)
            .map_err(|e| FactGraphError::Serialization(e.to_string()))?;
        Ok(Some(node))
    }

    pub fn put_edge(&self, edge: &Edge) -> Result<(), FactGraphError> {
        let bytes = bincode::serialize(edge)
            .map_err(|e| FactGraphError::Serialization(e.to_string()))?;
        atomic_write(&self.edge_path(&edge.from, &edge.to), &bytes)
    }

    /// Delete a node's durable file, for rolling back an append whose
    /// follow-on write (e.g. its confirms edge) failed. Deleting a file that
    /// was never written is not an error.
    pub fn remove_node(&self, id: &NodeId) -> Result<(), FactGraphError> {
        match fs::remove_file(self.node_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(e)),
        }
    }

    /// Replay every node and edge file under `root`, in directory-listing
    /// order, then sort nodes by their `NodeId` sequence number — replay
    /// order must match original insertion order regardless of wall-clock
    /// timestamps, since clocks can move backward across a restart but
    /// `tx_count` never does.
    pub fn replay(&self) -> Result<(Vec<Node>, Vec<Edge>), FactGraphError> {
        let mut nodes = Vec::new();
        for entry in fs::read_dir(self.root.join("nodes")).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            if entry.path().extension().and_then(|e| e.to_str()) != Some("bin") {
                continue;
            }
            let bytes = fs::read(entry.path()).map_err(io_err)?;
            let node: Node = bincode::deserialize(&bytes)
                .map_err(|e| FactGraphError::Serialization(e.to_string()))?;
            nodes.push(node);
        }
        nodes.sort_by_key(|n| node_seq(&n.id));

        let mut edges = Vec::new();
        for entry in fs::read_dir(self.root.join("edges")).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            if entry.path().extension().and_then(|e| e.to_str()) != Some("bin") {
                continue;
            }
            let bytes = fs::read(entry.path()).map_err(io_err)?;
            let edge: Edge = bincode::deserialize(&bytes)
                .map_err(|e| FactGraphError::Serialization(e.to_string()))?;
            edges.push(edge);
        }
        Ok((nodes, edges))
    }

    fn node_path(&self, id: &NodeId) -> PathBuf {
        self.root.join("nodes").join(format!("{}.bin", id.as_str()))
    }

    fn edge_path(&self, from: &NodeId, to: &NodeId) -> PathBuf {
        self.root
            .join("edges")
            .join(format!("{}_{}.bin", from.as_str(), to.as_str()))
    }
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), FactGraphError> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

fn io_err(e: std::io::Error) -> FactGraphError {
    FactGraphError::Io(e.to_string())
}

/// Numeric sequence encoded in a `NodeId` of the form `tx<seq>`, used to
/// recover insertion order on replay. Falls back to 0 for any id that
/// doesn't carry a parseable suffix rather than failing replay outright.
fn node_seq(id: &NodeId) -> u64 {
    id.as_str().strip_prefix("tx").and_then(|s| s.parse().ok()).unwrap_or(0)
}
