pub mod graph;

pub use graph::{InMemoryDag, MatchedNode};
