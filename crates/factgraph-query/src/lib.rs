pub mod aggregate;
pub mod executor;
pub mod mapper;
pub mod optimiser;
pub mod parser;
pub mod types;

use factgraph_core::FactGraphError;
use factgraph_storage::StorageCoordinator;

pub use parser::Parser;
pub use types::{Binding, Query};

/// Parse, optimise, and execute a SPARQL-subset query string against
/// `coordinator` in one call: parser → optimiser → executor → coordinator
/// → aggregator → projection.
pub fn run_query(coordinator: &StorageCoordinator, text: &str) -> Result<Vec<Binding>, FactGraphError> {
    let query = Parser::parse(text)?;
    let query = optimiser::optimise(query);
    executor::execute(coordinator, &query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use factgraph_core::{Node, NodeId, ValidatorId};

    fn make_node(n: u64, s: &str, p: &str, o: &str) -> Node {
        Node {
            id: NodeId::new(n),
            subject: s.to_string(),
            predicate: p.to_string(),
            object: o.to_string(),
            validator: ValidatorId::from("agent1"),
            signature: vec![],
            timestamp: 1_700_000_000 + n as i64,
            hash: [0u8; 32],
        }
    }

    #[test]
    fn end_to_end_select_with_filter_and_limit() {
        let store = StorageCoordinator::in_memory(300, 10_000, 8_000);
        store.add_node(make_node(1, "Alice", "age", "30")).unwrap();
        store.add_node(make_node(2, "Bob", "age", "20")).unwrap();

        let rows = run_query(&store, "SELECT ?p ?age WHERE { ?p <age> ?age . FILTER(?age > 25) }").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("p").cloned().flatten(), Some("Alice".to_string()));
    }

    #[test]
    fn mutating_keyword_is_rejected_before_execution() {
        let store = StorageCoordinator::in_memory(300, 10_000, 8_000);
        let err = run_query(&store, "INSERT DATA { <a> <b> <c> }").unwrap_err();
        assert!(matches!(err, FactGraphError::SecurityViolation(_)));
    }
}
