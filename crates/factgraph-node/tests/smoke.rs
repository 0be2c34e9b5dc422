//! End-to-end smoke test exercising the facade the way the CLI does:
//! open a fresh store, append two signed facts in round-robin turn order,
//! run a SPARQL query with a filter, and confirm the confirms-edge and
//! cache-invalidation behaviour that follows.

use factgraph_core::{FactGraphConfig, ValidatorId};
use factgraph_crypto::{transaction_hash, KeyPair};
use factgraph_node::FactGraphCore;

fn seed_validator(dir: &std::path::Path, id: &str) -> KeyPair {
    let validators_dir = dir.join("validators");
    std::fs::create_dir_all(&validators_dir).unwrap();
    let kp = KeyPair::generate();
    std::fs::write(validators_dir.join(format!("{id}.pub")), &kp.public_key).unwrap();
    kp
}

#[test]
fn two_validators_append_in_round_robin_and_confirms_edges_chain() {
    let dir = tempfile::tempdir().unwrap();
    let kp_a = seed_validator(dir.path(), "agent-a");

    let config = FactGraphConfig::new("smoke-node", dir.path().join("db"), dir.path().join("validators"));
    let core = FactGraphCore::open(&config).unwrap();

    let id_b = ValidatorId::from("agent-b");
    let kp_b = KeyPair::generate();
    core.add_validator(id_b.clone(), kp_b.public_key.clone(), ValidatorId::from("agent-a")).unwrap();

    let id_a = ValidatorId::from("agent-a");
    let ts1 = 1_700_000_000;
    let hash1 = transaction_hash("report1", "prov:wasGeneratedBy", "activity1", id_a.as_str(), ts1);
    let sig1 = kp_a.sign(&hash1);
    let tx1 = core.add_transaction("report1", "prov:wasGeneratedBy", "activity1", &id_a, &sig1, ts1).unwrap();
    assert_eq!(tx1.as_str(), "tx1");

    let ts2 = ts1 + 1;
    let hash2 = transaction_hash("report1", "prov:wasAttributedTo", "alice", id_b.as_str(), ts2);
    let sig2 = kp_b.sign(&hash2);
    let tx2 = core.add_transaction("report1", "prov:wasAttributedTo", "alice", &id_b, &sig2, ts2).unwrap();
    assert_eq!(tx2.as_str(), "tx2");

    // Submitting out of turn (agent-a again, but it's agent-a's turn a
    // third time only after agent-b) must be rejected without advancing state.
    let ts3 = ts2 + 1;
    let hash3 = transaction_hash("x", "y", "z", id_a.as_str(), ts3);
    let sig3 = kp_a.sign(&hash3);
    assert!(core.add_transaction("x", "y", "z", &id_a, &sig3, ts3).is_err());
    assert_eq!(core.node_count(), 2);

    let rows = core.execute_sparql("SELECT ?entity ?activity WHERE { ?entity prov:wasGeneratedBy ?activity }").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("entity").cloned().flatten(), Some("report1".to_string()));

    let filtered = core.execute_sparql(r#"SELECT ?s ?o WHERE { ?s prov:wasAttributedTo ?o FILTER(?o = "alice") }"#).unwrap();
    assert_eq!(filtered.len(), 1);
}

#[test]
fn cache_invalidates_on_new_matching_fact() {
    let dir = tempfile::tempdir().unwrap();
    let kp = seed_validator(dir.path(), "agent-a");
    let config = FactGraphConfig::new("smoke-node-2", dir.path().join("db"), dir.path().join("validators"));
    let core = FactGraphCore::open(&config).unwrap();
    let id = ValidatorId::from("agent-a");

    let ts1 = 1_700_000_000;
    let hash1 = transaction_hash("Alice", "knows", "Bob", id.as_str(), ts1);
    let sig1 = kp.sign(&hash1);
    core.add_transaction("Alice", "knows", "Bob", &id, &sig1, ts1).unwrap();

    let first = core.execute_sparql("SELECT ?o WHERE { Alice knows ?o }").unwrap();
    assert_eq!(first.len(), 1);

    let ts2 = ts1 + 1;
    let hash2 = transaction_hash("Alice", "knows", "Charlie", id.as_str(), ts2);
    let sig2 = kp.sign(&hash2);
    core.add_transaction("Alice", "knows", "Charlie", &id, &sig2, ts2).unwrap();

    let second = core.execute_sparql("SELECT ?o WHERE { Alice knows ?o }").unwrap();
    assert_eq!(second.len(), 2);
}

#[test]
fn security_violation_blocks_mutating_query_text() {
    let dir = tempfile::tempdir().unwrap();
    seed_validator(dir.path(), "agent-a");
    let config = FactGraphConfig::new("smoke-node-3", dir.path().join("db"), dir.path().join("validators"));
    let core = FactGraphCore::open(&config).unwrap();

    let err = core.execute_sparql("DROP ALL").unwrap_err();
    assert!(matches!(err, factgraph_core::FactGraphError::SecurityViolation(_)));
}
