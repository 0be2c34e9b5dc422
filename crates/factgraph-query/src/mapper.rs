use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

use crate::types::Binding;

/// Every key `enrich_binding` injects that isn't one of the query's own
/// SPARQL variable names: the raw positional keys, their long-form aliases,
/// the convenience aliases, and every PROV-O role name. None of these are
/// meaningful join keys for OPTIONAL — two unrelated rows both carry `"s"`,
/// `"validator"`, etc., so comparing them produces spurious mismatches.
static DERIVED_KEYS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    let mut keys: HashSet<&'static str> =
        ["s", "p", "o", "subject", "predicate", "object", "validator", "timestamp"].into_iter().collect();
    for (alias, _) in CONVENIENCE_ALIASES {
        keys.insert(*alias);
    }
    for (subject_role, object_role) in PROV_O_ROLES.values() {
        keys.insert(*subject_role);
        keys.insert(*object_role);
    }
    keys
});

/// True for a binding key that `enrich_binding` derives rather than one that
/// came from the query's own SPARQL variable names.
pub fn is_derived_key(key: &str) -> bool {
    DERIVED_KEYS.contains(key)
}

/// `predicate -> (subject_role, object_role)` for the seven PROV-O
/// predicates this store recognises. Built once and shared
/// across every binding enrichment — this table never changes at runtime.
static PROV_O_ROLES: Lazy<HashMap<&'static str, (&'static str, &'static str)>> = Lazy::new(|| {
    HashMap::from([
        ("prov:wasGeneratedBy", ("entity", "activity")),
        ("prov:used", ("activity", "entity")),
        ("prov:wasAssociatedWith", ("activity", "agent")),
        ("prov:wasAttributedTo", ("entity", "agent")),
        ("prov:wasDerivedFrom", ("entity", "entity")),
        ("prov:wasInformedBy", ("activity", "activity")),
        ("prov:actedOnBehalfOf", ("delegate", "responsible")),
    ])
});

const CONVENIENCE_ALIASES: &[(&str, &str)] = &[("person", "s"), ("relation", "p"), ("target", "o"), ("friend", "o")];

/// Enrich a raw `{s, p, o, validator, timestamp}` binding with positional
/// aliases, convenience aliases, and — when the predicate is a recognised
/// PROV-O relation — the matching subject/object role names.
pub fn enrich_binding(mut binding: Binding) -> Binding {
    let s = binding.get("s").cloned().flatten();
    let p = binding.get("p").cloned().flatten();
    let o = binding.get("o").cloned().flatten();

    binding.insert("subject".to_string(), s.clone());
    binding.insert("predicate".to_string(), p.clone());
    binding.insert("object".to_string(), o.clone());

    for (alias, position) in CONVENIENCE_ALIASES {
        let value = match *position {
            "s" => s.clone(),
            "p" => p.clone(),
            "o" => o.clone(),
            _ => None,
        };
        binding.insert((*alias).to_string(), value);
    }

    if let Some(predicate) = p.as_deref() {
        if let Some((subject_role, object_role)) = PROV_O_ROLES.get(predicate) {
            binding.insert((*subject_role).to_string(), s.clone());
            binding.insert((*object_role).to_string(), o.clone());
        }
    }

    binding
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_binding(s: &str, p: &str, o: &str) -> Binding {
        HashMap::from([
            ("s".to_string(), Some(s.to_string())),
            ("p".to_string(), Some(p.to_string())),
            ("o".to_string(), Some(o.to_string())),
        ])
    }

    #[test]
    fn injects_prov_o_roles_for_was_generated_by() {
        let binding = enrich_binding(base_binding("report1", "prov:wasGeneratedBy", "activity1"));
        assert_eq!(binding.get("entity").cloned().flatten(), Some("report1".to_string()));
        assert_eq!(binding.get("activity").cloned().flatten(), Some("activity1".to_string()));
    }

    #[test]
    fn injects_convenience_aliases() {
        let binding = enrich_binding(base_binding("Alice", "knows", "Bob"));
        assert_eq!(binding.get("person").cloned().flatten(), Some("Alice".to_string()));
        assert_eq!(binding.get("target").cloned().flatten(), Some("Bob".to_string()));
        assert_eq!(binding.get("friend").cloned().flatten(), Some("Bob".to_string()));
    }

    #[test]
    fn unknown_predicate_gets_no_role_aliases() {
        let binding = enrich_binding(base_binding("Alice", "knows", "Bob"));
        assert!(!binding.contains_key("entity"));
    }
}
