use serde::{Deserialize, Serialize};
use std::fmt;

/// UTC Unix timestamp (seconds). Assigned server-side on ingestion.
pub type Timestamp = i64;

/// 1-based, dense transaction sequence number (`tx_count`).
pub type TxSeq = u64;

// ── NodeId ───────────────────────────────────────────────────────────────────

/// Identifier of a transaction node: `tx{N}`, N = 1-based append counter.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(seq: TxSeq) -> Self {
        Self(format!("tx{seq}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ── ValidatorId ──────────────────────────────────────────────────────────────

/// Identifier of a validator in the roster. A short plain string — validators
/// are provisioned out of band (one `.pub` file per id), not derived from
/// key material.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValidatorId(pub String);

impl ValidatorId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValidatorId({})", self.0)
    }
}

impl From<String> for ValidatorId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ValidatorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ── Triple ───────────────────────────────────────────────────────────────────

/// An RDF fact `(subject, predicate, object)`. Strings may encode IRIs
/// (`<…>`), prefixed names (`prov:wasGeneratedBy`), or plain literals.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl Triple {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }
}

// ── TriplePattern ────────────────────────────────────────────────────────────

/// A triple pattern used for queries and cache keys. `None` in a position is
/// a wildcard that matches anything.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TriplePattern {
    pub subject: Option<String>,
    pub predicate: Option<String>,
    pub object: Option<String>,
}

impl TriplePattern {
    pub fn any() -> Self {
        Self::default()
    }

    /// Does this pattern match `triple` component-wise?
    pub fn matches(&self, triple: &Triple) -> bool {
        Self::component_matches(&self.subject, &triple.subject)
            && Self::component_matches(&self.predicate, &triple.predicate)
            && Self::component_matches(&self.object, &triple.object)
    }

    fn component_matches(pattern: &Option<String>, value: &str) -> bool {
        match pattern {
            None => true,
            Some(p) => p == value,
        }
    }

    /// Canonical serialisation used as a query-cache key.
    pub fn cache_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.subject.as_deref().unwrap_or("*"),
            self.predicate.as_deref().unwrap_or("*"),
            self.object.as_deref().unwrap_or("*"),
        )
    }
}
