use thiserror::Error;

/// Error kinds for the fact-store core, shared by every crate in the
/// workspace. A handful of internal variants (`Serialization`, `Io`) exist
/// to propagate lower-level failures without losing information.
#[derive(Debug, Clone, Error)]
pub enum FactGraphError {
    // ── Client errors (bad request; safe to surface, never change state) ──────
    #[error("unknown validator: {0}")]
    UnknownValidator(String),

    #[error("not your turn")]
    NotYourTurn,

    #[error("invalid signature")]
    BadSignature,

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("cannot remove last validator")]
    CannotRemoveLast,

    #[error("security violation: {0}")]
    SecurityViolation(String),

    // ── Query errors (malformed or unsatisfiable mid-execution) ───────────────
    #[error("query error: {0}")]
    QueryError(String),

    // ── System errors (environmental) ─────────────────────────────────────────
    #[error("storage error: {0}")]
    StorageError(String),

    // ── Internal plumbing, not exposed to external callers ────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(String),
}

impl FactGraphError {
    /// True for variants caused by a bad request rather than server state —
    /// never cause a state change, safe to retry where applicable.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            FactGraphError::UnknownValidator(_)
                | FactGraphError::NotYourTurn
                | FactGraphError::BadSignature
                | FactGraphError::CannotRemoveLast
                | FactGraphError::ParseError(_)
                | FactGraphError::SecurityViolation(_)
        )
    }

    /// True for the single query-error variant.
    pub fn is_query_error(&self) -> bool {
        matches!(self, FactGraphError::QueryError(_))
    }

    /// True for environmental/system errors.
    pub fn is_system_error(&self) -> bool {
        matches!(
            self,
            FactGraphError::StorageError(_)
                | FactGraphError::Serialization(_)
                | FactGraphError::Io(_)
        )
    }
}
