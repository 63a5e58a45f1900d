use thiserror::Error;

/// Closed set of failure kinds the engine surfaces.
///
/// Every public operation returns one of these; the HTTP layer and the voice
/// tools translate them without inspecting message strings. Messages passed
/// to `Validation` that a tool must branch on (`weekend_disallowed`,
/// `invalid_time`) are stable identifiers, not prose.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Optimistic concurrency loss. Recovered locally by bounded retry where
    /// the operation allows it; surfaced once retries exhaust.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("no available beds")]
    NoCapacity,

    #[error("reservation expired: {0}")]
    Expired(String),

    #[error("deadline exceeded: {0}")]
    Timeout(String),

    #[error("dependency unavailable: {0}")]
    Unavailable(String),

    /// Invariant violation. Logged with full context; the process keeps
    /// serving to avoid denying shelter.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        EngineError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        EngineError::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        EngineError::Internal(msg.into())
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => EngineError::NotFound("row not found".into()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                EngineError::Conflict("unique constraint violated".into())
            }
            // SQLITE_BUSY / SQLITE_LOCKED: a concurrent writer holds the
            // lock. That is an optimistic concurrency loss like any other
            // CAS miss, so bounded retry loops recover it.
            sqlx::Error::Database(db) if db.message().contains("locked") => {
                EngineError::Conflict(db.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                EngineError::Unavailable(e.to_string())
            }
            _ => EngineError::Internal(e.to_string()),
        }
    }
}
