use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// The five error kinds distinguished: validation, precondition,
/// not-found (surfaced as `Ok(false)`/empty, never as `Err`, so it has no
/// variant here except where `extend_expiration` explicitly raises),
/// integrity, and tenant-context absence (a warning, not an error).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("{operation}: {cause}")]
    Precondition { operation: String, cause: String },

    #[error("{operation}: {cause}")]
    Integrity { operation: String, cause: String },

    #[error("cache error: {0}")]
    Cache(String),
}

impl EngineError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn precondition(operation: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::Precondition {
            operation: operation.into(),
            cause: cause.into(),
        }
    }

    /// Reserved for invariant failures that indicate prior data corruption:
    /// hierarchy fixed-point bound exceeded, a cycle found on a read path.
    /// These should page operators, never get silently swallowed.
    pub fn integrity(operation: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::Integrity {
            operation: operation.into(),
            cause: cause.into(),
        }
    }
}

impl From<rebac_models::ValidationError> for EngineError {
    fn from(err: rebac_models::ValidationError) -> Self {
        Self::Validation {
            field: "input".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<rebac_cache::CacheError> for EngineError {
    fn from(err: rebac_cache::CacheError) -> Self {
        EngineError::Cache(err.to_string())
    }
}
