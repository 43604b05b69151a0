/// Errors returned by store operations.
///
/// Application code that runs inside the engine (trigger handlers,
/// transaction bodies) reports failures through [`StoreError::Handler`],
/// which carries the original `anyhow::Error` unchanged.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document not found: {path}")]
    NotFound { path: String },
    #[error("document already exists: {path}")]
    AlreadyExists { path: String },
    #[error("transaction conflict: {path} was modified after it was read")]
    Conflict { path: String },
    #[error("invalid trigger pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("unsupported filter operator: {op}")]
    UnsupportedOperator { op: String },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Handler(#[from] anyhow::Error),
}

impl StoreError {
    /// Shorthand for [`StoreError::InvalidArgument`].
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        StoreError::InvalidArgument(message.into())
    }

    /// Whether this error is a transaction validation conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Result alias used throughout the store.
pub type StoreResult<T> = Result<T, StoreError>;
