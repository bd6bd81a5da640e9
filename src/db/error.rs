//! Store error type
//!
//! Store implementations classify their failures into the few cases the
//! service layer reacts to differently. Everything else is carried as an
//! opaque `anyhow::Error` for logging.

/// Failure of a single store operation
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// The caller's deadline passed before the operation completed
    #[error("Deadline exceeded during {0}")]
    DeadlineExceeded(&'static str),

    /// The caller's context was cancelled
    #[error("Cancelled during {0}")]
    Cancelled(&'static str),

    /// Connectivity, query or decoding failure
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Classify a sqlx error, keeping `context` as the human readable cause.
    pub fn from_sqlx(err: sqlx::Error, context: &'static str) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::UniqueViolation(db_err.message().to_string());
            }
        }
        StoreError::Other(anyhow::Error::new(err).context(context))
    }
}
