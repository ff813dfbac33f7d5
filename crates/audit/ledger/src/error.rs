use thiserror::Error;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger-layer errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The key already holds a value (or a concurrent `put` won the race).
    #[error("ledger conflict: key already exists: {key}")]
    Conflict { key: String },

    #[error("ledger key not found: {key}")]
    NotFound { key: String },

    #[error("invalid ledger key: {0}")]
    InvalidKey(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("backend error: {0}")]
    Backend(String),
}

impl LedgerError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, LedgerError::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LedgerError::NotFound { .. })
    }

    /// Replace the storage-level key in `Conflict`/`NotFound` with a
    /// caller-readable one.
    pub(crate) fn relabel(self, key: &str) -> Self {
        match self {
            LedgerError::Conflict { .. } => LedgerError::Conflict {
                key: key.to_string(),
            },
            LedgerError::NotFound { .. } => LedgerError::NotFound {
                key: key.to_string(),
            },
            other => other,
        }
    }
}
