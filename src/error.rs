use sled::transaction::TransactionError;

#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

impl From<sled::Error> for DispatchError {
    fn from(err: sled::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

// Aborts carry the typed error out of a transaction closure; anything else is
// a storage-level failure.
impl From<TransactionError<DispatchError>> for DispatchError {
    fn from(err: TransactionError<DispatchError>) -> Self {
        match err {
            TransactionError::Abort(inner) => inner,
            TransactionError::Storage(inner) => Self::Internal(inner.to_string()),
        }
    }
}
