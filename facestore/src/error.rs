use thiserror::Error;

/// Errors that can occur in identity store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("facestore: identity not found: {0}")]
    NotFound(String),

    #[error("facestore: invalid identity id: {0:?}")]
    InvalidId(String),

    #[error("facestore: io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("facestore: serialization error: {0}")]
    Serialization(String),

    #[error("facestore: lock poisoned: {0}")]
    Poisoned(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
