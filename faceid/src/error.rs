use facekit_facestore::StoreError;
use thiserror::Error;

/// Errors returned by faceid operations.
#[derive(Debug, Error)]
pub enum FaceError {
    #[error("faceid: identity already exists: {0}")]
    AlreadyExists(String),

    #[error("faceid: identity not found: {0}")]
    NotFound(String),

    #[error("faceid: dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("faceid: no face detected in image")]
    NoFaceDetected,

    #[error("faceid: detection failed: {0}")]
    DetectionFailed(String),

    #[error("faceid: encoding failed: {0}")]
    EncodingFailed(String),

    #[error("faceid: storage: {0}")]
    Storage(#[source] StoreError),

    #[error("faceid: invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl From<StoreError> for FaceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => FaceError::NotFound(id),
            other => FaceError::Storage(other),
        }
    }
}
