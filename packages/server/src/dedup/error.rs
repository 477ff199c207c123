use filehub_common::storage::StorageError;
use thiserror::Error;
use uuid::Uuid;

use super::registry::RegistryError;

/// Caller-visible failures of the deduplication engine.
///
/// Every variant is terminal for the request: nothing has been committed when
/// one is returned.
#[derive(Debug, Error)]
pub enum DedupError {
    #[error("no content provided")]
    NoContentProvided,

    #[error("missing required field: {0}")]
    MissingRequiredField(&'static str),

    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("upload stream failed: {0}")]
    StreamRead(#[source] std::io::Error),

    #[error("upload exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },

    #[error("declared size {declared} does not match the {actual} bytes received")]
    SizeMismatch { declared: u64, actual: u64 },

    #[error("declared size {declared} exceeds the maximum of {max}")]
    SizeOutOfRange { declared: u64, max: u64 },

    #[error("file record {0} not found")]
    NotFound(Uuid),

    #[error("storage write failed: {0}")]
    StorageWrite(String),

    #[error("storage backend failed: {0}")]
    Backend(String),
}

impl DedupError {
    /// Classify a blob store failure that happened while persisting an upload.
    pub(crate) fn from_write(err: StorageError) -> Self {
        match err {
            StorageError::StreamRead(e) => Self::StreamRead(e),
            StorageError::SizeLimitExceeded { limit, .. } => Self::TooLarge { limit },
            StorageError::InvalidHash(msg) => Self::InvalidFingerprint(msg),
            other => Self::StorageWrite(other.to_string()),
        }
    }

    /// Classify a blob store failure on the read path.
    pub(crate) fn from_read(err: StorageError) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<RegistryError> for DedupError {
    fn from(err: RegistryError) -> Self {
        Self::Backend(err.to_string())
    }
}
