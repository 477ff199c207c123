use std::fmt;

/// Errors that can occur while fingerprinting or storing blobs.
#[derive(Debug)]
pub enum StorageError {
    /// No blob exists at the requested location.
    NotFound(String),
    /// The source stream failed before reaching its end.
    StreamRead(std::io::Error),
    /// Writing to or reading from the backing store failed.
    Io(std::io::Error),
    /// The provided fingerprint or storage location is malformed.
    InvalidHash(String),
    /// The stream exceeds the configured size limit.
    SizeLimitExceeded { actual: u64, limit: u64 },
    /// The bytes handed to the store do not hash to the claimed fingerprint.
    DigestMismatch { expected: String, actual: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(location) => write!(f, "blob not found: {location}"),
            Self::StreamRead(err) => write!(f, "stream read error: {err}"),
            Self::Io(err) => write!(f, "storage IO error: {err}"),
            Self::InvalidHash(msg) => write!(f, "invalid fingerprint: {msg}"),
            Self::SizeLimitExceeded { actual, limit } => {
                write!(f, "blob exceeds size limit ({actual} > {limit} bytes)")
            }
            Self::DigestMismatch { expected, actual } => {
                write!(f, "digest mismatch (expected {expected}, got {actual})")
            }
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::StreamRead(err) | Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
