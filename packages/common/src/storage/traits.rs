use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::StorageError;
use super::fingerprint::Fingerprint;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Result of a [`BlobStore::put_if_absent`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Opaque location to hand back to [`BlobStore::get_stream`].
    pub location: String,
    pub byte_length: u64,
    /// `false` when the fingerprint was already present and the stream was not consumed.
    pub created: bool,
}

/// Content-addressed blob storage. Blobs are written once and never mutated.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist the bytes of `reader` under `fingerprint` unless that
    /// fingerprint is already stored.
    ///
    /// Idempotent: storing an already-present fingerprint never rewrites or
    /// corrupts it. Implementations verify that the bytes actually hash to
    /// `fingerprint` and fail with [`StorageError::DigestMismatch`] otherwise.
    async fn put_if_absent(
        &self,
        fingerprint: &Fingerprint,
        reader: BoxReader,
    ) -> Result<StoredBlob, StorageError>;

    /// Retrieve a blob as a streaming async reader.
    async fn get_stream(&self, location: &str) -> Result<BoxReader, StorageError>;

    /// Retrieve all bytes of a blob.
    async fn get(&self, location: &str) -> Result<Vec<u8>, StorageError> {
        let mut reader = self.get_stream(location).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }
}
