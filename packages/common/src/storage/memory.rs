use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::error::StorageError;
use super::fingerprint::{Fingerprint, spool};
use super::traits::{BlobStore, BoxReader, StoredBlob};

/// In-memory blob store for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<Fingerprint, Vec<u8>>>,
    writes: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs that were physically written.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put_if_absent(
        &self,
        fingerprint: &Fingerprint,
        mut reader: BoxReader,
    ) -> Result<StoredBlob, StorageError> {
        if let Some(existing) = self.blobs.read().await.get(fingerprint) {
            return Ok(StoredBlob {
                location: fingerprint.location(),
                byte_length: existing.len() as u64,
                created: false,
            });
        }

        let mut buf = Vec::new();
        let written = spool(&mut reader, &mut buf, u64::MAX).await?;
        if written.fingerprint != *fingerprint {
            return Err(StorageError::DigestMismatch {
                expected: fingerprint.to_hex(),
                actual: written.fingerprint.to_hex(),
            });
        }

        let mut blobs = self.blobs.write().await;
        let created = !blobs.contains_key(fingerprint);
        if created {
            blobs.insert(*fingerprint, buf);
            self.writes.fetch_add(1, Ordering::SeqCst);
        }

        Ok(StoredBlob {
            location: fingerprint.location(),
            byte_length: written.byte_length,
            created,
        })
    }

    async fn get_stream(&self, location: &str) -> Result<BoxReader, StorageError> {
        let fingerprint = Fingerprint::from_location(location)?;
        let blobs = self.blobs.read().await;
        let data = blobs
            .get(&fingerprint)
            .ok_or_else(|| StorageError::NotFound(location.to_string()))?;
        Ok(Box::new(std::io::Cursor::new(data.clone())))
    }
}
