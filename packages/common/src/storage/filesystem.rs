use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::BufReader;
use tracing::debug;

use super::error::StorageError;
use super::fingerprint::{Fingerprint, spool};
use super::traits::{BlobStore, BoxReader, StoredBlob};

/// Filesystem-backed content-addressed blob store.
///
/// Blobs are stored in a Git-style sharded directory layout:
/// `{base_path}/{first 2 hex chars}/{remaining 62 hex chars}`.
/// Writes land in `{base_path}/.tmp` first and are renamed into place once
/// the digest has been verified, so a reader never observes a partial blob.
pub struct FilesystemBlobStore {
    base_path: PathBuf,
    max_size: u64,
}

impl FilesystemBlobStore {
    /// Create a new filesystem blob store, creating its directories.
    pub async fn new(base_path: PathBuf, max_size: u64) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path).await?;
        fs::create_dir_all(base_path.join(".tmp")).await?;
        Ok(Self {
            base_path,
            max_size,
        })
    }

    fn blob_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        let hex = fingerprint.to_hex();
        let (prefix, suffix) = hex.split_at(2);
        self.base_path.join(prefix).join(suffix)
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }

    async fn write_verified(
        &self,
        fingerprint: &Fingerprint,
        mut reader: BoxReader,
        temp_path: &Path,
        blob_path: &Path,
    ) -> Result<StoredBlob, StorageError> {
        let mut temp_file = fs::File::create(temp_path).await?;
        let written = spool(&mut reader, &mut temp_file, self.max_size).await?;
        temp_file.sync_all().await?;
        drop(temp_file);

        if written.fingerprint != *fingerprint {
            return Err(StorageError::DigestMismatch {
                expected: fingerprint.to_hex(),
                actual: written.fingerprint.to_hex(),
            });
        }

        if let Some(parent) = blob_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Another writer got there first; its bytes are identical.
        if fs::try_exists(blob_path).await? {
            let _ = fs::remove_file(temp_path).await;
            return Ok(StoredBlob {
                location: fingerprint.location(),
                byte_length: written.byte_length,
                created: false,
            });
        }

        fs::rename(temp_path, blob_path).await?;

        Ok(StoredBlob {
            location: fingerprint.location(),
            byte_length: written.byte_length,
            created: true,
        })
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put_if_absent(
        &self,
        fingerprint: &Fingerprint,
        reader: BoxReader,
    ) -> Result<StoredBlob, StorageError> {
        let blob_path = self.blob_path(fingerprint);

        if let Ok(meta) = fs::metadata(&blob_path).await {
            debug!(fingerprint = %fingerprint, "Blob already stored, skipping write");
            return Ok(StoredBlob {
                location: fingerprint.location(),
                byte_length: meta.len(),
                created: false,
            });
        }

        let temp_path = self.temp_path();
        let result = self
            .write_verified(fingerprint, reader, &temp_path, &blob_path)
            .await;

        if result.is_err() {
            // Best effort.
            let _ = fs::remove_file(&temp_path).await;
        }

        result
    }

    async fn get_stream(&self, location: &str) -> Result<BoxReader, StorageError> {
        let fingerprint = Fingerprint::from_location(location)?;
        match fs::File::open(self.blob_path(&fingerprint)).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(location.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
