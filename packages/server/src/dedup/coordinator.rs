use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::http::HeaderValue;
use filehub_common::StorageConfig;
use filehub_common::storage::{BlobStore, BoxReader, Fingerprint, Fingerprinted, spool};
use tokio::io::AsyncRead;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::error::DedupError;
use super::locks::FingerprintLocks;
use super::model::{Confirmation, LogicalRecord, NewBlob, NewRecord, RecordFilter};
use super::registry::{RecordRegistry, RegistryError};
use super::stats::StatsSnapshot;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Largest declared size the registry stores without loss.
pub const MAX_DECLARED_SIZE: u64 = i64::MAX as u64;

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// Where in-flight uploads are spooled before their fingerprint is known.
    pub scratch_dir: PathBuf,
    pub max_upload_size: u64,
    /// Reject uploads whose declared size differs from the bytes received.
    pub verify_declared_size: bool,
}

impl CoordinatorOptions {
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            scratch_dir: config.scratch_dir(),
            max_upload_size: config.max_blob_size,
            verify_declared_size: config.verify_declared_size,
        }
    }
}

/// Uploader-supplied metadata accompanying a byte stream.
#[derive(Debug, Clone, Default)]
pub struct UploadMetadata {
    pub filename: String,
    pub content_type: Option<String>,
    /// Size claimed by the client. The observed length is used when absent.
    pub declared_size: Option<u64>,
}

/// Claim that content with `file_hash` is already known, made without sending bytes.
///
/// Empty strings and a zero size count as missing.
#[derive(Debug, Clone, Default)]
pub struct ConfirmRequest {
    pub file_hash: Option<String>,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub size: Option<u64>,
}

/// A record together with a reader over its bytes.
pub struct Download {
    pub record: LogicalRecord,
    /// Length of the stored bytes, which may differ from the declared `record.size`.
    pub byte_length: u64,
    pub reader: BoxReader,
}

/// An upload that has been read and fingerprinted but not registered.
/// Dropping it discards the spooled bytes.
pub struct StagedUpload {
    scratch: ScratchFile,
    observed: Fingerprinted,
}

impl StagedUpload {
    pub fn fingerprint(&self) -> Fingerprint {
        self.observed.fingerprint
    }

    /// Bytes actually received.
    pub fn byte_length(&self) -> u64 {
        self.observed.byte_length
    }
}

/// Orchestrates fingerprinting, blob persistence and record registration.
pub struct DedupCoordinator {
    registry: Arc<dyn RecordRegistry>,
    blobs: Arc<dyn BlobStore>,
    locks: FingerprintLocks,
    options: CoordinatorOptions,
}

/// A spooled upload on local disk. Removed on drop so that a cancelled
/// request does not leave it behind.
struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(format!("upload-{}", Uuid::new_v4())),
        }
    }

    async fn open(&self) -> Result<BoxReader, DedupError> {
        let file = tokio::fs::File::open(&self.path)
            .await
            .map_err(|e| DedupError::StorageWrite(format!("failed to reopen upload: {e}")))?;
        Ok(Box::new(tokio::io::BufReader::new(file)))
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        // Best effort.
        let _ = std::fs::remove_file(&self.path);
    }
}

fn write_failed(err: RegistryError) -> DedupError {
    DedupError::StorageWrite(err.to_string())
}

/// Declared content type, else a guess from the filename, else octet-stream.
///
/// A declared value that could not be sent back as a `Content-Type` header is
/// treated as absent.
pub fn resolve_content_type(declared: Option<&str>, filename: &str) -> String {
    match declared.map(str::trim) {
        Some(t) if !t.is_empty() && HeaderValue::from_str(t).is_ok() => t.to_string(),
        _ => mime_guess::from_path(filename)
            .first()
            .map(|m| m.to_string())
            .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string()),
    }
}

fn check_declared_size(size: u64) -> Result<u64, DedupError> {
    if size > MAX_DECLARED_SIZE {
        return Err(DedupError::SizeOutOfRange {
            declared: size,
            max: MAX_DECLARED_SIZE,
        });
    }
    Ok(size)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl DedupCoordinator {
    pub fn new(
        registry: Arc<dyn RecordRegistry>,
        blobs: Arc<dyn BlobStore>,
        options: CoordinatorOptions,
    ) -> Self {
        Self {
            registry,
            blobs,
            locks: FingerprintLocks::new(),
            options,
        }
    }

    /// Store `stream` under its fingerprint, reusing an existing blob when the
    /// content is already known, and register a new record for it.
    ///
    /// Nothing is committed unless the whole stream was read successfully.
    #[instrument(skip(self, stream, upload), fields(filename = %upload.filename))]
    pub async fn submit_upload<R>(
        &self,
        stream: R,
        upload: UploadMetadata,
    ) -> Result<LogicalRecord, DedupError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let staged = self.stage_upload(stream).await?;
        self.commit_upload(staged, upload).await
    }

    /// First half of [`submit_upload`](Self::submit_upload): read the whole
    /// stream to scratch space and fingerprint it. Nothing is registered yet.
    pub async fn stage_upload<R>(&self, mut stream: R) -> Result<StagedUpload, DedupError>
    where
        R: AsyncRead + Unpin + Send,
    {
        tokio::fs::create_dir_all(&self.options.scratch_dir)
            .await
            .map_err(|e| DedupError::StorageWrite(format!("failed to create scratch dir: {e}")))?;

        let scratch = ScratchFile::new(&self.options.scratch_dir);
        let mut file = tokio::fs::File::create(&scratch.path)
            .await
            .map_err(|e| DedupError::StorageWrite(format!("failed to create scratch file: {e}")))?;

        let observed = spool(&mut stream, &mut file, self.options.max_upload_size)
            .await
            .map_err(DedupError::from_write)?;

        Ok(StagedUpload { scratch, observed })
    }

    /// Second half of [`submit_upload`](Self::submit_upload): apply the
    /// declared metadata and run the hit/miss decision.
    #[instrument(skip(self, staged, upload), fields(filename = %upload.filename, fingerprint = %staged.fingerprint()))]
    pub async fn commit_upload(
        &self,
        staged: StagedUpload,
        upload: UploadMetadata,
    ) -> Result<LogicalRecord, DedupError> {
        let observed = staged.observed;

        if observed.byte_length == 0 {
            return Err(DedupError::NoContentProvided);
        }

        let size = match upload.declared_size {
            Some(declared)
                if self.options.verify_declared_size && declared != observed.byte_length =>
            {
                return Err(DedupError::SizeMismatch {
                    declared,
                    actual: observed.byte_length,
                });
            }
            Some(declared) => check_declared_size(declared)?,
            None => observed.byte_length,
        };

        let content_type = resolve_content_type(upload.content_type.as_deref(), &upload.filename);
        let record = NewRecord {
            original_filename: upload.filename,
            declared_content_type: content_type,
            size,
            fingerprint: observed.fingerprint,
        };

        self.register(&staged.scratch, record).await
    }

    /// Bind a new record to an already-stored blob, trusting the caller's
    /// fingerprint. No bytes are transferred or verified.
    #[instrument(skip(self, request), fields(file_hash = ?request.file_hash))]
    pub async fn confirm_by_fingerprint(
        &self,
        request: ConfirmRequest,
    ) -> Result<Confirmation, DedupError> {
        let file_hash = non_empty(request.file_hash)
            .ok_or(DedupError::MissingRequiredField("file_hash"))?;
        let filename =
            non_empty(request.filename).ok_or(DedupError::MissingRequiredField("filename"))?;
        let size = request
            .size
            .filter(|s| *s > 0)
            .ok_or(DedupError::MissingRequiredField("size"))?;
        let size = check_declared_size(size)?;

        let fingerprint = Fingerprint::from_hex(file_hash.trim())
            .map_err(|e| DedupError::InvalidFingerprint(e.to_string()))?;

        if self.registry.find_blob(&fingerprint).await?.is_none() {
            debug!(fingerprint = %fingerprint, "Confirm miss, nothing created");
            return Ok(Confirmation::Absent);
        }

        let content_type = resolve_content_type(request.content_type.as_deref(), &filename);
        let record = self
            .registry
            .create(NewRecord {
                original_filename: filename,
                declared_content_type: content_type,
                size,
                fingerprint,
            })
            .await
            .map_err(write_failed)?;

        debug!(fingerprint = %fingerprint, record_id = %record.id, "Confirm hit, record created");
        Ok(Confirmation::Created(record))
    }

    /// Records matching `filter`, newest first.
    pub async fn query(&self, filter: &RecordFilter) -> Result<Vec<LogicalRecord>, DedupError> {
        Ok(self.registry.query(filter).await?)
    }

    pub async fn get_record(&self, id: Uuid) -> Result<LogicalRecord, DedupError> {
        self.registry
            .get(id)
            .await?
            .ok_or(DedupError::NotFound(id))
    }

    pub async fn compute_stats(&self) -> Result<StatsSnapshot, DedupError> {
        Ok(self.registry.stats().await?)
    }

    #[instrument(skip(self))]
    pub async fn download_by_record_id(&self, id: Uuid) -> Result<Download, DedupError> {
        let record = self.get_record(id).await?;
        let blob = self
            .registry
            .find_blob(&record.fingerprint)
            .await?
            .ok_or_else(|| {
                DedupError::Backend(format!(
                    "record {id} references unregistered blob {}",
                    record.fingerprint
                ))
            })?;
        let reader = self
            .blobs
            .get_stream(&blob.storage_location)
            .await
            .map_err(DedupError::from_read)?;

        Ok(Download {
            record,
            byte_length: blob.byte_length,
            reader,
        })
    }

    /// The hit/miss decision. Runs under the fingerprint lock so that at most
    /// one request per fingerprint is between lookup and registration.
    async fn register(
        &self,
        scratch: &ScratchFile,
        record: NewRecord,
    ) -> Result<LogicalRecord, DedupError> {
        let fingerprint = record.fingerprint;
        let _guard = self.locks.acquire(fingerprint).await;

        if self
            .registry
            .find_blob(&fingerprint)
            .await
            .map_err(write_failed)?
            .is_some()
        {
            let created = self.registry.create(record).await.map_err(write_failed)?;
            debug!(fingerprint = %fingerprint, record_id = %created.id, "Dedup hit");
            return Ok(created);
        }

        let stored = self
            .blobs
            .put_if_absent(&fingerprint, scratch.open().await?)
            .await
            .map_err(DedupError::from_write)?;
        let new_blob = NewBlob {
            fingerprint,
            byte_length: stored.byte_length,
            storage_location: stored.location,
        };

        match self.registry.commit(Some(new_blob), record.clone()).await {
            Ok(created) if stored.created => {
                info!(
                    fingerprint = %fingerprint,
                    byte_length = stored.byte_length,
                    record_id = %created.id,
                    "Stored new blob"
                );
                Ok(created)
            }
            Ok(created) => {
                // Bytes left behind by an earlier upload whose commit failed.
                info!(
                    fingerprint = %fingerprint,
                    record_id = %created.id,
                    "Registered previously stored bytes"
                );
                Ok(created)
            }
            // Another process registered the blob between our lookup and commit.
            Err(RegistryError::FingerprintConflict(_)) => {
                warn!(fingerprint = %fingerprint, "Blob registration conflict, retrying as hit");
                self.registry.create(record).await.map_err(write_failed)
            }
            Err(e) => Err(write_failed(e)),
        }
    }
}
