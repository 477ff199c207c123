//! Durable record of which blobs exist and which upload events point at them.

mod db;
mod memory;

use async_trait::async_trait;
use filehub_common::storage::Fingerprint;
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

use super::model::{LogicalRecord, NewBlob, NewRecord, PhysicalBlob, RecordFilter};
use super::stats::StatsSnapshot;

pub use db::SeaOrmRegistry;
pub use memory::MemoryRegistry;

/// Registry failures. These stay inside the engine; the coordinator turns
/// them into [`DedupError`](super::DedupError).
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Another request registered a blob for the same fingerprint first.
    #[error("a blob for fingerprint {0} is already registered")]
    FingerprintConflict(Fingerprint),

    /// A record was committed against a fingerprint with no blob.
    #[error("no blob registered for fingerprint {0}")]
    MissingBlob(Fingerprint),

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

#[async_trait]
pub trait RecordRegistry: Send + Sync {
    /// Look up the blob registered for `fingerprint`. The first registration
    /// is authoritative; later ones are rejected as conflicts.
    async fn find_blob(&self, fingerprint: &Fingerprint)
    -> Result<Option<PhysicalBlob>, RegistryError>;

    /// Atomically register `new_blob` (when given) and insert `record`.
    ///
    /// Either both rows become visible or neither does. Registering a blob
    /// whose fingerprint is already known fails with
    /// [`RegistryError::FingerprintConflict`] and leaves the registry
    /// untouched.
    async fn commit(
        &self,
        new_blob: Option<NewBlob>,
        record: NewRecord,
    ) -> Result<LogicalRecord, RegistryError>;

    /// Insert a record for an already-registered blob.
    async fn create(&self, record: NewRecord) -> Result<LogicalRecord, RegistryError> {
        self.commit(None, record).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<LogicalRecord>, RegistryError>;

    /// Records matching every predicate of `filter`, newest first.
    async fn query(&self, filter: &RecordFilter) -> Result<Vec<LogicalRecord>, RegistryError>;

    /// Storage accounting over every record, read from one consistent snapshot.
    async fn stats(&self) -> Result<StatsSnapshot, RegistryError>;
}
