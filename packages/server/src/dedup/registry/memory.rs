use std::collections::HashMap;

use async_trait::async_trait;
use filehub_common::storage::Fingerprint;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RecordRegistry, RegistryError};
use crate::dedup::clock::RecordStamper;
use crate::dedup::model::{LogicalRecord, NewBlob, NewRecord, PhysicalBlob, RecordFilter};
use crate::dedup::stats::{FingerprintUsage, StatsSnapshot, compute_stats};

#[derive(Default)]
struct Tables {
    blobs: HashMap<Fingerprint, PhysicalBlob>,
    records: Vec<LogicalRecord>,
}

/// In-process registry. One lock guards both tables, so a commit is atomic
/// and a read sees a consistent snapshot.
#[derive(Default)]
pub struct MemoryRegistry {
    tables: RwLock<Tables>,
    stamper: RecordStamper,
}

impl MemoryRegistry {
    pub fn new(stamper: RecordStamper) -> Self {
        Self {
            tables: RwLock::default(),
            stamper,
        }
    }

    pub async fn blob_count(&self) -> usize {
        self.tables.read().await.blobs.len()
    }

    pub async fn record_count(&self) -> usize {
        self.tables.read().await.records.len()
    }
}

#[async_trait]
impl RecordRegistry for MemoryRegistry {
    async fn find_blob(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<PhysicalBlob>, RegistryError> {
        Ok(self.tables.read().await.blobs.get(fingerprint).cloned())
    }

    async fn commit(
        &self,
        new_blob: Option<NewBlob>,
        record: NewRecord,
    ) -> Result<LogicalRecord, RegistryError> {
        let mut tables = self.tables.write().await;

        let blob = match new_blob {
            Some(blob) if tables.blobs.contains_key(&blob.fingerprint) => {
                return Err(RegistryError::FingerprintConflict(blob.fingerprint));
            }
            Some(blob) => Some(PhysicalBlob {
                fingerprint: blob.fingerprint,
                byte_length: blob.byte_length,
                storage_location: blob.storage_location,
                created_at: self.stamper.now(),
            }),
            None if !tables.blobs.contains_key(&record.fingerprint) => {
                return Err(RegistryError::MissingBlob(record.fingerprint));
            }
            None => None,
        };

        if let Some(blob) = &blob
            && blob.fingerprint != record.fingerprint
        {
            return Err(RegistryError::MissingBlob(record.fingerprint));
        }

        let (id, created_at) = self.stamper.stamp();
        let record = LogicalRecord {
            id,
            original_filename: record.original_filename,
            declared_content_type: record.declared_content_type,
            size: record.size,
            fingerprint: record.fingerprint,
            created_at,
        };

        if let Some(blob) = blob {
            tables.blobs.insert(blob.fingerprint, blob);
        }
        tables.records.push(record.clone());

        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<LogicalRecord>, RegistryError> {
        let tables = self.tables.read().await;
        Ok(tables.records.iter().find(|r| r.id == id).cloned())
    }

    async fn query(&self, filter: &RecordFilter) -> Result<Vec<LogicalRecord>, RegistryError> {
        let tables = self.tables.read().await;
        let mut matched: Vec<LogicalRecord> = tables
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(matched)
    }

    async fn stats(&self) -> Result<StatsSnapshot, RegistryError> {
        let tables = self.tables.read().await;
        let mut groups: HashMap<Fingerprint, FingerprintUsage> = HashMap::new();
        for record in &tables.records {
            let usage = groups.entry(record.fingerprint).or_insert(FingerprintUsage {
                largest: 0,
                total: 0,
                records: 0,
            });
            usage.largest = usage.largest.max(record.size);
            usage.total = usage.total.saturating_add(record.size);
            usage.records += 1;
        }
        Ok(compute_stats(groups.into_values()))
    }
}
