use chrono::{DateTime, Utc};
use filehub_common::storage::Fingerprint;
use uuid::Uuid;

/// One stored payload per distinct fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalBlob {
    pub fingerprint: Fingerprint,
    pub byte_length: u64,
    pub storage_location: String,
    pub created_at: DateTime<Utc>,
}

/// A blob that has just been written and is about to be registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBlob {
    pub fingerprint: Fingerprint,
    pub byte_length: u64,
    pub storage_location: String,
}

/// One upload event. Many records may share a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalRecord {
    pub id: Uuid,
    pub original_filename: String,
    pub declared_content_type: String,
    pub size: u64,
    /// Reference to the [`PhysicalBlob`] holding the bytes.
    pub fingerprint: Fingerprint,
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied fields of a record. The registry assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub original_filename: String,
    pub declared_content_type: String,
    pub size: u64,
    pub fingerprint: Fingerprint,
}

/// Outcome of a confirm-by-fingerprint call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// No blob is known for the fingerprint; nothing was created.
    Absent,
    /// A new record bound to the existing blob.
    Created(LogicalRecord),
}

/// Record query. Every set field must match (AND); unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Case-insensitive substring of the original filename.
    pub search: Option<String>,
    /// Case-insensitive substring of the declared content type.
    pub content_type: Option<String>,
    /// Inclusive lower bound on `size`.
    pub min_size: Option<u64>,
    /// Inclusive upper bound on `size`.
    pub max_size: Option<u64>,
    /// Inclusive lower bound on `created_at`.
    pub start_date: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`.
    pub end_date: Option<DateTime<Utc>>,
}

impl RecordFilter {
    pub fn matches(&self, record: &LogicalRecord) -> bool {
        fn contains_ci(haystack: &str, needle: &str) -> bool {
            haystack.to_lowercase().contains(&needle.to_lowercase())
        }

        self.search
            .as_deref()
            .is_none_or(|s| contains_ci(&record.original_filename, s))
            && self
                .content_type
                .as_deref()
                .is_none_or(|t| contains_ci(&record.declared_content_type, t))
            && self.min_size.is_none_or(|min| record.size >= min)
            && self.max_size.is_none_or(|max| record.size <= max)
            && self.start_date.is_none_or(|start| record.created_at >= start)
            && self.end_date.is_none_or(|end| record.created_at <= end)
    }
}
