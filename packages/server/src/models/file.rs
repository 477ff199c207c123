use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dedup::{ConfirmRequest, Confirmation, LogicalRecord, RecordFilter, StatsSnapshot};

/// Public path of a record's bytes.
pub fn download_url(id: &uuid::Uuid) -> String {
    format!("/api/v1/files/{id}/download")
}

/// Response DTO for a single file record.
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct FileResponse {
    /// Record ID (UUIDv7).
    #[schema(example = "01936f0e-1234-7abc-8000-000000000001")]
    pub id: String,
    /// Download URL for the record's content.
    #[schema(example = "/api/v1/files/01936f0e-1234-7abc-8000-000000000001/download")]
    pub file: String,
    /// Filename supplied by the uploader.
    #[schema(example = "report.pdf")]
    pub original_filename: String,
    /// Content type as declared by the uploader.
    #[schema(example = "application/pdf")]
    pub file_type: String,
    /// Declared size in bytes.
    #[schema(example = 142857)]
    pub size: u64,
    /// SHA-256 of the content, lowercase hex.
    #[schema(example = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")]
    pub file_hash: String,
    pub uploaded_at: DateTime<Utc>,
}

impl From<LogicalRecord> for FileResponse {
    fn from(record: LogicalRecord) -> Self {
        Self {
            id: record.id.to_string(),
            file: download_url(&record.id),
            original_filename: record.original_filename,
            file_type: record.declared_content_type,
            size: record.size,
            file_hash: record.fingerprint.to_hex(),
            uploaded_at: record.created_at,
        }
    }
}

/// Query parameters for listing files. All filters are optional and combine with AND.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FileListQuery {
    /// Case-insensitive substring of the filename.
    pub search: Option<String>,
    /// Case-insensitive substring of the content type.
    pub file_type: Option<String>,
    /// Minimum size in bytes (inclusive).
    pub min_size: Option<u64>,
    /// Maximum size in bytes (inclusive).
    pub max_size: Option<u64>,
    /// Earliest upload time (RFC 3339, inclusive).
    pub start_date: Option<DateTime<Utc>>,
    /// Latest upload time (RFC 3339, inclusive).
    pub end_date: Option<DateTime<Utc>>,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl From<FileListQuery> for RecordFilter {
    fn from(query: FileListQuery) -> Self {
        Self {
            search: trimmed(query.search),
            content_type: trimmed(query.file_type),
            min_size: query.min_size,
            max_size: query.max_size,
            start_date: query.start_date,
            end_date: query.end_date,
        }
    }
}

/// Request body for a pre-upload duplicate check.
#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct DedupCheckRequest {
    /// SHA-256 of the content, hex.
    pub file_hash: Option<String>,
    pub filename: Option<String>,
    pub file_type: Option<String>,
    pub size: Option<u64>,
}

impl From<DedupCheckRequest> for ConfirmRequest {
    fn from(req: DedupCheckRequest) -> Self {
        Self {
            file_hash: req.file_hash,
            filename: req.filename,
            content_type: req.file_type,
            size: req.size,
        }
    }
}

/// Result of a duplicate check. `file` is present only when `exists` is true.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DedupCheckResponse {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<FileResponse>,
}

impl From<Confirmation> for DedupCheckResponse {
    fn from(outcome: Confirmation) -> Self {
        match outcome {
            Confirmation::Absent => Self {
                exists: false,
                file: None,
            },
            Confirmation::Created(record) => Self {
                exists: true,
                file: Some(record.into()),
            },
        }
    }
}

/// Storage accounting across all records.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct StatsResponse {
    /// Sum of declared sizes over all records.
    #[schema(example = 16)]
    pub total_size: u64,
    /// Bytes that would be stored with one copy per distinct content.
    #[schema(example = 8)]
    pub unique_size: u64,
    #[schema(example = 8)]
    pub saved_size: u64,
    #[schema(example = 50.0)]
    pub savings_percentage: f64,
    pub record_count: u64,
    pub unique_blobs: u64,
}

impl From<StatsSnapshot> for StatsResponse {
    fn from(stats: StatsSnapshot) -> Self {
        Self {
            total_size: stats.total_logical_size,
            unique_size: stats.total_unique_size,
            saved_size: stats.saved_size,
            savings_percentage: stats.savings_percentage,
            record_count: stats.record_count,
            unique_blobs: stats.unique_blobs,
        }
    }
}
