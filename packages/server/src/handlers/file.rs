use std::fmt::Write;
use std::io;

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, body::Body};
use futures::TryStreamExt;
use tokio::io::AsyncRead;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::instrument;
use uuid::Uuid;

use crate::dedup::{DedupError, Download, UploadMetadata};
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::extractors::query::AppQuery;
use crate::models::file::{
    DedupCheckRequest, DedupCheckResponse, FileListQuery, FileResponse, StatsResponse,
};
use crate::state::AppState;

/// Slack above the blob limit for multipart framing and the text fields.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn upload_body_limit(max_blob_size: u64) -> DefaultBodyLimit {
    let max_blob_size = usize::try_from(max_blob_size).unwrap_or(usize::MAX);
    DefaultBodyLimit::max(max_blob_size.saturating_add(MULTIPART_OVERHEAD))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Files",
    operation_id = "listFiles",
    summary = "List file records",
    description = "Returns all file records matching the given filters, newest first. \
        Every filter is optional; supplied filters must all match.",
    params(FileListQuery),
    responses(
        (status = 200, description = "Matching records", body = Vec<FileResponse>),
        (status = 400, description = "Malformed filter (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query))]
pub async fn list_files(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<FileListQuery>,
) -> Result<Json<Vec<FileResponse>>, AppError> {
    let records = state.coordinator.query(&query.into()).await?;
    Ok(Json(records.into_iter().map(FileResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Files",
    operation_id = "uploadFile",
    summary = "Upload a file",
    description = "Uploads a file. The `file` multipart field is required and must carry a filename. \
        An optional `size` field records the client's declared size. Content that is already \
        stored is not written again; the new record points at the existing copy.",
    request_body(content_type = "multipart/form-data", description = "File upload with optional declared size"),
    responses(
        (status = 201, description = "Record created", body = FileResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR, UPLOAD_INTERRUPTED)", body = ErrorBody),
        (status = 413, description = "File too large (PAYLOAD_TOO_LARGE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, multipart))]
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut staged = None;
    let mut declared_size: Option<u64> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let upload = state.coordinator.stage_upload(field_reader(field)).await?;
                staged = Some((upload, filename, content_type));
            }
            Some("size") => {
                let text = field.text().await.map_err(multipart_error)?;
                declared_size = parse_declared_size(&text)?;
            }
            _ => {} // Ignore unknown fields.
        }
    }

    let (upload, filename, content_type) = staged.ok_or(DedupError::NoContentProvided)?;
    let filename = filename
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| AppError::Validation("File field must have a filename".into()))?;

    let record = state
        .coordinator
        .commit_upload(
            upload,
            UploadMetadata {
                filename,
                content_type,
                declared_size,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(FileResponse::from(record))))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Files",
    operation_id = "getFile",
    summary = "Get a file record",
    params(("id" = String, Path, description = "Record ID (UUID)")),
    responses(
        (status = 200, description = "Record", body = FileResponse),
        (status = 400, description = "Invalid ID (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Record not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FileResponse>, AppError> {
    let record = state.coordinator.get_record(parse_record_id(&id)?).await?;
    Ok(Json(FileResponse::from(record)))
}

#[utoipa::path(
    get,
    path = "/{id}/download",
    tag = "Files",
    operation_id = "downloadFile",
    summary = "Download a file's content",
    description = "Streams the stored bytes. The ETag is the content fingerprint, so \
        `If-None-Match` yields 304 for content the client already has.",
    params(("id" = String, Path, description = "Record ID (UUID)")),
    responses(
        (status = 200, description = "File content"),
        (status = 304, description = "Not modified"),
        (status = 400, description = "Invalid ID (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Record not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, headers))]
pub async fn download_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let download = state
        .coordinator
        .download_by_record_id(parse_record_id(&id)?)
        .await?;
    build_download_response(download, &headers)
}

#[utoipa::path(
    get,
    path = "/stats",
    tag = "Files",
    operation_id = "fileStats",
    summary = "Storage statistics",
    description = "Reports total declared size, size after deduplication and the savings.",
    responses(
        (status = 200, description = "Statistics", body = StatsResponse),
    ),
)]
#[instrument(skip(state))]
pub async fn file_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, AppError> {
    let stats = state.coordinator.compute_stats().await?;
    Ok(Json(stats.into()))
}

#[utoipa::path(
    post,
    path = "/dedup-check",
    tag = "Files",
    operation_id = "dedupCheck",
    summary = "Check for existing content before uploading",
    description = "If content with `file_hash` is already stored, a new record with the given \
        filename is created immediately and returned, and the client can skip the upload. \
        Otherwise nothing is created and `exists` is false. The hash is trusted as given.",
    request_body = DedupCheckRequest,
    responses(
        (status = 200, description = "Check result", body = DedupCheckResponse),
        (status = 400, description = "Missing or malformed field (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn dedup_check(
    State(state): State<AppState>,
    AppJson(payload): AppJson<DedupCheckRequest>,
) -> Result<Json<DedupCheckResponse>, AppError> {
    let outcome = state
        .coordinator
        .confirm_by_fingerprint(payload.into())
        .await?;
    Ok(Json(outcome.into()))
}

fn parse_record_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|_| AppError::Validation("Invalid file ID".into()))
}

fn parse_declared_size(text: &str) -> Result<Option<u64>, AppError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<u64>()
        .map(Some)
        .map_err(|_| AppError::Validation("size must be a non-negative integer".into()))
}

fn multipart_error(e: MultipartError) -> AppError {
    AppError::Validation(format!("Multipart error: {e}"))
}

/// Adapt a multipart field into a byte reader. Transport failures surface as
/// read errors.
fn field_reader(field: Field<'_>) -> impl AsyncRead + Unpin + Send + '_ {
    StreamReader::new(Box::pin(field.map_err(io::Error::other)))
}

fn build_download_response(download: Download, headers: &HeaderMap) -> Result<Response, AppError> {
    let record = download.record;
    let etag_value = format!("\"{}\"", record.fingerprint.to_hex());
    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH)
        && let Ok(val) = if_none_match.to_str()
        && (val == etag_value || val == "*")
    {
        return Ok(StatusCode::NOT_MODIFIED.into_response());
    }

    let body = Body::from_stream(ReaderStream::new(download.reader));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, &record.declared_content_type)
        .header(header::CONTENT_LENGTH, download.byte_length.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            attachment_disposition(&record.original_filename),
        )
        .header(header::ETAG, &etag_value)
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))
}

/// `attachment` disposition with an ASCII fallback name plus the exact UTF-8
/// name as an RFC 5987 extended parameter.
fn attachment_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && !matches!(c, '"' | '\\' | ';') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let fallback = if fallback.chars().any(|c| c.is_ascii_alphanumeric()) {
        fallback
    } else {
        "download".to_string()
    };

    let mut value = format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''");
    for byte in filename.bytes() {
        if is_attr_char(byte) {
            value.push(char::from(byte));
        } else {
            let _ = write!(value, "%{byte:02X}");
        }
    }
    value
}

fn is_attr_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte)
}
