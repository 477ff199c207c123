use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::dedup::DedupError;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`,
    /// `UPLOAD_INTERRUPTED`, `PAYLOAD_TOO_LARGE`, `NOT_FOUND`, `INTERNAL_ERROR`.
    #[schema(example = "VALIDATION_ERROR")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "missing required field: filename")]
    pub message: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    /// The client stopped sending before the upload was complete.
    UploadInterrupted(String),
    PayloadTooLarge(String),
    NotFound(String),
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message: msg,
                },
            ),
            AppError::UploadInterrupted(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "UPLOAD_INTERRUPTED",
                    message: msg,
                },
            ),
            AppError::PayloadTooLarge(msg) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                ErrorBody {
                    code: "PAYLOAD_TOO_LARGE",
                    message: msg,
                },
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    message: msg,
                },
            ),
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        message: "An unexpected error occurred".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<DedupError> for AppError {
    fn from(err: DedupError) -> Self {
        match err {
            DedupError::NoContentProvided
            | DedupError::MissingRequiredField(_)
            | DedupError::InvalidFingerprint(_)
            | DedupError::SizeMismatch { .. }
            | DedupError::SizeOutOfRange { .. } => {
                tracing::debug!("Rejected request: {err}");
                AppError::Validation(err.to_string())
            }
            DedupError::StreamRead(_) => {
                tracing::warn!("Upload interrupted: {err}");
                AppError::UploadInterrupted(err.to_string())
            }
            DedupError::TooLarge { .. } => AppError::PayloadTooLarge(err.to_string()),
            DedupError::NotFound(_) => AppError::NotFound(err.to_string()),
            DedupError::StorageWrite(_) | DedupError::Backend(_) => {
                AppError::Internal(err.to_string())
            }
        }
    }
}
