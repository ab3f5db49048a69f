use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::error::AppError;
use serde::Serialize;
use thiserror::Error;

/// API-facing error taxonomy. Every response names the failing stage and a
/// suggestion; internal detail never leaves the process.
#[derive(Error, Debug, Serialize, Clone)]
pub enum ApiError {
    #[error("Internal server error")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unprocessable document: {0}")]
    Unprocessable(String),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Oversize { size, limit } => Self::PayloadTooLarge(format!(
                "file is {size} bytes, the ceiling is {limit} bytes"
            )),
            AppError::UnsupportedFormat(msg) => Self::UnsupportedFormat(msg),
            AppError::Encrypted => {
                Self::Unprocessable("the document is encrypted and cannot be extracted".into())
            }
            AppError::CorruptInput(msg) => Self::Unprocessable(msg),
            AppError::NotFound(msg) => Self::NotFound(msg),
            AppError::Validation(msg) => Self::ValidationError(msg),
            other => {
                tracing::error!(error = ?other, "internal error");
                Self::InternalError("Internal server error".to_string())
            }
        }
    }
}

impl ApiError {
    fn stage(&self) -> &'static str {
        match self {
            Self::PayloadTooLarge(_) => "size-guard",
            Self::UnsupportedFormat(_) => "format-classification",
            Self::Unprocessable(_) => "extraction",
            Self::NotFound(_) => "lookup",
            Self::ValidationError(_) => "request-validation",
            Self::InternalError(_) => "internal",
        }
    }

    fn suggestion(&self) -> &'static str {
        match self {
            Self::PayloadTooLarge(_) => "Reduce the file size and upload again.",
            Self::UnsupportedFormat(_) => "Try converting the file to a supported format.",
            Self::Unprocessable(_) => {
                "Remove encryption or re-export the document, then upload again."
            }
            Self::NotFound(_) => "Check the document id.",
            Self::ValidationError(_) => "Correct the request parameters and retry.",
            Self::InternalError(_) => "Retry later; the problem has been logged.",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };

        let body = ErrorResponse {
            error: self.to_string(),
            stage: self.stage(),
            suggestion: self.suggestion(),
            status: "error",
        };

        (status, Json(body)).into_response()
    }
}

#[derive(Serialize, Debug)]
struct ErrorResponse {
    error: String,
    stage: &'static str,
    suggestion: &'static str,
    status: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Debug;

    fn assert_status_code<T: IntoResponse + Debug>(response: T, expected_status: StatusCode) {
        let response = response.into_response();
        assert_eq!(response.status(), expected_status);
    }

    #[test]
    fn test_app_error_to_api_error_conversion() {
        let oversize = AppError::Oversize { size: 60, limit: 50 };
        assert!(matches!(ApiError::from(oversize), ApiError::PayloadTooLarge(_)));

        let unsupported = AppError::UnsupportedFormat("tarball".to_string());
        assert!(matches!(
            ApiError::from(unsupported),
            ApiError::UnsupportedFormat(msg) if msg == "tarball"
        ));

        assert!(matches!(ApiError::from(AppError::Encrypted), ApiError::Unprocessable(_)));

        let not_found = AppError::NotFound("document x".to_string());
        assert!(matches!(ApiError::from(not_found), ApiError::NotFound(msg) if msg == "document x"));

        let internal = AppError::Io(std::io::Error::other("io error"));
        assert!(matches!(ApiError::from(internal), ApiError::InternalError(_)));
    }

    #[test]
    fn test_status_codes() {
        assert_status_code(
            ApiError::PayloadTooLarge("big".into()),
            StatusCode::PAYLOAD_TOO_LARGE,
        );
        assert_status_code(
            ApiError::UnsupportedFormat("tar".into()),
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
        );
        assert_status_code(
            ApiError::Unprocessable("encrypted".into()),
            StatusCode::UNPROCESSABLE_ENTITY,
        );
        assert_status_code(ApiError::NotFound("gone".into()), StatusCode::NOT_FOUND);
        assert_status_code(
            ApiError::ValidationError("empty query".into()),
            StatusCode::BAD_REQUEST,
        );
        assert_status_code(
            ApiError::InternalError("boom".into()),
            StatusCode::INTERNAL_SERVER_ERROR,
        );
    }

    #[test]
    fn test_internal_detail_is_sanitized() {
        let api_error = ApiError::InternalError("db password incorrect".to_string());
        assert_eq!(api_error.to_string(), "Internal server error");
    }
}
