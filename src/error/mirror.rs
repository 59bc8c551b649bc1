use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error as ThisError;

use super::IsRetryable;

#[derive(Debug, ThisError)]
pub enum MirrorError {
    #[error("Upstream error with status: {0}")]
    UpstreamStatus(StatusCode),

    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Bundle archive error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Bundle error: {0}")]
    Bundle(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Ractor error: {0}")]
    RactorError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl MirrorError {
    pub fn malformed(message: impl Into<String>) -> Self {
        MirrorError::MalformedPayload(message.into())
    }
}

impl IntoResponse for MirrorError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_body) = match self {
            MirrorError::DatabaseError(_)
            | MirrorError::RactorError(_)
            | MirrorError::IoError(_) => {
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                let body = ApiErrorObject {
                    code: "INTERNAL_ERROR".to_string(),
                    message: "An internal server error occurred.".to_string(),
                    details: None,
                };
                (status, body)
            }

            MirrorError::JsonError(_)
            | MirrorError::MalformedPayload(_)
            | MirrorError::Bundle(_)
            | MirrorError::ZipError(_) => {
                let status = StatusCode::BAD_GATEWAY;
                let body = ApiErrorObject {
                    code: "BAD_UPSTREAM_PAYLOAD".to_string(),
                    message: "Failed to parse upstream catalog data.".to_string(),
                    details: None,
                };
                (status, body)
            }

            MirrorError::ReqwestError(_) | MirrorError::UrlError(_) => {
                let status = StatusCode::BAD_GATEWAY;
                let body = ApiErrorObject {
                    code: "UPSTREAM_ERROR".to_string(),
                    message: "Upstream service error.".to_string(),
                    details: None,
                };
                (status, body)
            }

            MirrorError::UpstreamStatus(code) => {
                let (err_code, msg) = match code {
                    StatusCode::TOO_MANY_REQUESTS => {
                        ("RATE_LIMIT", "Upstream rate limit exceeded.")
                    }
                    StatusCode::UNAUTHORIZED => ("UNAUTHORIZED", "Upstream authentication failed."),
                    StatusCode::FORBIDDEN => ("FORBIDDEN", "Upstream permission denied."),
                    StatusCode::NOT_FOUND => ("NOT_FOUND", "Upstream resource not found."),
                    _ => ("UPSTREAM_ERROR", "An upstream error occurred."),
                };
                (
                    StatusCode::BAD_GATEWAY,
                    ApiErrorObject {
                        code: err_code.to_string(),
                        message: msg.to_string(),
                        details: Some(Value::from(code.as_u16())),
                    },
                )
            }
        };
        (status, Json(ApiErrorBody { inner: error_body })).into_response()
    }
}

/// Standardized API error response payload.
#[derive(Serialize)]
pub struct ApiErrorObject {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Serialize)]
pub struct ApiErrorBody {
    #[serde(rename = "error")]
    pub inner: ApiErrorObject,
}

/// Transient fetch failures are safe to retry with the same `fromVersion`; payload and
/// store failures need upstream or operator attention first.
impl IsRetryable for MirrorError {
    fn is_retryable(&self) -> bool {
        match self {
            MirrorError::ReqwestError(_) => true,
            MirrorError::UpstreamStatus(status) => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            MirrorError::DatabaseError(sqlx::Error::PoolTimedOut) => true,
            _ => false,
        }
    }
}
