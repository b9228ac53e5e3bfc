//! API errors and their JSON responses.

use crate::analysis::AnalysisError;
use crate::extract::ExtractError;
use crate::models::ErrorResponse;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};

const GENERIC_DETAIL: &str = "An unexpected error occurred";

/// Errors returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("Rate limit exceeded ({window} quota)")]
    RateLimited {
        window: &'static str,
        retry_after: Duration,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    UnsupportedMediaType(String),

    /// Provider failure while analyzing; `context` is e.g. "Analysis failed".
    #[error("{context}: {message}")]
    Analysis {
        context: &'static str,
        message: String,
        misconfigured: bool,
    },

    /// Unexpected failure. The detail is only exposed in debug mode.
    #[error("Internal server error: {detail}")]
    Internal { detail: String, debug: bool },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Analysis { misconfigured, .. } => {
                if *misconfigured {
                    StatusCode::INTERNAL_SERVER_ERROR
                } else {
                    StatusCode::BAD_GATEWAY
                }
            }
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::RateLimited { .. } => "RATE_LIMITED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            ApiError::Analysis { .. } => "ANALYSIS_FAILED",
            ApiError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Map an analyzer failure, prefixing the message with `context`.
    pub fn from_analysis(context: &'static str, err: AnalysisError) -> Self {
        match err {
            AnalysisError::NoChecks => ApiError::Validation(err.to_string()),
            other => ApiError::Analysis {
                context,
                misconfigured: other.is_configuration(),
                message: other.to_string(),
            },
        }
    }

    pub fn internal(detail: impl ToString, debug: bool) -> Self {
        ApiError::Internal {
            detail: detail.to_string(),
            debug,
        }
    }

    fn body(&self) -> ErrorResponse {
        match self {
            ApiError::Internal { detail, debug } => ErrorResponse {
                error: "Internal server error".to_string(),
                detail: Some(if *debug {
                    detail.clone()
                } else {
                    GENERIC_DETAIL.to_string()
                }),
                code: self.code().to_string(),
            },
            ApiError::RateLimited { retry_after, .. } => ErrorResponse {
                error: self.to_string(),
                detail: Some(format!("Retry after {} seconds", retry_after_secs(*retry_after))),
                code: self.code().to_string(),
            },
            other => ErrorResponse {
                error: other.to_string(),
                detail: None,
                code: other.code().to_string(),
            },
        }
    }
}

fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs();
    if retry_after.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs.max(1)
    }
}

impl From<ExtractError> for ApiError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::TooLarge { .. } => ApiError::PayloadTooLarge(err.to_string()),
            ExtractError::UnsupportedMediaType(_) => ApiError::UnsupportedMediaType(err.to_string()),
            ExtractError::Pdf(_) | ExtractError::Empty => ApiError::Validation(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Internal { detail, .. } => error!("Internal error: {}", detail),
            ApiError::Analysis { .. } => warn!("{}", self),
            _ => {}
        }

        let mut resp = (status, Json(self.body())).into_response();
        if let ApiError::RateLimited { retry_after, .. } = &self {
            if let Ok(v) = HeaderValue::from_str(&retry_after_secs(*retry_after).to_string()) {
                resp.headers_mut().insert("retry-after", v);
            }
        }
        resp
    }
}
