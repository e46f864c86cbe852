use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use uptime_core::{PartialFailure, ServiceError};

#[derive(Debug)]
pub enum ApiError {
    BadRequest {
        kind: &'static str,
        message: String,
    },
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    PartialFailure(PartialFailure),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<PartialFailure>,
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let kind = err.kind();
        let message = err.to_string();
        match err {
            ServiceError::Validation(_)
            | ServiceError::Expired(_)
            | ServiceError::QuotaExceeded { .. } => ApiError::BadRequest { kind, message },
            ServiceError::AuthFailed(_) => ApiError::Unauthorized(message),
            ServiceError::Forbidden(_) => ApiError::Forbidden(message),
            ServiceError::NotFound(_) => ApiError::NotFound(message),
            ServiceError::Conflict(_) => ApiError::Conflict(message),
            ServiceError::PartialFailure(partial) => {
                tracing::error!(
                    committed = %partial.committed,
                    orphans = ?partial.orphans,
                    "Request partially applied"
                );
                ApiError::PartialFailure(partial)
            }
            ServiceError::Store(e) => {
                tracing::error!(error = %e, "Storage failure");
                ApiError::Internal("internal storage error".into())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest {
            kind: "invalid_json",
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest {
            kind: "invalid_query",
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_kind, message, detail) = match self {
            ApiError::BadRequest { kind, message } => (StatusCode::BAD_REQUEST, kind, message, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "auth_failed", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::PartialFailure(partial) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "partial_failure",
                partial.to_string(),
                Some(partial),
            ),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg, None),
        };

        let body = ErrorBody {
            error: error_kind.to_string(),
            message,
            detail,
        };

        (status, axum::Json(body)).into_response()
    }
}
