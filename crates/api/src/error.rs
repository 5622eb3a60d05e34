use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::{ConflictDetail, DomainError, StoreError};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Slot collision with an approved consultation.
    #[error("Conflict: {message}")]
    SlotConflict {
        message: String,
        conflicting_interval: ConflictingInterval,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Interval already held by an approved consultation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ConflictingInterval {
    pub consultation_id: String,
    pub start: String,
    pub end: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<ValidationDetail>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    conflicting_interval: Option<ConflictingInterval>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut conflicting_interval = None;
        let (status, error_code, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::SlotConflict {
                message,
                conflicting_interval: interval,
            } => {
                conflicting_interval = Some(interval);
                (StatusCode::CONFLICT, "conflict", message)
            }
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                )
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
            details: None,
            conflicting_interval,
        };

        (status, Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        metrics::counter!("domain_errors_total", "kind" => err.kind()).increment(1);

        match err {
            DomainError::Validation(msg) => ApiError::Validation(msg),
            DomainError::Authorization(msg) => ApiError::Forbidden(msg),
            DomainError::State(msg) => ApiError::Conflict(msg),
            DomainError::Conflict(detail) => match &detail {
                ConflictDetail::Overlap {
                    consultation_id,
                    interval,
                } => ApiError::SlotConflict {
                    message: detail.to_string(),
                    conflicting_interval: ConflictingInterval {
                        consultation_id: consultation_id.to_string(),
                        start: interval.start.to_rfc3339(),
                        end: interval.end.to_rfc3339(),
                    },
                },
                ConflictDetail::StaleWrite { .. } => ApiError::Conflict(detail.to_string()),
            },
            DomainError::NotFound(what) => ApiError::NotFound(format!("{} not found", what)),
            DomainError::Upstream(msg) => ApiError::ServiceUnavailable(msg),
            DomainError::Store(StoreError::Rejected(msg)) => ApiError::Conflict(msg),
            DomainError::Store(err) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details: Vec<ValidationDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| ValidationDetail {
                    field: field.to_string(),
                    message: e.message.clone().map(|m| m.to_string()).unwrap_or_default(),
                })
            })
            .collect();

        let message = if details.len() == 1 {
            details[0].message.clone()
        } else {
            format!("{} validation errors", details.len())
        };

        ApiError::Validation(message)
    }
}
