//! API error handling for the Tally HTTP API.
//!
//! Every failure leaves a handler as an [`ApiError`] and is rendered as
//! `{"error": "...", "details": {...}}`.

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::TallyError;

/// API error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Unauthorized (401).
    Unauthorized,
    /// Forbidden (403).
    Forbidden,
    /// Not found (404).
    NotFound,
    /// Conflict (409).
    Conflict,
    /// Validation error (422) with field-level details.
    ValidationError,
    /// Unprocessable entity (422).
    UnprocessableEntity,
    /// Too many requests (429).
    TooManyRequests,
    /// Internal server error (500).
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::ValidationError => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::UnprocessableEntity => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
    /// Field-level validation messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, String>>,
}

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
    details: Option<BTreeMap<String, String>>,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnprocessableEntity, message)
    }

    pub fn too_many_requests() -> Self {
        Self::new(ErrorCode::TooManyRequests, "too many requests")
    }

    pub fn internal() -> Self {
        Self::new(ErrorCode::InternalError, "internal server error")
    }

    /// Create a validation error with field-level details.
    pub fn validation(details: BTreeMap<String, String>) -> Self {
        Self {
            code: ErrorCode::ValidationError,
            message: "validation failed".to_string(),
            details: Some(details),
        }
    }

    /// Create a validation error from `validator::ValidationErrors`.
    ///
    /// Each field reports its first failure.
    pub fn from_validation_errors(errors: validator::ValidationErrors) -> Self {
        let details = errors
            .field_errors()
            .into_iter()
            .filter_map(|(field, field_errors)| {
                field_errors
                    .first()
                    .map(|e| (field.to_string(), describe(e)))
            })
            .collect();

        Self::validation(details)
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// User-facing text for one field failure.
fn describe(error: &validator::ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }
    let param = |name: &str| {
        error
            .params
            .get(name)
            .map(|v| v.to_string())
            .unwrap_or_default()
    };
    match error.code.as_ref() {
        "required" => "this field is required".to_string(),
        "email" => "must be a valid email address".to_string(),
        "length" if error.params.contains_key("min") && param("min") != "0" => {
            if error.params.contains_key("max") {
                format!(
                    "must be between {} and {} characters",
                    param("min"),
                    param("max")
                )
            } else {
                format!("must be at least {} characters", param("min"))
            }
        }
        "length" => format!("must be at most {} characters", param("max")),
        code => format!("failed on {code} validation"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status_code();
        let body = ErrorBody {
            error: self.message,
            details: self.details,
        };
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<TallyError> for ApiError {
    fn from(err: TallyError) -> Self {
        match err {
            TallyError::Auth(msg) => ApiError::unauthorized(msg),
            TallyError::Permission(msg) => ApiError::forbidden(msg),
            TallyError::Validation(msg) => ApiError::unprocessable(msg),
            TallyError::Conflict(msg) => ApiError::conflict(msg),
            err @ TallyError::NotFound(_) => ApiError::not_found(err.to_string()),
            err => {
                tracing::error!(error = %err, "Internal error");
                ApiError::internal()
            }
        }
    }
}
