use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

pub type AppResult<T> = Result<T, AppError>;

/// User-facing, recoverable error taxonomy. Nothing in the core engines
/// throws; these arise at the HTTP boundary only.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    /// Conflict carrying the structured payload the booking client expects:
    /// `details.conflictingEvent {id,title,start_date,end_date}`.
    #[error("{message}")]
    BookingConflict { message: String, details: Value },
    #[error("{0}")]
    UnprocessableEntity(String),
    /// Strict-schema failure, mapped field-by-field onto form-field slots.
    #[error("Validation failed.")]
    ValidationFailed(BTreeMap<String, String>),
    #[error("{0}")]
    Dependency(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, error_body(&message)),
            AppError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, error_body(&message)),
            AppError::Forbidden(message) => (StatusCode::FORBIDDEN, error_body(&message)),
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, error_body(&message)),
            AppError::Conflict(message) => (StatusCode::CONFLICT, error_body(&message)),
            AppError::BookingConflict { message, details } => (
                StatusCode::CONFLICT,
                json!({ "error": message, "success": false, "details": details }),
            ),
            AppError::UnprocessableEntity(message) => {
                (StatusCode::UNPROCESSABLE_ENTITY, error_body(&message))
            }
            AppError::ValidationFailed(field_errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": "Validation failed.",
                    "success": false,
                    "field_errors": field_errors,
                }),
            ),
            AppError::Dependency(message) => (StatusCode::BAD_GATEWAY, error_body(&message)),
            AppError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_body("Internal server error."),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

fn error_body(message: &str) -> Value {
    json!({ "error": message, "success": false })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use serde_json::json;

    use super::AppError;

    #[test]
    fn validation_failure_is_unprocessable() {
        let mut field_errors = BTreeMap::new();
        field_errors.insert(
            "description".to_string(),
            "Description must be at least 10 characters.".to_string(),
        );
        let response = AppError::ValidationFailed(field_errors).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn booking_conflict_is_conflict() {
        let response = AppError::BookingConflict {
            message: "Event dates overlap an existing booking.".to_string(),
            details: json!({ "conflictingEvent": { "id": "abc" } }),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
