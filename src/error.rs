// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::store::StoreError;

pub const FOREIGN_KEY_MESSAGE: &str = "Foreign key constraint error";

/// Global Application Error Enum.
/// Every operation returns this type; store failures keep their cause in `source`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // 404 Not Found
    #[error("{0}")]
    NotFound(String),

    // 422 / 500, depending on what the store rejected
    #[error("{message}")]
    Persistence {
        message: String,
        #[source]
        source: StoreError,
    },

    // 400 Bad Request: business preconditions
    #[error("Please add questions to the exercise before activating it")]
    NoQuestions,

    #[error("Please add weightage to the exercise before activating it")]
    ZeroWeightage,

    #[error("Failed to create result")]
    ResultCreate,

    // 500: caller asked the query helper for a mode it does not have
    #[error("{0} method is not available.")]
    UnsupportedMode(String),

    // 400 Bad Request
    #[error("{0}")]
    BadRequest(String),

    // 403 Forbidden
    #[error("{0}")]
    Forbidden(String),

    // 500 Internal Server Error
    #[error("{0}")]
    InternalServerError(String),
}

/// Turns a store failure into the single human-readable message shown to callers.
///
/// * Foreign-key violations get a fixed message.
/// * Validation failures list each field's message, comma separated.
/// * Anything else keeps the store's own message.
pub fn describe_store_error(err: &StoreError) -> String {
    match err {
        StoreError::ForeignKey { .. } => FOREIGN_KEY_MESSAGE.to_string(),
        StoreError::Validation(violations) => violations
            .iter()
            .map(|v| v.message.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let mut message = describe_store_error(&err);
        if message.is_empty() {
            message = err.to_string();
        }
        AppError::Persistence {
            message,
            source: err,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::from(StoreError::from(err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Persistence { source, .. } => match source {
                StoreError::ForeignKey { .. } | StoreError::Validation(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                StoreError::Decode { .. } | StoreError::Database(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            AppError::NoQuestions | AppError::ZeroWeightage | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::ResultCreate
            | AppError::UnsupportedMode(_)
            | AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let error_message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = ?self, "Internal Server Error: {}", self);
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FieldViolation;

    #[test]
    fn foreign_key_errors_get_fixed_message() {
        let err = StoreError::ForeignKey {
            constraint: "results_exercise_id_fkey".into(),
        };
        assert_eq!(describe_store_error(&err), "Foreign key constraint error");
    }

    #[test]
    fn validation_messages_are_comma_joined() {
        let err = StoreError::Validation(vec![
            FieldViolation::new("name", "name cannot be null"),
            FieldViolation::new("marks", "marks must be a number"),
        ]);
        assert_eq!(
            describe_store_error(&err),
            "name cannot be null, marks must be a number"
        );
    }

    #[test]
    fn other_errors_keep_their_message() {
        let err = StoreError::Database("connection reset".into());
        let app: AppError = err.into();
        assert_eq!(app.to_string(), "connection reset");
        assert!(std::error::Error::source(&app).is_some());
    }

    #[test]
    fn unsupported_mode_names_the_mode() {
        let err = AppError::UnsupportedMode("findByPk".into());
        assert_eq!(err.to_string(), "findByPk method is not available.");
    }
}
