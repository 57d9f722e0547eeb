//! # Resource Errors
//!
//! Outcomes that end a request early, and how each maps onto HTTP.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::model::EntityKind;
use crate::storage::StorageError;

/// Result type for resource operations
pub type ResourceResult<T> = Result<T, ResourceError>;

#[derive(Debug, Error)]
pub enum ResourceError {
    // ==================
    // Client Errors (4xx)
    // ==================
    /// Parent or target entity does not exist
    #[error("Not found")]
    NotFound,

    /// Body is not a JSON object
    #[error("Not a JSON")]
    MalformedRequest,

    /// A required field is absent from a create payload
    #[error("Missing {0}")]
    MissingField(&'static str),

    /// The payload names an entity that does not exist
    #[error("Not found")]
    ReferenceNotFound { kind: EntityKind, id: String },

    // ==================
    // Server Errors (5xx)
    // ==================
    /// The mutation could not be made durable
    #[error("Internal error: {0}")]
    Persistence(#[from] StorageError),
}

impl ResourceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ResourceError::NotFound => StatusCode::NOT_FOUND,
            ResourceError::ReferenceNotFound { .. } => StatusCode::NOT_FOUND,
            ResourceError::MalformedRequest => StatusCode::BAD_REQUEST,
            ResourceError::MissingField(_) => StatusCode::BAD_REQUEST,
            ResourceError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable reason, as sent in the `error` field.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ErrorResponse {
    pub fn not_found() -> Self {
        Self {
            error: "Not found".to_string(),
            code: StatusCode::NOT_FOUND.as_u16(),
        }
    }
}

impl From<&ResourceError> for ErrorResponse {
    fn from(err: &ResourceError) -> Self {
        Self {
            code: err.status_code().as_u16(),
            error: err.reason(),
        }
    }
}

impl IntoResponse for ResourceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let ResourceError::Persistence(ref e) = self {
            error!(code = e.code(), error = %e, "request failed to persist");
        }
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ResourceError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ResourceError::MalformedRequest.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ResourceError::MissingField("name").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ResourceError::ReferenceNotFound {
                kind: EntityKind::User,
                id: "u".to_string()
            }
            .status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ResourceError::from(StorageError::write_failed_no_source("disk")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_reasons() {
        assert_eq!(ResourceError::MalformedRequest.reason(), "Not a JSON");
        assert_eq!(ResourceError::MissingField("user_id").reason(), "Missing user_id");
        assert_eq!(ResourceError::NotFound.reason(), "Not found");
    }

    #[test]
    fn test_error_body() {
        let body = ErrorResponse::from(&ResourceError::MissingField("name"));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"], "Missing name");
        assert_eq!(json["code"], 400);
    }
}
