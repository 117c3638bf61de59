use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::model::{missing_reference_message, FieldErrors, Id, NON_FIELD_ERRORS};
use crate::store::StoreError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
            fields: None,
        }
    }
}

/// Every failure a handler can report. Nothing has been persisted when one is returned.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("Invalid request: {0}")]
    Validation(FieldErrors),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn not_found(entity: &str, id: Id) -> Self {
        ApiError::NotFound(format!("{} {} not found.", entity, id))
    }

    /// A malformed request that cannot be attributed to a single field
    pub fn malformed(message: impl Into<String>) -> Self {
        ApiError::Validation(FieldErrors::single(NON_FIELD_ERRORS, message))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::FORBIDDEN,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::MissingReference { field, id, .. } => {
                ApiError::Validation(FieldErrors::single(field, missing_reference_message(id)))
            }
            StoreError::Conflict(message) => ApiError::malformed(message),
            StoreError::Backend(e) => ApiError::Internal(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Validation(fields) => ErrorResponse {
                error: "Invalid request.".to_string(),
                fields: Some(fields),
            },
            ApiError::Internal(e) => {
                log::error!("Request failed: {:#}", e);
                ErrorResponse::new("Internal server error.")
            }
            other => ErrorResponse::new(&other.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Unauthorized("no".to_string()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(FieldErrors::single("name", "bad")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::not_found("Dataset", 3).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_missing_reference_becomes_field_error() {
        let error = ApiError::from(StoreError::MissingReference {
            field: "training",
            entity: "Training",
            id: 99,
        });
        match error {
            ApiError::Validation(fields) => assert_eq!(
                fields.get("training"),
                Some(&["Invalid pk \"99\" - object does not exist.".to_string()][..])
            ),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_backend_error_is_internal() {
        let error = ApiError::from(StoreError::Backend(anyhow::anyhow!("connection reset")));
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
