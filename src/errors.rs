use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::repositories::StoreError;

const RESOURCE_NOT_FOUND: &str = "Resource not found";
const RESOURCE_EXISTS: &str = "Resource already exists";

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Additional error details (field-level validation failures)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// RFC 3339 timestamp when the error was rendered
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<StoreError> for ServiceError {
    /// Classifies a raw storage failure. Races and outages surface as internal
    /// errors; the detail is logged here and hidden from clients.
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => {
                debug!(%what, "record missing");
                ServiceError::NotFound(RESOURCE_NOT_FOUND.to_string())
            }
            StoreError::AlreadyExists(what) => {
                debug!(%what, "record already exists");
                ServiceError::AlreadyExists(RESOURCE_EXISTS.to_string())
            }
            StoreError::InsufficientFunds => ServiceError::InvalidRequest(
                "User does not have enough balance to checkout".to_string(),
            ),
            StoreError::Conflict(_) | StoreError::Unavailable(_) | StoreError::Backend(_) => {
                error!(error = %err, transient = err.is_transient(), "storage failure");
                ServiceError::InternalError(err.to_string())
            }
        }
    }
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidRequest(_) | Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::AlreadyExists(_) => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::InternalError(_) | Self::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::InternalError(_) | Self::DatabaseError(_) => "Internal server error".to_string(),
            Self::NotFound(msg)
            | Self::InvalidRequest(msg)
            | Self::AlreadyExists(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::ValidationError(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: None,
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

/// API Error type for HTTP responses
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Service error: {0}")]
    ServiceError(#[from] ServiceError),

    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        details: Option<String>,
    },

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, details) = match self {
            ApiError::ServiceError(service_error) => {
                return service_error.into_response();
            }
            ApiError::ValidationError { message, details } => {
                (StatusCode::BAD_REQUEST, message, details)
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message, None),
        };

        let error_response = ErrorResponse {
            error: status
                .canonical_reason()
                .unwrap_or("Unknown Error")
                .to_string(),
            message,
            details,
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use rstest::rstest;

    #[tokio::test]
    async fn service_error_response_includes_request_id() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("req-123"), async {
                ServiceError::NotFound("User does not have a cart".into()).into_response()
            })
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.request_id.as_deref(), Some("req-123"));
        assert_eq!(payload.message, "User does not have a cart");
    }

    #[rstest]
    #[case(ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND)]
    #[case(ServiceError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST)]
    #[case(ServiceError::ValidationError("x".into()), StatusCode::BAD_REQUEST)]
    #[case(ServiceError::AlreadyExists("x".into()), StatusCode::CONFLICT)]
    #[case(ServiceError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED)]
    #[case(ServiceError::Forbidden("x".into()), StatusCode::FORBIDDEN)]
    #[case(ServiceError::InternalError("x".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    fn service_error_status_code_mapping(#[case] err: ServiceError, #[case] status: StatusCode) {
        assert_eq!(err.status_code(), status);
    }

    #[test]
    fn response_message_hides_internal_details() {
        assert_eq!(
            ServiceError::InternalError("pool timed out".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::InvalidRequest("Product not in cart".into()).response_message(),
            "Product not in cart"
        );
    }

    #[rstest]
    #[case(StoreError::NotFound("cart".into()), StatusCode::NOT_FOUND)]
    #[case(StoreError::AlreadyExists("cart".into()), StatusCode::CONFLICT)]
    #[case(StoreError::InsufficientFunds, StatusCode::BAD_REQUEST)]
    #[case(StoreError::Conflict("stale".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(StoreError::Unavailable("timeout".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(StoreError::Backend("boom".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    fn store_errors_are_classified(#[case] err: StoreError, #[case] status: StatusCode) {
        assert_eq!(ServiceError::from(err).status_code(), status);
    }

    #[test]
    fn store_record_details_stay_out_of_client_messages() {
        let missing = ServiceError::from(StoreError::NotFound("cart for crio-user@gmail.com".into()));
        assert_eq!(missing.response_message(), "Resource not found");

        let taken = ServiceError::from(StoreError::AlreadyExists(
            "UNIQUE constraint failed: users.email".into(),
        ));
        assert_eq!(taken.response_message(), "Resource already exists");
    }

    #[test]
    fn insufficient_funds_keeps_the_balance_message() {
        let err = ServiceError::from(StoreError::InsufficientFunds);
        assert_eq!(
            err.response_message(),
            "User does not have enough balance to checkout"
        );
    }

    #[tokio::test]
    async fn api_validation_error_carries_details() {
        let response = ApiError::ValidationError {
            message: "Invalid request body".into(),
            details: Some("quantity: range".into()),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.details.as_deref(), Some("quantity: range"));
    }
}
