//! API error handling

use crate::auth::SessionError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    /// The single body every authentication failure produces
    pub fn authentication_failed() -> Self {
        Self::new("AUTHENTICATION_FAILED", "Authentication failed")
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    AuthenticationFailed,
    Internal(String),
    Database(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::BadRequest(detail) => (
                StatusCode::BAD_REQUEST,
                ApiError::bad_request("Malformed request body").with_details(detail),
            ),
            AppError::AuthenticationFailed => {
                (StatusCode::UNAUTHORIZED, ApiError::authentication_failed())
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, ApiError::internal_error())
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::new("DATABASE_ERROR", "Database operation failed"),
                )
            }
        };

        (status, Json(error)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(status = %rejection.status(), error = %rejection, "Rejected request body");
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        if err.is_authentication_failure() {
            // Cause was already audited; clients only learn that it failed
            return AppError::AuthenticationFailed;
        }

        match err {
            SessionError::Repository(e) => AppError::Database(e.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CredentialFailure, RepositoryError, TokenFormatError};

    #[test]
    fn test_authentication_failures_are_uniform() {
        let errors = [
            SessionError::InvalidCredentials(CredentialFailure::UnknownIdentifier),
            SessionError::InvalidCredentials(CredentialFailure::PasswordMismatch),
            SessionError::TokenMalformed(TokenFormatError::Empty),
            SessionError::TokenNotFound,
            SessionError::TokenExpiredOrRevoked,
        ];

        for err in errors {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn test_internal_failures_are_server_errors() {
        let repo = SessionError::Repository(RepositoryError::DatabaseError("down".to_string()));
        assert!(matches!(AppError::from(repo), AppError::Database(_)));

        let worker = SessionError::Worker("panicked".to_string());
        let response = AppError::from(worker).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_api_error_omits_empty_details() {
        let json = serde_json::to_string(&ApiError::authentication_failed()).unwrap();
        assert_eq!(
            json,
            r#"{"code":"AUTHENTICATION_FAILED","message":"Authentication failed"}"#
        );

        let json = serde_json::to_string(&ApiError::bad_request("x").with_details("y")).unwrap();
        assert!(json.contains("\"details\":\"y\""));
    }

    #[tokio::test]
    async fn test_bad_request_body_carries_details() {
        let response = AppError::BadRequest("missing field `password`".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let error: ApiError = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.code, "BAD_REQUEST");
        assert_eq!(error.details.as_deref(), Some("missing field `password`"));
    }
}
