//! HTTP error mapping.
//!
//! Maps workflow and session errors to status codes and a JSON body of the
//! form `{"error": "...", "code": "..."}`. The `code` is stable; clients branch
//! on it rather than on the message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use super::{AccessError, SessionError};

/// Error body returned by every failing endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

impl From<&AccessError> for ErrorResponse {
    fn from(error: &AccessError) -> Self {
        Self::new(error.to_string(), error.code())
    }
}

impl From<&SessionError> for ErrorResponse {
    fn from(error: &SessionError) -> Self {
        Self::new(error.to_string(), error.code())
    }
}

/// Status code for a workflow error
pub fn access_status(error: &AccessError) -> StatusCode {
    match error {
        AccessError::Validation { .. } => StatusCode::BAD_REQUEST,
        AccessError::DuplicateRequest { .. }
        | AccessError::AlreadyGranted { .. }
        | AccessError::AlreadyResolved { .. } => StatusCode::CONFLICT,
        AccessError::NotFound { .. } => StatusCode::NOT_FOUND,
        AccessError::Forbidden { .. } => StatusCode::FORBIDDEN,
        AccessError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Status code for a session error
pub fn session_status(error: &SessionError) -> StatusCode {
    match error {
        SessionError::NotConfigured | SessionError::MissingHeader(_) => StatusCode::UNAUTHORIZED,
        SessionError::InvalidUserId(_) | SessionError::UnknownRole(_) => StatusCode::BAD_REQUEST,
    }
}

/// Error type returned by HTTP handlers
#[derive(Debug)]
pub enum ApiError {
    Access(AccessError),
    Session(SessionError),
    /// Malformed path or body that never reached the gateway
    BadRequest(String),
}

impl From<AccessError> for ApiError {
    fn from(error: AccessError) -> Self {
        ApiError::Access(error)
    }
}

impl From<SessionError> for ApiError {
    fn from(error: SessionError) -> Self {
        ApiError::Session(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Access(e) => {
                if matches!(e, AccessError::Storage(_)) {
                    tracing::error!(error = %e, "Storage failure while handling request");
                }
                (access_status(e), ErrorResponse::from(e))
            }
            ApiError::Session(e) => (session_status(e), ErrorResponse::from(e)),
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(message.clone(), "BAD_REQUEST"),
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        ApiError::Access(self).into_response()
    }
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        ApiError::Session(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::model::RequestStatus;

    #[test]
    fn test_access_status_mapping() {
        let cases = [
            (
                AccessError::validation("reason", "required"),
                StatusCode::BAD_REQUEST,
            ),
            (
                AccessError::not_found("Request", "r-1"),
                StatusCode::NOT_FOUND,
            ),
            (
                AccessError::AlreadyResolved {
                    id: "r-1".into(),
                    status: RequestStatus::Approved,
                },
                StatusCode::CONFLICT,
            ),
            (
                AccessError::Forbidden {
                    action: "resolving requests",
                    required: "librarian",
                },
                StatusCode::FORBIDDEN,
            ),
            (
                AccessError::Storage(StoreError::Unavailable("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(access_status(&error), status, "{}", error);
        }
    }

    #[test]
    fn test_session_status_mapping() {
        assert_eq!(
            session_status(&SessionError::MissingHeader("x-user-id".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            session_status(&SessionError::UnknownRole("root".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_error_body() {
        let response = AccessError::validation("reason", "required").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.code, "VALIDATION_ERROR");
        assert!(body.error.contains("reason"));
    }
}
