//! API error handling.
//!
//! Maps the crate error taxonomy to HTTP responses with a stable JSON body.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::Error;

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn bad_gateway(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, code, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            code: self.code,
            message: self.message,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    /// Maps the crate error to a status code and stable error code.
    ///
    /// Errors after which the user must authorize again carry
    /// `details.reconnect = true` so the notes app can offer the handshake.
    fn from(err: Error) -> Self {
        if err.requires_reconnect() {
            let (code, message) = match err {
                Error::UpstreamAuth => ("UPSTREAM_AUTH", "Spotify session expired"),
                _ => ("NOT_CONNECTED", "Not connected to Spotify"),
            };
            return ApiError::new(StatusCode::UNAUTHORIZED, code, message)
                .with_details(json!({ "reconnect": true }));
        }

        match err {
            Error::StateMismatch => {
                ApiError::new(StatusCode::BAD_REQUEST, "STATE_MISMATCH", "State mismatch")
            }
            Error::AuthorizationDenied(reason) => ApiError::new(
                StatusCode::BAD_REQUEST,
                "AUTHORIZATION_DENIED",
                format!("Spotify authorization denied: {}", reason),
            ),
            Error::ProviderExchange { status, body } => {
                ApiError::bad_gateway("PROVIDER_EXCHANGE", "Spotify token exchange failed")
                    .with_details(json!({ "status": status, "body": body }))
            }
            Error::Upstream { status, body } => {
                ApiError::bad_gateway("UPSTREAM_ERROR", "Spotify API error")
                    .with_details(json!({ "status": status, "body": body }))
            }
            other => {
                tracing::error!(error = %other, "internal error");
                ApiError::internal("Internal server error")
            }
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_connected_maps_to_unauthorized() {
        let err = ApiError::from(Error::NotConnected);
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.code, "NOT_CONNECTED");
        assert_eq!(err.details.expect("reconnect hint")["reconnect"], true);
    }

    #[test]
    fn expired_session_asks_for_reconnect() {
        let err = ApiError::from(Error::UpstreamAuth);
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.code, "UPSTREAM_AUTH");
        assert_eq!(err.message, "Spotify session expired");
        assert_eq!(err.details.expect("reconnect hint")["reconnect"], true);
    }

    #[test]
    fn state_mismatch_is_not_a_reconnect() {
        let err = ApiError::from(Error::StateMismatch);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.details.is_none());
    }

    #[test]
    fn upstream_error_keeps_status_and_body() {
        let err = ApiError::from(Error::Upstream {
            status: Some(404),
            body: "NO_ACTIVE_DEVICE".into(),
        });
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        let details = err.details.expect("details should be attached");
        assert_eq!(details["status"], 404);
        assert_eq!(details["body"], "NO_ACTIVE_DEVICE");
    }

    #[test]
    fn io_errors_are_internal() {
        let err = ApiError::from(Error::Io(std::io::Error::other("disk full")));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Internal server error");
    }
}
