//! JSON error responses.
//!
//! Browser pages render [`AuthError::user_message`] inline instead; this is
//! for the JSON endpoints.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::AuthError;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = error_details(&self);
        if status.is_server_error() {
            tracing::error!(error = %self, category = %self.category(), "Request failed");
        } else {
            tracing::debug!(error = %self, category = %self.category(), "Request rejected");
        }

        let mut headers = HeaderMap::new();
        if status == StatusCode::UNAUTHORIZED {
            headers.insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer realm=\"unistay\""),
            );
        }

        (status, headers, Json(error_body(&self))).into_response()
    }
}

/// JSON body for an error: `{ "error": code, "category": ..., "message": ... }`.
///
/// The message is the user-facing one; internal details stay in the logs.
#[must_use]
pub fn error_body(error: &AuthError) -> serde_json::Value {
    let (_, code) = error_details(error);
    let mut body = json!({
        "error": code,
        "category": error.category().to_string(),
        "message": error.user_message(),
    });
    if let AuthError::Validation { field, .. } = error {
        body["field"] = json!(field);
    }
    body
}

/// HTTP status and machine-readable code for an error.
fn error_details(error: &AuthError) -> (StatusCode, &'static str) {
    match error {
        AuthError::AuthenticationFailed { .. } => {
            (StatusCode::UNAUTHORIZED, "authentication_failed")
        }
        AuthError::InvalidSession { .. } => (StatusCode::UNAUTHORIZED, "invalid_session"),
        AuthError::SessionExpired => (StatusCode::UNAUTHORIZED, "session_expired"),
        AuthError::Forbidden { .. } => (StatusCode::FORBIDDEN, "forbidden"),
        AuthError::Validation { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "validation_failed"),
        AuthError::Network { .. } => (StatusCode::BAD_GATEWAY, "network_failure"),
        AuthError::BackendRejected { .. } => (StatusCode::BAD_GATEWAY, "backend_rejected"),
        AuthError::IdentityProvider { .. } => (StatusCode::BAD_GATEWAY, "identity_provider"),
        AuthError::Configuration { .. } | AuthError::Internal { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "server_error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AuthError::authentication_failed("x").into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::validation("email", "x").into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AuthError::network("x").into_response().status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AuthError::internal("x").into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_unauthorized_has_www_authenticate() {
        let response = AuthError::SessionExpired.into_response();
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

        let response = AuthError::forbidden("x").into_response();
        assert!(!response.headers().contains_key(header::WWW_AUTHENTICATE));
    }

    #[test]
    fn test_error_body_hides_internal_details() {
        let body = error_body(&AuthError::internal("db password is hunter2"));
        assert_eq!(body["error"], "server_error");
        assert_eq!(body["category"], "internal");
        assert!(!body["message"].as_str().unwrap().contains("hunter2"));

        let body = error_body(&AuthError::validation("email", "Enter a valid email address"));
        assert_eq!(body["field"], "email");
        assert_eq!(body["message"], "Enter a valid email address");
    }
}
