//! Request handlers.
//!
//! Handlers never write the session cookie themselves. They change the
//! request's [`CurrentSession`](crate::middleware::CurrentSession) and the
//! session middleware persists the result.

pub mod auth;
pub mod oauth;
pub mod pages;
pub mod register;
pub mod roles;

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use unistay_auth::AuthError;

use crate::state::AppState;
use crate::templates;

/// Status for an error rendered as an HTML page.
pub(crate) fn page_status(error: &AuthError) -> StatusCode {
    match error {
        AuthError::AuthenticationFailed { .. }
        | AuthError::InvalidSession { .. }
        | AuthError::SessionExpired => StatusCode::UNAUTHORIZED,
        AuthError::Forbidden { .. } => StatusCode::FORBIDDEN,
        AuthError::Validation { .. } => StatusCode::BAD_REQUEST,
        AuthError::Network { .. }
        | AuthError::BackendRejected { .. }
        | AuthError::IdentityProvider { .. } => StatusCode::BAD_GATEWAY,
        AuthError::Configuration { .. } | AuthError::Internal { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Full-page error response.
pub(crate) fn error_page(title: &str, error: &AuthError) -> Response {
    error_page_with_status(page_status(error), title, error)
}

pub(crate) fn error_page_with_status(
    status: StatusCode,
    title: &str,
    error: &AuthError,
) -> Response {
    if status.is_server_error() {
        tracing::error!(error = %error, category = %error.category(), "Request failed");
    } else {
        tracing::info!(error = %error, category = %error.category(), "Request rejected");
    }
    (
        status,
        Html(templates::render_error_page(title, &error.user_message())),
    )
        .into_response()
}

/// `(id, display name)` of every enabled OAuth provider.
pub(crate) fn provider_links(state: &AppState) -> Vec<(String, String)> {
    state
        .oauth
        .providers()
        .map(|p| {
            let name = if p.name.is_empty() {
                p.id.clone()
            } else {
                p.name.clone()
            };
            (p.id.clone(), name)
        })
        .collect()
}
