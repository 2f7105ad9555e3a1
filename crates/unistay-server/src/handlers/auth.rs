//! Password sign-in and sign-out.

use axum::{
    Form,
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use unistay_auth::guard::LOGIN_PATH;

use super::provider_links;
use crate::middleware::CurrentSession;
use crate::state::AppState;
use crate::templates;

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    #[serde(rename = "callbackUrl")]
    pub callback_url: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(rename = "callbackUrl")]
    pub callback_url: Option<String>,
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .field("callback_url", &self.callback_url)
            .finish()
    }
}

/// GET /login
///
/// A signed-in user is sent straight on to where they were going.
pub async fn login_page(
    State(state): State<AppState>,
    session: CurrentSession,
    Query(query): Query<LoginQuery>,
) -> Response {
    if let Some(current) = session.current() {
        let target = state
            .guard
            .landing_for(&current, query.callback_url.as_deref());
        return Redirect::to(&target).into_response();
    }
    Html(templates::render_login_form(
        query.callback_url.as_deref(),
        "",
        None,
        &provider_links(&state),
    ))
    .into_response()
}

/// POST /login
///
/// Failures re-render the form with the error inline.
pub async fn login_submit(
    State(state): State<AppState>,
    session: CurrentSession,
    Form(form): Form<LoginForm>,
) -> Response {
    match state
        .adapter
        .login_with_password(&form.email, &form.password)
        .await
    {
        Ok(signed_in) => {
            let target = state
                .guard
                .landing_for(&signed_in, form.callback_url.as_deref());
            session.sign_in(signed_in);
            Redirect::to(&target).into_response()
        }
        Err(e) => {
            tracing::info!(error = %e, category = %e.category(), "Sign-in failed");
            Html(templates::render_login_form(
                form.callback_url.as_deref(),
                &form.email,
                Some(&e.user_message()),
                &provider_links(&state),
            ))
            .into_response()
        }
    }
}

/// POST /logout
pub async fn logout(session: CurrentSession) -> Redirect {
    session.sign_out();
    Redirect::to(LOGIN_PATH)
}
