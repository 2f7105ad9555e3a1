//! Social sign-in through an external OAuth provider.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use unistay_auth::{AuthError, identity::desired_role};

use super::{error_page, error_page_with_status};
use crate::middleware::CurrentSession;
use crate::state::{AppState, OAUTH_NONCE_COOKIE};

#[derive(Debug, Default, Deserialize)]
pub struct SignInQuery {
    pub role: Option<String>,
    #[serde(rename = "callbackUrl")]
    pub callback_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// GET /auth/signin/{provider}
pub async fn signin(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<SignInQuery>,
    jar: CookieJar,
) -> Response {
    if let Err(e) = state.oauth.provider(&provider) {
        return error_page_with_status(StatusCode::NOT_FOUND, "Sign-in unavailable", &e);
    }
    let role = desired_role(query.role.as_deref());
    match state
        .oauth
        .authorization_url(&provider, role, query.callback_url.as_deref())
    {
        Ok(request) => {
            tracing::info!(provider = %provider, role = %role, "Starting OAuth sign-in");
            let nonce = state.cookies.build_cookie(
                OAUTH_NONCE_COOKIE.to_string(),
                request.nonce,
                state.oauth_state_ttl.as_secs() as i64,
            );
            (jar.add(nonce), Redirect::to(request.url.as_str())).into_response()
        }
        Err(e) => error_page("Sign-in unavailable", &e),
    }
}

/// GET /auth/callback/{provider}
pub async fn callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    session: CurrentSession,
    jar: CookieJar,
) -> Response {
    let jar_cleared = jar
        .clone()
        .remove(state.cookies.removal(OAUTH_NONCE_COOKIE.to_string()));

    if let Some(error) = query.error {
        let message = query.error_description.unwrap_or(error);
        let e = AuthError::identity_provider(&provider, message);
        return (jar_cleared, error_page("Sign-in cancelled", &e)).into_response();
    }

    let (Some(code), Some(raw_state)) = (query.code, query.state) else {
        let e = AuthError::validation("code", "Missing code or state parameter");
        return (jar_cleared, error_page("Sign-in failed", &e)).into_response();
    };

    let result = async {
        let expected = state.oauth.verify_state(&provider, &raw_state)?;
        let nonce = jar.get(OAUTH_NONCE_COOKIE).map(|c| c.value().to_string());
        if nonce.as_deref() != Some(expected.nonce.as_str()) {
            return Err(AuthError::invalid_session(
                "OAuth state does not belong to this browser",
            ));
        }
        let (profile, oauth_state) = state.oauth.complete(&provider, &code, &raw_state).await?;
        let signed_in = state
            .adapter
            .login_with_profile(&profile, oauth_state.role)
            .await?;
        Ok::<_, AuthError>((signed_in, oauth_state))
    }
    .await;

    match result {
        Ok((signed_in, oauth_state)) => {
            let target = state
                .guard
                .landing_for(&signed_in, oauth_state.callback.as_deref());
            session.sign_in(signed_in);
            (jar_cleared, Redirect::to(&target)).into_response()
        }
        Err(e) => (jar_cleared, error_page("Sign-in failed", &e)).into_response(),
    }
}
