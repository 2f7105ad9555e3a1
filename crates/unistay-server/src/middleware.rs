use std::ops::Deref;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tokio::sync::watch;
use unistay_auth::session::SessionSnapshot;
use unistay_auth::{AuthError, GuardDecision, SessionStore};

use crate::state::AppState;

// =============================================================================
// Session Middleware
// =============================================================================

/// Session middleware: hydrates the store, refreshes, guards, persists.
///
/// For every request it:
/// 1. Hydrates a [`SessionStore`] from the session cookie
/// 2. Refreshes the access token when it is about to expire
/// 3. Runs the role guard on the requested path and short-circuits with a
///    redirect when the guard says so
/// 4. Exposes the store to handlers as [`CurrentSession`]
/// 5. Writes the session cookie back if the store changed
pub async fn session_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let had_cookie = jar.get(state.cookies.name()).is_some();
    let store = Arc::new(SessionStore::hydrated(
        state.policy,
        state.cookies.read(&jar),
    ));
    let changes = store.subscribe();

    if let Err(e) = store.refresh_if_needed(&state.adapter).await {
        tracing::debug!(error = %e, "Session dropped during refresh");
    }

    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let response = match state.guard.evaluate_store(&path_and_query, &store) {
        GuardDecision::Allow => {
            req.extensions_mut().insert(CurrentSession(store.clone()));
            next.run(req).await
        }
        GuardDecision::Redirect { target, reason } => {
            tracing::info!(
                path = %path_and_query,
                target = %target,
                reason = %reason,
                "Navigation redirected"
            );
            Redirect::to(&target).into_response()
        }
    };

    let jar = persist_session(&state, jar, &store, &changes, had_cookie);
    (jar, response).into_response()
}

/// Mirrors the store into the session cookie.
fn persist_session(
    state: &AppState,
    jar: CookieJar,
    store: &SessionStore,
    changes: &watch::Receiver<SessionSnapshot>,
    had_cookie: bool,
) -> CookieJar {
    let changed = changes.has_changed().unwrap_or(false);
    match store.current() {
        Some(session) if changed => match state.cookies.issue(jar.clone(), &session) {
            Ok(jar) => jar,
            Err(e) => {
                tracing::error!(error = %e, "Failed to issue session cookie");
                state.cookies.clear(jar)
            }
        },
        Some(_) => jar,
        None if had_cookie => state.cookies.clear(jar),
        None => jar,
    }
}

// =============================================================================
// Extractor
// =============================================================================

/// The request's session store, placed by [`session_middleware`].
///
/// Handlers sign in, sign out and update through it; the middleware persists
/// whatever they leave behind.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Arc<SessionStore>);

impl Deref for CurrentSession {
    type Target = SessionStore;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentSession>()
            .cloned()
            .ok_or_else(|| AuthError::internal("session middleware not installed"))
    }
}
