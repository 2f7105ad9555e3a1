//! Role selection for `pending` users.

use axum::{
    Form, Json,
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use unistay_auth::guard::{SELECT_ROLE_PATH, login_redirect};
use unistay_auth::{AuthError, Role, Session};

use crate::middleware::CurrentSession;
use crate::state::AppState;
use crate::templates;

#[derive(Debug, Default, Deserialize)]
pub struct SelectRoleForm {
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectRoleResponse {
    pub role: Role,
    pub redirect: String,
}

/// GET /select_role
pub async fn select_role_page(State(state): State<AppState>, session: CurrentSession) -> Response {
    match session.current() {
        None => Redirect::to(&login_redirect(SELECT_ROLE_PATH)).into_response(),
        Some(current) if !current.role.is_pending() => {
            Redirect::to(&state.guard.landing_for(&current, None)).into_response()
        }
        Some(current) => Html(templates::render_select_role(&current.email, None)).into_response(),
    }
}

/// POST /select_role
pub async fn select_role_submit(
    State(state): State<AppState>,
    session: CurrentSession,
    Form(form): Form<SelectRoleForm>,
) -> Response {
    let Some(current) = session.current() else {
        return Redirect::to(&login_redirect(SELECT_ROLE_PATH)).into_response();
    };
    match assign_role(&state, &session, &current, &form.role).await {
        Ok(updated) => Redirect::to(&state.guard.landing_for(&updated, None)).into_response(),
        Err(e) => {
            tracing::info!(user_id = %current.user_id, error = %e, "Role selection failed");
            Html(templates::render_select_role(
                &current.email,
                Some(&e.user_message()),
            ))
            .into_response()
        }
    }
}

/// POST /api/session/role
///
/// JSON variant of role selection.
pub async fn select_role_api(
    State(state): State<AppState>,
    session: CurrentSession,
    Json(form): Json<SelectRoleForm>,
) -> Result<Json<SelectRoleResponse>, AuthError> {
    let current = session
        .current()
        .ok_or_else(|| AuthError::authentication_failed("Sign in first"))?;
    let updated = assign_role(&state, &session, &current, &form.role).await?;
    Ok(Json(SelectRoleResponse {
        role: updated.role,
        redirect: state.guard.landing_for(&updated, None),
    }))
}

/// Records the role with the backend and merges it into the session.
async fn assign_role(
    state: &AppState,
    session: &CurrentSession,
    current: &Session,
    raw_role: &str,
) -> Result<Session, AuthError> {
    let role: Role = raw_role.trim().parse()?;
    let update = state.adapter.select_role(current, role).await?;
    let updated = session.update(update)?;
    tracing::info!(user_id = %updated.user_id, role = %updated.role, "Role selected");
    Ok(updated)
}
