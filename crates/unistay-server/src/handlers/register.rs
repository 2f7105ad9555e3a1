//! Registration wizard.
//!
//! The wizard lives in [`WizardSessions`](crate::wizard_sessions::WizardSessions);
//! the browser holds a signed ticket in the `unistay.wizard` cookie.

use axum::{
    Form,
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use unistay_auth::wizard::{DetailsInput, RoleDetailsInput};
use unistay_auth::{RegistrationWizard, StepInput, WizardStep};
use uuid::Uuid;

use crate::middleware::CurrentSession;
use crate::state::AppState;
use crate::templates;
use crate::wizard_sessions::WIZARD_COOKIE;

/// Every field any wizard step may post.
#[derive(Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    /// `next`, `back` or `submit`.
    pub action: Option<String>,
    /// Set when a social provider button was pressed.
    pub provider: Option<String>,
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub password_confirmation: String,
    pub university: String,
    pub student_id: String,
    pub properties_count: String,
    pub agency_name: String,
    pub licence_number: String,
}

impl std::fmt::Debug for RegisterForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterForm")
            .field("action", &self.action)
            .field("provider", &self.provider)
            .field("role", &self.role)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl RegisterForm {
    /// The posted fields that belong to `step`.
    fn into_step_input(self, step: WizardStep) -> StepInput {
        match step {
            WizardStep::RoleSelect => StepInput::RoleSelect { role: self.role },
            WizardStep::Details => StepInput::Details(DetailsInput {
                first_name: self.first_name,
                last_name: self.last_name,
                email: self.email,
                phone: self.phone,
                password: self.password,
                password_confirmation: self.password_confirmation,
            }),
            WizardStep::RoleDetails => StepInput::RoleDetails(RoleDetailsInput {
                university: self.university,
                student_id: self.student_id,
                properties_count: self.properties_count,
                agency_name: self.agency_name,
                licence_number: self.licence_number,
            }),
            WizardStep::SocialSignup => StepInput::SocialSignup {
                provider: self.provider,
            },
        }
    }
}

/// Wizard named by the request's ticket, if it is still live.
fn load_wizard(state: &AppState, jar: &CookieJar) -> Option<(Uuid, RegistrationWizard)> {
    let id = jar
        .get(WIZARD_COOKIE)
        .and_then(|c| state.wizards.read_ticket(state.cookies.codec(), c.value()))?;
    state.wizards.get(&id).map(|wizard| (id, wizard))
}

/// Stores `wizard`, creating its entry when `id` is `None`, and issues a
/// ticket good for another idle TTL.
fn save_wizard(
    state: &AppState,
    jar: CookieJar,
    id: Option<Uuid>,
    wizard: RegistrationWizard,
) -> CookieJar {
    let id = match id {
        Some(id) => {
            state.wizards.put(id, wizard);
            id
        }
        None => state.wizards.start(wizard),
    };
    match state.wizards.ticket(state.cookies.codec(), id) {
        Ok(ticket) => jar.add(state.cookies.build_cookie(
            WIZARD_COOKIE.to_string(),
            ticket,
            state.wizards.ttl().as_secs() as i64,
        )),
        Err(e) => {
            tracing::error!(error = %e, "Failed to issue wizard ticket");
            jar
        }
    }
}

fn finish_wizard(state: &AppState, jar: CookieJar, id: Option<&Uuid>) -> CookieJar {
    if let Some(id) = id {
        state.wizards.remove(id);
    }
    clear_ticket(state, jar)
}

fn clear_ticket(state: &AppState, jar: CookieJar) -> CookieJar {
    jar.remove(state.cookies.removal(WIZARD_COOKIE.to_string()))
}

/// GET /register
///
/// Nothing is stored until the first step is posted.
pub async fn register_page(
    State(state): State<AppState>,
    session: CurrentSession,
    jar: CookieJar,
) -> Response {
    if let Some(current) = session.current() {
        return Redirect::to(&state.guard.landing_for(&current, None)).into_response();
    }
    match load_wizard(&state, &jar) {
        Some((_, wizard)) => Html(templates::render_wizard(&wizard)).into_response(),
        None => {
            let page = Html(templates::render_wizard(&RegistrationWizard::new()));
            if jar.get(WIZARD_COOKIE).is_some() {
                (clear_ticket(&state, jar), page).into_response()
            } else {
                page.into_response()
            }
        }
    }
}

/// POST /register
pub async fn register_submit(
    State(state): State<AppState>,
    session: CurrentSession,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> Response {
    if let Some(current) = session.current() {
        return Redirect::to(&state.guard.landing_for(&current, None)).into_response();
    }
    let (id, mut wizard) = match load_wizard(&state, &jar) {
        Some((id, wizard)) => (Some(id), wizard),
        None if jar.get(WIZARD_COOKIE).is_some() => {
            // Expired or unknown wizard: start over rather than accept a
            // step out of order.
            tracing::debug!("Registration wizard restarted");
            let page = Html(templates::render_wizard(&RegistrationWizard::new()));
            return (clear_ticket(&state, jar), page).into_response();
        }
        // First post comes from the role step.
        None => (None, RegistrationWizard::new()),
    };

    if form.provider.is_some() {
        let step = wizard.step();
        if wizard.advance(form.into_step_input(step)).is_ok()
            && let Some(path) = wizard.social_signin_path()
        {
            tracing::info!(path = %path, "Registration continues with social sign-in");
            let jar = finish_wizard(&state, jar, id.as_ref());
            return (jar, Redirect::to(&path)).into_response();
        }
    } else {
        match form.action.as_deref().unwrap_or("next") {
            "back" => {
                wizard.back();
            }
            "submit" => {
                if let Ok(signed_in) = wizard.submit(&state.adapter).await {
                    let target = state.guard.landing_for(&signed_in, None);
                    session.sign_in(signed_in);
                    let jar = finish_wizard(&state, jar, id.as_ref());
                    return (jar, Redirect::to(&target)).into_response();
                }
            }
            _ => {
                let step = wizard.step();
                if let Err(e) = wizard.advance(form.into_step_input(step)) {
                    tracing::debug!(step = ?step, error = %e, "Registration step rejected");
                }
            }
        }
    }

    let page = Html(templates::render_wizard(&wizard));
    if id.is_none() && wizard.step() == WizardStep::RoleSelect {
        // Rejected first step: nothing worth keeping.
        return page.into_response();
    }
    let jar = save_wizard(&state, jar, id, wizard);
    (jar, page).into_response()
}
