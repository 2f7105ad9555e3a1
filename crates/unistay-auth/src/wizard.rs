//! Registration and verification wizard.
//!
//! A linear state machine: `RoleSelect -> Details -> RoleDetails ->
//! SocialSignup`. Each step validates its own input before the wizard
//! advances, going back keeps what was entered, and the account is created
//! by a single call from the last step. A failed call leaves the wizard on
//! that step with an error to show.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::identity::{IdentityProviderAdapter, RegistrationRequest};
use crate::role::Role;
use crate::session::Session;

/// Minimum password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Providers that can be linked at the last step.
pub const SOCIAL_PROVIDERS: [&str; 2] = ["google", "facebook"];

/// Wizard steps, in order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    #[default]
    RoleSelect,
    Details,
    RoleDetails,
    SocialSignup,
}

impl WizardStep {
    pub const ALL: [WizardStep; 4] = [
        WizardStep::RoleSelect,
        WizardStep::Details,
        WizardStep::RoleDetails,
        WizardStep::SocialSignup,
    ];

    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::RoleSelect => Some(Self::Details),
            Self::Details => Some(Self::RoleDetails),
            Self::RoleDetails => Some(Self::SocialSignup),
            Self::SocialSignup => None,
        }
    }

    #[must_use]
    pub fn previous(self) -> Option<Self> {
        match self {
            Self::RoleSelect => None,
            Self::Details => Some(Self::RoleSelect),
            Self::RoleDetails => Some(Self::Details),
            Self::SocialSignup => Some(Self::RoleDetails),
        }
    }

    /// 1-based position.
    #[must_use]
    pub fn number(self) -> usize {
        match self {
            Self::RoleSelect => 1,
            Self::Details => 2,
            Self::RoleDetails => 3,
            Self::SocialSignup => 4,
        }
    }

    #[must_use]
    pub fn is_final(self) -> bool {
        self.next().is_none()
    }

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::RoleSelect => "Choose your role",
            Self::Details => "Your details",
            Self::RoleDetails => "A bit more about you",
            Self::SocialSignup => "Link a social account",
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Personal details entered at [`WizardStep::Details`].
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DetailsInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub password_confirmation: String,
}

impl fmt::Debug for DetailsInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetailsInput")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .field("password", &"[redacted]")
            .finish()
    }
}

/// Role-specific details entered at [`WizardStep::RoleDetails`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RoleDetailsInput {
    pub university: String,
    pub student_id: String,
    /// Free text as typed; must be a non-negative integer when present.
    pub properties_count: String,
    pub agency_name: String,
    pub licence_number: String,
}

/// Input for one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepInput {
    RoleSelect { role: String },
    Details(DetailsInput),
    RoleDetails(RoleDetailsInput),
    SocialSignup { provider: Option<String> },
}

impl StepInput {
    #[must_use]
    pub fn step(&self) -> WizardStep {
        match self {
            Self::RoleSelect { .. } => WizardStep::RoleSelect,
            Self::Details(_) => WizardStep::Details,
            Self::RoleDetails(_) => WizardStep::RoleDetails,
            Self::SocialSignup { .. } => WizardStep::SocialSignup,
        }
    }
}

/// Everything entered so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationDraft {
    pub role: Option<Role>,
    pub details: DetailsInput,
    pub role_details: RoleDetailsInput,
    pub social_provider: Option<String>,
}

/// The wizard state machine.
#[derive(Debug, Clone, Default)]
pub struct RegistrationWizard {
    step: WizardStep,
    draft: RegistrationDraft,
    error: Option<String>,
}

impl RegistrationWizard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn step(&self) -> WizardStep {
        self.step
    }

    #[must_use]
    pub fn draft(&self) -> &RegistrationDraft {
        &self.draft
    }

    /// Error to show on the current step.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Records `input` for the current step and moves forward if it is valid.
    ///
    /// Values are kept even when validation fails, so the step can be shown
    /// again with what the user typed. At the last step the input is recorded
    /// and the wizard stays put; use [`submit`](Self::submit) to finish.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` if `input` belongs to another step or
    /// does not validate.
    pub fn advance(&mut self, input: StepInput) -> Result<WizardStep, AuthError> {
        if input.step() != self.step {
            return Err(self.fail(AuthError::validation(
                "step",
                format!("Expected input for '{}'", self.step),
            )));
        }

        let result = match input {
            StepInput::RoleSelect { role } => match parse_selectable_role(&role) {
                Ok(role) => {
                    self.draft.role = Some(role);
                    Ok(())
                }
                Err(e) => Err(e),
            },
            StepInput::Details(details) => {
                self.draft.details = details;
                validate_details(&self.draft.details)
            }
            StepInput::RoleDetails(role_details) => {
                self.draft.role_details = role_details;
                self.selected_role()
                    .and_then(|role| validate_role_details(role, &self.draft.role_details))
            }
            StepInput::SocialSignup { provider } => {
                let provider = provider
                    .map(|p| p.trim().to_ascii_lowercase())
                    .filter(|p| !p.is_empty());
                match provider {
                    Some(p) if !SOCIAL_PROVIDERS.contains(&p.as_str()) => Err(
                        AuthError::validation("provider", format!("Unknown provider '{p}'")),
                    ),
                    provider => {
                        self.draft.social_provider = provider;
                        Ok(())
                    }
                }
            }
        };

        if let Err(e) = result {
            return Err(self.fail(e));
        }
        self.error = None;
        if let Some(next) = self.step.next() {
            tracing::debug!(from = ?self.step, to = ?next, "Registration wizard advanced");
            self.step = next;
        }
        Ok(self.step)
    }

    /// Goes back one step. Entered values are kept.
    pub fn back(&mut self) -> WizardStep {
        self.error = None;
        if let Some(previous) = self.step.previous() {
            self.step = previous;
        }
        self.step
    }

    /// OAuth sign-in path when a social provider was chosen at the last step.
    ///
    /// The role picked at the first step travels along so a first-time
    /// account gets it.
    #[must_use]
    pub fn social_signin_path(&self) -> Option<String> {
        if !self.step.is_final() {
            return None;
        }
        let provider = self.draft.social_provider.as_deref()?;
        let role = self.draft.role.unwrap_or(Role::Student);
        Some(format!("/auth/signin/{provider}?role={role}"))
    }

    /// Builds the backend payload from a complete draft.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` if the wizard is not on its last step
    /// or any step no longer validates.
    pub fn registration_request(&self) -> Result<RegistrationRequest, AuthError> {
        if !self.step.is_final() {
            return Err(AuthError::validation(
                "step",
                "Registration can only be submitted from the last step",
            ));
        }
        let role = self.selected_role()?;
        let details = &self.draft.details;
        validate_details(details)?;
        let extra = &self.draft.role_details;
        validate_role_details(role, extra)?;

        let non_empty = |s: &str| {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        };
        let is = |r: Role| (role == r).then_some(());

        Ok(RegistrationRequest {
            role,
            first_name: details.first_name.trim().to_string(),
            last_name: details.last_name.trim().to_string(),
            email: details.email.trim().to_ascii_lowercase(),
            phone: non_empty(&details.phone),
            password: details.password.clone(),
            university: is(Role::Student).and_then(|()| non_empty(&extra.university)),
            student_id: is(Role::Student).and_then(|()| non_empty(&extra.student_id)),
            properties_count: is(Role::Landlord)
                .and_then(|()| non_empty(&extra.properties_count))
                .and_then(|c| c.parse().ok()),
            agency_name: is(Role::Agent).and_then(|()| non_empty(&extra.agency_name)),
            licence_number: is(Role::Agent).and_then(|()| non_empty(&extra.licence_number)),
        })
    }

    /// Creates the account and signs it in.
    ///
    /// On failure the wizard stays on the last step and keeps the error for
    /// display; it never advances.
    pub async fn submit(&mut self, adapter: &IdentityProviderAdapter) -> Result<Session, AuthError> {
        let request = match self.registration_request() {
            Ok(request) => request,
            Err(e) => return Err(self.fail(e)),
        };
        match adapter.register(&request).await {
            Ok(session) => {
                self.error = None;
                Ok(session)
            }
            Err(e) => {
                tracing::info!(error = %e, "Registration failed");
                Err(self.fail(e))
            }
        }
    }

    fn selected_role(&self) -> Result<Role, AuthError> {
        self.draft
            .role
            .ok_or_else(|| AuthError::validation("role", "Choose a role first"))
    }

    fn fail(&mut self, error: AuthError) -> AuthError {
        self.error = Some(error.user_message());
        error
    }
}

fn parse_selectable_role(raw: &str) -> Result<Role, AuthError> {
    let role: Role = raw.parse()?;
    if role.is_self_selectable() {
        Ok(role)
    } else {
        Err(AuthError::validation(
            "role",
            "Choose student, landlord or agent",
        ))
    }
}

fn require(field: &str, value: &str, label: &str) -> Result<(), AuthError> {
    if value.trim().is_empty() {
        return Err(AuthError::validation(field, format!("{label} is required")));
    }
    Ok(())
}

/// Checks a [`DetailsInput`]. The password confirmation is checked here,
/// before any request is made.
pub fn validate_details(details: &DetailsInput) -> Result<(), AuthError> {
    require("first_name", &details.first_name, "First name")?;
    require("last_name", &details.last_name, "Last name")?;

    let email = details.email.trim();
    let well_formed = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty())
        && !email.chars().any(char::is_whitespace);
    if !well_formed {
        return Err(AuthError::validation(
            "email",
            "Enter a valid email address",
        ));
    }

    let phone = details.phone.trim();
    if !phone.is_empty() {
        let allowed = phone
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'));
        let digits = phone.chars().filter(char::is_ascii_digit).count();
        if !allowed || digits < 7 {
            return Err(AuthError::validation("phone", "Enter a valid phone number"));
        }
    }

    if details.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::validation(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    if details.password != details.password_confirmation {
        return Err(AuthError::validation(
            "password_confirmation",
            "Passwords do not match",
        ));
    }
    Ok(())
}

/// Checks a [`RoleDetailsInput`] for `role`.
pub fn validate_role_details(role: Role, input: &RoleDetailsInput) -> Result<(), AuthError> {
    match role {
        Role::Student => require("university", &input.university, "University"),
        Role::Landlord => {
            let count = input.properties_count.trim();
            if !count.is_empty() && count.parse::<u32>().is_err() {
                return Err(AuthError::validation(
                    "properties_count",
                    "Number of properties must be a whole number",
                ));
            }
            Ok(())
        }
        Role::Agent => {
            require("agency_name", &input.agency_name, "Agency name")?;
            require("licence_number", &input.licence_number, "Licence number")
        }
        Role::Pending | Role::Admin => Err(AuthError::validation(
            "role",
            "Choose student, landlord or agent",
        )),
    }
}
