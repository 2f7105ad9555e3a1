//! Identity provider adapter.
//!
//! Turns credentials (a password or an external provider profile) into a
//! [`Session`], and keeps that session's tokens and role current against the
//! backend.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{DecodingKey, Validation};
use serde::Deserialize;

use super::backend::{
    BackendUser, HttpIdentityBackend, IdentityBackend, RegistrationRequest, SocialLoginRequest,
    TokenPair,
};
use super::oauth::DEFAULT_OAUTH_ROLE;
use super::provider::ProviderProfile;
use crate::config::{AuthConfig, SessionConfig};
use crate::error::AuthError;
use crate::role::Role;
use crate::session::{Session, SessionUpdate, now_unix};

/// Exchanges credentials for sessions through an [`IdentityBackend`].
#[derive(Clone)]
pub struct IdentityProviderAdapter {
    backend: Arc<dyn IdentityBackend>,
    max_age: Duration,
    access_token_lifetime: Duration,
}

impl IdentityProviderAdapter {
    /// Creates an adapter over any backend implementation.
    #[must_use]
    pub fn new(backend: Arc<dyn IdentityBackend>, session: &SessionConfig) -> Self {
        Self {
            backend,
            max_age: session.max_age,
            access_token_lifetime: session.access_token_lifetime,
        }
    }

    /// Creates an adapter talking HTTP to the configured backend.
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let backend = HttpIdentityBackend::from_config(config)?;
        Ok(Self::new(Arc::new(backend), &config.session))
    }

    /// The backend in use.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn IdentityBackend> {
        &self.backend
    }

    /// Signs in with an email and password.
    ///
    /// # Errors
    ///
    /// - `AuthError::Validation` if either field is empty (no request is made)
    /// - `AuthError::AuthenticationFailed` if the backend refuses the
    ///   credentials or returns no access token
    /// - `AuthError::Network` on transport failure
    pub async fn login_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AuthError::validation("email", "Email is required"));
        }
        if password.is_empty() {
            return Err(AuthError::validation("password", "Password is required"));
        }

        let tokens = self.backend.obtain_token(email, password).await?;
        if tokens.access.trim().is_empty() {
            return Err(AuthError::authentication_failed(
                "backend returned no access token",
            ));
        }
        let user = self.backend.current_user(&tokens.access).await?;

        tracing::info!(user_id = %user.id, role = %user.role, "Password login succeeded");
        Ok(self.mint(user, tokens))
    }

    /// Signs in a user authenticated by an external provider.
    ///
    /// First-time users are registered by the backend with `desired_role`,
    /// or with the default OAuth role when `desired_role` is not
    /// self-selectable. Returning users keep the role the backend has on
    /// record.
    pub async fn login_with_profile(
        &self,
        profile: &ProviderProfile,
        desired_role: Role,
    ) -> Result<Session, AuthError> {
        let email = profile.email.clone().ok_or_else(|| {
            AuthError::identity_provider(&profile.provider, "provider did not share an email")
        })?;
        let (first_name, last_name) = profile.name_parts();
        let role = if desired_role.is_self_selectable() {
            desired_role
        } else {
            DEFAULT_OAUTH_ROLE
        };

        let request = SocialLoginRequest {
            email,
            first_name,
            last_name,
            provider: profile.provider.clone(),
            role,
        };
        let response = self.backend.social_login(&request).await?;
        let access = response
            .access
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| AuthError::authentication_failed("backend returned no access token"))?;

        tracing::info!(
            user_id = %response.user.id,
            provider = %profile.provider,
            role = %response.user.role,
            "Social login succeeded"
        );
        Ok(self.mint(
            response.user,
            TokenPair {
                access,
                refresh: response.refresh,
            },
        ))
    }

    /// Obtains a fresh access token for `session`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionExpired` when the session has no refresh
    /// token, otherwise whatever the backend call fails with.
    pub async fn refresh(&self, session: &Session) -> Result<SessionUpdate, AuthError> {
        let refresh_token = session
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::SessionExpired)?;

        let tokens = self.backend.refresh_token(refresh_token).await?;
        if tokens.access.trim().is_empty() {
            return Err(AuthError::authentication_failed(
                "backend returned no access token",
            ));
        }
        let expires_at = self.access_expiry(&tokens.access, now_unix());
        tracing::debug!(user_id = %session.user_id, "Access token refreshed");
        Ok(SessionUpdate::default().with_tokens(tokens.access, tokens.refresh, expires_at))
    }

    /// Stores a functional role for the session's user and returns the
    /// claim update to merge into the session.
    ///
    /// # Errors
    ///
    /// - `AuthError::Validation` if `role` is not self-selectable
    /// - `AuthError::Forbidden` if the session already has a role
    pub async fn select_role(
        &self,
        session: &Session,
        role: Role,
    ) -> Result<SessionUpdate, AuthError> {
        if !role.is_self_selectable() {
            return Err(AuthError::validation(
                "role",
                format!("'{role}' cannot be selected"),
            ));
        }
        if !session.role.is_pending() {
            return Err(AuthError::forbidden(format!(
                "role already chosen ('{}')",
                session.role
            )));
        }

        let assignment = self.backend.update_role(&session.access_token, role).await?;
        tracing::info!(user_id = %session.user_id, role = %assignment.role, "Role updated");

        let mut update = SessionUpdate::role(assignment.role);
        if let Some(verified) = assignment.is_verified {
            update = update.with_verified(verified);
        }
        Ok(update)
    }

    /// Creates an account and signs it in with the same credentials.
    pub async fn register(&self, request: &RegistrationRequest) -> Result<Session, AuthError> {
        let user = self.backend.register(request).await?;
        tracing::info!(user_id = %user.id, role = %user.role, "Account registered");
        self.login_with_password(&request.email, &request.password)
            .await
    }

    /// Expiry of an access token: its `exp` claim when readable, otherwise
    /// `now` plus the configured lifetime.
    #[must_use]
    pub fn access_expiry(&self, access_token: &str, now: i64) -> i64 {
        jwt_expiry(access_token).unwrap_or(now + self.access_token_lifetime.as_secs() as i64)
    }

    fn mint(&self, user: BackendUser, tokens: TokenPair) -> Session {
        let now = now_unix();
        Session {
            user_id: user.id,
            email: user.email,
            role: user.role,
            is_verified: user.is_verified,
            access_expires_at: self.access_expiry(&tokens.access, now),
            access_token: tokens.access,
            refresh_token: tokens.refresh,
            issued_at: now,
            expires_at: now + self.max_age.as_secs() as i64,
        }
    }
}

impl std::fmt::Debug for IdentityProviderAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityProviderAdapter")
            .field("max_age", &self.max_age)
            .field("access_token_lifetime", &self.access_token_lifetime)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: Option<i64>,
}

/// Reads the `exp` claim of a JWT without verifying it.
///
/// The token is opaque to us; the backend is the one that validates it.
fn jwt_expiry(token: &str) -> Option<i64> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<ExpiryClaim>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()?
        .claims
        .exp
}
