//! # unistay-auth
//!
//! Session and role authorization core of the UniStay frontend.
//!
//! This crate provides:
//! - An identity provider adapter that exchanges passwords or OAuth profiles
//!   for backend-issued tokens
//! - A session store with subscribe/notify, a maximum session age and
//!   ahead-of-expiry token refresh
//! - A role guard that allows or redirects every protected navigation
//! - The registration wizard state machine
//!
//! ## Overview
//!
//! Users authenticate through the [`identity`] adapter, which mints a
//! [`Session`]. The session is owned by a [`SessionStore`] and persisted as a
//! signed token. Every protected navigation is checked by the [`RoleGuard`].
//!
//! ## Modules
//!
//! - [`config`] - Authentication, session and cookie configuration
//! - [`role`] - The role claim
//! - [`session`] - Session model, signed tokens and the session store
//! - [`identity`] - Backend API, OAuth providers and the adapter
//! - [`guard`] - Protected routes and the navigation guard
//! - [`wizard`] - Registration wizard
//! - [`middleware`] - axum integration (session cookie, error responses)

pub mod config;
pub mod error;
pub mod guard;
pub mod identity;
pub mod middleware;
pub mod role;
pub mod session;
pub mod wizard;

pub use config::{AuthConfig, ConfigError};
pub use error::{AuthError, ErrorCategory};
pub use guard::{GuardDecision, ProtectedRoute, RedirectReason, RoleGuard, RouteTable};
pub use identity::{
    HttpIdentityBackend, IdentityBackend, IdentityProviderAdapter, OAuthClient, ProviderProfile,
};
pub use middleware::SessionCookies;
pub use role::Role;
pub use session::{
    Session, SessionCodec, SessionPolicy, SessionSnapshot, SessionStatus, SessionStore,
    SessionUpdate, SessionView,
};
pub use wizard::{RegistrationWizard, StepInput, WizardStep};

/// Type alias for authentication results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use unistay_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::config::{AuthConfig, ConfigError};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::guard::{GuardDecision, RedirectReason, RoleGuard, RouteTable};
    pub use crate::identity::{IdentityBackend, IdentityProviderAdapter, OAuthClient};
    pub use crate::middleware::SessionCookies;
    pub use crate::role::Role;
    pub use crate::session::{Session, SessionStatus, SessionStore, SessionUpdate};
    pub use crate::wizard::{RegistrationWizard, StepInput, WizardStep};
}
