//! Identity provider integration.
//!
//! - [`backend`]: the backend REST API behind the [`IdentityBackend`] trait
//! - [`provider`]: external OAuth provider configuration and profiles
//! - [`oauth`]: the stateless authorization code flow
//! - [`adapter`]: credentials in, [`Session`](crate::session::Session) out

pub mod adapter;
pub mod backend;
pub mod oauth;
pub mod provider;

pub use adapter::IdentityProviderAdapter;
pub use backend::{
    BackendUser, HttpIdentityBackend, IdentityBackend, RegistrationRequest, RoleAssignment,
    SocialLoginRequest, SocialLoginResponse, TokenPair,
};
pub use oauth::{AuthorizationRequest, OAuthClient, OAuthState, desired_role};
pub use provider::{OAuthProviderConfig, ProviderProfile};
