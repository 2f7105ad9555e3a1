use std::sync::Arc;
use std::time::Duration;

use unistay_auth::{
    AuthError, HttpIdentityBackend, IdentityBackend, IdentityProviderAdapter, OAuthClient,
    RoleGuard, SessionCookies, SessionPolicy,
};

use crate::config::AppConfig;
use crate::wizard_sessions::WizardSessions;

/// Cookie binding an OAuth round trip to the browser that started it.
pub const OAUTH_NONCE_COOKIE: &str = "unistay.oauth_nonce";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub adapter: IdentityProviderAdapter,
    pub guard: Arc<RoleGuard>,
    pub cookies: SessionCookies,
    pub oauth: Arc<OAuthClient>,
    pub policy: SessionPolicy,
    pub wizards: WizardSessions,
    pub oauth_state_ttl: Duration,
}

impl AppState {
    /// State talking to the configured backend over HTTP.
    pub fn new(cfg: &AppConfig) -> Result<Self, AuthError> {
        let backend = HttpIdentityBackend::from_config(&cfg.auth)?;
        Self::with_backend(cfg, Arc::new(backend))
    }

    /// State using the given backend, e.g. a mock in tests.
    ///
    /// Fails on an invalid auth configuration, in particular a missing
    /// session secret.
    pub fn with_backend(
        cfg: &AppConfig,
        backend: Arc<dyn IdentityBackend>,
    ) -> Result<Self, AuthError> {
        cfg.auth
            .validate()
            .map_err(|e| AuthError::configuration(e.to_string()))?;
        let cookies = SessionCookies::from_config(&cfg.auth);
        let oauth = OAuthClient::new(&cfg.auth, cookies.codec().clone())?;
        Ok(Self {
            adapter: IdentityProviderAdapter::new(backend, &cfg.auth.session),
            guard: Arc::new(RoleGuard::default()),
            cookies,
            oauth: Arc::new(oauth),
            policy: SessionPolicy::from(&cfg.auth.session),
            wizards: WizardSessions::new(cfg.server.wizard_ttl),
            oauth_state_ttl: cfg.auth.oauth.state_ttl,
        })
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("adapter", &self.adapter)
            .field("guard", &self.guard)
            .field("policy", &self.policy)
            .field("wizards", &self.wizards)
            .finish_non_exhaustive()
    }
}
