//! Authentication and session configuration.
//!
//! # Example (TOML)
//!
//! ```toml
//! [auth]
//! api_base_url = "https://api.unistay.example"
//!
//! [auth.session]
//! secret = "a-long-random-secret-of-at-least-32-bytes"
//! max_age = "30d"
//!
//! [[auth.oauth.providers]]
//! id = "google"
//! client_id = "..."
//! client_secret = "..."
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::identity::provider::OAuthProviderConfig;

/// Minimum length of the session signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Root authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Base URL of the backend REST API.
    pub api_base_url: String,

    /// Timeout applied to every backend and provider request.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Session lifetime and signing.
    pub session: SessionConfig,

    /// Session cookie attributes.
    pub cookie: CookieConfig,

    /// External OAuth providers.
    pub oauth: OAuthConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            request_timeout: Duration::from_secs(15),
            session: SessionConfig::default(),
            cookie: CookieConfig::default(),
            oauth: OAuthConfig::default(),
        }
    }
}

/// Session lifetime and signing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// HMAC secret used to sign session, OAuth state and wizard tokens.
    /// Required; empty by default.
    pub secret: String,

    /// Maximum age of a session. Past it the session reads as
    /// unauthenticated regardless of token validity.
    #[serde(with = "humantime_serde")]
    pub max_age: Duration,

    /// Refresh the access token when it expires within this window.
    #[serde(with = "humantime_serde")]
    pub refresh_window: Duration,

    /// Assumed access token lifetime when the token carries no readable `exp`.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            // No usable default: a deployment must provide its own key.
            secret: String::new(),
            max_age: Duration::from_secs(30 * 24 * 3600), // 30 days
            refresh_window: Duration::from_secs(60),
            access_token_lifetime: Duration::from_secs(300), // 5 minutes
        }
    }
}

/// Session cookie attributes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Cookie name.
    pub name: String,
    /// Set the `Secure` attribute.
    pub secure: bool,
    /// `SameSite` policy: "strict", "lax" or "none".
    pub same_site: String,
    /// Cookie path.
    pub path: String,
    /// Optional cookie domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "unistay.session".to_string(),
            secure: false,
            same_site: "lax".to_string(),
            path: "/".to_string(),
            domain: None,
        }
    }
}

/// OAuth provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Public base URL of this frontend, used to build callback URLs.
    pub public_base_url: String,

    /// Lifetime of the signed `state` parameter.
    #[serde(with = "humantime_serde")]
    pub state_ttl: Duration,

    /// Configured providers.
    pub providers: Vec<OAuthProviderConfig>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:3000".to_string(),
            state_ttl: Duration::from_secs(600),
            providers: Vec::new(),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the API URL is empty or unparsable, the secret
    /// is missing or too short, a lifetime is zero, or a provider is misconfigured.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.is_empty() {
            return Err(ConfigError::Missing("auth.api_base_url".to_string()));
        }
        if url::Url::parse(&self.api_base_url).is_err() {
            return Err(ConfigError::InvalidValue(format!(
                "auth.api_base_url is not a valid URL: '{}'",
                self.api_base_url
            )));
        }

        if self.session.secret.trim().is_empty() {
            return Err(ConfigError::Missing(
                "auth.session.secret (e.g. UNISTAY__AUTH__SESSION__SECRET)".to_string(),
            ));
        }
        if self.session.secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::InvalidValue(format!(
                "auth.session.secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        if self.session.max_age.is_zero() {
            return Err(ConfigError::InvalidValue(
                "auth.session.max_age must be > 0".to_string(),
            ));
        }
        if self.session.access_token_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "auth.session.access_token_lifetime must be > 0".to_string(),
            ));
        }

        match self.cookie.same_site.to_ascii_lowercase().as_str() {
            "strict" | "lax" | "none" => {}
            other => {
                return Err(ConfigError::InvalidValue(format!(
                    "Invalid cookie same_site: '{other}'. Must be strict, lax, or none"
                )));
            }
        }

        if url::Url::parse(&self.oauth.public_base_url).is_err() {
            return Err(ConfigError::InvalidValue(format!(
                "auth.oauth.public_base_url is not a valid URL: '{}'",
                self.oauth.public_base_url
            )));
        }
        for provider in &self.oauth.providers {
            if provider.id.is_empty() {
                return Err(ConfigError::Missing("auth.oauth.providers[].id".to_string()));
            }
            if provider.client_id.is_empty() {
                return Err(ConfigError::Missing(format!(
                    "client_id for OAuth provider '{}'",
                    provider.id
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> AuthConfig {
        let mut config = AuthConfig::default();
        config.session.secret = "config-test-secret-config-test-secret".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = AuthConfig::default();
        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert_eq!(config.session.max_age, Duration::from_secs(30 * 24 * 3600));
        assert_eq!(config.cookie.name, "unistay.session");
        assert!(config.oauth.providers.is_empty());
    }

    #[test]
    fn test_default_config_requires_secret() {
        let err = AuthConfig::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
        assert!(err.to_string().contains("auth.session.secret"));

        let mut blank = AuthConfig::default();
        blank.session.secret = " ".repeat(MIN_SECRET_LEN);
        assert!(matches!(blank.validate(), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_configured_secret_validates() {
        assert!(configured().validate().is_ok());
    }

    #[test]
    fn test_short_secret_fails_validation() {
        let mut config = configured();
        config.session.secret = "short".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
        assert!(err.to_string().contains("secret"));
    }

    #[test]
    fn test_invalid_same_site_fails_validation() {
        let mut config = configured();
        config.cookie.same_site = "sometimes".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("same_site"));
    }

    #[test]
    fn test_provider_without_client_id_fails_validation() {
        let mut config = configured();
        config
            .oauth
            .providers
            .push(OAuthProviderConfig::google("", None));
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn test_humantime_durations_deserialize() {
        let json = r#"{
            "session": { "max_age": "12h", "refresh_window": "30s" },
            "request_timeout": "5s"
        }"#;
        let config: AuthConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.session.max_age, Duration::from_secs(12 * 3600));
        assert_eq!(config.session.refresh_window, Duration::from_secs(30));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        // Unspecified fields keep their defaults
        assert_eq!(config.cookie.path, "/");
    }
}
