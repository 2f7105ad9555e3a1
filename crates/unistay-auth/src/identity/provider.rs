//! External OAuth provider configuration and profile normalization.
//!
//! # Example
//!
//! ```ignore
//! use unistay_auth::identity::provider::OAuthProviderConfig;
//!
//! let google = OAuthProviderConfig::google("client-id", Some("client-secret".into()))
//!     .with_scope("https://www.googleapis.com/auth/user.birthday.read");
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AuthError;

/// Configuration for an external OAuth 2.0 provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthProviderConfig {
    /// Unique identifier (e.g., "google", "facebook"). Used in callback URLs
    /// and forwarded to the backend as the `provider` field.
    pub id: String,

    /// Human-readable name for buttons.
    #[serde(default)]
    pub name: String,

    /// OAuth client ID registered with the provider.
    pub client_id: String,

    /// OAuth client secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Authorization endpoint. Well-known providers fill this in.
    #[serde(default)]
    pub authorization_endpoint: String,

    /// Token endpoint. Well-known providers fill this in.
    #[serde(default)]
    pub token_endpoint: String,

    /// Userinfo endpoint. Well-known providers fill this in.
    #[serde(default)]
    pub userinfo_endpoint: String,

    /// Scopes to request.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Whether this provider is offered.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Additional parameters for the authorization URL.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_auth_params: Vec<(String, String)>,
}

fn default_true() -> bool {
    true
}

impl OAuthProviderConfig {
    /// Creates a provider with explicit endpoints.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        client_id: impl Into<String>,
        authorization_endpoint: impl Into<String>,
        token_endpoint: impl Into<String>,
        userinfo_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            client_id: client_id.into(),
            client_secret: None,
            authorization_endpoint: authorization_endpoint.into(),
            token_endpoint: token_endpoint.into(),
            userinfo_endpoint: userinfo_endpoint.into(),
            scopes: Vec::new(),
            enabled: true,
            extra_auth_params: Vec::new(),
        }
    }

    /// Google with its published endpoints.
    #[must_use]
    pub fn google(client_id: impl Into<String>, client_secret: Option<String>) -> Self {
        Self {
            client_secret,
            ..Self::new("google", "Google", client_id, "", "", "")
        }
        .with_well_known_defaults()
    }

    /// Facebook with its published endpoints.
    #[must_use]
    pub fn facebook(client_id: impl Into<String>, client_secret: Option<String>) -> Self {
        Self {
            client_secret,
            ..Self::new("facebook", "Facebook", client_id, "", "", "")
        }
        .with_well_known_defaults()
    }

    /// Fills unset endpoints, name and scopes for well-known provider ids.
    #[must_use]
    pub fn with_well_known_defaults(mut self) -> Self {
        let (name, auth, token, userinfo, scopes): (&str, &str, &str, &str, &[&str]) =
            match self.id.as_str() {
                "google" => (
                    "Google",
                    "https://accounts.google.com/o/oauth2/v2/auth",
                    "https://oauth2.googleapis.com/token",
                    "https://openidconnect.googleapis.com/v1/userinfo",
                    &["openid", "email", "profile"],
                ),
                "facebook" => (
                    "Facebook",
                    "https://www.facebook.com/v19.0/dialog/oauth",
                    "https://graph.facebook.com/v19.0/oauth/access_token",
                    "https://graph.facebook.com/me?fields=id,name,email,first_name,last_name",
                    &["email", "public_profile"],
                ),
                _ => return self,
            };
        if self.name.is_empty() {
            self.name = name.to_string();
        }
        if self.authorization_endpoint.is_empty() {
            self.authorization_endpoint = auth.to_string();
        }
        if self.token_endpoint.is_empty() {
            self.token_endpoint = token.to_string();
        }
        if self.userinfo_endpoint.is_empty() {
            self.userinfo_endpoint = userinfo.to_string();
        }
        if self.scopes.is_empty() {
            self.scopes = scopes.iter().map(|s| (*s).to_string()).collect();
        }
        self
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Adds a scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(scope.into());
        self
    }

    /// Adds an extra authorization parameter.
    #[must_use]
    pub fn with_extra_auth_param(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.extra_auth_params.push((key.into(), value.into()));
        self
    }

    /// Returns `true` once every endpoint is known.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.authorization_endpoint.is_empty()
            && !self.token_endpoint.is_empty()
            && !self.userinfo_endpoint.is_empty()
    }
}

/// Profile returned by an OAuth provider after a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderProfile {
    /// Provider id (e.g., "google").
    pub provider: String,
    /// Provider-side subject identifier.
    pub subject: String,
    pub email: Option<String>,
    /// Display name.
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

impl ProviderProfile {
    /// Extracts a profile from a userinfo document.
    ///
    /// Accepts both OIDC claim names (`sub`, `given_name`, `family_name`) and
    /// Graph API names (`id`, `first_name`, `last_name`).
    pub fn from_userinfo(provider: &str, userinfo: &Value) -> Result<Self, AuthError> {
        let text = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| userinfo.get(*k))
                .and_then(|v| match v {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .filter(|s| !s.is_empty())
        };

        let subject = text(&["sub", "id"]).ok_or_else(|| {
            AuthError::identity_provider(provider, "userinfo has no subject identifier")
        })?;

        Ok(Self {
            provider: provider.to_string(),
            subject,
            email: text(&["email"]).map(|e| e.to_ascii_lowercase()),
            name: text(&["name"]),
            given_name: text(&["given_name", "first_name"]),
            family_name: text(&["family_name", "last_name"]),
        })
    }

    /// First and last name for the backend.
    ///
    /// Given/family claims win; otherwise the display name is split at its
    /// first whitespace run.
    #[must_use]
    pub fn name_parts(&self) -> (String, String) {
        if let Some(given) = &self.given_name {
            return (given.clone(), self.family_name.clone().unwrap_or_default());
        }
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => match name.split_once(char::is_whitespace) {
                Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
                None => (name.to_string(), String::new()),
            },
            _ => (String::new(), self.family_name.clone().unwrap_or_default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_well_known_defaults() {
        let google = OAuthProviderConfig::google("cid", Some("secret".to_string()));
        assert_eq!(google.name, "Google");
        assert!(google.is_complete());
        assert!(google.scopes.contains(&"email".to_string()));
        assert_eq!(google.client_secret.as_deref(), Some("secret"));

        let custom = OAuthProviderConfig::new("acme", "", "cid", "", "", "").with_well_known_defaults();
        assert!(!custom.is_complete());
    }

    #[test]
    fn test_provider_deserializes_with_defaults() {
        let provider: OAuthProviderConfig = serde_json::from_value(json!({
            "id": "facebook",
            "client_id": "fb-client"
        }))
        .unwrap();
        assert!(provider.enabled);
        assert!(!provider.is_complete());
        assert!(provider.with_well_known_defaults().is_complete());
    }

    #[test]
    fn test_profile_from_oidc_userinfo() {
        let profile = ProviderProfile::from_userinfo(
            "google",
            &json!({
                "sub": "1098",
                "email": "Sam.Lee@Example.com",
                "name": "Sam Lee",
                "given_name": "Sam",
                "family_name": "Lee"
            }),
        )
        .unwrap();
        assert_eq!(profile.subject, "1098");
        assert_eq!(profile.email.as_deref(), Some("sam.lee@example.com"));
        assert_eq!(profile.name_parts(), ("Sam".to_string(), "Lee".to_string()));
    }

    #[test]
    fn test_profile_from_graph_userinfo() {
        let profile = ProviderProfile::from_userinfo(
            "facebook",
            &json!({ "id": 5501, "name": "Ada  King Lovelace", "email": "ada@example.com" }),
        )
        .unwrap();
        assert_eq!(profile.subject, "5501");
        assert_eq!(
            profile.name_parts(),
            ("Ada".to_string(), "King Lovelace".to_string())
        );
    }

    #[test]
    fn test_profile_without_subject_fails() {
        let err = ProviderProfile::from_userinfo("google", &json!({ "email": "a@b.c" })).unwrap_err();
        assert!(matches!(err, AuthError::IdentityProvider { .. }));
    }

    #[test]
    fn test_name_parts_fallbacks() {
        let mut profile = ProviderProfile {
            provider: "google".to_string(),
            subject: "1".to_string(),
            email: None,
            name: Some("Cher".to_string()),
            given_name: None,
            family_name: None,
        };
        assert_eq!(profile.name_parts(), ("Cher".to_string(), String::new()));

        profile.name = None;
        assert_eq!(profile.name_parts(), (String::new(), String::new()));
    }
}
