//! OAuth 2.0 authorization code flow against external providers.
//!
//! The flow keeps no server-side state: the `state` parameter is a signed
//! token carrying a CSRF nonce, the provider, the role the user asked for and
//! where to send them afterwards.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use url::Url;

use super::provider::{OAuthProviderConfig, ProviderProfile};
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::guard::sanitize_callback;
use crate::role::Role;
use crate::session::{SessionCodec, now_unix};

/// `typ` claim of OAuth state tokens.
pub const OAUTH_STATE_TYPE: &str = "oauth_state";

/// Role granted to first-time OAuth users who did not ask for one.
pub const DEFAULT_OAUTH_ROLE: Role = Role::Student;

/// Resolves the role a user may request through the OAuth flow.
///
/// Only self-selectable roles are honoured; anything else falls back to
/// [`DEFAULT_OAUTH_ROLE`].
#[must_use]
pub fn desired_role(raw: Option<&str>) -> Role {
    raw.map(Role::from_claim)
        .filter(Role::is_self_selectable)
        .unwrap_or(DEFAULT_OAUTH_ROLE)
}

/// Claims of the signed `state` parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthState {
    pub typ: String,
    /// CSRF nonce.
    pub nonce: String,
    pub provider: String,
    /// Role requested for a first-time user.
    pub role: Role,
    /// Same-origin path to continue to after sign-in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<String>,
    pub exp: i64,
}

/// Everything needed to send the browser to a provider.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Provider authorization URL, including the `state` parameter.
    pub url: Url,
    /// Signed state token.
    pub state: String,
    /// Nonce embedded in the state.
    pub nonce: String,
}

#[derive(Debug, Deserialize)]
struct ProviderTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Client for the configured OAuth providers.
pub struct OAuthClient {
    providers: BTreeMap<String, OAuthProviderConfig>,
    codec: Arc<SessionCodec>,
    public_base_url: Url,
    state_ttl: Duration,
    http_client: reqwest::Client,
}

impl OAuthClient {
    /// Creates a client for every enabled provider in `config`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` when the public URL does not parse
    /// or a provider lacks an endpoint after well-known defaults are applied.
    pub fn new(config: &AuthConfig, codec: Arc<SessionCodec>) -> Result<Self, AuthError> {
        let public_base_url = Url::parse(&config.oauth.public_base_url).map_err(|e| {
            AuthError::configuration(format!(
                "Invalid public base URL '{}': {e}",
                config.oauth.public_base_url
            ))
        })?;

        let mut providers = BTreeMap::new();
        for provider in &config.oauth.providers {
            if !provider.enabled {
                tracing::debug!(provider = %provider.id, "Skipping disabled OAuth provider");
                continue;
            }
            let provider = provider.clone().with_well_known_defaults();
            if !provider.is_complete() {
                return Err(AuthError::configuration(format!(
                    "OAuth provider '{}' is missing an endpoint",
                    provider.id
                )));
            }
            tracing::info!(provider = %provider.id, "Registered OAuth provider");
            providers.insert(provider.id.clone(), provider);
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AuthError::configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            providers,
            codec,
            public_base_url,
            state_ttl: config.oauth.state_ttl,
            http_client,
        })
    }

    /// Enabled providers, ordered by id.
    pub fn providers(&self) -> impl Iterator<Item = &OAuthProviderConfig> {
        self.providers.values()
    }

    /// Looks up an enabled provider.
    pub fn provider(&self, provider_id: &str) -> Result<&OAuthProviderConfig, AuthError> {
        self.providers.get(provider_id).ok_or_else(|| {
            AuthError::identity_provider(provider_id, "provider is not configured")
        })
    }

    /// Callback URL registered with the provider.
    pub fn redirect_uri(&self, provider_id: &str) -> Result<Url, AuthError> {
        self.public_base_url
            .join(&format!("/auth/callback/{provider_id}"))
            .map_err(|e| AuthError::internal(format!("Failed to build redirect URI: {e}")))
    }

    /// Builds the provider authorization URL for a sign-in attempt.
    pub fn authorization_url(
        &self,
        provider_id: &str,
        role: Role,
        callback: Option<&str>,
    ) -> Result<AuthorizationRequest, AuthError> {
        let provider = self.provider(provider_id)?;

        let nonce = {
            use rand::Rng;
            let bytes: [u8; 16] = rand::thread_rng().r#gen();
            URL_SAFE_NO_PAD.encode(bytes)
        };
        let claims = OAuthState {
            typ: OAUTH_STATE_TYPE.to_string(),
            nonce: nonce.clone(),
            provider: provider.id.clone(),
            role: if role.is_self_selectable() {
                role
            } else {
                DEFAULT_OAUTH_ROLE
            },
            callback: callback.and_then(sanitize_callback),
            exp: now_unix() + self.state_ttl.as_secs() as i64,
        };
        let state = self.codec.encode(&claims)?;

        let mut url = Url::parse(&provider.authorization_endpoint).map_err(|e| {
            AuthError::configuration(format!(
                "Invalid authorization endpoint for '{}': {e}",
                provider.id
            ))
        })?;
        {
            let redirect_uri = self.redirect_uri(&provider.id)?;
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &provider.client_id)
                .append_pair("redirect_uri", redirect_uri.as_str())
                .append_pair("scope", &provider.scopes.join(" "))
                .append_pair("state", &state);
            for (key, value) in &provider.extra_auth_params {
                query.append_pair(key, value);
            }
        }

        tracing::debug!(provider = %provider.id, role = %claims.role, "Starting OAuth sign-in");
        Ok(AuthorizationRequest { url, state, nonce })
    }

    /// Verifies a returned `state` parameter.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::IdentityProvider` if the state is forged, expired,
    /// of another token type, or issued for a different provider.
    pub fn verify_state(&self, provider_id: &str, state: &str) -> Result<OAuthState, AuthError> {
        let claims: OAuthState = self
            .codec
            .decode(state)
            .map_err(|e| AuthError::identity_provider(provider_id, format!("invalid state: {e}")))?;
        if claims.typ != OAUTH_STATE_TYPE {
            return Err(AuthError::identity_provider(
                provider_id,
                "invalid state: wrong token type",
            ));
        }
        if claims.provider != provider_id {
            return Err(AuthError::identity_provider(
                provider_id,
                "state was issued for another provider",
            ));
        }
        Ok(claims)
    }

    /// Exchanges an authorization code for a provider access token.
    pub async fn exchange_code(&self, provider_id: &str, code: &str) -> Result<String, AuthError> {
        let provider = self.provider(provider_id)?;
        let redirect_uri = self.redirect_uri(provider_id)?;

        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
            ("client_id", provider.client_id.as_str()),
        ];
        if let Some(secret) = &provider.client_secret {
            params.push(("client_secret", secret.as_str()));
        }

        tracing::debug!(provider = %provider_id, endpoint = %provider.token_endpoint, "Exchanging authorization code");
        let response = self
            .http_client
            .post(&provider.token_endpoint)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if let Ok(error) = serde_json::from_str::<ProviderErrorResponse>(&body) {
                return Err(AuthError::identity_provider(
                    provider_id,
                    match error.error_description {
                        Some(description) => format!("{}: {description}", error.error),
                        None => error.error,
                    },
                ));
            }
            return Err(AuthError::identity_provider(
                provider_id,
                format!("token exchange failed: HTTP {status}"),
            ));
        }

        let token: ProviderTokenResponse = response.json().await.map_err(|e| {
            AuthError::identity_provider(provider_id, format!("unreadable token response: {e}"))
        })?;
        Ok(token.access_token)
    }

    /// Fetches and normalizes the user's profile.
    pub async fn fetch_profile(
        &self,
        provider_id: &str,
        access_token: &str,
    ) -> Result<ProviderProfile, AuthError> {
        let provider = self.provider(provider_id)?;
        let response = self
            .http_client
            .get(&provider.userinfo_endpoint)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::identity_provider(
                provider_id,
                format!("userinfo request failed: HTTP {}", response.status()),
            ));
        }

        let userinfo: serde_json::Value = response.json().await.map_err(|e| {
            AuthError::identity_provider(provider_id, format!("unreadable userinfo: {e}"))
        })?;
        ProviderProfile::from_userinfo(provider_id, &userinfo)
    }

    /// Completes a callback: verifies the state, exchanges the code and
    /// fetches the profile.
    pub async fn complete(
        &self,
        provider_id: &str,
        code: &str,
        state: &str,
    ) -> Result<(ProviderProfile, OAuthState), AuthError> {
        let state = self.verify_state(provider_id, state)?;
        let access_token = self.exchange_code(provider_id, code).await?;
        let profile = self.fetch_profile(provider_id, &access_token).await?;
        Ok((profile, state))
    }
}

impl std::fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClient")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("public_base_url", &self.public_base_url.as_str())
            .finish_non_exhaustive()
    }
}
