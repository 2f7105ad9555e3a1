//! Backend REST API client.
//!
//! The backend owns users, credentials and roles. This module exposes it
//! through the [`IdentityBackend`] trait and implements that trait over HTTP
//! with `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::role::Role;

const TOKEN_PATH: &str = "api/token/";
const TOKEN_REFRESH_PATH: &str = "api/token/refresh/";
const CURRENT_USER_PATH: &str = "api/users/me/";
const SOCIAL_LOGIN_PATH: &str = "api/users/social_login/";
const UPDATE_ROLE_PATH: &str = "api/users/update_role/";
const REGISTER_PATH: &str = "api/users/register/";

/// Access/refresh token pair issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Empty when the backend answered without one.
    #[serde(default)]
    pub access: String,
    /// Absent when the backend does not rotate refresh tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

/// User record returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendUser {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Backends emit numeric or string ids.
fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Number(i64),
        Text(String),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Number(n) => n.to_string(),
        Id::Text(s) => s,
    })
}

/// Normalized payload forwarded after an OAuth sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SocialLoginRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub provider: String,
    /// Role requested for a first-time user.
    pub role: Role,
}

/// Backend answer to a social login.
#[derive(Debug, Clone, Deserialize)]
pub struct SocialLoginResponse {
    #[serde(default)]
    pub access: Option<String>,
    #[serde(default)]
    pub refresh: Option<String>,
    pub user: BackendUser,
}

/// Role stored by the backend after an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RoleAssignment {
    pub role: Role,
    #[serde(default)]
    pub is_verified: Option<bool>,
}

/// Account creation payload produced by the registration wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationRequest {
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub university: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agency_name: Option<String>,
    #[serde(rename = "license_number", skip_serializing_if = "Option::is_none")]
    pub licence_number: Option<String>,
}

/// Operations the backend offers for identity and roles.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Exchanges an email and password for a token pair.
    async fn obtain_token(&self, email: &str, password: &str) -> Result<TokenPair, AuthError>;

    /// Fetches the user owning `access_token`.
    async fn current_user(&self, access_token: &str) -> Result<BackendUser, AuthError>;

    /// Signs in (registering on first contact) a user authenticated by an
    /// external provider.
    async fn social_login(
        &self,
        request: &SocialLoginRequest,
    ) -> Result<SocialLoginResponse, AuthError>;

    /// Trades a refresh token for a new access token.
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, AuthError>;

    /// Stores a new role for the user owning `access_token`.
    async fn update_role(&self, access_token: &str, role: Role)
    -> Result<RoleAssignment, AuthError>;

    /// Creates an account.
    async fn register(&self, request: &RegistrationRequest) -> Result<BackendUser, AuthError>;
}

/// How non-2xx statuses of a call are classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    /// Credential or bearer-token calls: 400/401/403 mean bad credentials.
    Credentials,
    /// Account creation: 400 carries field errors.
    Registration,
}

/// [`IdentityBackend`] over the backend's REST API.
#[derive(Debug, Clone)]
pub struct HttpIdentityBackend {
    base_url: Url,
    http_client: reqwest::Client,
}

impl HttpIdentityBackend {
    /// Creates a client for the API rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the URL does not parse or the
    /// HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AuthError> {
        let mut base_url = Url::parse(base_url).map_err(|e| {
            AuthError::configuration(format!("Invalid API base URL '{base_url}': {e}"))
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            http_client,
        })
    }

    /// Creates a client from the authentication config.
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        Self::new(&config.api_base_url, config.request_timeout)
    }

    /// Root URL of the backend API.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        self.base_url
            .join(path)
            .map_err(|e| AuthError::internal(format!("Failed to build URL for {path}: {e}")))
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        kind: CallKind,
    ) -> Result<T, AuthError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(|e| {
                AuthError::internal(format!("Failed to parse backend response: {e}"))
            });
        }

        let body = response.text().await.unwrap_or_default();
        let (field, detail) = backend_message(&body);
        tracing::debug!(status = status.as_u16(), body = %body, "Backend rejected request");

        Err(match (kind, status.as_u16()) {
            (CallKind::Registration, 400) => AuthError::validation(
                field.unwrap_or_else(|| "registration".to_string()),
                detail.unwrap_or_else(|| "Registration was rejected".to_string()),
            ),
            (_, 400 | 401 | 403) => AuthError::authentication_failed(
                detail.unwrap_or_else(|| format!("Backend answered {status}")),
            ),
            (_, code) => AuthError::backend_rejected(
                code,
                detail.unwrap_or_else(|| format!("Backend answered {status}")),
            ),
        })
    }
}

/// Pulls a human-readable message (and the offending field, if any) out of a
/// backend error body such as `{"detail": "..."}` or `{"email": ["..."]}`.
fn backend_message(body: &str) -> (Option<String>, Option<String>) {
    let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body)
    else {
        return (None, None);
    };

    let text = |value: &serde_json::Value| match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(items) => items.iter().find_map(|i| i.as_str().map(String::from)),
        _ => None,
    };

    for key in ["detail", "error", "message", "non_field_errors"] {
        if let Some(message) = map.get(key).and_then(text) {
            return (None, Some(message));
        }
    }
    map.iter()
        .find_map(|(field, value)| text(value).map(|m| (Some(field.clone()), Some(m))))
        .unwrap_or((None, None))
}

#[async_trait]
impl IdentityBackend for HttpIdentityBackend {
    async fn obtain_token(&self, email: &str, password: &str) -> Result<TokenPair, AuthError> {
        let url = self.endpoint(TOKEN_PATH)?;
        let body = serde_json::json!({ "email": email, "password": password });
        self.send(self.http_client.post(url).json(&body), CallKind::Credentials)
            .await
    }

    async fn current_user(&self, access_token: &str) -> Result<BackendUser, AuthError> {
        let url = self.endpoint(CURRENT_USER_PATH)?;
        self.send(
            self.http_client.get(url).bearer_auth(access_token),
            CallKind::Credentials,
        )
        .await
    }

    async fn social_login(
        &self,
        request: &SocialLoginRequest,
    ) -> Result<SocialLoginResponse, AuthError> {
        let url = self.endpoint(SOCIAL_LOGIN_PATH)?;
        self.send(self.http_client.post(url).json(request), CallKind::Credentials)
            .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let url = self.endpoint(TOKEN_REFRESH_PATH)?;
        let body = serde_json::json!({ "refresh": refresh_token });
        self.send(self.http_client.post(url).json(&body), CallKind::Credentials)
            .await
    }

    async fn update_role(
        &self,
        access_token: &str,
        role: Role,
    ) -> Result<RoleAssignment, AuthError> {
        let url = self.endpoint(UPDATE_ROLE_PATH)?;
        let body = serde_json::json!({ "role": role });
        self.send(
            self.http_client.post(url).bearer_auth(access_token).json(&body),
            CallKind::Credentials,
        )
        .await
    }

    async fn register(&self, request: &RegistrationRequest) -> Result<BackendUser, AuthError> {
        let url = self.endpoint(REGISTER_PATH)?;
        self.send(self.http_client.post(url).json(request), CallKind::Registration)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn backend(server: &MockServer) -> HttpIdentityBackend {
        HttpIdentityBackend::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let backend =
            HttpIdentityBackend::new("http://api.example/v1", Duration::from_secs(1)).unwrap();
        assert_eq!(
            backend.endpoint(TOKEN_PATH).unwrap().as_str(),
            "http://api.example/v1/api/token/"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = HttpIdentityBackend::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, AuthError::Configuration { .. }));
    }

    #[test]
    fn test_backend_user_accepts_numeric_id() {
        let user: BackendUser = serde_json::from_value(json!({
            "id": 7,
            "email": "a@b.c",
            "role": "landlord"
        }))
        .unwrap();
        assert_eq!(user.id, "7");
        assert_eq!(user.role, Role::Landlord);
        assert!(!user.is_verified);
    }

    #[test]
    fn test_backend_message_extraction() {
        assert_eq!(
            backend_message(r#"{"detail": "No active account"}"#),
            (None, Some("No active account".to_string()))
        );
        assert_eq!(
            backend_message(r#"{"email": ["user with this email already exists."]}"#),
            (
                Some("email".to_string()),
                Some("user with this email already exists.".to_string())
            )
        );
        assert_eq!(backend_message("<html>"), (None, None));
    }

    #[tokio::test]
    async fn test_obtain_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token/"))
            .and(body_json(json!({ "email": "sam@example.com", "password": "hunter22" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "access": "a", "refresh": "r" })),
            )
            .mount(&server)
            .await;

        let pair = backend(&server)
            .await
            .obtain_token("sam@example.com", "hunter22")
            .await
            .unwrap();
        assert_eq!(pair.access, "a");
        assert_eq!(pair.refresh.as_deref(), Some("r"));
    }

    #[tokio::test]
    async fn test_token_response_without_access() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "refresh": "r" })))
            .mount(&server)
            .await;

        let pair = backend(&server)
            .await
            .obtain_token("sam@example.com", "hunter22")
            .await
            .unwrap();
        assert!(pair.access.is_empty());
    }

    #[tokio::test]
    async fn test_bad_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token/"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "detail": "No active account" })),
            )
            .mount(&server)
            .await;

        let err = backend(&server)
            .await
            .obtain_token("sam@example.com", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AuthenticationFailed { .. }));
        assert!(err.to_string().contains("No active account"));
    }

    #[tokio::test]
    async fn test_server_error_is_backend_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/users/me/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = backend(&server).await.current_user("t").await.unwrap_err();
        assert!(matches!(err, AuthError::BackendRejected { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_update_role_sends_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/users/update_role/"))
            .and(header("authorization", "Bearer tok"))
            .and(body_json(json!({ "role": "student" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "role": "student" })))
            .expect(1)
            .mount(&server)
            .await;

        let assignment = backend(&server)
            .await
            .update_role("tok", Role::Student)
            .await
            .unwrap();
        assert_eq!(assignment.role, Role::Student);
        assert_eq!(assignment.is_verified, None);
    }

    #[tokio::test]
    async fn test_registration_field_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/users/register/"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "email": ["user with this email already exists."]
            })))
            .mount(&server)
            .await;

        let request = RegistrationRequest {
            role: Role::Student,
            first_name: "Sam".to_string(),
            last_name: "Lee".to_string(),
            email: "sam@example.com".to_string(),
            phone: None,
            password: "hunter222".to_string(),
            university: Some("Uni".to_string()),
            student_id: None,
            properties_count: None,
            agency_name: None,
            licence_number: None,
        };
        let err = backend(&server).await.register(&request).await.unwrap_err();
        match err {
            AuthError::Validation { field, message } => {
                assert_eq!(field, "email");
                assert!(message.contains("already exists"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_failure() {
        let backend =
            HttpIdentityBackend::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let err = backend.refresh_token("r").await.unwrap_err();
        assert!(matches!(err, AuthError::Network { .. }));
    }
}
