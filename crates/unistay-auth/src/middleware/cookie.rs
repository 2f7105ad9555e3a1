//! Signed session cookie.
//!
//! The session travels as an HttpOnly cookie holding the token produced by
//! [`SessionCodec`]. A cookie that fails verification reads as "no session".

use std::sync::Arc;

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::config::{AuthConfig, CookieConfig};
use crate::error::AuthError;
use crate::session::{Session, SessionCodec, now_unix};

/// Reads and writes the session cookie.
#[derive(Debug, Clone)]
pub struct SessionCookies {
    codec: Arc<SessionCodec>,
    config: CookieConfig,
}

impl SessionCookies {
    #[must_use]
    pub fn new(codec: Arc<SessionCodec>, config: CookieConfig) -> Self {
        Self { codec, config }
    }

    /// Builds the codec from the configured secret.
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            Arc::new(SessionCodec::new(&config.session.secret)),
            config.cookie.clone(),
        )
    }

    /// Codec used to sign the cookie, shared with the OAuth state.
    #[must_use]
    pub fn codec(&self) -> &Arc<SessionCodec> {
        &self.codec
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Session carried by the request, if the cookie is present and valid.
    #[must_use]
    pub fn read(&self, jar: &CookieJar) -> Option<Session> {
        let cookie = jar.get(&self.config.name)?;
        match self.codec.decode_session(cookie.value()) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring invalid session cookie");
                None
            }
        }
    }

    /// Adds a cookie carrying `session`, expiring with the session.
    pub fn issue(&self, jar: CookieJar, session: &Session) -> Result<CookieJar, AuthError> {
        let token = self.codec.encode_session(session)?;
        let max_age = (session.expires_at - now_unix()).max(0);
        Ok(jar.add(self.build_cookie(self.config.name.clone(), token, max_age)))
    }

    /// Removes the session cookie.
    #[must_use]
    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        jar.remove(self.removal(self.config.name.clone()))
    }

    /// Builds a cookie with the configured attributes.
    #[must_use]
    pub fn build_cookie(&self, name: String, value: String, max_age_secs: i64) -> Cookie<'static> {
        let mut builder = Cookie::build((name, value))
            .http_only(true)
            .secure(self.config.secure)
            .same_site(same_site(&self.config.same_site))
            .path(self.config.path.clone())
            .max_age(time::Duration::seconds(max_age_secs));
        if let Some(domain) = &self.config.domain {
            builder = builder.domain(domain.clone());
        }
        builder.build()
    }

    /// Cookie that, when removed from a jar, clears `name` on the client.
    #[must_use]
    pub fn removal(&self, name: String) -> Cookie<'static> {
        let mut builder = Cookie::build((name, "")).path(self.config.path.clone());
        if let Some(domain) = &self.config.domain {
            builder = builder.domain(domain.clone());
        }
        builder.build()
    }
}

fn same_site(value: &str) -> SameSite {
    match value.to_ascii_lowercase().as_str() {
        "strict" => SameSite::Strict,
        "none" => SameSite::None,
        _ => SameSite::Lax,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Role;
    use crate::session::test_session;

    fn cookies() -> SessionCookies {
        let mut config = AuthConfig::default();
        config.session.secret = "cookie-test-secret-cookie-test-secret".to_string();
        SessionCookies::from_config(&config)
    }

    #[test]
    fn test_issue_then_read() {
        let cookies = cookies();
        let session = test_session(Role::Landlord);
        let jar = cookies.issue(CookieJar::new(), &session).unwrap();

        let cookie = jar.get("unistay.session").unwrap();
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert!(cookie.max_age().is_some_and(|age| age.whole_seconds() > 3500));

        assert_eq!(cookies.read(&jar), Some(session));
    }

    #[test]
    fn test_tampered_cookie_reads_as_no_session() {
        let cookies = cookies();
        let jar = CookieJar::new().add(Cookie::new("unistay.session", "garbage"));
        assert!(cookies.read(&jar).is_none());

        let other = SessionCookies::new(
            Arc::new(SessionCodec::new("some-other-secret-some-other-secret")),
            CookieConfig::default(),
        );
        let jar = other
            .issue(CookieJar::new(), &test_session(Role::Admin))
            .unwrap();
        assert!(cookies.read(&jar).is_none());
    }

    #[test]
    fn test_clear() {
        let cookies = cookies();
        let jar = cookies
            .issue(CookieJar::new(), &test_session(Role::Student))
            .unwrap();
        let jar = cookies.clear(jar);
        assert!(jar.get("unistay.session").is_none());
    }

    #[test]
    fn test_same_site_parsing() {
        assert_eq!(same_site("Strict"), SameSite::Strict);
        assert_eq!(same_site("none"), SameSite::None);
        assert_eq!(same_site("lax"), SameSite::Lax);
    }
}
