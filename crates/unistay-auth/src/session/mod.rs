//! Session model, signed session tokens and the owning session store.
//!
//! A [`Session`] is created by the identity provider adapter, persisted as a
//! signed token by [`SessionCodec`] and owned at runtime by a
//! [`SessionStore`].

pub mod codec;
pub mod store;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::role::Role;

pub use codec::{SessionCodec, SessionCodecError};
pub use store::{SessionPolicy, SessionSnapshot, SessionStore};

/// Current unix timestamp in seconds.
#[must_use]
pub fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Authenticated user's role and token bundle for one login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Backend user id.
    pub user_id: String,
    /// User email address.
    pub email: String,
    /// Role claim.
    pub role: Role,
    /// Whether the backend has verified the user's identity documents.
    #[serde(default)]
    pub is_verified: bool,
    /// Backend access token (bearer).
    pub access_token: String,
    /// Backend refresh token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// When the access token expires (unix seconds).
    pub access_expires_at: i64,
    /// When the session was minted (unix seconds).
    pub issued_at: i64,
    /// Hard expiry of the session (unix seconds), `issued_at + max_age`.
    pub expires_at: i64,
}

impl Session {
    /// Returns `true` if the session carries a usable access token.
    #[must_use]
    pub fn has_valid_tokens(&self) -> bool {
        !self.access_token.trim().is_empty()
    }

    /// Returns `true` once the session has outlived its maximum age.
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// A session counts as authenticated only with tokens and before expiry.
    #[must_use]
    pub fn is_active_at(&self, now: i64) -> bool {
        self.has_valid_tokens() && !self.is_expired_at(now)
    }

    /// Returns `true` when the access token expires within `window`.
    #[must_use]
    pub fn needs_refresh_at(&self, now: i64, window: Duration) -> bool {
        self.access_expires_at - now <= window.as_secs() as i64
    }

    /// Merges a partial claim set into this session.
    pub fn apply(&mut self, update: &SessionUpdate) {
        if let Some(role) = update.role {
            self.role = role;
        }
        if let Some(verified) = update.is_verified {
            self.is_verified = verified;
        }
        if let Some(access) = &update.access_token {
            self.access_token = access.clone();
        }
        if let Some(refresh) = &update.refresh_token {
            self.refresh_token = Some(refresh.clone());
        }
        if let Some(exp) = update.access_expires_at {
            self.access_expires_at = exp;
        }
    }
}

/// Partial claim set merged into a live session without re-authentication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionUpdate {
    pub role: Option<Role>,
    pub is_verified: Option<bool>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub access_expires_at: Option<i64>,
}

impl SessionUpdate {
    /// Update that only changes the role.
    #[must_use]
    pub fn role(role: Role) -> Self {
        Self {
            role: Some(role),
            ..Self::default()
        }
    }

    /// Sets the verification flag.
    #[must_use]
    pub fn with_verified(mut self, verified: bool) -> Self {
        self.is_verified = Some(verified);
        self
    }

    /// Sets a refreshed token pair.
    #[must_use]
    pub fn with_tokens(
        mut self,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        access_expires_at: i64,
    ) -> Self {
        self.access_token = Some(access_token.into());
        self.refresh_token = refresh_token;
        self.access_expires_at = Some(access_expires_at);
        self
    }

    /// Returns `true` if the update changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Observable status of the session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Loading,
    Authenticated,
    Unauthenticated,
}

/// Read-only view of a session safe to hand to a browser (no tokens).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<i64>,
}

impl SessionView {
    /// Builds a view from a status and an optional session.
    #[must_use]
    pub fn new(status: SessionStatus, session: Option<&Session>) -> Self {
        Self {
            status,
            user_id: session.map(|s| s.user_id.clone()),
            email: session.map(|s| s.email.clone()),
            role: session.map(|s| s.role),
            is_verified: session.map(|s| s.is_verified),
            expires: session.map(|s| s.expires_at),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_session(role: Role) -> Session {
    let now = now_unix();
    Session {
        user_id: "42".to_string(),
        email: "sam@example.com".to_string(),
        role,
        is_verified: false,
        access_token: "access-token".to_string(),
        refresh_token: Some("refresh-token".to_string()),
        access_expires_at: now + 300,
        issued_at: now,
        expires_at: now + 3600,
    }
}
