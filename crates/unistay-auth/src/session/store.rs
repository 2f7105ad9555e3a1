//! The single owning session store.
//!
//! The store holds at most one session, exposes its status, merges partial
//! updates, enforces the maximum session age and refreshes the access token
//! ahead of expiry. Consumers observe changes through [`SessionStore::subscribe`].
//!
//! All writes go through the inner `watch` sender, which serializes them.
//! Racing writers resolve last-write-wins.

use std::time::Duration;

use tokio::sync::watch;

use super::{Session, SessionStatus, SessionUpdate, SessionView, now_unix};
use crate::config::SessionConfig;
use crate::error::AuthError;
use crate::identity::IdentityProviderAdapter;
use crate::role::Role;

/// Lifetime policy applied by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Maximum age of a session, measured from `issued_at`.
    pub max_age: Duration,
    /// Refresh the access token when it expires within this window.
    pub refresh_window: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for SessionPolicy {
    fn from(config: &SessionConfig) -> Self {
        Self {
            max_age: config.max_age,
            refresh_window: config.refresh_window,
        }
    }
}

/// Value published to subscribers on every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub session: Option<Session>,
}

impl SessionSnapshot {
    fn loading() -> Self {
        Self {
            status: SessionStatus::Loading,
            session: None,
        }
    }

    fn unauthenticated() -> Self {
        Self {
            status: SessionStatus::Unauthenticated,
            session: None,
        }
    }

    fn authenticated(session: Session) -> Self {
        Self {
            status: SessionStatus::Authenticated,
            session: Some(session),
        }
    }

    /// Browser-safe view of this snapshot.
    #[must_use]
    pub fn view(&self) -> SessionView {
        SessionView::new(self.status, self.session.as_ref())
    }
}

/// Owning store for the current session.
#[derive(Debug)]
pub struct SessionStore {
    tx: watch::Sender<SessionSnapshot>,
    policy: SessionPolicy,
}

impl SessionStore {
    /// Creates a store in the `loading` state.
    #[must_use]
    pub fn new(policy: SessionPolicy) -> Self {
        let (tx, _rx) = watch::channel(SessionSnapshot::loading());
        Self { tx, policy }
    }

    /// Creates a store already hydrated from a persisted session.
    #[must_use]
    pub fn hydrated(policy: SessionPolicy, session: Option<Session>) -> Self {
        let store = Self::new(policy);
        store.hydrate(session);
        store
    }

    /// Lifetime policy of this store.
    #[must_use]
    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    /// Resolves the `loading` state from a persisted session (or its absence).
    pub fn hydrate(&self, session: Option<Session>) {
        let now = now_unix();
        let snapshot = match session {
            Some(s) if self.is_live(&s, now) => SessionSnapshot::authenticated(s),
            Some(s) => {
                tracing::debug!(user_id = %s.user_id, "Discarding expired persisted session");
                SessionSnapshot::unauthenticated()
            }
            None => SessionSnapshot::unauthenticated(),
        };
        self.tx.send_replace(snapshot);
    }

    /// Stores a freshly minted session.
    pub fn sign_in(&self, session: Session) {
        tracing::info!(user_id = %session.user_id, role = %session.role, "Session established");
        self.tx.send_replace(SessionSnapshot::authenticated(session));
    }

    /// Destroys the current session.
    pub fn sign_out(&self) {
        let previous = self.tx.send_replace(SessionSnapshot::unauthenticated());
        if let Some(session) = previous.session {
            tracing::info!(user_id = %session.user_id, "Session cleared");
        }
    }

    /// Current snapshot, with the expiry policy applied.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_at(now_unix())
    }

    /// Current snapshot as of `now`. An expired session is dropped and
    /// subscribers are notified.
    #[must_use]
    pub fn snapshot_at(&self, now: i64) -> SessionSnapshot {
        self.tx.send_if_modified(|snapshot| {
            let expired = snapshot
                .session
                .as_ref()
                .is_some_and(|s| !self.is_live(s, now));
            if expired {
                tracing::debug!("Session reached its maximum age");
                *snapshot = SessionSnapshot::unauthenticated();
            }
            expired
        });
        self.tx.borrow().clone()
    }

    /// Status of the store.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.snapshot().status
    }

    /// The current session, if authenticated.
    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.snapshot().session
    }

    /// Role of the current session.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.current().map(|s| s.role)
    }

    /// User id of the current session.
    #[must_use]
    pub fn user_id(&self) -> Option<String> {
        self.current().map(|s| s.user_id)
    }

    /// Access token of the current session.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.current().map(|s| s.access_token)
    }

    /// Merges a partial claim set into the live session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionExpired` when there is no live session.
    pub fn update(&self, update: SessionUpdate) -> Result<Session, AuthError> {
        let now = now_unix();
        let mut result = Err(AuthError::SessionExpired);
        self.tx.send_if_modified(|snapshot| {
            let expired = snapshot
                .session
                .as_ref()
                .is_some_and(|s| !self.is_live(s, now));
            if expired {
                *snapshot = SessionSnapshot::unauthenticated();
                return true;
            }
            let Some(session) = snapshot.session.as_mut() else {
                return false;
            };
            if update.is_empty() {
                result = Ok(session.clone());
                return false;
            }
            session.apply(&update);
            tracing::debug!(user_id = %session.user_id, role = %session.role, "Session updated");
            result = Ok(session.clone());
            true
        });
        result
    }

    /// Subscribes to session changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    /// Refreshes the access token if it expires within the refresh window.
    ///
    /// A rejected refresh clears the session. A network failure keeps the
    /// session while the current access token is still valid.
    pub async fn refresh_if_needed(
        &self,
        adapter: &IdentityProviderAdapter,
    ) -> Result<Option<Session>, AuthError> {
        let now = now_unix();
        let Some(session) = self.snapshot_at(now).session else {
            return Ok(None);
        };
        if !session.needs_refresh_at(now, self.policy.refresh_window) {
            return Ok(Some(session));
        }

        match adapter.refresh(&session).await {
            Ok(update) => self.update(update).map(Some),
            Err(AuthError::Network { message }) if session.access_expires_at > now => {
                tracing::warn!(error = %message, "Token refresh failed, keeping current access token");
                Ok(Some(session))
            }
            Err(e) => {
                tracing::info!(user_id = %session.user_id, error = %e, "Token refresh rejected");
                self.sign_out();
                Err(e)
            }
        }
    }

    fn is_live(&self, session: &Session, now: i64) -> bool {
        let max_age = self.policy.max_age.as_secs() as i64;
        session.is_active_at(now) && now - session.issued_at < max_age
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::test_session;

    #[test]
    fn test_starts_loading() {
        let store = SessionStore::new(SessionPolicy::default());
        assert_eq!(store.status(), SessionStatus::Loading);
        assert!(store.current().is_none());
    }

    #[test]
    fn test_hydrate() {
        let store = SessionStore::new(SessionPolicy::default());
        store.hydrate(Some(test_session(Role::Student)));
        assert_eq!(store.status(), SessionStatus::Authenticated);
        assert_eq!(store.role(), Some(Role::Student));
        assert_eq!(store.user_id().as_deref(), Some("42"));

        store.hydrate(None);
        assert_eq!(store.status(), SessionStatus::Unauthenticated);
    }

    #[test]
    fn test_tokenless_session_is_unauthenticated() {
        let mut session = test_session(Role::Student);
        session.access_token.clear();
        let store = SessionStore::hydrated(SessionPolicy::default(), Some(session));
        assert_eq!(store.status(), SessionStatus::Unauthenticated);
    }

    #[test]
    fn test_max_age_enforced_regardless_of_tokens() {
        let policy = SessionPolicy {
            max_age: Duration::from_secs(600),
            refresh_window: Duration::from_secs(60),
        };
        let session = test_session(Role::Agent);
        let store = SessionStore::hydrated(policy, Some(session.clone()));
        assert_eq!(store.status(), SessionStatus::Authenticated);

        let later = session.issued_at + 601;
        let snapshot = store.snapshot_at(later);
        assert_eq!(snapshot.status, SessionStatus::Unauthenticated);
        assert!(snapshot.session.is_none());
    }

    #[test]
    fn test_update_merges_without_reauthentication() {
        let store =
            SessionStore::hydrated(SessionPolicy::default(), Some(test_session(Role::Pending)));
        let updated = store.update(SessionUpdate::role(Role::Student)).unwrap();
        assert_eq!(updated.role, Role::Student);
        assert_eq!(updated.access_token, "access-token");
        assert_eq!(store.role(), Some(Role::Student));
    }

    #[test]
    fn test_update_without_session_fails() {
        let store = SessionStore::hydrated(SessionPolicy::default(), None);
        let err = store.update(SessionUpdate::role(Role::Student)).unwrap_err();
        assert!(matches!(err, AuthError::SessionExpired));
    }

    #[tokio::test]
    async fn test_subscribers_are_notified() {
        let store =
            SessionStore::hydrated(SessionPolicy::default(), Some(test_session(Role::Pending)));
        let mut rx = store.subscribe();
        assert!(!rx.has_changed().unwrap());

        store.update(SessionUpdate::role(Role::Landlord)).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(
            rx.borrow_and_update().session.as_ref().map(|s| s.role),
            Some(Role::Landlord)
        );

        // Empty updates do not wake subscribers.
        store.update(SessionUpdate::default()).unwrap();
        assert!(!rx.has_changed().unwrap());

        store.sign_out();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().status, SessionStatus::Unauthenticated);
    }
}
