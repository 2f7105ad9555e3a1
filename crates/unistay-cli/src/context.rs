//! Session owned by one CLI invocation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use unistay_auth::config::SessionConfig;
use unistay_auth::session::SessionSnapshot;
use unistay_auth::{
    HttpIdentityBackend, IdentityProviderAdapter, RoleGuard, SessionPolicy, SessionStore,
};

use crate::session_file::{SessionFile, StoredSession};

/// Timeout for every backend request made by the CLI.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Store, adapter and guard for one command, backed by the profile's
/// session file.
pub struct SessionContext {
    pub api: String,
    pub adapter: IdentityProviderAdapter,
    pub store: SessionStore,
    pub guard: RoleGuard,
    file: SessionFile,
    changes: watch::Receiver<SessionSnapshot>,
    had_file: bool,
}

impl SessionContext {
    /// Loads the stored session and refreshes it if its access token is
    /// about to expire.
    pub async fn open(api: String, file: SessionFile) -> Result<Self> {
        let backend = HttpIdentityBackend::new(&api, REQUEST_TIMEOUT)?;
        let settings = SessionConfig::default();
        let adapter = IdentityProviderAdapter::new(Arc::new(backend), &settings);
        Self::with_adapter(api, file, adapter, SessionPolicy::from(&settings)).await
    }

    pub async fn with_adapter(
        api: String,
        file: SessionFile,
        adapter: IdentityProviderAdapter,
        policy: SessionPolicy,
    ) -> Result<Self> {
        let stored = file.load()?;
        let had_file = stored.is_some();
        let session = match stored {
            Some(stored) if stored.api == api => Some(stored.session),
            Some(stored) => {
                tracing::info!(stored = %stored.api, api = %api, "Stored session belongs to another backend");
                None
            }
            None => None,
        };

        let store = SessionStore::hydrated(policy, session);
        let changes = store.subscribe();
        if let Err(e) = store.refresh_if_needed(&adapter).await {
            tracing::debug!(error = %e, "Stored session dropped during refresh");
        }

        Ok(Self {
            api,
            adapter,
            store,
            guard: RoleGuard::default(),
            file,
            changes,
            had_file,
        })
    }

    /// Writes the session back if the command changed it.
    pub fn persist(self) -> Result<()> {
        let changed = self.changes.has_changed().unwrap_or(false);
        match self.store.current() {
            Some(session) if changed => self.file.save(&StoredSession {
                api: self.api,
                session,
            }),
            Some(_) => Ok(()),
            None if self.had_file => {
                self.file.remove()?;
                Ok(())
            }
            None => Ok(()),
        }
    }
}
