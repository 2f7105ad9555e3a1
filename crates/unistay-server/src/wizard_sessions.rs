//! Server-side registration wizards.
//!
//! A wizard in progress holds a password, so it stays on the server. The
//! browser only carries a signed ticket naming the wizard.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use unistay_auth::session::now_unix;
use unistay_auth::{AuthError, RegistrationWizard, SessionCodec};
use uuid::Uuid;

/// Cookie carrying the wizard ticket.
pub const WIZARD_COOKIE: &str = "unistay.wizard";

/// `typ` claim of wizard tickets.
pub const WIZARD_TICKET_TYPE: &str = "wizard";

/// Claims of the signed wizard ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardTicket {
    pub typ: String,
    pub id: Uuid,
    pub exp: i64,
}

struct WizardEntry {
    wizard: RegistrationWizard,
    touched: Instant,
}

/// In-memory wizard storage with idle expiry.
#[derive(Clone)]
pub struct WizardSessions {
    entries: Arc<DashMap<Uuid, WizardEntry>>,
    ttl: Duration,
}

impl WizardSessions {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Wizard `id`, unless it is unknown or idle past the TTL.
    pub fn get(&self, id: &Uuid) -> Option<RegistrationWizard> {
        {
            let entry = self.entries.get(id)?;
            if entry.touched.elapsed() <= self.ttl {
                return Some(entry.wizard.clone());
            }
        }
        self.entries.remove(id);
        None
    }

    /// Stores a new wizard and returns its id.
    pub fn start(&self, wizard: RegistrationWizard) -> Uuid {
        let id = Uuid::new_v4();
        self.put(id, wizard);
        id
    }

    pub fn put(&self, id: Uuid, wizard: RegistrationWizard) {
        self.entries.insert(
            id,
            WizardEntry {
                wizard,
                touched: Instant::now(),
            },
        );
    }

    pub fn remove(&self, id: &Uuid) {
        self.entries.remove(id);
    }

    /// Drops idle wizards. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.touched.elapsed() <= ttl);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, "Purged idle registration wizards");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Signs a ticket for wizard `id`.
    pub fn ticket(&self, codec: &SessionCodec, id: Uuid) -> Result<String, AuthError> {
        let claims = WizardTicket {
            typ: WIZARD_TICKET_TYPE.to_string(),
            id,
            exp: now_unix() + self.ttl.as_secs() as i64,
        };
        Ok(codec.encode(&claims)?)
    }

    /// Wizard id named by a ticket, if the ticket verifies.
    pub fn read_ticket(&self, codec: &SessionCodec, token: &str) -> Option<Uuid> {
        match codec.decode::<WizardTicket>(token) {
            Ok(ticket) if ticket.typ == WIZARD_TICKET_TYPE => Some(ticket.id),
            Ok(ticket) => {
                tracing::debug!(typ = %ticket.typ, "Ignoring wizard cookie of wrong type");
                None
            }
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring invalid wizard cookie");
                None
            }
        }
    }
}

impl std::fmt::Debug for WizardSessions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WizardSessions")
            .field("active", &self.entries.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unistay_auth::StepInput;

    const SECRET: &str = "wizard-secret-wizard-secret-wizard!!";

    #[test]
    fn test_start_get_put() {
        let sessions = WizardSessions::new(Duration::from_secs(60));
        let id = sessions.start(RegistrationWizard::new());
        let mut wizard = sessions.get(&id).unwrap();
        wizard
            .advance(StepInput::RoleSelect {
                role: "agent".into(),
            })
            .unwrap();
        sessions.put(id, wizard);
        assert_eq!(
            sessions.get(&id).unwrap().step(),
            unistay_auth::WizardStep::Details
        );
        sessions.remove(&id);
        assert!(sessions.get(&id).is_none());
    }

    #[test]
    fn test_idle_wizards_expire() {
        let sessions = WizardSessions::new(Duration::ZERO);
        let id = sessions.start(RegistrationWizard::new());
        std::thread::sleep(Duration::from_millis(5));
        assert!(sessions.get(&id).is_none());
        assert!(sessions.is_empty());

        sessions.start(RegistrationWizard::new());
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(sessions.purge_expired(), 1);
    }

    #[test]
    fn test_ticket_roundtrip_and_type_check() {
        let codec = SessionCodec::new(SECRET);
        let sessions = WizardSessions::new(Duration::from_secs(60));
        let id = Uuid::new_v4();
        let token = sessions.ticket(&codec, id).unwrap();
        assert_eq!(sessions.read_ticket(&codec, &token), Some(id));

        let other = SessionCodec::new("another-secret-another-secret-another");
        assert!(sessions.read_ticket(&other, &token).is_none());
        assert!(sessions.read_ticket(&codec, "nope").is_none());
    }
}
