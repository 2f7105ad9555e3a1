//! Per-profile persisted session.
//!
//! The CLI owns one session per profile, stored as JSON next to the config
//! file. The file holds backend tokens, so it is written owner-only.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use unistay_auth::Session;

/// What is written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    /// Backend the session was obtained from.
    pub api: String,
    pub session: Session,
}

#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn in_dir(dir: &Path, profile: &str) -> Self {
        Self {
            path: dir.join(format!("session.{profile}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored session. An unreadable file counts as no session.
    pub fn load(&self) -> Result<Option<StoredSession>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read {}", self.path.display()))?;
        match serde_json::from_str(&content) {
            Ok(stored) => Ok(Some(stored)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring corrupt session file");
                Ok(None)
            }
        }
    }

    pub fn save(&self, stored: &StoredSession) -> Result<()> {
        let content = serde_json::to_string_pretty(stored)?;
        fs::write(&self.path, content)
            .with_context(|| format!("Cannot write {}", self.path.display()))?;
        restrict_permissions(&self.path)?;
        Ok(())
    }

    pub fn remove(&self) -> Result<bool> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use unistay_auth::Role;

    fn stored() -> StoredSession {
        StoredSession {
            api: "http://localhost:8000".into(),
            session: Session {
                user_id: "3".into(),
                email: "lee@example.com".into(),
                role: Role::Landlord,
                is_verified: true,
                access_token: "a".into(),
                refresh_token: Some("r".into()),
                access_expires_at: 100,
                issued_at: 50,
                expires_at: 1000,
            },
        }
    }

    #[test]
    fn test_save_load_remove() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::in_dir(dir.path(), "default");
        assert!(file.load().unwrap().is_none());

        file.save(&stored()).unwrap();
        assert_eq!(file.load().unwrap(), Some(stored()));

        assert!(file.remove().unwrap());
        assert!(!file.remove().unwrap());
    }

    #[test]
    fn test_corrupt_file_reads_as_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::in_dir(dir.path(), "broken");
        fs::write(file.path(), "{not json").unwrap();
        assert!(file.load().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::in_dir(dir.path(), "default");
        file.save(&stored()).unwrap();
        let mode = fs::metadata(file.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
