//! Role claim carried by every session.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Functional role of a user.
///
/// `Pending` is the sentinel for a registered user who has not chosen a
/// functional role yet. It never grants access to a role-specific area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Role {
    #[default]
    Pending,
    Student,
    Landlord,
    Agent,
    Admin,
}

impl Role {
    /// Every role except `Pending`.
    pub const FUNCTIONAL: [Role; 4] = [Role::Student, Role::Landlord, Role::Agent, Role::Admin];

    /// Roles a user may pick for themselves during registration or role selection.
    pub const SELF_SELECTABLE: [Role; 3] = [Role::Student, Role::Landlord, Role::Agent];

    /// Wire name of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Student => "student",
            Self::Landlord => "landlord",
            Self::Agent => "agent",
            Self::Admin => "admin",
        }
    }

    /// Returns `true` for the sentinel role.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Returns `true` if a user may assign this role to themselves.
    #[must_use]
    pub fn is_self_selectable(&self) -> bool {
        Self::SELF_SELECTABLE.contains(self)
    }

    /// Root of the role's own dashboard area.
    #[must_use]
    pub fn dashboard_root(&self) -> Option<&'static str> {
        match self {
            Self::Pending => None,
            Self::Student => Some("/dashboard/student"),
            Self::Landlord => Some("/dashboard/landlord"),
            Self::Agent => Some("/dashboard/agent"),
            Self::Admin => Some("/dashboard/admin"),
        }
    }

    /// Parses a role claim leniently.
    ///
    /// Unknown or empty claims read as `Pending` so that a backend typo can
    /// never widen access.
    #[must_use]
    pub fn from_claim(claim: &str) -> Self {
        claim.parse().unwrap_or(Self::Pending)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "student" => Ok(Self::Student),
            "landlord" => Ok(Self::Landlord),
            "agent" => Ok(Self::Agent),
            "admin" => Ok(Self::Admin),
            other => Err(AuthError::validation(
                "role",
                format!("Unknown role: {other}"),
            )),
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Self::from_claim(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roles() {
        assert_eq!("student".parse::<Role>().unwrap(), Role::Student);
        assert_eq!(" Landlord ".parse::<Role>().unwrap(), Role::Landlord);
        assert_eq!("AGENT".parse::<Role>().unwrap(), Role::Agent);
        assert!("tenant".parse::<Role>().is_err());
    }

    #[test]
    fn test_unknown_claim_is_pending() {
        assert_eq!(Role::from_claim("superuser"), Role::Pending);
        assert_eq!(Role::from_claim(""), Role::Pending);
        assert_eq!(Role::from_claim("admin"), Role::Admin);
    }

    #[test]
    fn test_serde_wire_form() {
        assert_eq!(serde_json::to_string(&Role::Landlord).unwrap(), "\"landlord\"");
        let role: Role = serde_json::from_str("\"agent\"").unwrap();
        assert_eq!(role, Role::Agent);
        let role: Role = serde_json::from_str("\"owner\"").unwrap();
        assert_eq!(role, Role::Pending);
    }

    #[test]
    fn test_dashboard_roots() {
        assert_eq!(Role::Pending.dashboard_root(), None);
        for role in Role::FUNCTIONAL {
            let root = role.dashboard_root().unwrap();
            assert!(root.ends_with(role.as_str()));
        }
    }

    #[test]
    fn test_self_selectable() {
        assert!(Role::Student.is_self_selectable());
        assert!(Role::Agent.is_self_selectable());
        assert!(!Role::Admin.is_self_selectable());
        assert!(!Role::Pending.is_self_selectable());
    }
}
