//! Role router and navigation guard.
//!
//! Every protected navigation is checked by [`RoleGuard::evaluate`], which
//! compares the session's role against the route table and answers
//! [`GuardDecision::Allow`] or [`GuardDecision::Redirect`]. The rules, in
//! order:
//!
//! 1. no live session: go to `/login?callbackUrl=<requested path>`
//! 2. role `pending`: go to `/select_role`
//! 3. role not allowed: go to the role's own dashboard, or `/unauthorized`
//!    when that would not help
//! 4. otherwise allow
//!
//! Paths outside every protected prefix are public.
//!
//! # Example
//!
//! ```ignore
//! use unistay_auth::guard::{GuardDecision, RoleGuard};
//!
//! let guard = RoleGuard::default();
//! match guard.evaluate("/dashboard/student", store.current().as_ref()) {
//!     GuardDecision::Allow => render(),
//!     GuardDecision::Redirect { target, .. } => redirect(target),
//! }
//! ```

mod routes;

use std::fmt;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::Serialize;

use crate::role::Role;
use crate::session::{Session, SessionStore, now_unix};

pub use routes::{ProtectedRoute, RouteTable};

/// Sign-in page.
pub const LOGIN_PATH: &str = "/login";
/// Role selection page for `pending` users.
pub const SELECT_ROLE_PATH: &str = "/select_role";
/// Registration wizard.
pub const REGISTER_PATH: &str = "/register";
/// Shown when no sensible destination exists for a denied role.
pub const UNAUTHORIZED_PATH: &str = "/unauthorized";
/// Query parameter carrying the originally requested path.
pub const CALLBACK_PARAM: &str = "callbackUrl";

/// Why a navigation was redirected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectReason {
    /// No live session.
    Unauthenticated,
    /// The user has not chosen a functional role yet.
    PendingRole,
    /// The user's role is not allowed on this route.
    WrongRole,
}

impl fmt::Display for RedirectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "unauthenticated"),
            Self::PendingRole => write!(f, "pending_role"),
            Self::WrongRole => write!(f, "wrong_role"),
        }
    }
}

/// Outcome of a guard evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GuardDecision {
    Allow,
    Redirect {
        target: String,
        reason: RedirectReason,
    },
}

impl GuardDecision {
    fn redirect(target: impl Into<String>, reason: RedirectReason) -> Self {
        Self::Redirect {
            target: target.into(),
            reason,
        }
    }

    #[must_use]
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Redirect target, if any.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Allow => None,
            Self::Redirect { target, .. } => Some(target),
        }
    }
}

/// Evaluates navigations against a [`RouteTable`].
#[derive(Debug, Clone, Default)]
pub struct RoleGuard {
    routes: RouteTable,
}

impl RoleGuard {
    #[must_use]
    pub fn new(routes: RouteTable) -> Self {
        Self { routes }
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Decides a navigation to `path_and_query` for `session`.
    #[must_use]
    pub fn evaluate(&self, path_and_query: &str, session: Option<&Session>) -> GuardDecision {
        self.evaluate_at(path_and_query, session, now_unix())
    }

    /// Decides a navigation using the store's current session.
    #[must_use]
    pub fn evaluate_store(&self, path_and_query: &str, store: &SessionStore) -> GuardDecision {
        self.evaluate(path_and_query, store.current().as_ref())
    }

    /// Decides a navigation as of `now`.
    #[must_use]
    pub fn evaluate_at(
        &self,
        path_and_query: &str,
        session: Option<&Session>,
        now: i64,
    ) -> GuardDecision {
        let path = path_of(path_and_query);
        let Some(route) = self.routes.lookup(&path) else {
            return GuardDecision::Allow;
        };

        let Some(session) = session.filter(|s| s.is_active_at(now)) else {
            tracing::debug!(path = %path, "Guard: no session");
            return GuardDecision::redirect(
                login_redirect(path_and_query),
                RedirectReason::Unauthenticated,
            );
        };

        let role = session.role;
        if role.is_pending() {
            tracing::debug!(path = %path, user_id = %session.user_id, "Guard: role pending");
            return GuardDecision::redirect(SELECT_ROLE_PATH, RedirectReason::PendingRole);
        }

        if route.allows(role) {
            return GuardDecision::Allow;
        }

        tracing::debug!(
            path = %path,
            user_id = %session.user_id,
            role = %role,
            route = %route.prefix(),
            "Guard: role not allowed"
        );
        GuardDecision::redirect(
            self.fallback_for(role, &path),
            RedirectReason::WrongRole,
        )
    }

    /// Where to go right after signing in or choosing a role.
    ///
    /// A `pending` user always lands on role selection. Otherwise the
    /// requested callback wins when it is same-origin, not a sign-in page and
    /// allowed for the session; the role's dashboard is the fallback.
    #[must_use]
    pub fn landing_for(&self, session: &Session, callback: Option<&str>) -> String {
        if session.role.is_pending() {
            return SELECT_ROLE_PATH.to_string();
        }
        if let Some(callback) = callback.and_then(sanitize_callback) {
            let path = path_of(&callback);
            let is_auth_page = [LOGIN_PATH, SELECT_ROLE_PATH, REGISTER_PATH]
                .iter()
                .any(|p| path == *p || path.starts_with(&format!("{p}/")));
            if !is_auth_page && self.evaluate(&callback, Some(session)).is_allow() {
                return callback;
            }
        }
        session.role.dashboard_root().unwrap_or("/").to_string()
    }

    /// Where to send a role that was denied `denied_path`.
    fn fallback_for(&self, role: Role, denied_path: &str) -> &'static str {
        role.dashboard_root()
            .filter(|root| *root != denied_path)
            .filter(|root| self.routes.lookup(root).is_none_or(|r| r.allows(role)))
            .unwrap_or(UNAUTHORIZED_PATH)
    }
}

/// Path component of a path-and-query string, percent-decoded with dot
/// segments and empty segments resolved. Empty reads as `/`.
fn path_of(path_and_query: &str) -> String {
    let raw = path_and_query
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let decoded = percent_decode_str(raw).decode_utf8_lossy();

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Login URL that returns to `path_and_query` afterwards.
///
/// The requested path is kept as-is; characters are percent-encoded only
/// where the query syntax requires it, so `/` stays literal.
#[must_use]
pub fn login_redirect(path_and_query: &str) -> String {
    let requested = if path_and_query.is_empty() {
        "/"
    } else {
        path_and_query
    };
    format!(
        "{LOGIN_PATH}?{CALLBACK_PARAM}={}",
        encode_query_value(requested)
    )
}

/// Characters escaped inside a query value. Unreserved characters, `/`,
/// `?`, `:`, `@` and the sub-delimiters other than `&`, `=` and `+` stay
/// literal.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/')
    .remove(b':')
    .remove(b'@')
    .remove(b'!')
    .remove(b'$')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b',')
    .remove(b';')
    .remove(b'?');

/// Percent-encodes `value` for use inside a query string.
#[must_use]
pub fn encode_query_value(value: &str) -> String {
    utf8_percent_encode(value, QUERY_VALUE).to_string()
}

/// Accepts a post-login destination only if it stays on this site.
///
/// Returns the trimmed path for same-origin absolute paths and `None` for
/// anything else (scheme-relative `//host`, backslash tricks, full URLs,
/// control characters).
#[must_use]
pub fn sanitize_callback(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let safe = raw.starts_with('/')
        && !raw.starts_with("//")
        && !raw.contains('\\')
        && !raw.chars().any(char::is_control);
    safe.then(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::test_session;

    fn decide(path: &str, role: Option<Role>) -> GuardDecision {
        let session = role.map(test_session);
        RoleGuard::default().evaluate(path, session.as_ref())
    }

    #[test]
    fn test_pending_role_goes_to_role_selection() {
        assert_eq!(
            decide("/dashboard/landlord", Some(Role::Pending)),
            GuardDecision::Redirect {
                target: "/select_role".to_string(),
                reason: RedirectReason::PendingRole,
            }
        );
        assert_eq!(
            decide("/verification", Some(Role::Pending)).target(),
            Some("/select_role")
        );
    }

    #[test]
    fn test_unauthenticated_goes_to_login_with_callback() {
        assert_eq!(
            decide("/dashboard/student", None),
            GuardDecision::Redirect {
                target: "/login?callbackUrl=/dashboard/student".to_string(),
                reason: RedirectReason::Unauthenticated,
            }
        );
    }

    #[test]
    fn test_callback_keeps_query() {
        assert_eq!(
            decide("/dashboard/landlord/listings?page=2&sort=new", None).target(),
            Some("/login?callbackUrl=/dashboard/landlord/listings?page%3D2%26sort%3Dnew")
        );
    }

    #[test]
    fn test_matching_role_is_allowed() {
        assert!(decide("/dashboard/agent/tasks", Some(Role::Agent)).is_allow());
        assert!(decide("/dashboard/agent", Some(Role::Agent)).is_allow());
        assert!(decide("/dashboard", Some(Role::Admin)).is_allow());
        assert!(decide("/verification/upload", Some(Role::Student)).is_allow());
    }

    #[test]
    fn test_wrong_role_goes_to_own_dashboard() {
        assert_eq!(
            decide("/dashboard/landlord/properties", Some(Role::Student)),
            GuardDecision::Redirect {
                target: "/dashboard/student".to_string(),
                reason: RedirectReason::WrongRole,
            }
        );
        assert_eq!(
            decide("/verification", Some(Role::Admin)).target(),
            Some("/dashboard/admin")
        );
    }

    #[test]
    fn test_dot_segments_and_escapes_cannot_leave_own_area() {
        for path in [
            "/dashboard/student/../admin/users",
            "/dashboard/student/%2e%2e/admin",
            "/dashboard/student/%2E%2E%2Fadmin",
            "/dashboard//admin",
            "/dashboard/./admin",
            "/%64ashboard/admin",
        ] {
            assert_eq!(
                decide(path, Some(Role::Student)).target(),
                Some("/dashboard/student"),
                "{path}"
            );
        }
        // The callback keeps the path as requested.
        assert_eq!(
            decide("/dashboard/./admin", None).target(),
            Some("/login?callbackUrl=/dashboard/./admin")
        );
        assert!(decide("/dashboard/admin/../student/saved", Some(Role::Student)).is_allow());
    }

    #[test]
    fn test_query_value_encoding() {
        assert_eq!(encode_query_value("/a b/ü"), "/a%20b/%C3%BC");
        assert_eq!(encode_query_value("/x?y=1&z=+"), "/x?y%3D1%26z%3D%2B");
        assert_eq!(encode_query_value("/p:q@r~s"), "/p:q@r~s");
    }

    #[test]
    fn test_unauthorized_when_own_root_is_denied() {
        let table = RouteTable::default()
            .with_route(ProtectedRoute::new("/dashboard/student", [Role::Admin]));
        let guard = RoleGuard::new(table);
        let session = test_session(Role::Student);
        assert_eq!(
            guard.evaluate("/dashboard/student/saved", Some(&session)).target(),
            Some("/unauthorized")
        );
    }

    #[test]
    fn test_public_paths_are_always_allowed() {
        assert!(decide("/", None).is_allow());
        assert!(decide("/login", None).is_allow());
        assert!(decide("/listings/12", Some(Role::Pending)).is_allow());
        // Segment boundaries matter.
        assert!(decide("/dashboards", None).is_allow());
        assert!(decide("/verificationx", None).is_allow());
    }

    #[test]
    fn test_expired_or_tokenless_session_is_no_session() {
        let guard = RoleGuard::default();
        let session = test_session(Role::Student);
        let decision = guard.evaluate_at("/dashboard/student", Some(&session), session.expires_at);
        assert_eq!(
            decision.target(),
            Some("/login?callbackUrl=/dashboard/student")
        );

        let mut tokenless = test_session(Role::Student);
        tokenless.access_token.clear();
        assert!(!guard.evaluate("/dashboard/student", Some(&tokenless)).is_allow());
    }

    #[test]
    fn test_role_update_changes_next_decision() {
        let store = SessionStore::hydrated(
            crate::session::SessionPolicy::default(),
            Some(test_session(Role::Pending)),
        );
        let guard = RoleGuard::default();
        assert_eq!(
            guard.evaluate_store("/dashboard/student", &store).target(),
            Some("/select_role")
        );

        store
            .update(crate::session::SessionUpdate::role(Role::Student))
            .unwrap();
        assert!(guard.evaluate_store("/dashboard/student", &store).is_allow());
    }

    #[test]
    fn test_landing_after_sign_in() {
        let guard = RoleGuard::default();
        let landlord = test_session(Role::Landlord);
        assert_eq!(guard.landing_for(&landlord, None), "/dashboard/landlord");
        assert_eq!(
            guard.landing_for(&landlord, Some("/dashboard/landlord/units?page=2")),
            "/dashboard/landlord/units?page=2"
        );
        // A callback the role may not open falls back to its dashboard.
        assert_eq!(
            guard.landing_for(&landlord, Some("/dashboard/student")),
            "/dashboard/landlord"
        );
        assert_eq!(
            guard.landing_for(&landlord, Some("//evil.example")),
            "/dashboard/landlord"
        );
        assert_eq!(guard.landing_for(&landlord, Some("/login")), "/dashboard/landlord");

        let pending = test_session(Role::Pending);
        assert_eq!(
            guard.landing_for(&pending, Some("/dashboard/student")),
            "/select_role"
        );
    }

    #[test]
    fn test_sanitize_callback() {
        assert_eq!(
            sanitize_callback("/dashboard/agent?x=1").as_deref(),
            Some("/dashboard/agent?x=1")
        );
        assert_eq!(sanitize_callback("//evil.example"), None);
        assert_eq!(sanitize_callback("https://evil.example/"), None);
        assert_eq!(sanitize_callback("/\\evil.example"), None);
        assert_eq!(sanitize_callback(""), None);
    }

    #[test]
    fn test_decision_serializes_tagged() {
        let json = serde_json::to_value(decide("/dashboard/admin", Some(Role::Pending))).unwrap();
        assert_eq!(json["decision"], "redirect");
        assert_eq!(json["target"], "/select_role");
        assert_eq!(json["reason"], "pending_role");
    }
}
