//! Protected route table.

use serde::Serialize;

use crate::role::Role;

/// A protected URL-path prefix and the roles allowed under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtectedRoute {
    prefix: String,
    allowed: Vec<Role>,
}

impl ProtectedRoute {
    /// Creates a route. A trailing `/` on the prefix is ignored.
    #[must_use]
    pub fn new(prefix: impl Into<String>, allowed: impl IntoIterator<Item = Role>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_end_matches('/');
        Self {
            prefix: if trimmed.is_empty() {
                "/".to_string()
            } else {
                trimmed.to_string()
            },
            allowed: allowed.into_iter().filter(|r| !r.is_pending()).collect(),
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn allowed(&self) -> &[Role] {
        &self.allowed
    }

    /// `pending` is never allowed, whatever the table says.
    #[must_use]
    pub fn allows(&self, role: Role) -> bool {
        !role.is_pending() && self.allowed.contains(&role)
    }

    /// Path-segment prefix match: `/dashboard` covers `/dashboard` and
    /// `/dashboard/x`, not `/dashboards`.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        if self.prefix == "/" {
            return true;
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

/// Static mapping from path prefixes to allowed roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteTable {
    routes: Vec<ProtectedRoute>,
}

impl RouteTable {
    #[must_use]
    pub fn new(routes: impl IntoIterator<Item = ProtectedRoute>) -> Self {
        routes
            .into_iter()
            .fold(Self { routes: Vec::new() }, Self::with_route)
    }

    /// Adds a route, replacing any route with the same prefix.
    #[must_use]
    pub fn with_route(mut self, route: ProtectedRoute) -> Self {
        self.routes.retain(|r| r.prefix != route.prefix);
        self.routes.push(route);
        self
    }

    /// The most specific route covering `path`.
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<&ProtectedRoute> {
        self.routes
            .iter()
            .filter(|r| r.matches(path))
            .max_by_key(|r| r.prefix.len())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProtectedRoute> {
        self.routes.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new([
            ProtectedRoute::new("/dashboard/student", [Role::Student]),
            ProtectedRoute::new("/dashboard/landlord", [Role::Landlord]),
            ProtectedRoute::new("/dashboard/agent", [Role::Agent]),
            ProtectedRoute::new("/dashboard/admin", [Role::Admin]),
            ProtectedRoute::new("/dashboard", Role::FUNCTIONAL),
            ProtectedRoute::new(
                "/verification",
                [Role::Student, Role::Landlord, Role::Agent],
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_prefix_matching() {
        let route = ProtectedRoute::new("/dashboard/", [Role::Student]);
        assert_eq!(route.prefix(), "/dashboard");
        assert!(route.matches("/dashboard"));
        assert!(route.matches("/dashboard/"));
        assert!(route.matches("/dashboard/student/saved"));
        assert!(!route.matches("/dashboards"));
        assert!(!route.matches("/"));
    }

    #[test]
    fn test_longest_prefix_wins() {
        let table = RouteTable::default();
        assert_eq!(
            table.lookup("/dashboard/landlord/units").map(ProtectedRoute::prefix),
            Some("/dashboard/landlord")
        );
        assert_eq!(
            table.lookup("/dashboard/settings").map(ProtectedRoute::prefix),
            Some("/dashboard")
        );
        assert!(table.lookup("/about").is_none());
    }

    #[test]
    fn test_pending_is_never_allowed() {
        let route = ProtectedRoute::new("/anything", [Role::Pending, Role::Student]);
        assert_eq!(route.allowed(), &[Role::Student]);
        assert!(!route.allows(Role::Pending));
    }

    #[test]
    fn test_with_route_replaces_same_prefix() {
        let table = RouteTable::default()
            .with_route(ProtectedRoute::new("/dashboard/admin", [Role::Admin, Role::Agent]));
        assert_eq!(table.iter().filter(|r| r.prefix() == "/dashboard/admin").count(), 1);
        assert!(table.lookup("/dashboard/admin").unwrap().allows(Role::Agent));
    }
}
