//! Route access query: the gate's decision table without its rendering
//! vocabulary, for callers that only need the boolean (enabling a button,
//! hiding a navigation entry).

use super::gate::roles_satisfied;
use super::SessionSnapshot;

/// Why access was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenial {
    NotAuthenticated,
    InsufficientPermissions,
}

/// Structured access decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteAccess {
    pub can_access: bool,
    pub is_loading: bool,
    pub reason: Option<AccessDenial>,
}

impl RouteAccess {
    fn granted() -> Self {
        Self {
            can_access: true,
            is_loading: false,
            reason: None,
        }
    }

    fn loading() -> Self {
        Self {
            can_access: false,
            is_loading: true,
            reason: None,
        }
    }

    fn denied(reason: AccessDenial) -> Self {
        Self {
            can_access: false,
            is_loading: false,
            reason: Some(reason),
        }
    }
}

/// Decide whether the current session may access a route guarded by
/// `required_roles`. An empty role list means any authenticated session
/// qualifies (same convention as the gate).
pub fn route_access<S: AsRef<str>>(
    snapshot: &SessionSnapshot,
    required_roles: &[S],
    require_all: bool,
) -> RouteAccess {
    if snapshot.initializing {
        return RouteAccess::loading();
    }
    if !snapshot.authenticated {
        return RouteAccess::denied(AccessDenial::NotAuthenticated);
    }
    if !required_roles.is_empty() {
        let roles: Vec<String> = required_roles
            .iter()
            .map(|r| r.as_ref().to_string())
            .collect();
        let granted = snapshot
            .user
            .as_ref()
            .map(|user| roles_satisfied(user, &roles, require_all))
            .unwrap_or(false);
        if !granted {
            return RouteAccess::denied(AccessDenial::InsufficientPermissions);
        }
    }
    RouteAccess::granted()
}
