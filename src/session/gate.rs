//! Authorization gate: a pure decision over a session snapshot.
//!
//! The gate never mutates session state and has no side effects; the view
//! layer maps its decision to a loading placeholder, a login prompt, a
//! denial view (or a caller-supplied fallback), or the protected content.

use super::{SessionSnapshot, UserIdentity};

/// What a guarded region requires.
///
/// An empty `required_roles` list means "authenticated is enough" - the
/// public-route convention lives here, not in the role predicates (where
/// an empty any-of set is simply false).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateRequest {
    pub required_roles: Vec<String>,
    /// When set, every role is required; otherwise one suffices.
    pub require_all: bool,
}

impl GateRequest {
    /// No role requirement: any authenticated user passes.
    pub fn public() -> Self {
        Self::default()
    }

    /// At least one of `roles` is required.
    pub fn any_of<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required_roles: roles.into_iter().map(Into::into).collect(),
            require_all: false,
        }
    }

    /// Every one of `roles` is required.
    pub fn all_of<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required_roles: roles.into_iter().map(Into::into).collect(),
            require_all: true,
        }
    }

    /// Evaluate this request against a session snapshot.
    pub fn evaluate(&self, snapshot: &SessionSnapshot) -> GateDecision {
        if snapshot.initializing {
            return GateDecision::Loading;
        }
        if !snapshot.authenticated {
            return GateDecision::LoginRequired;
        }
        if !self.required_roles.is_empty() {
            let granted = match &snapshot.user {
                Some(user) => roles_satisfied(user, &self.required_roles, self.require_all),
                None => false,
            };
            if !granted {
                let held = snapshot.user.as_ref();
                let missing_roles = self
                    .required_roles
                    .iter()
                    .filter(|role| !held.map(|u| u.has_role(role)).unwrap_or(false))
                    .cloned()
                    .collect();
                return GateDecision::Denied { missing_roles };
            }
        }
        GateDecision::Granted
    }
}

/// Outcome of a gate evaluation, in render order of precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Startup has not resolved; show the loading placeholder, never
    /// protected content.
    Loading,
    /// Unauthenticated; show a login prompt.
    LoginRequired,
    /// Authenticated but lacking roles; show the caller's fallback or a
    /// denial view listing `missing_roles`.
    Denied { missing_roles: Vec<String> },
    /// Render the protected content.
    Granted,
}

/// Shared grant rule: all-of means the user's roles are a superset of the
/// requirement, any-of means the sets intersect.
pub(crate) fn roles_satisfied(user: &UserIdentity, roles: &[String], require_all: bool) -> bool {
    if require_all {
        roles.iter().all(|role| user.has_role(role))
    } else {
        roles.iter().any(|role| user.has_role(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn authenticated_with(roles: &[&str]) -> SessionSnapshot {
        SessionSnapshot {
            authenticated: true,
            initializing: false,
            loading_message: String::new(),
            user: Some(UserIdentity {
                username: Some("asilva".to_string()),
                roles: roles.iter().map(|r| r.to_string()).collect::<BTreeSet<_>>(),
                ..Default::default()
            }),
        }
    }

    fn unauthenticated() -> SessionSnapshot {
        SessionSnapshot {
            authenticated: false,
            initializing: false,
            loading_message: String::new(),
            user: None,
        }
    }

    #[test]
    fn test_loading_wins_over_everything() {
        let snapshot = SessionSnapshot::startup();
        assert_eq!(GateRequest::public().evaluate(&snapshot), GateDecision::Loading);
        assert_eq!(
            GateRequest::any_of(["admin"]).evaluate(&snapshot),
            GateDecision::Loading
        );
    }

    #[test]
    fn test_unauthenticated_gets_login_prompt() {
        // Session resolved unauthenticated: any role-gated route prompts login
        let snapshot = unauthenticated();
        assert_eq!(
            GateRequest::any_of(["admin"]).evaluate(&snapshot),
            GateDecision::LoginRequired
        );
        assert_eq!(GateRequest::public().evaluate(&snapshot), GateDecision::LoginRequired);
    }

    #[test]
    fn test_empty_roles_means_public() {
        let snapshot = authenticated_with(&[]);
        assert_eq!(GateRequest::public().evaluate(&snapshot), GateDecision::Granted);
    }

    #[test]
    fn test_any_of_grants_on_intersection() {
        let snapshot = authenticated_with(&["user"]);
        assert_eq!(
            GateRequest::any_of(["admin", "user"]).evaluate(&snapshot),
            GateDecision::Granted
        );
    }

    #[test]
    fn test_any_of_denies_with_missing_roles() {
        let snapshot = authenticated_with(&["user"]);
        assert_eq!(
            GateRequest::any_of(["admin"]).evaluate(&snapshot),
            GateDecision::Denied {
                missing_roles: vec!["admin".to_string()]
            }
        );
    }

    #[test]
    fn test_all_of_requires_superset() {
        let snapshot = authenticated_with(&["user", "operator"]);
        assert_eq!(
            GateRequest::all_of(["user", "operator"]).evaluate(&snapshot),
            GateDecision::Granted
        );
        assert_eq!(
            GateRequest::all_of(["user", "admin"]).evaluate(&snapshot),
            GateDecision::Denied {
                missing_roles: vec!["admin".to_string()]
            }
        );
    }

    #[test]
    fn test_evaluation_is_pure() {
        let snapshot = authenticated_with(&["user"]);
        let request = GateRequest::any_of(["admin"]);
        let first = request.evaluate(&snapshot);
        let second = request.evaluate(&snapshot);
        assert_eq!(first, second);
    }
}
