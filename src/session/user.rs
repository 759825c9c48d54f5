//! User identity as seen by the rest of the application.

use std::collections::BTreeSet;

use crate::provider::claims::TokenClaims;
use crate::provider::ProviderProfile;

/// Identity of the authenticated user, rebuilt wholesale on every profile
/// load so stale fields and roles never survive a reload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Union of tenant-wide and application-scoped roles.
    pub roles: BTreeSet<String>,
}

impl UserIdentity {
    /// Merge the remote profile (when available) with locally decoded
    /// token claims, field by field, profile winning. Roles always come
    /// from the claims, recomputed rather than merged.
    pub fn from_provider(
        profile: Option<&ProviderProfile>,
        claims: Option<&TokenClaims>,
        client_id: &str,
    ) -> Self {
        Self {
            id: pick(profile.and_then(|p| p.id.as_ref()), claims.and_then(|c| c.sub.as_ref())),
            username: pick(
                profile.and_then(|p| p.username.as_ref()),
                claims.and_then(|c| c.preferred_username.as_ref()),
            ),
            email: pick(
                profile.and_then(|p| p.email.as_ref()),
                claims.and_then(|c| c.email.as_ref()),
            ),
            first_name: pick(
                profile.and_then(|p| p.first_name.as_ref()),
                claims.and_then(|c| c.given_name.as_ref()),
            ),
            last_name: pick(
                profile.and_then(|p| p.last_name.as_ref()),
                claims.and_then(|c| c.family_name.as_ref()),
            ),
            roles: claims.map(|c| c.roles(client_id)).unwrap_or_default(),
        }
    }

    /// `"{first} {last}"` trimmed, falling back to the username when both
    /// name parts are absent.
    pub fn full_name(&self) -> Option<String> {
        let joined = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        );
        let trimmed = joined.trim();
        if trimmed.is_empty() {
            self.username.clone()
        } else {
            Some(trimmed.to_string())
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

fn pick(primary: Option<&String>, fallback: Option<&String>) -> Option<String> {
    primary.or(fallback).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(first: &str, last: &str, username: &str) -> UserIdentity {
        UserIdentity {
            first_name: (!first.is_empty()).then(|| first.to_string()),
            last_name: (!last.is_empty()).then(|| last.to_string()),
            username: Some(username.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_full_name_from_parts() {
        assert_eq!(named("Ana", "Silva", "asilva").full_name().as_deref(), Some("Ana Silva"));
    }

    #[test]
    fn test_full_name_falls_back_to_username() {
        assert_eq!(named("", "", "asilva").full_name().as_deref(), Some("asilva"));
    }

    #[test]
    fn test_full_name_single_part_is_trimmed() {
        assert_eq!(named("Ana", "", "asilva").full_name().as_deref(), Some("Ana"));
        assert_eq!(named("", "Silva", "asilva").full_name().as_deref(), Some("Silva"));
    }

    #[test]
    fn test_profile_fields_win_over_claims() {
        let profile = ProviderProfile {
            id: Some("p-id".to_string()),
            username: Some("profile.user".to_string()),
            email: None,
            first_name: Some("Profile".to_string()),
            last_name: None,
        };
        let claims = TokenClaims {
            sub: Some("c-id".to_string()),
            preferred_username: Some("claims.user".to_string()),
            email: Some("claims@example.com".to_string()),
            family_name: Some("Claims".to_string()),
            ..Default::default()
        };

        let user = UserIdentity::from_provider(Some(&profile), Some(&claims), "client");
        assert_eq!(user.id.as_deref(), Some("p-id"));
        assert_eq!(user.username.as_deref(), Some("profile.user"));
        // Claims fill the gaps the profile left
        assert_eq!(user.email.as_deref(), Some("claims@example.com"));
        assert_eq!(user.last_name.as_deref(), Some("Claims"));
    }

    #[test]
    fn test_identity_from_claims_alone() {
        let claims = TokenClaims {
            sub: Some("c-id".to_string()),
            preferred_username: Some("claims.user".to_string()),
            ..Default::default()
        };
        let user = UserIdentity::from_provider(None, Some(&claims), "client");
        assert_eq!(user.id.as_deref(), Some("c-id"));
        assert_eq!(user.username.as_deref(), Some("claims.user"));
        assert!(user.roles.is_empty());
    }
}
