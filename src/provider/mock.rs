//! Offline mock identity provider.
//!
//! Selected by the `FLEETWATCH_MOCK_AUTH` toggle: a fixed identity with a
//! configurable role set, no network calls, always authenticated. Keeps
//! the rest of the application exercisable without a running provider.

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::error::AuthError;

use super::claims::{RoleGroup, TokenClaims};
use super::{IdentityProvider, ProviderProfile};

/// Fixed token string handed to API calls in mock mode.
const MOCK_TOKEN: &str = "mock-access-token";

/// Mock tokens are reported as valid for a day; renewal never triggers.
const MOCK_VALIDITY_SECS: i64 = 86_400;

pub struct MockProvider {
    client_id: String,
    profile: ProviderProfile,
    roles: Vec<String>,
}

impl MockProvider {
    /// Mock identity with the default development roles.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self::with_roles(client_id, ["admin", "user"])
    }

    pub fn with_roles<I, S>(client_id: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            client_id: client_id.into(),
            profile: ProviderProfile {
                id: Some("mock-user-123".to_string()),
                username: Some("dev.user".to_string()),
                email: Some("dev.user@example.com".to_string()),
                first_name: Some("Dev".to_string()),
                last_name: Some("User".to_string()),
            },
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl IdentityProvider for MockProvider {
    async fn initialize(&self) -> Result<bool, AuthError> {
        debug!("mock provider initialized");
        Ok(true)
    }

    async fn login(&self, _redirect_uri: &str) -> Result<(), AuthError> {
        debug!("mock login");
        Ok(())
    }

    async fn logout(&self, _redirect_uri: &str) -> Result<(), AuthError> {
        debug!("mock logout");
        Ok(())
    }

    async fn update_token(&self, _min_validity_secs: i64) -> Result<bool, AuthError> {
        // Never expires, never renews
        Ok(false)
    }

    async fn load_profile(&self) -> Result<ProviderProfile, AuthError> {
        Ok(self.profile.clone())
    }

    fn access_token(&self) -> Option<String> {
        Some(MOCK_TOKEN.to_string())
    }

    fn claims(&self) -> Option<TokenClaims> {
        Some(TokenClaims {
            sub: self.profile.id.clone(),
            preferred_username: self.profile.username.clone(),
            email: self.profile.email.clone(),
            given_name: self.profile.first_name.clone(),
            family_name: self.profile.last_name.clone(),
            exp: Some(Utc::now().timestamp() + MOCK_VALIDITY_SECS),
            realm_access: Some(RoleGroup {
                roles: self.roles.clone(),
            }),
            resource_access: Default::default(),
        })
    }

    fn client_id(&self) -> &str {
        &self.client_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_is_always_authenticated() {
        let provider = MockProvider::new("fleetwatch-dashboard");
        assert!(provider.initialize().await.expect("mock init"));
        assert_eq!(provider.access_token().as_deref(), Some(MOCK_TOKEN));
        assert!(!provider.update_token(30).await.expect("mock renewal"));
    }

    #[tokio::test]
    async fn test_mock_roles_flow_through_claims() {
        let provider = MockProvider::with_roles("fleetwatch-dashboard", ["operator"]);
        let claims = provider.claims().expect("mock claims");
        let roles = claims.roles("fleetwatch-dashboard");
        assert!(roles.contains("operator"));
        assert!(!roles.contains("admin"));
        assert!(!claims.expires_within(30));
    }
}
