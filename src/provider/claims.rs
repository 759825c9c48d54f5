//! Decoded access-token claims.
//!
//! The provider issues compact JWTs over TLS; this module decodes the
//! payload segment for local use (identity fields, roles, expiry).
//! Signature verification is the provider's job, not ours - the token is
//! only ever presented back to the provider and the fleet API.

use std::collections::{BTreeSet, HashMap};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use serde::Deserialize;

use crate::error::AuthError;

/// A named role group as embedded in the token (`realm_access`,
/// `resource_access.{client}`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleGroup {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Claims payload of a decoded access token.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenClaims {
    pub sub: Option<String>,
    pub preferred_username: Option<String>,
    pub email: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    /// Expiry as seconds since the epoch.
    pub exp: Option<i64>,
    /// Tenant-wide roles.
    #[serde(default)]
    pub realm_access: Option<RoleGroup>,
    /// Application-scoped roles, keyed by client identifier.
    #[serde(default)]
    pub resource_access: HashMap<String, RoleGroup>,
}

impl TokenClaims {
    /// Decode the payload segment of a compact JWT.
    pub fn decode(token: &str) -> Result<Self, AuthError> {
        let mut segments = token.split('.');
        let payload = match (segments.next(), segments.next()) {
            (Some(_header), Some(payload)) => payload,
            _ => {
                return Err(AuthError::InvalidToken(
                    "token is not in compact JWT form".to_string(),
                ))
            }
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| AuthError::InvalidToken(format!("payload is not base64url: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| AuthError::InvalidToken(format!("payload is not valid JSON: {e}")))
    }

    /// Seconds until the token expires (negative if already expired).
    /// `None` when the token carries no `exp` claim.
    pub fn seconds_until_expiry(&self) -> Option<i64> {
        self.exp.map(|exp| exp - Utc::now().timestamp())
    }

    /// True when the token expires within the given window. A token
    /// without an `exp` claim is treated as already expiring so callers
    /// renew rather than trust it.
    pub fn expires_within(&self, seconds: i64) -> bool {
        match self.seconds_until_expiry() {
            Some(remaining) => remaining <= seconds,
            None => true,
        }
    }

    /// Union of tenant-wide roles and the roles scoped to `client_id`.
    /// Duplicates collapse; iteration order is lexicographic.
    pub fn roles(&self, client_id: &str) -> BTreeSet<String> {
        let mut roles: BTreeSet<String> = self
            .realm_access
            .as_ref()
            .map(|group| group.roles.iter().cloned().collect())
            .unwrap_or_default();
        if let Some(group) = self.resource_access.get(client_id) {
            roles.extend(group.roles.iter().cloned());
        }
        roles
    }
}
