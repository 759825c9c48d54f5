//! Application configuration management.
//!
//! All settings come from the environment (a `.env` file is honored when
//! present). The identity-provider settings are required unless the mock
//! identity toggle is set, in which case the whole provider subsystem runs
//! offline.

use std::env;

use crate::error::AuthError;

/// Identity provider base URL, e.g. `https://auth.example.com`.
pub const ENV_AUTH_URL: &str = "FLEETWATCH_AUTH_URL";

/// Realm (tenant) identifier on the identity provider.
pub const ENV_AUTH_REALM: &str = "FLEETWATCH_AUTH_REALM";

/// Client identifier registered with the identity provider.
pub const ENV_AUTH_CLIENT_ID: &str = "FLEETWATCH_AUTH_CLIENT_ID";

/// Application base URL, used as the post-login/post-logout redirect target.
pub const ENV_APP_URL: &str = "FLEETWATCH_APP_URL";

/// Fleet API base URL.
pub const ENV_API_URL: &str = "FLEETWATCH_API_URL";

/// When truthy, bypasses the identity provider with a fixed mock identity.
pub const ENV_MOCK_AUTH: &str = "FLEETWATCH_MOCK_AUTH";

/// Default application URL when none is configured (local dev server).
const DEFAULT_APP_URL: &str = "http://localhost:5173";

/// Default fleet API URL when none is configured (local backend).
const DEFAULT_API_URL: &str = "http://localhost:3001/api";

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub auth_url: String,
    pub realm: String,
    pub client_id: String,
    pub app_url: String,
    pub api_url: String,
    pub mock_auth: bool,
}

impl AuthConfig {
    /// Load configuration, honoring a `.env` file if one is present.
    pub fn load() -> Result<Self, AuthError> {
        let _ = dotenvy::dotenv();
        Self::from_env()
    }

    /// Read configuration from the current process environment.
    pub fn from_env() -> Result<Self, AuthError> {
        let mock_auth = read(ENV_MOCK_AUTH).map(|v| is_truthy(&v)).unwrap_or(false);

        let auth_url = read(ENV_AUTH_URL);
        let realm = read(ENV_AUTH_REALM);
        let client_id = read(ENV_AUTH_CLIENT_ID);

        // Provider settings are only required when the real provider is in use
        if !mock_auth {
            if auth_url.is_none() {
                return Err(AuthError::MissingConfig(ENV_AUTH_URL));
            }
            if realm.is_none() {
                return Err(AuthError::MissingConfig(ENV_AUTH_REALM));
            }
            if client_id.is_none() {
                return Err(AuthError::MissingConfig(ENV_AUTH_CLIENT_ID));
            }
        }

        Ok(Self {
            auth_url: auth_url.unwrap_or_default(),
            realm: realm.unwrap_or_default(),
            client_id: client_id.unwrap_or_else(|| "fleetwatch-dashboard".to_string()),
            app_url: read(ENV_APP_URL).unwrap_or_else(|| DEFAULT_APP_URL.to_string()),
            api_url: read(ENV_API_URL).unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            mock_auth,
        })
    }
}

/// Read an environment variable, treating empty values as unset.
fn read(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}
