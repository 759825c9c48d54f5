//! OpenID Connect identity provider implementation.
//!
//! Talks to the standard `realms/{realm}/protocol/openid-connect`
//! endpoints: the refresh-token grant for renewal, `userinfo` for the
//! remote profile, and the authorization / end-session endpoints for the
//! login and logout redirects. Token issuance itself happens on the
//! provider's pages after the login redirect; a hosting shell that
//! completes that flow hands the resulting token pair back through
//! [`KeycloakProvider::resume_tokens`].

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use crate::config::AuthConfig;
use crate::error::AuthError;

use super::claims::TokenClaims;
use super::{EventSender, IdentityProvider, Navigator, ProviderEvent, ProviderProfile};

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Validity window demanded of a resumed token pair during initialization.
const RESUME_MIN_VALIDITY_SECS: i64 = 30;

/// Length of the OAuth `state` parameter attached to login redirects.
const STATE_PARAM_LEN: usize = 32;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
}

struct TokenSet {
    access_token: String,
    refresh_token: String,
    claims: TokenClaims,
}

pub struct KeycloakProvider {
    http: Client,
    base_url: String,
    realm: String,
    client_id: String,
    navigator: Arc<dyn Navigator>,
    events: EventSender,
    tokens: RwLock<Option<TokenSet>>,
    expiry_timer: Mutex<Option<JoinHandle<()>>>,
}

impl KeycloakProvider {
    pub fn new(
        config: &AuthConfig,
        navigator: Arc<dyn Navigator>,
        events: EventSender,
    ) -> Result<Self, AuthError> {
        Url::parse(&config.auth_url)
            .map_err(|_| AuthError::MissingConfig(crate::config::ENV_AUTH_URL))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            base_url: config.auth_url.trim_end_matches('/').to_string(),
            realm: config.realm.clone(),
            client_id: config.client_id.clone(),
            navigator,
            events,
            tokens: RwLock::new(None),
            expiry_timer: Mutex::new(None),
        })
    }

    /// Adopt a token pair obtained out-of-band (the hosting shell's
    /// redirect-callback handler, or a persisted session being restored).
    /// Fires `AuthSuccess` so an already-running session picks it up.
    pub fn resume_tokens(&self, access_token: &str, refresh_token: &str) -> Result<(), AuthError> {
        let claims = TokenClaims::decode(access_token)?;
        self.arm_expiry_timer(&claims);
        *self.write_tokens() = Some(TokenSet {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            claims,
        });
        let _ = self.events.send(ProviderEvent::AuthSuccess);
        Ok(())
    }

    fn endpoint(&self, leaf: &str) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/{}",
            self.base_url, self.realm, leaf
        )
    }

    fn read_tokens(&self) -> std::sync::RwLockReadGuard<'_, Option<TokenSet>> {
        self.tokens.read().expect("token lock poisoned")
    }

    fn write_tokens(&self) -> std::sync::RwLockWriteGuard<'_, Option<TokenSet>> {
        self.tokens.write().expect("token lock poisoned")
    }

    /// Arm (or re-arm) the timer that fires `TokenExpired` at the access
    /// token's expiry instant.
    fn arm_expiry_timer(&self, claims: &TokenClaims) {
        let Some(remaining) = claims.seconds_until_expiry() else {
            return;
        };
        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            if remaining > 0 {
                tokio::time::sleep(Duration::from_secs(remaining as u64)).await;
            }
            let _ = events.send(ProviderEvent::TokenExpired);
        });
        let mut slot = self.expiry_timer.lock().expect("timer lock poisoned");
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    fn clear_tokens(&self) {
        *self.write_tokens() = None;
        if let Some(timer) = self.expiry_timer.lock().expect("timer lock poisoned").take() {
            timer.abort();
        }
    }

    fn random_state() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(STATE_PARAM_LEN)
            .map(char::from)
            .collect()
    }
}

#[async_trait]
impl IdentityProvider for KeycloakProvider {
    async fn initialize(&self) -> Result<bool, AuthError> {
        let has_tokens = self.read_tokens().is_some();
        if !has_tokens {
            debug!("no resumed session, initializing unauthenticated");
            return Ok(false);
        }

        // A resumed token pair must still be usable before we report an
        // authenticated session.
        match self.update_token(RESUME_MIN_VALIDITY_SECS).await {
            Ok(_) => Ok(true),
            Err(AuthError::RefreshRejected) => {
                warn!("resumed session is no longer valid");
                self.clear_tokens();
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    async fn login(&self, redirect_uri: &str) -> Result<(), AuthError> {
        let mut url = Url::parse(&self.endpoint("auth"))
            .map_err(|e| AuthError::Login(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", "openid")
            .append_pair("state", &Self::random_state());

        debug!(url = %url, "redirecting to authorization endpoint");
        self.navigator.navigate(&url);
        Ok(())
    }

    async fn logout(&self, redirect_uri: &str) -> Result<(), AuthError> {
        // Revoke the provider-side session first; only a successful call
        // may clear local credentials.
        let refresh_token = self
            .read_tokens()
            .as_ref()
            .map(|set| set.refresh_token.clone());
        if let Some(refresh_token) = refresh_token {
            let response = self
                .http
                .post(self.endpoint("logout"))
                .form(&[
                    ("client_id", self.client_id.as_str()),
                    ("refresh_token", refresh_token.as_str()),
                ])
                .send()
                .await?;
            if !response.status().is_success() {
                let status = response.status();
                return Err(AuthError::Logout(format!(
                    "provider logout returned {status}"
                )));
            }
        }

        let mut url = Url::parse(&self.endpoint("logout"))
            .map_err(|e| AuthError::Logout(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("post_logout_redirect_uri", redirect_uri);

        self.clear_tokens();
        let _ = self.events.send(ProviderEvent::Logout);
        self.navigator.navigate(&url);
        Ok(())
    }

    async fn update_token(&self, min_validity_secs: i64) -> Result<bool, AuthError> {
        let refresh_token = {
            let tokens = self.read_tokens();
            let Some(set) = tokens.as_ref() else {
                return Err(AuthError::RefreshRejected);
            };
            // Negative window forces renewal regardless of remaining life
            if min_validity_secs >= 0 && !set.claims.expires_within(min_validity_secs) {
                return Ok(false);
            }
            set.refresh_token.clone()
        };

        let response = self
            .http
            .post(self.endpoint("token"))
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("refresh_token", refresh_token.as_str()),
            ])
            .send()
            .await?;

        if response.status().is_client_error() {
            // The refresh token itself is dead; the caller force-logs-out
            return Err(AuthError::RefreshRejected);
        }
        let response = response.error_for_status()?;
        let body: TokenResponse = response.json().await?;

        let claims = TokenClaims::decode(&body.access_token)?;
        self.arm_expiry_timer(&claims);
        *self.write_tokens() = Some(TokenSet {
            access_token: body.access_token,
            // The provider may rotate the refresh token; keep the old one
            // when it does not
            refresh_token: body.refresh_token.unwrap_or(refresh_token),
            claims,
        });
        debug!("access token renewed");
        Ok(true)
    }

    async fn load_profile(&self) -> Result<ProviderProfile, AuthError> {
        let token = self.access_token().ok_or(AuthError::NotInitialized)?;
        let response = self
            .http
            .get(self.endpoint("userinfo"))
            .bearer_auth(token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AuthError::ProfileLoad(format!(
                "userinfo returned {status}"
            )));
        }
        response
            .json::<ProviderProfile>()
            .await
            .map_err(|e| AuthError::ProfileLoad(e.to_string()))
    }

    fn access_token(&self) -> Option<String> {
        self.read_tokens().as_ref().map(|set| set.access_token.clone())
    }

    fn claims(&self) -> Option<TokenClaims> {
        self.read_tokens().as_ref().map(|set| set.claims.clone())
    }

    fn client_id(&self) -> &str {
        &self.client_id
    }
}

impl Drop for KeycloakProvider {
    fn drop(&mut self) {
        if let Some(timer) = self.expiry_timer.lock().expect("timer lock poisoned").take() {
            timer.abort();
        }
    }
}
