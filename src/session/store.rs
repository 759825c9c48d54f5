//! Session store: the state machine owning authentication status, user
//! identity, and token freshness.
//!
//! State lives behind a watch channel; every mutation publishes a whole
//! [`SessionSnapshot`], so readers between await points always observe a
//! fully-formed state. Provider-level failures are converted into state
//! transitions here and never propagate to consumers, with two
//! exceptions: `login` and `logout` surface their errors to the caller
//! and leave the snapshot untouched.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::provider::{
    EventSender, IdentityProvider, KeycloakProvider, MockProvider, Navigator, ProviderEvent,
    ProviderHandle,
};

use super::user::UserIdentity;
use super::{SessionSnapshot, MSG_CONNECTING, MSG_LOADING_PROFILE};

/// Minimum remaining validity demanded of a token handed to callers.
/// Matches the renewal window used when the provider reports expiry.
pub const MIN_TOKEN_VALIDITY_SECS: i64 = 30;

pub struct SessionStore {
    handle: ProviderHandle,
    redirect_uri: String,
    state: watch::Sender<SessionSnapshot>,
    /// Serializes token renewals: callers queued here re-check validity
    /// after acquiring, so one in-flight renewal serves every caller.
    refresh_gate: Mutex<()>,
}

impl SessionStore {
    pub fn new(provider: Arc<dyn IdentityProvider>, redirect_uri: impl Into<String>) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::startup());
        Self {
            handle: ProviderHandle::new(provider),
            redirect_uri: redirect_uri.into(),
            state,
            refresh_gate: Mutex::new(()),
        }
    }

    /// Build a store from configuration, selecting the mock identity when
    /// the offline toggle is set.
    pub fn from_config(
        config: &AuthConfig,
        navigator: Arc<dyn Navigator>,
        events: EventSender,
    ) -> Result<Self, AuthError> {
        let provider: Arc<dyn IdentityProvider> = if config.mock_auth {
            info!("mock identity enabled, bypassing the identity provider");
            Arc::new(MockProvider::new(config.client_id.clone()))
        } else {
            Arc::new(KeycloakProvider::new(config, navigator, events)?)
        };
        Ok(Self::new(provider, config.app_url.clone()))
    }

    // ------------------------------------------------------------------
    // Reactive snapshot contract
    // ------------------------------------------------------------------

    /// Subscribe to session state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Current state, cloned.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().authenticated
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().initializing
    }

    pub fn user(&self) -> Option<UserIdentity> {
        self.state.borrow().user.clone()
    }

    // ------------------------------------------------------------------
    // Startup
    // ------------------------------------------------------------------

    /// Run the provider initialization and resolve the session out of the
    /// initializing state. Returns whether the session is authenticated.
    ///
    /// Errors never escape: a failed initialization resolves the session
    /// unauthenticated with a diagnostic in `loading_message`.
    pub async fn initialize(&self) -> bool {
        self.set_loading_message(MSG_CONNECTING);

        match self.handle.initialize().await {
            Ok(true) => {
                self.set_loading_message(MSG_LOADING_PROFILE);
                let user = self.build_identity().await;
                self.state.send_modify(|s| {
                    s.authenticated = true;
                    s.user = Some(user);
                    s.initializing = false;
                });
                info!("session initialized, authenticated");
                true
            }
            Ok(false) => {
                self.state.send_modify(|s| {
                    s.authenticated = false;
                    s.user = None;
                    s.initializing = false;
                });
                info!("session initialized, unauthenticated");
                false
            }
            Err(err) => {
                error!(error = %err, "session initialization failed");
                self.state.send_modify(|s| {
                    s.loading_message = format!("Authentication error: {err}");
                    s.authenticated = false;
                    s.user = None;
                    s.initializing = false;
                });
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Login / logout
    // ------------------------------------------------------------------

    /// Redirect to the provider's authorization endpoint. Errors if
    /// called before `initialize()` has resolved.
    pub async fn login(&self) -> Result<(), AuthError> {
        if !self.handle.initialized() {
            return Err(AuthError::NotInitialized);
        }
        self.handle.provider().login(&self.redirect_uri).await
    }

    /// Clear the provider session and redirect away. A failed logout
    /// propagates and leaves local authentication untouched.
    pub async fn logout(&self) -> Result<(), AuthError> {
        if !self.handle.initialized() {
            return Err(AuthError::NotInitialized);
        }
        self.handle.provider().logout(&self.redirect_uri).await?;
        self.clear_user();
        Ok(())
    }

    /// Forced logout: the session is already gone on the provider side
    /// (dead refresh token, provider-initiated logout), so local state is
    /// cleared regardless of whether the provider call succeeds.
    pub async fn force_logout(&self) {
        warn!("forcing logout");
        self.clear_user();
        if let Err(err) = self.handle.provider().logout(&self.redirect_uri).await {
            warn!(error = %err, "provider logout failed during forced logout");
        }
    }

    // ------------------------------------------------------------------
    // Tokens
    // ------------------------------------------------------------------

    /// Current access token, guaranteed valid for at least
    /// [`MIN_TOKEN_VALIDITY_SECS`], renewing silently when needed.
    ///
    /// `None` when the session is unauthenticated or renewal fails. A
    /// rejected refresh token additionally force-logs-out; transient
    /// renewal failures leave the session authenticated. Safe to call
    /// concurrently: callers that arrive during an in-flight renewal all
    /// receive the outcome of that single renewal.
    pub async fn get_token(&self) -> Option<String> {
        if !self.is_authenticated() {
            return None;
        }
        let provider = self.handle.provider();

        // Fast path: token still comfortably valid
        if let Some(claims) = provider.claims() {
            if !claims.expires_within(MIN_TOKEN_VALIDITY_SECS) {
                return provider.access_token();
            }
        }

        let _gate = self.refresh_gate.lock().await;
        if !self.is_authenticated() {
            return None;
        }
        // A renewal that completed while we were queued already covers us
        if let Some(claims) = provider.claims() {
            if !claims.expires_within(MIN_TOKEN_VALIDITY_SECS) {
                return provider.access_token();
            }
        }

        match provider.update_token(MIN_TOKEN_VALIDITY_SECS).await {
            Ok(_) => provider.access_token(),
            Err(AuthError::RefreshRejected) => {
                warn!("refresh token rejected, forcing logout");
                self.force_logout().await;
                None
            }
            // Transient failures (network, provider 5xx) withhold the
            // token but leave the session authenticated; the next call
            // retries.
            Err(err) => {
                warn!(error = %err, "token renewal failed, keeping session");
                None
            }
        }
    }

    /// Unconditional renewal, used by the API layer after an auth
    /// rejection. Returns false when no token could be obtained; only a
    /// rejected refresh token additionally forces logout.
    pub async fn force_refresh(&self) -> bool {
        if !self.is_authenticated() {
            return false;
        }
        let _gate = self.refresh_gate.lock().await;
        match self.handle.provider().update_token(-1).await {
            Ok(_) => true,
            Err(AuthError::RefreshRejected) => {
                warn!("refresh token rejected, forcing logout");
                self.force_logout().await;
                false
            }
            Err(err) => {
                warn!(error = %err, "forced token renewal failed, keeping session");
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Roles
    // ------------------------------------------------------------------

    /// True iff the authenticated user holds `role`. Always false when
    /// unauthenticated - missing permission is a state, not an error.
    pub fn has_role(&self, role: &str) -> bool {
        self.state
            .borrow()
            .user
            .as_ref()
            .map(|user| user.has_role(role))
            .unwrap_or(false)
    }

    /// True iff at least one of `roles` is held. An empty slice yields
    /// false; "no roles required means public" is the gate layer's
    /// convention, not this predicate's.
    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.iter().any(|role| self.has_role(role.as_ref()))
    }

    /// True iff every one of `roles` is held (vacuously true for an empty
    /// slice).
    pub fn has_all_roles<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.iter().all(|role| self.has_role(role.as_ref()))
    }

    // ------------------------------------------------------------------
    // Profile
    // ------------------------------------------------------------------

    /// Re-fetch the remote profile and rebuild the identity wholesale.
    /// A failed fetch is logged and leaves the previous identity in
    /// place - profile staleness never revokes authentication.
    pub async fn reload_profile(&self) {
        if !self.is_authenticated() {
            return;
        }
        let provider = self.handle.provider();
        match provider.load_profile().await {
            Ok(profile) => {
                let user = UserIdentity::from_provider(
                    Some(&profile),
                    provider.claims().as_ref(),
                    provider.client_id(),
                );
                debug!(username = ?user.username, "user profile reloaded");
                self.state.send_modify(|s| s.user = Some(user));
            }
            Err(err) => {
                warn!(error = %err, "profile reload failed, keeping previous identity");
            }
        }
    }

    // ------------------------------------------------------------------
    // Provider events
    // ------------------------------------------------------------------

    /// Apply one provider event. Called sequentially by the session
    /// service's pump task.
    pub async fn apply_event(&self, event: ProviderEvent) {
        match event {
            ProviderEvent::AuthSuccess => {
                info!("provider reported authentication success");
                let user = self.build_identity().await;
                self.state.send_modify(|s| {
                    s.authenticated = true;
                    s.user = Some(user);
                });
            }
            ProviderEvent::AuthError { description } => {
                error!(description = %description, "provider reported authentication error");
                self.clear_user();
            }
            ProviderEvent::Logout => {
                info!("provider reported logout");
                self.clear_user();
            }
            ProviderEvent::TokenExpired => {
                if !self.is_authenticated() {
                    return;
                }
                debug!("access token expired, renewing");
                let _gate = self.refresh_gate.lock().await;
                match self
                    .handle
                    .provider()
                    .update_token(MIN_TOKEN_VALIDITY_SECS)
                    .await
                {
                    Ok(true) => debug!("access token renewed after expiry"),
                    Ok(false) => {}
                    Err(err) => {
                        warn!(error = %err, "renewal after expiry failed");
                        self.force_logout().await;
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Build the identity for a freshly authenticated session: token
    /// claims are the baseline (always locally available), the remote
    /// profile enriches them when it can be fetched. This keeps
    /// `authenticated => user present` even when the profile endpoint is
    /// down.
    async fn build_identity(&self) -> UserIdentity {
        let provider = self.handle.provider();
        let profile = match provider.load_profile().await {
            Ok(profile) => Some(profile),
            Err(err) => {
                warn!(error = %err, "failed to load user profile, using token claims");
                None
            }
        };
        UserIdentity::from_provider(
            profile.as_ref(),
            provider.claims().as_ref(),
            provider.client_id(),
        )
    }

    fn clear_user(&self) {
        self.state.send_modify(|s| {
            s.authenticated = false;
            s.user = None;
        });
    }

    fn set_loading_message(&self, message: &str) {
        self.state.send_modify(|s| {
            if s.initializing {
                s.loading_message = message.to_string();
            }
        });
    }
}
