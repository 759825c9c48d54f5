//! Identity provider client.
//!
//! This module defines the provider contract (`IdentityProvider`), the
//! typed event channel providers push asynchronous updates through, and
//! `ProviderHandle`, which owns the one-time initialization guarantee:
//! concurrent callers share a single in-flight initialization and later
//! callers get the cached result.
//!
//! Implementations: `KeycloakProvider` (OpenID Connect over HTTP) and
//! `MockProvider` (offline development).

pub mod claims;
pub mod keycloak;
pub mod mock;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::debug;
use url::Url;

use crate::error::AuthError;

pub use claims::{RoleGroup, TokenClaims};
pub use keycloak::KeycloakProvider;
pub use mock::MockProvider;

/// Asynchronous updates pushed by a provider after initialization.
/// Applied sequentially by the session service's event pump, so no two
/// events are ever processed concurrently for the same handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The user completed authentication (e.g. a resumed redirect flow).
    AuthSuccess,
    /// The provider reported an authentication failure.
    AuthError { description: String },
    /// The provider session ended outside our control.
    Logout,
    /// The access token reached its expiry instant.
    TokenExpired,
}

pub type EventSender = mpsc::UnboundedSender<ProviderEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ProviderEvent>;

/// Channel pair wiring a provider (sender) to the session service
/// (receiver).
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Browser-style navigation sink. `login`/`logout` redirect the user agent
/// away to the provider; the hosting shell decides what "navigate" means.
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &Url);
}

/// Navigator that only records the request in the log. Suitable for tests
/// and headless use.
#[derive(Debug, Default)]
pub struct NullNavigator;

impl Navigator for NullNavigator {
    fn navigate(&self, url: &Url) {
        debug!(url = %url, "navigation requested");
    }
}

/// Remote user profile as returned by the provider's userinfo endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderProfile {
    #[serde(rename = "sub")]
    pub id: Option<String>,
    #[serde(rename = "preferred_username")]
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "given_name")]
    pub first_name: Option<String>,
    #[serde(rename = "family_name")]
    pub last_name: Option<String>,
}

/// Contract every identity provider implementation satisfies.
///
/// Initialization idempotence is not an implementation concern: wrap the
/// provider in a [`ProviderHandle`] and call through it.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Establish the provider connection and report whether an
    /// authenticated session already exists.
    async fn initialize(&self) -> Result<bool, AuthError>;

    /// Redirect the user agent to the provider's authorization endpoint.
    async fn login(&self, redirect_uri: &str) -> Result<(), AuthError>;

    /// Clear the provider-side session, then redirect the user agent to
    /// `redirect_uri`. On failure local credentials are left untouched.
    async fn logout(&self, redirect_uri: &str) -> Result<(), AuthError>;

    /// Renew the access token if it expires within `min_validity_secs`
    /// (negative forces renewal). `Ok(true)` means a new token was
    /// obtained, `Ok(false)` that the current one is still valid.
    /// `Err(AuthError::RefreshRejected)` means the refresh token itself
    /// is dead and the session must be force-logged-out.
    async fn update_token(&self, min_validity_secs: i64) -> Result<bool, AuthError>;

    /// Fetch the remote user profile.
    async fn load_profile(&self) -> Result<ProviderProfile, AuthError>;

    /// Current access token, if any.
    fn access_token(&self) -> Option<String>;

    /// Decoded claims of the current access token, if any.
    fn claims(&self) -> Option<TokenClaims>;

    /// Client identifier this provider was configured with.
    fn client_id(&self) -> &str;
}

type InitFuture = Shared<BoxFuture<'static, Result<bool, Arc<AuthError>>>>;

enum InitState {
    Idle,
    Pending(InitFuture),
    Done(bool),
}

/// Wraps a provider with the one-time-initialization guarantee.
///
/// The first `initialize()` call starts the provider's initialization;
/// callers arriving while it is in flight await the same shared future,
/// and callers arriving after completion get the cached boolean. A failed
/// initialization clears the pending state so a later call may retry.
pub struct ProviderHandle {
    provider: Arc<dyn IdentityProvider>,
    init: Mutex<InitState>,
}

impl ProviderHandle {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            init: Mutex::new(InitState::Idle),
        }
    }

    /// The wrapped provider. Callers must not invoke `login`/`logout`
    /// through this before [`ProviderHandle::initialize`] has resolved.
    pub fn provider(&self) -> &dyn IdentityProvider {
        self.provider.as_ref()
    }

    /// True once initialization has completed successfully.
    pub fn initialized(&self) -> bool {
        matches!(*self.init.lock().expect("init state lock poisoned"), InitState::Done(_))
    }

    /// Coalesced initialization: exactly one provider request is issued no
    /// matter how many callers race here, and all of them resolve to the
    /// same outcome.
    pub async fn initialize(&self) -> Result<bool, AuthError> {
        let fut = {
            let mut state = self.init.lock().expect("init state lock poisoned");
            match &*state {
                InitState::Done(authenticated) => return Ok(*authenticated),
                InitState::Pending(fut) => fut.clone(),
                InitState::Idle => {
                    let provider = Arc::clone(&self.provider);
                    let fut: InitFuture = async move {
                        provider.initialize().await.map_err(Arc::new)
                    }
                    .boxed()
                    .shared();
                    *state = InitState::Pending(fut.clone());
                    fut
                }
            }
        };

        let result = fut.await;
        let mut state = self.init.lock().expect("init state lock poisoned");
        match result {
            Ok(authenticated) => {
                *state = InitState::Done(authenticated);
                Ok(authenticated)
            }
            Err(err) => {
                // Leave room for a later retry, mirroring a cleared
                // in-flight promise.
                if matches!(*state, InitState::Pending(_)) {
                    *state = InitState::Idle;
                }
                Err(AuthError::Initialization(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        fail_first: AtomicBool,
    }

    #[async_trait]
    impl IdentityProvider for CountingProvider {
        async fn initialize(&self) -> Result<bool, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Hold the in-flight window open so concurrent callers overlap
            tokio::time::sleep(std::time::Duration::from_millis(30)).await;
            if self.fail_first.swap(false, Ordering::SeqCst) {
                return Err(AuthError::Initialization("provider unreachable".to_string()));
            }
            Ok(true)
        }

        async fn login(&self, _redirect_uri: &str) -> Result<(), AuthError> {
            Ok(())
        }

        async fn logout(&self, _redirect_uri: &str) -> Result<(), AuthError> {
            Ok(())
        }

        async fn update_token(&self, _min_validity_secs: i64) -> Result<bool, AuthError> {
            Ok(false)
        }

        async fn load_profile(&self) -> Result<ProviderProfile, AuthError> {
            Ok(ProviderProfile::default())
        }

        fn access_token(&self) -> Option<String> {
            None
        }

        fn claims(&self) -> Option<TokenClaims> {
            None
        }

        fn client_id(&self) -> &str {
            "test-client"
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_initialize_issues_one_request() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            fail_first: AtomicBool::new(false),
        });
        let handle = Arc::new(ProviderHandle::new(provider.clone() as Arc<dyn IdentityProvider>));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let handle = Arc::clone(&handle);
                tokio::spawn(async move { handle.initialize().await })
            })
            .collect();

        for task in tasks {
            let result = task.await.expect("task should not panic");
            assert!(matches!(result, Ok(true)));
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!(handle.initialized());
    }

    #[tokio::test]
    async fn test_initialize_caches_result() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            fail_first: AtomicBool::new(false),
        });
        let handle = ProviderHandle::new(provider.clone() as Arc<dyn IdentityProvider>);

        assert!(handle.initialize().await.expect("first init"));
        assert!(handle.initialize().await.expect("second init"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_initialize_allows_retry() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            fail_first: AtomicBool::new(true),
        });
        let handle = ProviderHandle::new(provider.clone() as Arc<dyn IdentityProvider>);

        assert!(handle.initialize().await.is_err());
        assert!(!handle.initialized());

        assert!(handle.initialize().await.expect("retry should succeed"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }
}
