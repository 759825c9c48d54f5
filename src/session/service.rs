//! Session lifecycle controller.
//!
//! Runs the one-time startup sequence (guarded against re-entrant
//! invocation), then pumps provider events into the store for the rest of
//! the application's life. Shutting the service down detaches the pump -
//! after that no event can mutate the store - but leaves the provider
//! handle intact; there is no session destroy path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::provider::{event_channel, EventReceiver, Navigator};

use super::store::SessionStore;

pub struct SessionService {
    store: Arc<SessionStore>,
    started: AtomicBool,
    events: Mutex<Option<EventReceiver>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl SessionService {
    pub fn new(store: Arc<SessionStore>, events: EventReceiver) -> Self {
        Self {
            store,
            started: AtomicBool::new(false),
            events: Mutex::new(Some(events)),
            pump: Mutex::new(None),
        }
    }

    /// Wire up a store and service from configuration.
    pub fn from_config(
        config: &AuthConfig,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, AuthError> {
        let (sender, receiver) = event_channel();
        let store = Arc::new(SessionStore::from_config(config, navigator, sender)?);
        Ok(Self::new(store, receiver))
    }

    /// The session contract handed to the rest of the application.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Run the startup sequence and start the event pump. Idempotent:
    /// re-entrant calls wait for the in-flight startup to resolve and
    /// report its outcome; calls after completion return the current
    /// authentication state.
    pub async fn start(&self) -> bool {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("session service already started");
            // Racing callers must not observe the pre-resolution snapshot
            let mut updates = self.store.subscribe();
            return match updates.wait_for(|s| !s.initializing).await {
                Ok(snapshot) => snapshot.authenticated,
                Err(_) => self.store.is_authenticated(),
            };
        }

        let authenticated = self.store.initialize().await;

        if let Some(mut receiver) = self.events.lock().expect("event slot lock poisoned").take() {
            let store = Arc::clone(&self.store);
            let pump = tokio::spawn(async move {
                while let Some(event) = receiver.recv().await {
                    store.apply_event(event).await;
                }
                debug!("provider event channel closed");
            });
            *self.pump.lock().expect("pump lock poisoned") = Some(pump);
        }

        info!(authenticated, "session service started");
        authenticated
    }

    /// Detach the event pump. The store and provider handle stay alive;
    /// only the subscription ends.
    pub fn shutdown(&self) {
        if let Some(pump) = self.pump.lock().expect("pump lock poisoned").take() {
            pump.abort();
            debug!("session event pump detached");
        }
    }
}

impl Drop for SessionService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderEvent;
    use crate::session::store::testing::TestProvider;
    use std::sync::atomic::Ordering as AtomicOrdering;

    fn service_with(provider: Arc<TestProvider>) -> (SessionService, crate::provider::EventSender) {
        let (sender, receiver) = event_channel();
        let store = Arc::new(SessionStore::new(provider, "http://localhost:5173"));
        (SessionService::new(store, receiver), sender)
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let provider = Arc::new(TestProvider::authenticated());
        let (service, _sender) = service_with(provider.clone());

        assert!(service.start().await);
        assert!(service.start().await);
        assert_eq!(provider.init_calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reentrant_start_waits_for_resolution() {
        let provider = Arc::new(
            TestProvider::authenticated().with_init_delay(std::time::Duration::from_millis(50)),
        );
        let (service, _sender) = service_with(provider.clone());
        let service = Arc::new(service);

        let first = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.start().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        // The racing caller reports the resolved outcome, not the
        // still-initializing snapshot
        assert!(service.start().await);
        assert!(first.await.expect("task should not panic"));
        assert_eq!(provider.init_calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_pump_applies_provider_events() {
        let provider = Arc::new(TestProvider::authenticated());
        let (service, sender) = service_with(provider.clone());

        let mut updates = service.store().subscribe();
        assert!(service.start().await);
        assert!(service.store().is_authenticated());

        sender
            .send(ProviderEvent::Logout)
            .expect("pump should be listening");

        // The logout transition is the next published snapshot
        loop {
            updates.changed().await.expect("store should stay alive");
            if !updates.borrow().authenticated {
                break;
            }
        }
        assert!(service.store().user().is_none());
    }

    #[tokio::test]
    async fn test_shutdown_detaches_pump() {
        let provider = Arc::new(TestProvider::authenticated());
        let (service, sender) = service_with(provider.clone());

        service.start().await;
        service.shutdown();

        // Events sent after detach must not mutate the store
        let _ = sender.send(ProviderEvent::Logout);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(service.store().is_authenticated());
    }
}
