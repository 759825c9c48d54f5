//! Fleetwatch core - session and authorization library for the Fleetwatch
//! dashboard, a browser-style client monitoring a small fleet of remote
//! machines.
//!
//! The heart of the crate is the session subsystem: a provider-backed
//! state machine that owns authentication status, user identity and
//! roles, and token freshness, renewing the access token transparently
//! before expiry and reacting to provider-initiated events (login
//! success, auth error, forced logout, token expiry). UI shells consume
//! it through three surfaces:
//!
//! - [`SessionStore`] - reactive snapshots, `get_token`, role predicates
//! - [`GateRequest`] / [`GateDecision`] - declarative guard for UI regions
//! - [`route_access`] - the same decision as a plain struct, no rendering
//!
//! [`ApiClient`] wires the machine CRUD endpoints to the session store:
//! bearer tokens are fetched per request and a 401 triggers exactly one
//! renewal-and-retry before the session is force-logged-out.
//!
//! Typical wiring:
//!
//! ```no_run
//! use std::sync::Arc;
//! use fleetwatch_core::{ApiClient, AuthConfig, NullNavigator, SessionService};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = AuthConfig::load()?;
//! let service = SessionService::from_config(&config, Arc::new(NullNavigator))?;
//! let authenticated = service.start().await;
//!
//! let api = ApiClient::new(&config, Arc::clone(service.store()))?;
//! if authenticated {
//!     let machines = api.list_machines().await?;
//!     println!("{} machines", machines.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod provider;
pub mod session;

pub use api::{ApiClient, ApiError};
pub use config::AuthConfig;
pub use error::AuthError;
pub use models::{Machine, MachineDraft, MachineMetrics, MachineStatus, MachineStatusReport};
pub use provider::{
    event_channel, IdentityProvider, KeycloakProvider, MockProvider, Navigator, NullNavigator,
    ProviderEvent, ProviderHandle, ProviderProfile, TokenClaims,
};
pub use session::{
    route_access, AccessDenial, GateDecision, GateRequest, RouteAccess, SessionService,
    SessionSnapshot, SessionStore, UserIdentity, MIN_TOKEN_VALIDITY_SECS,
};
