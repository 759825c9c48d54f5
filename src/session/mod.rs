//! Session state: the process-wide authentication/authorization state for
//! the lifetime of the application.
//!
//! - `SessionStore` owns the state machine and token freshness
//! - `SessionService` drives one-time startup and pumps provider events
//! - `gate` / `access` derive render/route decisions from a snapshot
//! - `UserIdentity` is the merged profile + token-claims identity

pub mod access;
pub mod gate;
pub mod service;
pub mod store;
pub mod user;

pub use access::{route_access, AccessDenial, RouteAccess};
pub use gate::{GateDecision, GateRequest};
pub use service::SessionService;
pub use store::{SessionStore, MIN_TOKEN_VALIDITY_SECS};
pub use user::UserIdentity;

/// Status text shown before the startup sequence begins.
pub const MSG_INITIALIZING: &str = "Initializing authentication...";

/// Status text while the provider connection is being established.
pub(crate) const MSG_CONNECTING: &str = "Connecting to identity provider...";

/// Status text while the user profile is being fetched.
pub(crate) const MSG_LOADING_PROFILE: &str = "Loading user profile...";

/// One fully-formed observation of the session state.
///
/// Published wholesale through a watch channel, so readers never see a
/// partially-updated state: `user` is `Some` exactly when `authenticated`
/// is true, and while `initializing` is set neither field is final.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub authenticated: bool,
    /// True only during the one-time startup sequence.
    pub initializing: bool,
    /// Human-readable status, mutated only while `initializing` (the
    /// startup failure diagnostic is written as part of resolving).
    pub loading_message: String,
    pub user: Option<UserIdentity>,
}

impl SessionSnapshot {
    /// The state every session starts in.
    pub fn startup() -> Self {
        Self {
            authenticated: false,
            initializing: true,
            loading_message: MSG_INITIALIZING.to_string(),
            user: None,
        }
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self::startup()
    }
}
