//! Authentication error taxonomy.
//!
//! Provider-level failures are caught at the session store boundary and
//! converted into state transitions or logged diagnostics; the variants
//! here describe which path applies. Only `login`/`logout` surface errors
//! directly to callers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// Provider unreachable or misconfigured during startup. Non-fatal:
    /// the session resolves unauthenticated with this as the diagnostic.
    #[error("identity provider initialization failed: {0}")]
    Initialization(String),

    /// `login`/`logout` called before `initialize()` resolved.
    #[error("identity provider has not been initialized")]
    NotInitialized,

    #[error("login failed: {0}")]
    Login(String),

    /// The provider rejected the logout call. Local state is left
    /// unchanged when this is returned.
    #[error("logout failed: {0}")]
    Logout(String),

    /// The refresh token itself was rejected. The session must be
    /// force-logged-out when this surfaces.
    #[error("refresh token rejected by the identity provider")]
    RefreshRejected,

    /// Remote profile fetch failed. Logged and non-fatal; authentication
    /// state is preserved.
    #[error("failed to load user profile: {0}")]
    ProfileLoad(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The access token payload could not be decoded.
    #[error("invalid access token: {0}")]
    InvalidToken(String),

    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),
}
