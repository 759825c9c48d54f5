//! REST client for the fleet API.
//!
//! This module provides the `ApiClient` for the machine CRUD endpoints.
//! Authentication is delegated to the session store: a bearer token is
//! fetched per request and auth rejections trigger one renewal-and-retry
//! before the session is force-logged-out.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
