//! Authenticated client for the fleet API.
//!
//! Every outbound request obtains its bearer token through
//! `SessionStore::get_token` - callers never read a cached token directly,
//! so in-flight calls cannot carry stale credentials. Auth rejections are
//! handled by an explicit policy: one forced renewal and one retry, then a
//! forced logout.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::AuthConfig;
use crate::models::{Machine, MachineDraft, MachineStatusReport};
use crate::session::SessionStore;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Body placeholder for requests that carry none.
const NO_BODY: Option<&()> = None;

// ============================================================================
// Retry policy
// ============================================================================

/// What to do with a response, given how often we have already retried.
/// Kept as data so the single-retry bound on auth rejections is explicit
/// and testable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RetryAction {
    /// Success; hand the response to the caller.
    Proceed,
    /// First auth rejection: force a token renewal and retry once.
    RefreshAndRetry,
    /// Second auth rejection: the renewed token was rejected too.
    ForceLogout,
    /// Rate limited with retries left: back off and go again.
    Backoff,
    /// Rate limited with the retry budget spent.
    GiveUpRateLimited,
    /// Any other failure: map the status to an error.
    Fail,
}

pub(crate) fn classify(status: StatusCode, auth_retried: bool, rate_retries: u32) -> RetryAction {
    if status.is_success() {
        RetryAction::Proceed
    } else if status == StatusCode::UNAUTHORIZED {
        if auth_retried {
            RetryAction::ForceLogout
        } else {
            RetryAction::RefreshAndRetry
        }
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        if rate_retries >= MAX_RATE_LIMIT_RETRIES {
            RetryAction::GiveUpRateLimited
        } else {
            RetryAction::Backoff
        }
    } else {
        RetryAction::Fail
    }
}

// ============================================================================
// Client
// ============================================================================

/// Fleet API client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection
/// pooling, and the session store is shared by reference.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl ApiClient {
    pub fn new(config: &AuthConfig, session: Arc<SessionStore>) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    /// Send a request with bearer auth, the single-retry auth policy, and
    /// bounded rate-limit backoff. Returns the successful response.
    async fn dispatch<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut auth_retried = false;
        let mut rate_retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let token = self.session.get_token().await.ok_or(ApiError::Unauthorized)?;
            let mut request = self.http.request(method.clone(), &url).bearer_auth(token);
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request.send().await?;
            let status = response.status();

            match classify(status, auth_retried, rate_retries) {
                RetryAction::Proceed => return Ok(response),
                RetryAction::RefreshAndRetry => {
                    warn!(url = %url, "auth rejected, forcing token renewal and retrying once");
                    auth_retried = true;
                    if !self.session.force_refresh().await {
                        return Err(ApiError::Unauthorized);
                    }
                }
                RetryAction::ForceLogout => {
                    warn!(url = %url, "auth rejected after renewal, forcing logout");
                    self.session.force_logout().await;
                    return Err(ApiError::Unauthorized);
                }
                RetryAction::Backoff => {
                    rate_retries += 1;
                    warn!(url = %url, retry = rate_retries, backoff_ms, "rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
                RetryAction::GiveUpRateLimited => return Err(ApiError::RateLimited),
                RetryAction::Fail => {
                    let body = response.text().await.unwrap_or_default();
                    return Err(ApiError::from_status(status, &body));
                }
            }
        }
    }

    async fn request_json<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self.dispatch(method, path, body).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    // ===== Machine CRUD =====

    /// Fetch all machine records.
    pub async fn list_machines(&self) -> Result<Vec<Machine>, ApiError> {
        debug!("fetching machine list");
        self.request_json(Method::GET, "/machines", NO_BODY).await
    }

    /// Fetch a single machine record.
    pub async fn get_machine(&self, id: &str) -> Result<Machine, ApiError> {
        self.request_json(Method::GET, &format!("/machines/{id}"), NO_BODY)
            .await
    }

    /// Create a machine record.
    pub async fn create_machine(&self, draft: &MachineDraft) -> Result<Machine, ApiError> {
        self.request_json(Method::POST, "/machines", Some(draft)).await
    }

    /// Replace a machine record.
    pub async fn update_machine(&self, id: &str, draft: &MachineDraft) -> Result<Machine, ApiError> {
        self.request_json(Method::PUT, &format!("/machines/{id}"), Some(draft))
            .await
    }

    /// Delete a machine record.
    pub async fn delete_machine(&self, id: &str) -> Result<(), ApiError> {
        self.dispatch(Method::DELETE, &format!("/machines/{id}"), NO_BODY)
            .await
            .map(|_| ())
    }

    /// Probe the live status and metrics of a machine.
    pub async fn machine_status(&self, id: &str) -> Result<MachineStatusReport, ApiError> {
        self.request_json(Method::GET, &format!("/machines/{id}/status"), NO_BODY)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_success() {
        assert_eq!(classify(StatusCode::OK, false, 0), RetryAction::Proceed);
        assert_eq!(classify(StatusCode::NO_CONTENT, true, 3), RetryAction::Proceed);
    }

    #[test]
    fn test_classify_auth_retries_exactly_once() {
        // First 401 renews and retries; the second forces logout
        assert_eq!(
            classify(StatusCode::UNAUTHORIZED, false, 0),
            RetryAction::RefreshAndRetry
        );
        assert_eq!(
            classify(StatusCode::UNAUTHORIZED, true, 0),
            RetryAction::ForceLogout
        );
    }

    #[test]
    fn test_classify_rate_limit_budget() {
        for retries in 0..MAX_RATE_LIMIT_RETRIES {
            assert_eq!(
                classify(StatusCode::TOO_MANY_REQUESTS, false, retries),
                RetryAction::Backoff
            );
        }
        assert_eq!(
            classify(StatusCode::TOO_MANY_REQUESTS, false, MAX_RATE_LIMIT_RETRIES),
            RetryAction::GiveUpRateLimited
        );
    }

    #[test]
    fn test_classify_other_failures() {
        assert_eq!(classify(StatusCode::FORBIDDEN, false, 0), RetryAction::Fail);
        assert_eq!(classify(StatusCode::NOT_FOUND, false, 0), RetryAction::Fail);
        assert_eq!(
            classify(StatusCode::INTERNAL_SERVER_ERROR, false, 0),
            RetryAction::Fail
        );
    }
}
