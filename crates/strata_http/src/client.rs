use crate::error::{HttpError, Result};
use crate::pagination::Pages;
use crate::retry::{Clock, RetryPolicy, TokioClock};
use crate::transport::{ApiRequest, ApiResponse, Transport};

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

/// Supplies the `Authorization` header value for every request.
pub trait Authorizer: Send + Sync + 'static + Clone {
    fn authorization(&self) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Drops any cached credential after a 401.
    /// Returns `true` when a retry with a fresh credential makes sense.
    fn invalidate(&self) -> impl Future<Output = bool> + Send {
        async { false }
    }
}

/// API token scheme used by the identity provider.
#[derive(Clone, Debug)]
pub struct SswsToken(pub String);

impl Authorizer for SswsToken {
    async fn authorization(&self) -> Result<Option<String>> {
        Ok(Some(format!("SSWS {}", self.0)))
    }
}

#[derive(Clone, Debug)]
pub struct BearerToken(pub String);

impl Authorizer for BearerToken {
    async fn authorization(&self) -> Result<Option<String>> {
        Ok(Some(format!("Bearer {}", self.0)))
    }
}

#[derive(Clone, Debug, Default)]
pub struct NoAuth;

impl Authorizer for NoAuth {
    async fn authorization(&self) -> Result<Option<String>> {
        Ok(None)
    }
}

/// REST client shared by all vendor integrations.
///
/// Requests are sent one at a time. A 429 is retried after the advertised
/// reset (see [`RetryPolicy`]); when attempts run out the last 429 is
/// returned to the caller unchanged.
#[derive(Clone)]
pub struct ApiClient<T: Transport, A: Authorizer, C: Clock = TokioClock> {
    base_url: String,
    transport: T,
    authorizer: A,
    clock: C,
    policy: RetryPolicy,
}

impl<T: Transport, A: Authorizer> ApiClient<T, A, TokioClock> {
    pub fn new(base_url: impl Into<String>, transport: T, authorizer: A) -> Self {
        Self::with_clock(base_url, transport, authorizer, TokioClock)
    }
}

impl<T: Transport, A: Authorizer, C: Clock> ApiClient<T, A, C> {
    pub fn with_clock(base_url: impl Into<String>, transport: T, authorizer: A, clock: C) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            transport,
            authorizer,
            clock,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn authorizer(&self) -> &A {
        &self.authorizer
    }

    /// Absolute URLs (e.g. pagination links) pass through untouched.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    pub fn request(&self, method: Method, path: &str) -> ApiRequest {
        ApiRequest::new(method, self.url(path))
    }

    /// Sends with authorization and rate-limit handling; any status is returned.
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let response = self.send_with_retry(request.clone()).await?;

        if response.status == StatusCode::UNAUTHORIZED && self.authorizer.invalidate().await {
            debug!("Credential rejected, retrying once with a fresh one");
            return self.send_with_retry(request).await;
        }

        Ok(response)
    }

    async fn send_with_retry(&self, request: ApiRequest) -> Result<ApiResponse> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let response = self.transport.send(self.authorize(request.clone()).await?).await?;

            if !RetryPolicy::is_rate_limited(&response) {
                if let Some(pause) = self.policy.preemptive_wait(&response) {
                    debug!(?pause, "Rate limit budget low, slowing down");
                    self.clock.sleep(pause).await;
                }
                return Ok(response);
            }

            if attempt >= max_attempts {
                warn!(attempts = attempt, "Still rate limited, giving up");
                return Ok(response);
            }

            let wait = self.policy.wait_for(&response, self.clock.now_epoch());
            warn!(attempt, wait_secs = wait.as_secs(), "Rate limited, waiting for reset");
            self.clock.sleep(wait).await;
            attempt += 1;
        }
    }

    async fn authorize(&self, mut request: ApiRequest) -> Result<ApiRequest> {
        if let Some(value) = self.authorizer.authorization().await? {
            let value = HeaderValue::from_str(&value)
                .map_err(|e| HttpError::Auth(format!("Invalid authorization header: {e}")))?;
            request.headers.insert(AUTHORIZATION, value);
        }
        request
            .headers
            .entry(ACCEPT)
            .or_insert(HeaderValue::from_static("application/json"));
        Ok(request)
    }

    /// GET a JSON document; non-2xx statuses become [`HttpError::ServerError`].
    pub async fn get_json<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<R> {
        let request = self.request(Method::GET, path).query(query)?;
        self.send(request).await?.error_for_status()?.json()
    }

    /// Like [`get_json`](Self::get_json) but a 404 yields `None`.
    pub async fn get_optional_json<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<R>> {
        let request = self.request(Method::GET, path).query(query)?;
        let response = self.send(request).await?;
        if response.status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        response.error_for_status()?.json().map(Some)
    }

    pub async fn post_json<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let request = self.request(Method::POST, path).json(body)?;
        self.send(request).await?.error_for_status()?.json()
    }

    pub async fn put_json<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let request = self.request(Method::PUT, path).json(body)?;
        self.send(request).await?.error_for_status()?.json()
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send(self.request(Method::DELETE, path))
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Lazily walks a collection following `rel="next"` links.
    pub fn paginate<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Pages<'_, R, T, A, C>> {
        let first = self.request(Method::GET, path).query(query)?;
        Ok(Pages::new(self, first.url))
    }
}
