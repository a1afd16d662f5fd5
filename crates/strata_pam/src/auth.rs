use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use strata_http::{ApiRequest, Authorizer, Clock, HttpError, Transport};
use tracing::debug;

const TOKEN_LIFETIME_SECS: u64 = 3600;
const EXPIRY_BUFFER_SECS: u64 = 60;

#[derive(Serialize)]
struct ServiceTokenRequest<'a> {
    key_id: &'a str,
    key_secret: &'a str,
}

#[derive(Deserialize)]
struct ServiceTokenResponse {
    bearer_token: String,
}

struct CachedToken {
    bearer_token: String,
    expires_at: u64,
}

/// Exchanges a service user key for a bearer token, cached for an hour.
#[derive(Clone)]
pub struct ServiceTokenAuth<T: Transport, C: Clock> {
    token_url: String,
    key_id: String,
    key_secret: String,
    transport: T,
    clock: C,
    cache: Arc<Mutex<Option<CachedToken>>>,
}

impl<T: Transport, C: Clock> ServiceTokenAuth<T, C> {
    pub fn new(token_url: String, key_id: String, key_secret: String, transport: T, clock: C) -> Self {
        Self {
            token_url,
            key_id,
            key_secret,
            transport,
            clock,
            cache: Arc::new(Mutex::new(None)),
        }
    }

    async fn fetch_token(&self, now: u64) -> strata_http::Result<String> {
        debug!("Requesting service token");
        let request = ApiRequest::post(&self.token_url).json(&ServiceTokenRequest {
            key_id: &self.key_id,
            key_secret: &self.key_secret,
        })?;
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(HttpError::Auth(format!(
                "Failed to authenticate with privileged access: {} - {}",
                response.status.as_u16(),
                response.text()
            )));
        }

        let token: ServiceTokenResponse = response.json()?;
        *self.lock() = Some(CachedToken {
            bearer_token: token.bearer_token.clone(),
            expires_at: now + TOKEN_LIFETIME_SECS,
        });
        Ok(token.bearer_token)
    }

    fn lock(&self) -> MutexGuard<'_, Option<CachedToken>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Transport, C: Clock> Authorizer for ServiceTokenAuth<T, C> {
    async fn authorization(&self) -> strata_http::Result<Option<String>> {
        let now = self.clock.now_epoch();
        let cached = self
            .lock()
            .as_ref()
            .filter(|t| now + EXPIRY_BUFFER_SECS < t.expires_at)
            .map(|t| t.bearer_token.clone());

        let token = match cached {
            Some(token) => token,
            None => self.fetch_token(now).await?,
        };
        Ok(Some(format!("Bearer {token}")))
    }

    async fn invalidate(&self) -> bool {
        self.lock().take();
        true
    }
}
