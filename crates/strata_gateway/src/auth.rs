use crate::error::GatewayError;

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use strata_core::prelude::*;
use strata_http::header::{ACCEPT, HeaderValue};
use strata_http::{ApiRequest, Authorizer, Clock, HttpError, StatusCode, Transport};
use tracing::{debug, error};

pub const ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: u64 = 300;
const DEFAULT_EXPIRES_IN: u64 = 3600;
const EXPIRY_BUFFER_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub iat: u64,
    pub exp: u64,
    pub scope: String,
}

/// Signs the short-lived client assertion exchanged for an access token.
#[derive(Clone)]
pub struct AssertionSigner {
    client_id: String,
    audience: String,
    scope: String,
    header: Header,
    key: EncodingKey,
}

impl AssertionSigner {
    /// RS256 with a PEM private key.
    pub fn rs256(client_id: &str, audience: &str, scope: &str, pem: &[u8]) -> Result<Self, GatewayError> {
        Ok(Self {
            client_id: client_id.to_string(),
            audience: audience.to_string(),
            scope: scope.to_string(),
            header: Header::new(Algorithm::RS256),
            key: EncodingKey::from_rsa_pem(pem)?,
        })
    }

    /// HS256 with a shared secret; only useful against test servers.
    pub fn hs256(client_id: &str, audience: &str, scope: &str, secret: &[u8]) -> Self {
        Self {
            client_id: client_id.to_string(),
            audience: audience.to_string(),
            scope: scope.to_string(),
            header: Header::new(Algorithm::HS256),
            key: EncodingKey::from_secret(secret),
        }
    }

    pub async fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let pem = match &config.key {
            KeySource::Path(path) => {
                let path = expand_home(path);
                tokio::fs::read(&path)
                    .await
                    .map_err(|e| GatewayError::io(&path, e))?
            }
            KeySource::Pem(pem) => pem.as_bytes().to_vec(),
        };
        Self::rs256(&config.client_id, &config.base_url(), &config.scope(), &pem)
    }

    pub fn claims(&self, now: u64) -> AssertionClaims {
        AssertionClaims {
            iss: self.client_id.clone(),
            sub: self.client_id.clone(),
            aud: self.audience.clone(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
            scope: self.scope.clone(),
        }
    }

    pub fn sign(&self, now: u64) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&self.header, &self.claims(now), &self.key)
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    access_token: String,
    expires_at: u64,
}

/// Client-credentials bearer authorization with a cached access token.
#[derive(Clone)]
pub struct GatewayAuth<T: Transport, C: Clock> {
    token_url: String,
    scope: String,
    signer: AssertionSigner,
    transport: T,
    clock: C,
    cache: Arc<Mutex<Option<CachedToken>>>,
}

impl<T: Transport, C: Clock> GatewayAuth<T, C> {
    pub fn new(token_url: String, scope: String, signer: AssertionSigner, transport: T, clock: C) -> Self {
        Self {
            token_url,
            scope,
            signer,
            transport,
            clock,
            cache: Arc::new(Mutex::new(None)),
        }
    }

    /// A cached token still valid for more than the expiry buffer.
    fn cached(&self, now: u64) -> Option<String> {
        self.lock()
            .as_ref()
            .filter(|t| now + EXPIRY_BUFFER_SECS < t.expires_at)
            .map(|t| t.access_token.clone())
    }

    async fn fetch_token(&self, now: u64) -> strata_http::Result<String> {
        debug!("Requesting new access token");
        let assertion = self
            .signer
            .sign(now)
            .map_err(|e| HttpError::Auth(format!("Could not sign client assertion: {e}")))?;

        let request = ApiRequest::post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_assertion_type", ASSERTION_TYPE),
                ("client_assertion", assertion.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .header(ACCEPT, HeaderValue::from_static("application/json"));
        let response = self.transport.send(request).await?;

        if response.status != StatusCode::OK {
            error!(status = %response.status, "Token request failed");
            return Err(HttpError::Auth(format!(
                "Failed to obtain access token: {} - {}",
                response.status.as_u16(),
                response.text()
            )));
        }

        let token: TokenResponse = response.json()?;
        let expires_in = token.expires_in.unwrap_or(DEFAULT_EXPIRES_IN);
        debug!(expires_in, "Obtained access token");

        *self.lock() = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at: now + expires_in,
        });
        Ok(token.access_token)
    }

    fn lock(&self) -> MutexGuard<'_, Option<CachedToken>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Transport, C: Clock> Authorizer for GatewayAuth<T, C> {
    async fn authorization(&self) -> strata_http::Result<Option<String>> {
        let now = self.clock.now_epoch();
        let token = match self.cached(now) {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_use_client_id_and_five_minute_lifetime() {
        let signer = AssertionSigner::hs256("cid", "https://gw.example.com", "a b", b"secret");
        let claims = signer.claims(1_000);

        assert_eq!(claims.iss, "cid");
        assert_eq!(claims.sub, "cid");
        assert_eq!(claims.aud, "https://gw.example.com");
        assert_eq!(claims.exp - claims.iat, 300);
        assert_eq!(claims.scope, "a b");
    }

    #[test]
    fn signed_assertion_decodes_with_the_same_secret() {
        let signer = AssertionSigner::hs256("cid", "https://gw.example.com", "scope", b"secret");
        let token = signer.sign(1_700_000_000).unwrap();

        let mut validation = jsonwebtoken::Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_audience(&["https://gw.example.com"]);
        let decoded = jsonwebtoken::decode::<AssertionClaims>(
            &token,
            &jsonwebtoken::DecodingKey::from_secret(b"secret"),
            &validation,
        )
        .unwrap();

        assert_eq!(decoded.claims, signer.claims(1_700_000_000));
        assert_eq!(decoded.header.typ.as_deref(), Some("JWT"));
    }

    #[test]
    fn garbage_pem_is_rejected() {
        let result = AssertionSigner::rs256("cid", "https://gw", "s", b"not a key");
        assert!(matches!(result, Err(GatewayError::Key(_))));
    }
}
