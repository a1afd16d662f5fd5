use crate::auth::{AssertionSigner, GatewayAuth};
use crate::error::GatewayError;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strata_core::prelude::*;
use strata_http::{ApiClient, ApiResponse, Authorizer, Clock, Method, ReqwestTransport, TokioClock, Transport};
use tracing::info;

pub const TOKEN_PATH: &str = "/api/v2/oauth/token";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// `healthy` or `unhealthy`.
    pub status: String,
    pub hostname: String,
    pub authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.authenticated
    }
}

/// Admin API client for the access gateway.
#[derive(Clone)]
pub struct GatewayClient<T: Transport = ReqwestTransport, C: Clock = TokioClock> {
    hostname: String,
    api: ApiClient<T, GatewayAuth<T, C>, C>,
}

impl GatewayClient {
    /// Loads the signing key and builds an HTTPS client honoring `verify_ssl`.
    pub async fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let signer = AssertionSigner::from_config(config).await?;
        let transport = ReqwestTransport::with_tls_verification(config.verify_ssl)?;
        info!(hostname = %config.hostname, "Gateway client initialized");
        Ok(Self::with_transport(config, signer, transport, TokioClock))
    }
}

impl<T: Transport, C: Clock> GatewayClient<T, C> {
    pub fn with_transport(config: &GatewayConfig, signer: AssertionSigner, transport: T, clock: C) -> Self {
        let base_url = config.base_url();
        let auth = GatewayAuth::new(
            format!("{base_url}{TOKEN_PATH}"),
            config.scope(),
            signer,
            transport.clone(),
            clock.clone(),
        );
        Self {
            hostname: config.hostname.clone(),
            api: ApiClient::with_clock(base_url, transport, auth, clock),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn api(&self) -> &ApiClient<T, GatewayAuth<T, C>, C> {
        &self.api
    }

    /// Collection endpoints answer either a bare list or `{"data": [...]}`.
    pub async fn list<R: DeserializeOwned>(&self, path: &str) -> Result<Vec<R>, GatewayError> {
        Ok(self.api.paginate(path, &[])?.try_collect().await?)
    }

    pub async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R, GatewayError> {
        Ok(self.api.get_json(path, &[]).await?)
    }

    pub async fn send_json<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<R, GatewayError> {
        let request = self.api.request(method, path).json(body)?;
        let response = self.api.send(request).await?.error_for_status()?;
        decode_body(&response)
    }

    pub async fn delete(&self, path: &str) -> Result<(), GatewayError> {
        Ok(self.api.delete(path).await?)
    }

    /// Verifies that an access token can be obtained.
    pub async fn health_check(&self) -> HealthStatus {
        match self.api.authorizer().authorization().await {
            Ok(_) => HealthStatus {
                status: "healthy".to_string(),
                hostname: self.hostname.clone(),
                authenticated: true,
                error: None,
            },
            Err(e) => HealthStatus {
                status: "unhealthy".to_string(),
                hostname: self.hostname.clone(),
                authenticated: false,
                error: Some(e.to_string()),
            },
        }
    }
}

/// An empty body decodes as `{}`.
fn decode_body<R: DeserializeOwned>(response: &ApiResponse) -> Result<R, GatewayError> {
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_value(serde_json::Value::Object(Default::default()))?);
    }
    Ok(serde_json::from_slice(&response.body)?)
}
