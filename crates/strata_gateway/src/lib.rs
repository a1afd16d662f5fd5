//! Client for the access gateway admin API.
//!
//! Authentication uses the OAuth client-credentials grant with a signed JWT
//! client assertion. Access tokens are cached until shortly before expiry and
//! refreshed once when the API answers 401.

mod apps;
mod auth;
mod client;
mod error;
pub mod model;

pub use apps::{ApplicationManager, AttributeChanges, DeployAction, DeployResult};
pub use auth::{ASSERTION_TYPE, AssertionClaims, AssertionSigner, GatewayAuth};
pub use client::{GatewayClient, HealthStatus, TOKEN_PATH};
pub use error::GatewayError;
pub use model::{AppConfig, AttributeConfig, GatewayFile, PolicyConfig};
