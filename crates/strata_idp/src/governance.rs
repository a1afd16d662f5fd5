use crate::error::IdpError;
use crate::model::{Bundle, Grant};

use serde::Serialize;
use serde_json::{Value, json};
use strata_core::prelude::*;
use strata_http::{ApiClient, Clock, Method, ReqwestTransport, SswsToken, StatusCode, TokioClock, Transport};
use tracing::{info, instrument, warn};

const BUNDLE_GRANT_TYPE: &str = "ENTITLEMENT-BUNDLE";

/// Result of creating one grant. An existing grant is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantOutcome {
    Created,
    Exists,
    Failed { status: u16, message: String },
}

/// Entitlement management state of one application.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntitlementStatus {
    Enabled { data: Value },
    NotConfigured,
    NotEligible { error: String },
    Error { error: String },
}

impl EntitlementStatus {
    pub fn is_enabled(&self) -> bool {
        matches!(self, EntitlementStatus::Enabled { .. })
    }

    /// Short label for tables.
    pub fn display(&self) -> &'static str {
        match self {
            EntitlementStatus::Enabled { .. } => "ENABLED",
            EntitlementStatus::NotConfigured => "Not Enabled",
            EntitlementStatus::NotEligible { .. } => "Not Eligible",
            EntitlementStatus::Error { .. } => "error",
        }
    }
}

/// Result of enabling or disabling entitlement management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SettingChange {
    Success,
    DryRun,
    AlreadyEnabled,
    NotEnabled,
    Error { message: String },
}

impl SettingChange {
    pub fn is_ok(&self) -> bool {
        !matches!(self, SettingChange::Error { .. })
    }
}

/// Body of `POST /grants` assigning a bundle to a user or group.
pub fn grant_payload(principal_id: &str, principal_type: &str, bundle_id: &str) -> Value {
    json!({
        "principal": {"id": principal_id, "type": principal_type},
        "bundle": {"id": bundle_id},
        "grantType": BUNDLE_GRANT_TYPE,
    })
}

/// Governance API of one tenant (`/governance/api/v1`).
#[derive(Clone)]
pub struct GovernanceClient<T: Transport = ReqwestTransport, C: Clock = TokioClock> {
    api: ApiClient<T, SswsToken, C>,
}

impl GovernanceClient {
    pub fn new(config: &IdpConfig) -> Result<Self, IdpError> {
        Ok(Self::with_transport(config, ReqwestTransport::new()?, TokioClock))
    }
}

impl<T: Transport, C: Clock> GovernanceClient<T, C> {
    pub fn with_transport(config: &IdpConfig, transport: T, clock: C) -> Self {
        Self {
            api: ApiClient::with_clock(
                config.governance_url(),
                transport,
                SswsToken(config.api_token.clone()),
                clock,
            ),
        }
    }

    #[instrument(skip(self))]
    pub async fn list_bundles(&self) -> Result<Vec<Bundle>, IdpError> {
        Ok(self
            .api
            .paginate("entitlement-bundles", &[("limit", "200".to_string())])?
            .collect_partial()
            .await)
    }

    /// A tenant without grants answers 404; that is an empty list.
    #[instrument(skip(self))]
    pub async fn list_grants(&self) -> Result<Vec<Grant>, IdpError> {
        let mut pages = self
            .api
            .paginate::<Grant>("grants", &[("limit", "200".to_string())])?;
        let mut grants = Vec::new();
        loop {
            match pages.next_page().await {
                Ok(Some(page)) => grants.extend(page),
                Ok(None) => break,
                Err(e) if e.is_not_found() && grants.is_empty() => {
                    info!("No grants found");
                    break;
                }
                Err(e) => {
                    warn!(fetched = grants.len(), "Stopped paging after error: {e}");
                    break;
                }
            }
        }
        Ok(grants)
    }

    #[instrument(skip(self, payload))]
    pub async fn create_grant(&self, payload: &Value) -> Result<GrantOutcome, IdpError> {
        let request = self.api.request(Method::POST, "grants").json(payload)?;
        let response = self.api.send(request).await?;

        Ok(match response.status {
            s if s.is_success() => GrantOutcome::Created,
            StatusCode::CONFLICT => GrantOutcome::Exists,
            s => GrantOutcome::Failed {
                status: s.as_u16(),
                message: response.text(),
            },
        })
    }

    pub async fn entitlement_status(&self, app_id: &str) -> Result<EntitlementStatus, IdpError> {
        let request = self
            .api
            .request(Method::GET, &format!("entitlement-settings/{app_id}"));
        let response = self.api.send(request).await?;

        Ok(match response.status {
            StatusCode::NOT_FOUND => EntitlementStatus::NotConfigured,
            StatusCode::BAD_REQUEST => EntitlementStatus::NotEligible {
                error: response.text(),
            },
            s if s.is_success() => EntitlementStatus::Enabled {
                data: response.json().unwrap_or(Value::Null),
            },
            _ => EntitlementStatus::Error {
                error: response.text(),
            },
        })
    }

    /// Falls back to `PUT` when the tenant rejects the `POST` form.
    #[instrument(skip(self))]
    pub async fn enable_entitlements(&self, app_id: &str, dry_run: bool) -> Result<SettingChange, IdpError> {
        if dry_run {
            info!("[DRY RUN] Would enable entitlement management");
            return Ok(SettingChange::DryRun);
        }

        let payload = json!({
            "resourceId": app_id,
            "resourceType": "APPLICATION",
            "enabled": true,
        });
        let request = self
            .api
            .request(Method::POST, "entitlement-settings")
            .json(&payload)?;
        let response = self.api.send(request).await?;

        match response.status {
            s if s.is_success() => Ok(SettingChange::Success),
            StatusCode::CONFLICT => Ok(SettingChange::AlreadyEnabled),
            StatusCode::BAD_REQUEST => self.put_enabled(app_id, true, "enable").await,
            s => Ok(SettingChange::Error {
                message: format!("Failed to enable: {}", s.as_u16()),
            }),
        }
    }

    #[instrument(skip(self))]
    pub async fn disable_entitlements(&self, app_id: &str, dry_run: bool) -> Result<SettingChange, IdpError> {
        if dry_run {
            info!("[DRY RUN] Would disable entitlement management");
            return Ok(SettingChange::DryRun);
        }

        let request = self
            .api
            .request(Method::DELETE, &format!("entitlement-settings/{app_id}"));
        let response = self.api.send(request).await?;

        match response.status {
            s if s.is_success() => Ok(SettingChange::Success),
            StatusCode::NOT_FOUND => Ok(SettingChange::NotEnabled),
            StatusCode::BAD_REQUEST => self.put_enabled(app_id, false, "disable").await,
            s => Ok(SettingChange::Error {
                message: format!("Failed to disable: {}", s.as_u16()),
            }),
        }
    }

    async fn put_enabled(&self, app_id: &str, enabled: bool, action: &str) -> Result<SettingChange, IdpError> {
        let request = self
            .api
            .request(Method::PUT, &format!("entitlement-settings/{app_id}"))
            .json(&json!({ "enabled": enabled }))?;
        let response = self.api.send(request).await?;

        if response.is_success() {
            Ok(SettingChange::Success)
        } else {
            Ok(SettingChange::Error {
                message: format!("Failed to {action}: {} {}", response.status.as_u16(), response.text()),
            })
        }
    }
}
