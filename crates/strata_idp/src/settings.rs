use crate::client::IdpClient;
use crate::error::IdpError;
use crate::filters::{LabelPattern, is_system_app};
use crate::governance::{EntitlementStatus, GovernanceClient, SettingChange};
use crate::model::App;

use serde::Serialize;
use strata_http::{Clock, Transport};
use tracing::info;

/// How the apps to act on are chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppSelector {
    All,
    Id(String),
    /// Shell wildcard on the label.
    Label(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppEntitlements {
    pub id: String,
    pub label: String,
    pub sign_on_mode: Option<String>,
    pub status: Option<String>,
    pub entitlement_settings: EntitlementStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingResult {
    pub app_id: String,
    pub label: String,
    #[serde(flatten)]
    pub change: SettingChange,
}

/// Resolves a selector to apps. An unknown id, or a pattern matching nothing,
/// is an error.
pub async fn select_apps<T: Transport, C: Clock>(
    client: &IdpClient<T, C>,
    selector: &AppSelector,
) -> Result<Vec<App>, IdpError> {
    match selector {
        AppSelector::All => client.list_apps().await,
        AppSelector::Id(id) => client
            .get_app(id)
            .await?
            .map(|app| vec![app])
            .ok_or_else(|| IdpError::AppNotFound(id.clone())),
        AppSelector::Label(pattern) => {
            let matcher = LabelPattern::new(pattern)?;
            let apps: Vec<App> = client
                .list_apps()
                .await?
                .into_iter()
                .filter(|app| matcher.matches(&app.label))
                .collect();
            if apps.is_empty() {
                return Err(IdpError::AppNotFound(pattern.clone()));
            }
            Ok(apps)
        }
    }
}

/// Drops system apps and returns how many were dropped.
pub fn without_system_apps(apps: Vec<App>) -> (Vec<App>, usize) {
    let before = apps.len();
    let kept: Vec<App> = apps.into_iter().filter(|app| !is_system_app(app)).collect();
    let skipped = before - kept.len();
    (kept, skipped)
}

pub async fn entitlement_report<T: Transport, C: Clock>(
    governance: &GovernanceClient<T, C>,
    apps: &[App],
) -> Result<Vec<AppEntitlements>, IdpError> {
    let mut report = Vec::with_capacity(apps.len());
    for app in apps {
        report.push(AppEntitlements {
            id: app.id.clone(),
            label: app.label.clone(),
            sign_on_mode: app.sign_on_mode.clone(),
            status: app.status.clone(),
            entitlement_settings: governance.entitlement_status(&app.id).await?,
        });
    }
    Ok(report)
}

/// Enables or disables entitlement management on each app in turn.
pub async fn apply_setting<T: Transport, C: Clock>(
    governance: &GovernanceClient<T, C>,
    apps: &[App],
    enable: bool,
    dry_run: bool,
) -> Result<Vec<SettingResult>, IdpError> {
    let mut results = Vec::with_capacity(apps.len());
    for app in apps {
        let change = if enable {
            governance.enable_entitlements(&app.id, dry_run).await?
        } else {
            governance.disable_entitlements(&app.id, dry_run).await?
        };
        info!(app = %app.label, ?change, "Entitlement management updated");
        results.push(SettingResult {
            app_id: app.id.clone(),
            label: app.label.clone(),
            change,
        });
    }
    Ok(results)
}
