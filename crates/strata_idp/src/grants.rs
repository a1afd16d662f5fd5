use crate::client::IdpClient;
use crate::error::IdpError;
use crate::governance::{GovernanceClient, GrantOutcome, grant_payload};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use strata_http::{Clock, Transport};
use tracing::{info, warn};

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleRecord {
    pub id: String,
    pub name: String,
    pub target_app_id: Option<String>,
    pub target_app_name: Option<String>,
    pub status: Option<String>,
}

/// One grant with every id resolved to a name that exists in any tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRecord {
    pub bundle_id: String,
    pub bundle_name: String,
    pub target_app_id: Option<String>,
    pub target_app_name: Option<String>,
    pub principal_id: String,
    pub principal_type: String,
    pub principal_name: String,
    pub grant_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantExport {
    pub source_org: String,
    pub export_time: String,
    pub bundles: Vec<BundleRecord>,
    pub grants: Vec<GrantRecord>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GrantImportSummary {
    pub created: usize,
    pub exists: usize,
    pub excluded: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// `None` when the source tenant has no bundles.
pub async fn export_grants<T: Transport, C: Clock>(
    idp: &IdpClient<T, C>,
    governance: &GovernanceClient<T, C>,
    export_time: String,
) -> Result<Option<GrantExport>, IdpError> {
    let bundles = governance.list_bundles().await?;
    if bundles.is_empty() {
        return Ok(None);
    }

    let group_names: HashMap<String, String> = idp
        .list_groups(None)
        .await?
        .into_iter()
        .map(|g| (g.id, g.profile.name))
        .collect();
    let user_names: HashMap<String, String> = idp
        .list_users(false)
        .await?
        .into_iter()
        .map(|u| (u.id.clone(), u.profile.display_name()))
        .collect();
    let app_labels: HashMap<String, String> = idp
        .list_apps()
        .await?
        .into_iter()
        .map(|a| (a.id, a.label))
        .collect();

    let records: Vec<BundleRecord> = bundles
        .iter()
        .map(|bundle| {
            let target_app_id = bundle.target_app_id().map(str::to_string);
            BundleRecord {
                id: bundle.id.clone(),
                name: if bundle.name.is_empty() {
                    UNKNOWN.to_string()
                } else {
                    bundle.name.clone()
                },
                target_app_name: target_app_id
                    .as_ref()
                    .and_then(|id| app_labels.get(id))
                    .cloned(),
                target_app_id,
                status: bundle.status.clone(),
            }
        })
        .collect();
    let by_id: HashMap<&str, &BundleRecord> = records.iter().map(|b| (b.id.as_str(), b)).collect();

    let mut grants = Vec::new();
    for grant in governance.list_grants().await? {
        let Some(bundle) = grant
            .bundle
            .as_ref()
            .and_then(|b| by_id.get(b.id.as_str()))
        else {
            continue;
        };

        let principal = grant.principal.clone().unwrap_or_default();
        let principal_type = if principal.principal_type.is_empty() {
            "UNKNOWN".to_string()
        } else {
            principal.principal_type
        };
        let principal_name = match principal_type.as_str() {
            "GROUP" => group_names.get(&principal.id),
            "USER" => user_names.get(&principal.id),
            _ => None,
        }
        .filter(|name| !name.is_empty())
        .cloned()
        .unwrap_or_else(|| UNKNOWN.to_string());

        grants.push(GrantRecord {
            bundle_id: bundle.id.clone(),
            bundle_name: bundle.name.clone(),
            target_app_id: bundle.target_app_id.clone(),
            target_app_name: bundle.target_app_name.clone(),
            principal_id: principal.id,
            principal_type,
            principal_name,
            grant_id: grant.id,
        });
    }
    info!(bundles = records.len(), grants = grants.len(), "Resolved grants");

    Ok(Some(GrantExport {
        source_org: idp.org_name().to_string(),
        export_time,
        bundles: records,
        grants,
    }))
}

/// Recreates grants in the target tenant by matching bundle, group and user
/// names. Users match on "First Last" first, then on login or email.
pub async fn import_grants<T: Transport, C: Clock>(
    idp: &IdpClient<T, C>,
    governance: &GovernanceClient<T, C>,
    export: &GrantExport,
    exclude_apps: &BTreeSet<String>,
    dry_run: bool,
) -> Result<GrantImportSummary, IdpError> {
    let bundle_ids: HashMap<String, String> = governance
        .list_bundles()
        .await?
        .into_iter()
        .map(|b| (b.name, b.id))
        .collect();
    let group_ids: HashMap<String, String> = idp
        .list_groups(None)
        .await?
        .into_iter()
        .map(|g| (g.profile.name, g.id))
        .collect();

    let mut user_by_name = HashMap::new();
    let mut user_by_login = HashMap::new();
    for user in idp.list_users(false).await? {
        let profile = &user.profile;
        let name = format!(
            "{} {}",
            profile.first_name.as_deref().unwrap_or_default(),
            profile.last_name.as_deref().unwrap_or_default()
        );
        let name = name.trim().to_lowercase();
        if !name.is_empty() {
            user_by_name.insert(name, user.id.clone());
        }
        for key in [&profile.login, &profile.email] {
            if !key.is_empty() {
                user_by_login
                    .entry(key.to_lowercase())
                    .or_insert_with(|| user.id.clone());
            }
        }
    }

    let mut summary = GrantImportSummary::default();

    for grant in &export.grants {
        if grant
            .target_app_name
            .as_ref()
            .is_some_and(|app| exclude_apps.contains(app))
        {
            summary.excluded += 1;
            continue;
        }

        let Some(bundle_id) = bundle_ids.get(&grant.bundle_name) else {
            warn!(bundle = %grant.bundle_name, "Bundle not found in target");
            summary.skipped += 1;
            continue;
        };

        let principal_id = match grant.principal_type.as_str() {
            "GROUP" => group_ids.get(&grant.principal_name),
            "USER" => {
                let key = grant.principal_name.to_lowercase();
                user_by_name.get(&key).or_else(|| user_by_login.get(&key))
            }
            _ => None,
        };
        let Some(principal_id) = principal_id else {
            warn!(
                principal_type = %grant.principal_type,
                principal = %grant.principal_name,
                "Principal not found in target"
            );
            summary.skipped += 1;
            continue;
        };

        let payload = grant_payload(principal_id, &grant.principal_type, bundle_id);
        if dry_run {
            info!(bundle = %grant.bundle_name, principal = %grant.principal_name, "[DRY RUN] Would create grant: {payload}");
            summary.created += 1;
            continue;
        }

        match governance.create_grant(&payload).await? {
            GrantOutcome::Created => {
                info!(bundle = %grant.bundle_name, principal = %grant.principal_name, "Created grant");
                summary.created += 1;
            }
            GrantOutcome::Exists => summary.exists += 1,
            GrantOutcome::Failed { status, message } => {
                warn!(status, bundle = %grant.bundle_name, "Grant creation failed: {message}");
                summary.errors += 1;
            }
        }
    }

    Ok(summary)
}
