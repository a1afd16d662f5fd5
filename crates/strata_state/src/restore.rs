use crate::error::RestoreError;

use serde::Serialize;
use std::path::PathBuf;
use strata_core::prelude::*;
use tracing::{debug, info, instrument, warn};

/// Conventional provisioning directory for an environment.
pub fn default_terraform_dir(environment: &str) -> PathBuf {
    PathBuf::from(format!("environments/{environment}/terraform"))
}

/// The version a restore should bring back, resolved from a manifest or
/// given directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreTarget {
    pub location: StateLocation,
    pub version_id: String,
    pub environment: Option<String>,
}

impl RestoreTarget {
    pub fn version(location: StateLocation, version_id: impl Into<String>) -> Self {
        Self {
            location,
            version_id: version_id.into(),
            environment: None,
        }
    }

    /// Only state-based manifests with a versioned remote capture qualify.
    pub fn from_manifest(manifest: &SnapshotManifest) -> Result<Self, RestoreError> {
        let remote = match manifest.captured_state()? {
            CapturedState::S3(remote) => remote,
            CapturedState::Local(_) => return Err(RestoreError::LocalState),
        };
        let version_id = remote
            .version_id
            .clone()
            .filter(|v| !v.is_empty())
            .ok_or(RestoreError::MissingVersion)?;

        Ok(Self {
            location: StateLocation {
                bucket: remote.bucket.clone(),
                key: remote.key.clone(),
                region: remote.region.clone(),
            },
            version_id,
            environment: manifest.environment.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RestoreOutcome {
    AlreadyCurrent {
        version_id: String,
    },
    DryRun {
        current: Option<String>,
        would_restore: String,
    },
    Restored {
        previous: Option<String>,
        restored_from: String,
        new: Option<String>,
    },
}

/// Result of driving the provisioning tool after a state restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningOutcome {
    InitFailed(ToolOutput),
    PlanFailed(ToolOutput),
    /// Plan succeeded; apply skipped.
    DryRun { plan: ToolOutput },
    Applied { plan: ToolOutput, apply: ToolOutput },
    ApplyFailed { plan: ToolOutput, apply: ToolOutput },
}

impl ProvisioningOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            Self::InitFailed(_) => "init_failed",
            Self::PlanFailed(_) => "plan_failed",
            Self::DryRun { .. } => "dry_run",
            Self::Applied { .. } => "applied",
            Self::ApplyFailed { .. } => "apply_failed",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::DryRun { .. } | Self::Applied { .. })
    }

    /// Captured stderr of the failing step.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::InitFailed(out) | Self::PlanFailed(out) => Some(&out.stderr),
            Self::ApplyFailed { apply, .. } => Some(&apply.stderr),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullRestoreReport {
    pub state: RestoreOutcome,
    pub provisioning: ProvisioningOutcome,
}

impl FullRestoreReport {
    pub fn is_success(&self) -> bool {
        self.provisioning.is_success()
    }
}

/// Rolls a versioned state object back by writing an old version as the
/// new current one. History is never rewritten.
#[derive(Clone)]
pub struct StateRestore<S: StateStore> {
    store: S,
    key: String,
}

impl<S: StateStore> StateRestore<S> {
    pub fn new(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Newest first.
    pub async fn list_versions(&self, limit: usize) -> Result<Vec<VersionEntry>, RestoreError> {
        Ok(self.store.list_versions(&self.key, limit).await?)
    }

    #[instrument(skip(self), fields(bucket = %self.store.bucket(), key = %self.key))]
    pub async fn restore_state(&self, target_version: &str, dry_run: bool) -> Result<RestoreOutcome, RestoreError> {
        let current = self.store.head(&self.key).await?.version_id;
        info!(current = ?current, target = target_version, "Resolving state versions");

        if current.as_deref() == Some(target_version) {
            warn!("Target version is already the current version");
            return Ok(RestoreOutcome::AlreadyCurrent {
                version_id: target_version.to_string(),
            });
        }

        if dry_run {
            return Ok(RestoreOutcome::DryRun {
                current,
                would_restore: target_version.to_string(),
            });
        }

        let data = self
            .store
            .get_version(&self.key, Some(target_version))
            .await?;
        debug!(bytes = data.len(), "Downloaded target version");

        let new = match self.store.put(&self.key, data).await? {
            Some(version) => Some(version),
            None => self.store.head(&self.key).await?.version_id,
        };
        info!(new = ?new, "State restored");

        Ok(RestoreOutcome::Restored {
            previous: current,
            restored_from: target_version.to_string(),
            new,
        })
    }

    /// State restore followed by init, plan and apply.
    pub async fn full_restore<P: ProvisioningTool>(
        &self,
        tool: &P,
        target_version: &str,
        dry_run: bool,
        auto_approve: bool,
    ) -> Result<FullRestoreReport, RestoreError> {
        let state = self.restore_state(target_version, dry_run).await?;
        let provisioning = run_provisioning(tool, dry_run, auto_approve).await?;
        Ok(FullRestoreReport { state, provisioning })
    }
}

/// `init`, then `plan`, then (unless `dry_run`) `apply`. The plan artifact
/// is discarded once the run ends, whatever the result.
pub async fn run_provisioning<P: ProvisioningTool>(
    tool: &P,
    dry_run: bool,
    auto_approve: bool,
) -> Result<ProvisioningOutcome, RestoreError> {
    info!(dir = %tool.working_dir().display(), "Running provisioning tool");

    let init = tool.init().await?;
    if !init.success() {
        warn!(stderr = %init.stderr, "Init failed");
        return Ok(ProvisioningOutcome::InitFailed(init));
    }

    let plan = tool.plan().await?;
    if !plan.output.success() {
        warn!(stderr = %plan.output.stderr, "Plan failed");
        let output = plan.output.clone();
        discard(tool, plan).await;
        return Ok(ProvisioningOutcome::PlanFailed(output));
    }

    if dry_run {
        info!("Dry run: plan complete, apply skipped");
        let output = plan.output.clone();
        discard(tool, plan).await;
        return Ok(ProvisioningOutcome::DryRun { plan: output });
    }

    let apply = tool.apply(&plan, auto_approve).await;
    let plan_output = plan.output.clone();
    discard(tool, plan).await;
    let apply = apply?;

    if apply.success() {
        Ok(ProvisioningOutcome::Applied {
            plan: plan_output,
            apply,
        })
    } else {
        warn!(stderr = %apply.stderr, "Apply failed");
        Ok(ProvisioningOutcome::ApplyFailed {
            plan: plan_output,
            apply,
        })
    }
}

async fn discard<P: ProvisioningTool>(tool: &P, plan: PlanArtifact) {
    let path = plan.path.clone();
    if let Err(e) = tool.discard(plan).await {
        warn!("Could not remove plan file {}: {e}", path.display());
    }
}
