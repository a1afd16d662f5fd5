use crate::error::*;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Metadata of one version of the state object, without its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectVersion {
    pub version_id: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEntry {
    pub version_id: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: Option<u64>,
    pub is_latest: bool,
}

/// A versioned object store holding the provisioning tool's state.
///
/// Every `put` creates a new version; old versions stay addressable.
pub trait StateStore: Send + Sync + 'static + Clone {
    fn bucket(&self) -> &str;
    fn region(&self) -> &str;

    /// Metadata-only read of the current version.
    fn head(&self, key: &str) -> impl Future<Output = Result<ObjectVersion, StateStoreError>> + Send;

    /// Reads the content at `version_id`, or the current version when `None`.
    fn get_version(
        &self,
        key: &str,
        version_id: Option<&str>,
    ) -> impl Future<Output = Result<Bytes, StateStoreError>> + Send;

    /// Writes `data` as a new current version and returns its version id.
    fn put(
        &self,
        key: &str,
        data: Bytes,
    ) -> impl Future<Output = Result<Option<String>, StateStoreError>> + Send;

    /// Newest first, at most `limit` entries.
    fn list_versions(
        &self,
        key: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<VersionEntry>, StateStoreError>> + Send;
}

/// Captured result of one provisioning subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// A saved plan file, consumed by `apply` and removed by `discard`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanArtifact {
    pub path: PathBuf,
    pub output: ToolOutput,
}

/// External infrastructure-as-code tool driven as a black box.
pub trait ProvisioningTool: Send + Sync {
    fn working_dir(&self) -> &Path;

    fn init(&self) -> impl Future<Output = Result<ToolOutput, ProvisioningError>> + Send;

    /// Always returns the artifact location so a failed plan can still be discarded.
    fn plan(&self) -> impl Future<Output = Result<PlanArtifact, ProvisioningError>> + Send;

    fn apply(
        &self,
        plan: &PlanArtifact,
        auto_approve: bool,
    ) -> impl Future<Output = Result<ToolOutput, ProvisioningError>> + Send;

    fn discard(&self, plan: PlanArtifact) -> impl Future<Output = Result<(), ProvisioningError>> + Send;
}
