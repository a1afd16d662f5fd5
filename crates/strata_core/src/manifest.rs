use crate::error::{ConfigError, ManifestError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const MANIFEST_FILE_NAME: &str = "MANIFEST.json";
pub const RESOURCE_MANIFEST_VERSION: &str = "1.0";
pub const STATE_MANIFEST_VERSION: &str = "2.0";

/// Sortable snapshot identifier, e.g. `2025-01-15T10-30-00`.
pub fn snapshot_id_for(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H-%M-%S").to_string()
}

/// The "Manifest" is the point-in-time description of one snapshot.
///
/// It is written once and never updated in place. A new snapshot always
/// produces a new manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotManifest {
    /// Schema version: "1.0" for resource exports, "2.0" for state-based backups.
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_type: Option<BackupType>,

    /// Timestamp-derived and lexically sortable.
    pub snapshot_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    pub org_name: String,

    pub created_at: DateTime<Utc>,

    /// Who triggered the backup.
    pub created_by: String,

    #[serde(default)]
    pub schedule: Schedule,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<String>,

    /// Ordered as the expected-file list, absent files omitted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileDescriptor>,

    /// - Key: resource type name e.g., "users", "entitlements"
    /// - Value: where it came from and how many records it holds
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<String, ResourceEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terraform_state: Option<StateReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_exports: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_instructions: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<ManifestSummary>,
}

impl SnapshotManifest {
    pub fn resource_based(
        org_name: impl Into<String>,
        created_by: impl Into<String>,
        schedule: Schedule,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            version: RESOURCE_MANIFEST_VERSION.to_string(),
            backup_type: None,
            snapshot_id: snapshot_id_for(created_at),
            environment: None,
            org_name: org_name.into(),
            created_at,
            created_by: created_by.into(),
            schedule,
            backup_dir: None,
            files: Vec::new(),
            resources: BTreeMap::new(),
            terraform_state: None,
            resource_exports: None,
            restore_instructions: None,
            summary: None,
        }
    }

    pub fn state_based(
        environment: impl Into<String>,
        org_name: impl Into<String>,
        created_by: impl Into<String>,
        schedule: Schedule,
        state: CapturedState,
        created_at: DateTime<Utc>,
    ) -> Self {
        let restore_instructions = BTreeMap::from([
            (
                "state_restore".to_string(),
                format!("Run `strata state restore --manifest {MANIFEST_FILE_NAME}` to roll back the remote state"),
            ),
            (
                "full_restore".to_string(),
                format!("Run `strata state restore --manifest {MANIFEST_FILE_NAME} --full-restore` for state + terraform apply"),
            ),
        ]);

        Self {
            version: STATE_MANIFEST_VERSION.to_string(),
            backup_type: Some(BackupType::StateBased),
            environment: Some(environment.into()),
            terraform_state: Some(StateReference::Captured(state)),
            resource_exports: Some(BTreeMap::new()),
            restore_instructions: Some(restore_instructions),
            ..Self::resource_based(org_name, created_by, schedule, created_at)
        }
    }

    pub fn from_slice(data: &[u8]) -> Result<Self, ManifestError> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn to_pretty_json(&self) -> Result<Vec<u8>, ManifestError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Returns the captured state, rejecting anything that is not a state-based manifest.
    pub fn captured_state(&self) -> Result<&CapturedState, ManifestError> {
        if self.backup_type != Some(BackupType::StateBased) {
            let found = self
                .backup_type
                .map(|t| t.to_string())
                .unwrap_or_else(|| "none".to_string());
            return Err(ManifestError::Invalid(format!(
                "expected backup_type='state-based', got '{found}'"
            )));
        }

        match &self.terraform_state {
            Some(StateReference::Captured(state)) => Ok(state),
            Some(StateReference::Pointer(_)) => Err(ManifestError::Invalid(
                "terraform_state is a bare pointer, not a captured state".into(),
            )),
            None => Err(ManifestError::Invalid(
                "missing terraform_state section".into(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackupType {
    #[serde(rename = "state-based")]
    StateBased,
    #[serde(rename = "resource-based")]
    ResourceBased,
}

impl fmt::Display for BackupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupType::StateBased => f.write_str("state-based"),
            BackupType::ResourceBased => f.write_str("resource-based"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Schedule {
    #[default]
    Manual,
    Daily,
    Weekly,
}

impl FromStr for Schedule {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Schedule::Manual),
            "daily" => Ok(Schedule::Daily),
            "weekly" => Ok(Schedule::Weekly),
            other => Err(ConfigError::Invalid(format!(
                "unknown schedule '{other}' (expected manual, daily or weekly)"
            ))),
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Schedule::Manual => "manual",
            Schedule::Daily => "daily",
            Schedule::Weekly => "weekly",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Path relative to the backup directory, e.g. "oig/reviews.json".
    pub file: String,

    pub size_bytes: u64,

    pub modified: DateTime<Utc>,

    /// The SHA256 of the file content at manifest creation time.
    pub sha256: String,

    /// Record count, only for CSV and JSON files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceOrigin {
    Export,
    Terraform,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub count: usize,
    pub file: String,
    pub source: ResourceOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestSummary {
    pub total_files: usize,
    pub total_resources: usize,
}

/// Either a full capture from a state backup or a bare pointer attached to a
/// resource manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateReference {
    Captured(CapturedState),
    Pointer(StatePointer),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePointer {
    pub s3_bucket: String,
    pub s3_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum CapturedState {
    S3(RemoteState),
    Local(LocalState),
}

/// One immutable revision of the remotely stored state object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteState {
    pub bucket: String,
    pub key: String,
    pub region: String,
    #[serde(default)]
    pub version_id: Option<String>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub content_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<String>,
    /// Hash of the content downloaded at exactly `version_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_sha256: Option<String>,
}

/// A plain file copy. Not retrievable by version, only usable for comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalState {
    pub original_path: String,
    pub backup_path: String,
    pub sha256: String,
    pub size_bytes: u64,
    pub modified: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn snapshot_id_sorts_lexically() {
        let earlier = snapshot_id_for(Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap());
        let later = snapshot_id_for(Utc.with_ymd_and_hms(2025, 11, 2, 8, 5, 9).unwrap());
        assert_eq!(earlier, "2025-01-15T10-30-00");
        assert!(earlier < later);
    }

    #[test]
    fn parses_state_based_manifest() {
        let raw = r#"{
            "version": "2.0",
            "backup_type": "state-based",
            "snapshot_id": "2025-01-15T10-30-00",
            "environment": "mycompany",
            "org_name": "mycompany",
            "created_at": "2025-01-15T10:30:00Z",
            "created_by": "ci",
            "schedule": "daily",
            "terraform_state": {
                "source": "s3",
                "bucket": "tf-state",
                "key": "env/mycompany/terraform.tfstate",
                "region": "us-east-1",
                "version_id": "v-123",
                "etag": "abc"
            },
            "resource_exports": {}
        }"#;

        let manifest = SnapshotManifest::from_slice(raw.as_bytes()).unwrap();
        assert_eq!(manifest.schedule, Schedule::Daily);
        match manifest.captured_state().unwrap() {
            CapturedState::S3(remote) => {
                assert_eq!(remote.version_id.as_deref(), Some("v-123"));
                assert_eq!(remote.bucket, "tf-state");
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn resource_manifest_keeps_bare_pointer() {
        let raw = r#"{
            "version": "1.0",
            "snapshot_id": "2025-01-15T10-30-00",
            "org_name": "acme",
            "created_at": "2025-01-15T10:30:00Z",
            "created_by": "ops",
            "schedule": "manual",
            "terraform_state": { "s3_bucket": "b", "s3_key": "k" }
        }"#;

        let manifest = SnapshotManifest::from_slice(raw.as_bytes()).unwrap();
        assert_eq!(
            manifest.terraform_state,
            Some(StateReference::Pointer(StatePointer {
                s3_bucket: "b".into(),
                s3_key: "k".into(),
                version_id: None,
            }))
        );
        assert!(matches!(
            manifest.captured_state(),
            Err(ManifestError::Invalid(_))
        ));
    }

    #[test]
    fn state_based_manifest_serializes_source_tag() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let local = LocalState {
            original_path: "terraform.tfstate".into(),
            backup_path: "backup/terraform.tfstate".into(),
            sha256: "00".repeat(32),
            size_bytes: 12,
            modified: now,
        };
        let manifest = SnapshotManifest::state_based(
            "prod",
            "acme",
            "ops",
            Schedule::Weekly,
            CapturedState::Local(local),
            now,
        );

        let value: serde_json::Value =
            serde_json::from_slice(&manifest.to_pretty_json().unwrap()).unwrap();
        assert_eq!(value["backup_type"], "state-based");
        assert_eq!(value["terraform_state"]["source"], "local");
        assert_eq!(value["version"], STATE_MANIFEST_VERSION);
        assert!(value.get("files").is_none());
    }

    #[test]
    fn schedule_parses_known_labels_only() {
        assert_eq!("weekly".parse::<Schedule>().unwrap(), Schedule::Weekly);
        assert!("hourly".parse::<Schedule>().is_err());
    }
}
