use crate::atomic::atomic_write;
use crate::count::{count_csv_rows, count_json_items};

use chrono::{DateTime, SubsecRound, Utc};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use strata_core::prelude::*;
use tokio::fs;
use tracing::{debug, info};

/// One file the manifest looks for inside the backup directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedFile {
    /// Relative to the backup directory, e.g. "oig/reviews.json".
    pub file: String,
    pub count_key: Option<String>,
    pub origin: ResourceOrigin,
}

impl ExpectedFile {
    pub fn export(file: &str, count_key: Option<&str>) -> Self {
        Self {
            file: file.to_string(),
            count_key: count_key.map(str::to_string),
            origin: ResourceOrigin::Export,
        }
    }

    pub fn terraform(file: &str, count_key: Option<&str>) -> Self {
        Self {
            origin: ResourceOrigin::Terraform,
            ..Self::export(file, count_key)
        }
    }

    /// File name without directory prefix and extension.
    pub fn resource_name(&self) -> String {
        let name = self.file.rsplit('/').next().unwrap_or(&self.file);
        match name.rsplit_once('.') {
            Some((stem, _)) => stem.to_string(),
            None => name.to_string(),
        }
    }
}

pub fn default_expected_files() -> Vec<ExpectedFile> {
    vec![
        ExpectedFile::export("users.csv", None),
        ExpectedFile::export("groups.json", Some("groups")),
        ExpectedFile::export("memberships.json", Some("memberships")),
        ExpectedFile::export("app_assignments.json", Some("applications")),
        ExpectedFile::export("owner_mappings.json", None),
        ExpectedFile::export("label_mappings.json", Some("labels")),
        ExpectedFile::export("risk_rules.json", Some("rules")),
        ExpectedFile::terraform("oig/entitlements.json", Some("entitlements")),
        ExpectedFile::terraform("oig/reviews.json", Some("reviews")),
        ExpectedFile::terraform("oig/request_sequences.json", Some("sequences")),
        ExpectedFile::terraform("oig/catalog_entries.json", Some("entries")),
    ]
}

/// Scans a backup directory and produces a resource-based manifest.
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    backup_dir: PathBuf,
    expected: Vec<ExpectedFile>,
    org_name: String,
    created_by: String,
    schedule: Schedule,
    state: Option<StateReference>,
    created_at: Option<DateTime<Utc>>,
}

impl ManifestBuilder {
    pub fn new(backup_dir: impl Into<PathBuf>, org_name: impl Into<String>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            expected: default_expected_files(),
            org_name: org_name.into(),
            created_by: actor_identity(),
            schedule: Schedule::Manual,
            state: None,
            created_at: None,
        }
    }

    pub fn expected_files(mut self, expected: Vec<ExpectedFile>) -> Self {
        self.expected = expected;
        self
    }

    pub fn created_by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = actor.into();
        self
    }

    pub fn schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Embedded verbatim in the manifest.
    pub fn state_reference(mut self, state: Option<StateReference>) -> Self {
        self.state = state;
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    pub async fn build(&self) -> Result<SnapshotManifest, ManifestError> {
        if !fs::metadata(&self.backup_dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Err(ManifestError::Invalid(format!(
                "backup directory not found: {}",
                self.backup_dir.display()
            )));
        }

        let created_at = self
            .created_at
            .unwrap_or_else(|| Utc::now().trunc_subsecs(0));
        let mut manifest = SnapshotManifest::resource_based(
            &self.org_name,
            &self.created_by,
            self.schedule,
            created_at,
        );
        manifest.backup_dir = Some(self.backup_dir.display().to_string());

        let mut total_resources = 0;
        for expected in &self.expected {
            let Some(descriptor) = self.describe(expected).await? else {
                debug!(file = %expected.file, "Not present, skipping");
                continue;
            };

            let count = descriptor.count.unwrap_or(0);
            info!(file = %expected.file, count, "Added to manifest");
            total_resources += count;
            manifest.resources.insert(
                expected.resource_name(),
                ResourceEntry {
                    count,
                    file: expected.file.clone(),
                    source: expected.origin,
                },
            );
            manifest.files.push(descriptor);
        }

        manifest.summary = Some(ManifestSummary {
            total_files: manifest.files.len(),
            total_resources,
        });
        manifest.terraform_state = self.state.clone();

        Ok(manifest)
    }

    async fn describe(&self, expected: &ExpectedFile) -> Result<Option<FileDescriptor>, ManifestError> {
        let path = self.backup_dir.join(&expected.file);

        let metadata = match fs::metadata(&path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ManifestError::io(&path, e)),
        };

        let data = fs::read(&path)
            .await
            .map_err(|e| ManifestError::io(&path, e))?;
        let modified = metadata
            .modified()
            .map(|t| DateTime::<Utc>::from(t).trunc_subsecs(0))
            .map_err(|e| ManifestError::io(&path, e))?;

        Ok(Some(FileDescriptor {
            file: expected.file.clone(),
            size_bytes: metadata.len(),
            modified,
            sha256: hex::encode(Sha256::digest(&data)),
            count: count_records(&path, &data, expected.count_key.as_deref())?,
        }))
    }
}

fn count_records(path: &Path, data: &[u8], key: Option<&str>) -> Result<Option<usize>, ManifestError> {
    let parse_error = |message: String| ManifestError::Parse {
        path: path.to_path_buf(),
        message,
    };

    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => count_csv_rows(data)
            .map(Some)
            .map_err(|e| parse_error(e.to_string())),
        Some("json") => {
            let value: serde_json::Value =
                serde_json::from_slice(data).map_err(|e| parse_error(e.to_string()))?;
            Ok(Some(count_json_items(&value, key)))
        }
        _ => Ok(None),
    }
}

/// Pretty-printed, written atomically.
pub async fn write_manifest(manifest: &SnapshotManifest, output: &Path) -> Result<(), ManifestError> {
    let data = manifest.to_pretty_json()?;
    atomic_write(output, data)
        .await
        .map_err(|e| ManifestError::io(output, e))
}

pub async fn read_manifest(path: &Path) -> Result<SnapshotManifest, ManifestError> {
    let data = fs::read(path)
        .await
        .map_err(|e| ManifestError::io(path, e))?;
    SnapshotManifest::from_slice(&data).map_err(|e| ManifestError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
