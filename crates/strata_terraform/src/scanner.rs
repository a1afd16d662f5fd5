use crate::error::TerraformError;

use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

const SKIPPED_FILE: &str = "RESOURCE_EXAMPLES.tf";

/// Apps targeted by entitlement resources across a set of `.tf` files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntitlementScan {
    /// Literal application ids, e.g. `0oa1b2c3`.
    pub app_ids: BTreeSet<String>,
    /// References such as `okta_app_oauth.my_app`.
    pub terraform_references: BTreeSet<String>,
    pub resolved_labels: BTreeMap<String, String>,
    pub files_scanned: usize,
}

impl EntitlementScan {
    pub fn total(&self) -> usize {
        self.app_ids.len() + self.terraform_references.len()
    }
}

pub struct EntitlementScanner {
    entitlement: Regex,
    bundle: Regex,
    literal: Regex,
    reference: Regex,
}

impl EntitlementScanner {
    pub fn new() -> Result<Self, TerraformError> {
        Ok(Self {
            entitlement: Regex::new(
                r#"resource\s+"okta_entitlement"\s+"[^"]+"\s*\{[^}]*app_id\s*=\s*([^\n]+)"#,
            )?,
            bundle: Regex::new(
                r#"resource\s+"okta_entitlement_bundle"\s+"[^"]+"\s*\{[^}]*target\s*\{[^}]*external_id\s*=\s*([^\n]+)"#,
            )?,
            literal: Regex::new(r#"^"(0oa[^"]+)""#)?,
            reference: Regex::new(r"^(okta_app_[a-z_]+\.[a-zA-Z0-9_]+)\.id")?,
        })
    }

    /// Adds every app targeted in `content` to `scan`. Variables cannot be
    /// resolved and are ignored.
    pub fn scan_content(&self, content: &str, scan: &mut EntitlementScan) {
        let values = self
            .entitlement
            .captures_iter(content)
            .chain(self.bundle.captures_iter(content))
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().trim());

        for value in values {
            if let Some(id) = self.literal.captures(value).and_then(|c| c.get(1)) {
                scan.app_ids.insert(id.as_str().to_string());
            } else if let Some(reference) = self.reference.captures(value).and_then(|c| c.get(1)) {
                scan.terraform_references
                    .insert(reference.as_str().to_string());
            }
        }
    }

    /// Unreadable files are reported and skipped.
    pub async fn scan_files(&self, files: &[PathBuf]) -> EntitlementScan {
        let mut scan = EntitlementScan {
            files_scanned: files.len(),
            ..Default::default()
        };

        for file in files {
            if file.file_name().is_some_and(|n| n == SKIPPED_FILE) {
                continue;
            }
            match tokio::fs::read_to_string(file).await {
                Ok(content) => self.scan_content(&content, &mut scan),
                Err(e) => warn!("Could not read {}: {e}", file.display()),
            }
        }
        scan
    }

    /// Looks up `label = "..."` of each referenced app resource in `dir`.
    pub async fn resolve_labels(
        &self,
        dir: &Path,
        references: &BTreeSet<String>,
    ) -> Result<BTreeMap<String, String>, TerraformError> {
        let mut patterns = Vec::new();
        for reference in references {
            let Some((resource_type, name)) = reference.split_once('.') else {
                continue;
            };
            let pattern = Regex::new(&format!(
                r#"resource\s+"{}"\s+"{}"\s*\{{[^}}]*label\s*=\s*"([^"]+)""#,
                regex::escape(resource_type),
                regex::escape(name)
            ))?;
            patterns.push((reference.clone(), pattern));
        }

        let mut resolved = BTreeMap::new();
        if patterns.is_empty() {
            return Ok(resolved);
        }

        for file in find_tf_files(dir)? {
            let Ok(content) = tokio::fs::read_to_string(&file).await else {
                continue;
            };
            for (reference, pattern) in &patterns {
                if resolved.contains_key(reference) {
                    continue;
                }
                if let Some(label) = pattern.captures(&content).and_then(|c| c.get(1)) {
                    resolved.insert(reference.clone(), label.as_str().to_string());
                }
            }
        }
        Ok(resolved)
    }
}

/// `.tf` files directly inside `dir`, sorted. A missing directory yields none.
pub fn find_tf_files(dir: &Path) -> Result<Vec<PathBuf>, TerraformError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && entry.path().extension().is_some_and(|e| e == "tf") {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
