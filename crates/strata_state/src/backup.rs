use crate::error::BackupError;

use chrono::{DateTime, SubsecRound, Utc};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use strata_core::prelude::*;
use strata_fs::{atomic_write, sha256_file, write_manifest};
use tracing::{info, instrument};

pub const STATE_FILE_NAME: &str = "terraform.tfstate";

/// What to record in a state-based manifest besides the state itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRequest {
    pub environment: String,
    pub org_name: String,
    pub output_dir: PathBuf,
    pub schedule: Schedule,
    pub created_by: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl BackupRequest {
    pub fn new(
        environment: impl Into<String>,
        org_name: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            environment: environment.into(),
            org_name: org_name.into(),
            output_dir: output_dir.into(),
            schedule: Schedule::Manual,
            created_by: actor_identity(),
            created_at: None,
        }
    }

    pub fn schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn created_by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = actor.into();
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.output_dir.join(MANIFEST_FILE_NAME)
    }

    fn state_path(&self) -> PathBuf {
        self.output_dir.join(STATE_FILE_NAME)
    }

    /// Builds and atomically writes the manifest for `state`.
    async fn finish(&self, state: CapturedState) -> Result<BackupOutcome, BackupError> {
        let created_at = self
            .created_at
            .unwrap_or_else(|| Utc::now().trunc_subsecs(0));
        let manifest = SnapshotManifest::state_based(
            &self.environment,
            &self.org_name,
            &self.created_by,
            self.schedule,
            state,
            created_at,
        );
        let manifest_path = self.manifest_path();
        write_manifest(&manifest, &manifest_path).await?;
        info!(path = %manifest_path.display(), "Manifest created");

        Ok(BackupOutcome {
            manifest,
            manifest_path,
        })
    }
}

#[derive(Debug, Clone)]
pub struct BackupOutcome {
    pub manifest: SnapshotManifest,
    pub manifest_path: PathBuf,
}

/// Captures the current version of a remotely stored state object.
#[derive(Clone)]
pub struct StateBackup<S: StateStore> {
    store: S,
    key: String,
}

impl<S: StateStore> StateBackup<S> {
    pub fn new(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Metadata-only read of the current version.
    #[instrument(skip(self), fields(bucket = %self.store.bucket(), key = %self.key))]
    pub async fn capture(&self) -> Result<RemoteState, BackupError> {
        let head = self.store.head(&self.key).await?;
        Ok(RemoteState {
            bucket: self.store.bucket().to_string(),
            key: self.key.clone(),
            region: self.store.region().to_string(),
            version_id: head.version_id,
            etag: head.etag.map(|e| e.trim_matches('"').to_string()),
            last_modified: head.last_modified,
            content_length: head.size,
            backup_path: None,
            backup_sha256: None,
        })
    }

    /// Records the current version and, with `download`, a copy of the
    /// content at exactly that version plus its hash.
    pub async fn backup(&self, request: &BackupRequest, download: bool) -> Result<BackupOutcome, BackupError> {
        let mut state = self.capture().await?;

        if download {
            let data = self
                .store
                .get_version(&self.key, state.version_id.as_deref())
                .await?;
            let path = request.state_path();
            state.backup_sha256 = Some(hex::encode(Sha256::digest(&data)));
            atomic_write(&path, data)
                .await
                .map_err(|e| BackupError::io(&path, e))?;
            info!(path = %path.display(), "State downloaded");
            state.backup_path = Some(path.display().to_string());
        }

        request.finish(CapturedState::S3(state)).await
    }
}

/// Copies a local state file next to the manifest. The copy cannot be
/// restored by version, only compared.
pub async fn backup_local(request: &BackupRequest, state_path: &Path) -> Result<BackupOutcome, BackupError> {
    if !tokio::fs::try_exists(state_path).await.unwrap_or(false) {
        return Err(BackupError::LocalStateNotFound(state_path.to_path_buf()));
    }

    let backup_path = request.state_path();
    tokio::fs::create_dir_all(&request.output_dir)
        .await
        .map_err(|e| BackupError::io(&request.output_dir, e))?;
    tokio::fs::copy(state_path, &backup_path)
        .await
        .map_err(|e| BackupError::io(&backup_path, e))?;

    let (sha256, size_bytes) = sha256_file(&backup_path)
        .await
        .map_err(|e| BackupError::io(&backup_path, e))?;
    let modified = tokio::fs::metadata(&backup_path)
        .await
        .and_then(|m| m.modified())
        .map(|t| DateTime::<Utc>::from(t).trunc_subsecs(0))
        .map_err(|e| BackupError::io(&backup_path, e))?;

    request
        .finish(CapturedState::Local(LocalState {
            original_path: state_path.display().to_string(),
            backup_path: backup_path.display().to_string(),
            sha256,
            size_bytes,
            modified,
        }))
        .await
}
