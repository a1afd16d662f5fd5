use std::path::PathBuf;
use strata_core::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error(transparent)]
    Store(#[from] StateStoreError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("Local state file not found: {0}")]
    LocalStateNotFound(PathBuf),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BackupError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Error, Debug)]
pub enum RestoreError {
    #[error(transparent)]
    Store(#[from] StateStoreError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    #[error("Manifest uses local state, not a versioned store; cannot restore a version")]
    LocalState,

    #[error("No target version: the manifest has no version id")]
    MissingVersion,
}
