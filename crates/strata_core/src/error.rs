use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("State object not found: {0}")]
    NotFound(String),

    #[error("State version not found: {0}")]
    VersionNotFound(String),

    #[error("State store backend error: {0}")]
    Generic(String),
}

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Manifest serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid manifest: {0}")]
    Invalid(String),
}

impl ManifestError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Error, Debug)]
pub enum ProvisioningError {
    #[error("Working directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raised before any network call when required settings are absent.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
