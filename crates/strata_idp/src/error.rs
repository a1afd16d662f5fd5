use std::path::PathBuf;
use strata_core::prelude::*;
use strata_http::HttpError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdpError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("Application not found: {0}")]
    AppNotFound(String),
}

impl IdpError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
