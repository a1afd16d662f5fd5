use std::path::PathBuf;
use strata_core::prelude::*;
use strata_http::HttpError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid signing key: {0}")]
    Key(#[from] jsonwebtoken::errors::Error),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid application config: {0}")]
    InvalidApp(String),

    #[error("Application not found: {0}")]
    AppNotFound(String),
}

impl GatewayError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
