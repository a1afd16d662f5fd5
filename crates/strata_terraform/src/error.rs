use std::path::PathBuf;
use strata_core::error::ProvisioningError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TerraformError {
    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Failed to walk {0}")]
    Walk(#[from] walkdir::Error),
}
