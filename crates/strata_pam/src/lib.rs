//! Privileged access API client and an importer that turns a team's live
//! resources into Terraform configuration plus `terraform import` commands.

mod auth;
mod client;
mod error;
mod hcl;
mod importer;
pub mod model;

pub use auth::ServiceTokenAuth;
pub use client::PamClient;
pub use error::PamError;
pub use hcl::{NameAllocator, TerraformBlock, sanitize_name};
pub use importer::{
    COMMANDS_FILE, EXPORT_FILE, FolderEntry, ImportArtifacts, ImportReport, ImportSummary, PamImporter,
    PamInventory, ProjectEntry, TERRAFORM_FILE, WrittenFiles, render,
};
