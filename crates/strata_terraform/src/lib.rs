mod cli;
mod error;
mod scanner;

pub use cli::{PLAN_FILE, TerraformCli};
pub use error::TerraformError;
pub use scanner::{EntitlementScan, EntitlementScanner, find_tf_files};
