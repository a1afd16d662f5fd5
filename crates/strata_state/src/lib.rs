//! State-based backups and restores.
//!
//! A backup records which version of the remotely stored provisioning state
//! was current, optionally with a hashed copy of its content. A restore
//! writes an old version back as a new current version and can then replay
//! the provisioning tool (`init`, `plan`, `apply`) against it.

mod backup;
mod error;
mod restore;

pub use backup::{BackupOutcome, BackupRequest, STATE_FILE_NAME, StateBackup, backup_local};
pub use error::{BackupError, RestoreError};
pub use restore::{
    FullRestoreReport, ProvisioningOutcome, RestoreOutcome, RestoreTarget, StateRestore, default_terraform_dir,
    run_provisioning,
};
