pub use strata_core::*;

pub mod http {
    pub use strata_http::*;
}

pub mod fs {
    pub use strata_fs::*;
}

#[cfg(feature = "idp")]
pub mod idp {
    pub use strata_idp::*;
}

#[cfg(feature = "gateway")]
pub mod gateway {
    pub use strata_gateway::*;
}

#[cfg(feature = "pam")]
pub mod pam {
    pub use strata_pam::*;
}

#[cfg(feature = "s3")]
pub mod s3 {
    pub use strata_s3::*;
}

#[cfg(feature = "terraform")]
pub mod terraform {
    pub use strata_terraform::*;
}

#[cfg(feature = "state")]
pub mod state {
    pub use strata_state::*;
}

#[cfg(feature = "mock")]
pub mod mock {
    pub use strata_mock::*;
}

pub mod prelude {
    pub use strata_core::prelude::*;
    pub use strata_fs::{ManifestBuilder, atomic_write};
    pub use strata_http::{ApiClient, ReqwestTransport, RetryPolicy};

    #[cfg(feature = "idp")]
    pub use strata_idp::{GovernanceClient, IdpClient};

    #[cfg(feature = "gateway")]
    pub use strata_gateway::{ApplicationManager, GatewayClient};

    #[cfg(feature = "pam")]
    pub use strata_pam::{PamClient, PamImporter};

    #[cfg(feature = "s3")]
    pub use strata_s3::S3StateStore;

    #[cfg(feature = "terraform")]
    pub use strata_terraform::TerraformCli;

    #[cfg(feature = "state")]
    pub use strata_state::{BackupRequest, StateBackup, StateRestore};

    #[cfg(feature = "mock")]
    pub use strata_mock::{MemoryStateStore, MockTransport, ScriptedProvisioner};
}
