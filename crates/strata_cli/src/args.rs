use clap::Args;
use std::path::PathBuf;
use strata_core::prelude::*;
use strata_idp::AppSelector;

/// Identity provider tenant credentials.
#[derive(Args, Debug, Clone)]
pub struct IdpArgs {
    #[arg(long, env = "OKTA_ORG_NAME")]
    pub org_name: Option<String>,

    /// Domain (e.g. "oktapreview.com") or full base URL
    #[arg(long, env = "OKTA_BASE_URL")]
    pub base_url: Option<String>,

    #[arg(long, env = "OKTA_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,
}

impl IdpArgs {
    pub fn config(&self) -> Result<IdpConfig, ConfigError> {
        IdpConfig::new(
            self.org_name.clone().unwrap_or_default(),
            self.base_url.clone(),
            self.api_token.clone().unwrap_or_default(),
        )
    }
}

/// Location of the remote state object.
#[derive(Args, Debug, Clone)]
pub struct StateArgs {
    #[arg(long)]
    pub state_bucket: Option<String>,

    #[arg(long)]
    pub state_key: Option<String>,

    #[arg(long, env = "AWS_REGION", default_value = DEFAULT_REGION)]
    pub aws_region: String,
}

impl StateArgs {
    /// `None` when no bucket was given.
    pub fn location(&self) -> Result<Option<StateLocation>, ConfigError> {
        let Some(bucket) = &self.state_bucket else {
            return Ok(None);
        };
        let key = self
            .state_key
            .clone()
            .ok_or_else(|| ConfigError::Missing("--state-key".into()))?;
        StateLocation::new(bucket.clone(), key, Some(self.aws_region.clone())).map(Some)
    }

    pub fn require_location(&self) -> Result<StateLocation, ConfigError> {
        self.location()?
            .ok_or_else(|| ConfigError::Missing("--state-bucket".into()))
    }
}

/// Which applications to act on.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct AppSelection {
    #[arg(long)]
    pub app_id: Option<String>,

    /// Shell wildcard on the label, e.g. "Salesforce*"
    #[arg(long)]
    pub app_label: Option<String>,
}

impl AppSelection {
    pub fn selector(&self) -> AppSelector {
        match (&self.app_id, &self.app_label) {
            (Some(id), _) => AppSelector::Id(id.clone()),
            (None, Some(pattern)) => AppSelector::Label(pattern.clone()),
            (None, None) => AppSelector::All,
        }
    }
}

/// Access gateway connection. A config file's `gateway` section wins over these.
#[derive(Args, Debug, Clone)]
pub struct GatewayArgs {
    /// Applications file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(long, env = "OAG_HOSTNAME")]
    pub hostname: Option<String>,

    #[arg(long, env = "OAG_CLIENT_ID")]
    pub client_id: Option<String>,

    #[arg(long, env = "OAG_PRIVATE_KEY_PATH")]
    pub private_key_path: Option<PathBuf>,

    /// PEM content, used when no key path is set
    #[arg(long, env = "OAG_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,
}

/// Privileged access team credentials.
#[derive(Args, Debug, Clone)]
pub struct PamArgs {
    #[arg(long, env = "OKTAPAM_TEAM")]
    pub team: Option<String>,

    #[arg(long, env = "OKTAPAM_KEY")]
    pub key_id: Option<String>,

    #[arg(long, env = "OKTAPAM_SECRET", hide_env_values = true)]
    pub key_secret: Option<String>,

    #[arg(long, default_value = DEFAULT_PAM_API_BASE)]
    pub api_base: String,
}

impl PamArgs {
    pub fn config(&self) -> Result<PamConfig, ConfigError> {
        Ok(PamConfig::new(self.team.clone(), self.key_id.clone(), self.key_secret.clone())?
            .with_api_base(&self.api_base))
    }
}
