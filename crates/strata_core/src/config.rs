use crate::error::ConfigError;
use std::path::PathBuf;

pub const DEFAULT_BASE_DOMAIN: &str = "okta.com";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_PAM_API_BASE: &str = "https://app.scaleft.com/v1";

/// Every scope the gateway admin API knows about; requested by default.
pub const GATEWAY_SCOPES: [&str; 5] = [
    "okta.oag.app.manage",
    "okta.oag.app.read",
    "okta.oag.cert.read",
    "okta.oag.idp.manage",
    "okta.oag.idp.read",
];

/// Connection settings for one identity provider tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdpConfig {
    pub org_name: String,
    /// Either a bare domain (`okta.com`, `oktapreview.com`) or a full base URL.
    pub base_domain: String,
    pub api_token: String,
}

impl IdpConfig {
    pub fn new(
        org_name: impl Into<String>,
        base_domain: Option<String>,
        api_token: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            org_name: org_name.into(),
            base_domain: base_domain
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BASE_DOMAIN.to_string()),
            api_token: api_token.into(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.org_name.trim().is_empty() {
            return Err(ConfigError::Missing("OKTA_ORG_NAME".into()));
        }
        if self.api_token.trim().is_empty() {
            return Err(ConfigError::Missing("OKTA_API_TOKEN".into()));
        }
        Ok(())
    }

    pub fn base_url(&self) -> String {
        if has_scheme(&self.base_domain) {
            self.base_domain.trim_end_matches('/').to_string()
        } else {
            format!("https://{}.{}", self.org_name, self.base_domain)
        }
    }

    pub fn api_url(&self) -> String {
        format!("{}/api/v1", self.base_url())
    }

    pub fn governance_url(&self) -> String {
        format!("{}/governance/api/v1", self.base_url())
    }
}

/// Where the private key for the gateway assertion comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    Path(PathBuf),
    Pem(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Admin hostname, optionally with scheme.
    pub hostname: String,
    pub client_id: String,
    pub key: KeySource,
    pub scopes: Vec<String>,
    pub verify_ssl: bool,
}

impl GatewayConfig {
    pub fn new(
        hostname: Option<String>,
        client_id: Option<String>,
        key_path: Option<PathBuf>,
        key_pem: Option<String>,
    ) -> Result<Self, ConfigError> {
        let hostname = non_empty(hostname).ok_or_else(|| ConfigError::Missing("OAG_HOSTNAME".into()))?;
        let client_id =
            non_empty(client_id).ok_or_else(|| ConfigError::Missing("OAG_CLIENT_ID".into()))?;
        let key = match (key_path, non_empty(key_pem)) {
            (Some(path), _) => KeySource::Path(path),
            (None, Some(pem)) => KeySource::Pem(pem),
            (None, None) => {
                return Err(ConfigError::Missing(
                    "OAG_PRIVATE_KEY_PATH or OAG_PRIVATE_KEY".into(),
                ));
            }
        };

        Ok(Self {
            hostname,
            client_id,
            key,
            scopes: GATEWAY_SCOPES.iter().map(|s| s.to_string()).collect(),
            verify_ssl: true,
        })
    }

    pub fn base_url(&self) -> String {
        if has_scheme(&self.hostname) {
            self.hostname.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", self.hostname)
        }
    }

    pub fn scope(&self) -> String {
        self.scopes.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PamConfig {
    pub team: String,
    pub key_id: String,
    pub key_secret: String,
    pub api_base: String,
}

impl PamConfig {
    pub fn new(
        team: Option<String>,
        key_id: Option<String>,
        key_secret: Option<String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            team: non_empty(team).ok_or_else(|| ConfigError::Missing("OKTAPAM_TEAM".into()))?,
            key_id: non_empty(key_id).ok_or_else(|| ConfigError::Missing("OKTAPAM_KEY".into()))?,
            key_secret: non_empty(key_secret)
                .ok_or_else(|| ConfigError::Missing("OKTAPAM_SECRET".into()))?,
            api_base: DEFAULT_PAM_API_BASE.to_string(),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

/// Location of the versioned state object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLocation {
    pub bucket: String,
    pub key: String,
    pub region: String,
}

impl StateLocation {
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        region: Option<String>,
    ) -> Result<Self, ConfigError> {
        let bucket = bucket.into();
        let key = key.into();
        if bucket.trim().is_empty() {
            return Err(ConfigError::Missing("state bucket".into()));
        }
        if key.trim().is_empty() {
            return Err(ConfigError::Missing("state key".into()));
        }
        Ok(Self {
            bucket,
            key,
            region: non_empty(region).unwrap_or_else(|| DEFAULT_REGION.to_string()),
        })
    }

    /// Conventional key layout: `{prefix}/{environment}/terraform.tfstate`.
    pub fn environment_key(prefix: &str, environment: &str) -> String {
        format!("{}/{}/terraform.tfstate", prefix.trim_end_matches('/'), environment)
    }
}

/// Who is running the tool: CI actor first, then the login user.
pub fn actor_identity() -> String {
    let from_env = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
    from_env("GITHUB_ACTOR")
        .or_else(|| from_env("USER"))
        .or_else(|| whoami::username().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn has_scheme(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idp_urls_from_bare_domain() {
        let config = IdpConfig::new("acme", None, "token").unwrap();
        assert_eq!(config.base_url(), "https://acme.okta.com");
        assert_eq!(config.governance_url(), "https://acme.okta.com/governance/api/v1");
    }

    #[test]
    fn idp_accepts_full_base_url() {
        let config = IdpConfig::new("acme", Some("http://127.0.0.1:9000/".into()), "t").unwrap();
        assert_eq!(config.api_url(), "http://127.0.0.1:9000/api/v1");
    }

    #[test]
    fn missing_token_is_a_config_error() {
        let err = IdpConfig::new("acme", None, "  ").unwrap_err();
        assert_eq!(err, ConfigError::Missing("OKTA_API_TOKEN".into()));
    }

    #[test]
    fn gateway_requires_a_key() {
        let err = GatewayConfig::new(Some("gw.example.com".into()), Some("cid".into()), None, None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));

        let config = GatewayConfig::new(
            Some("gw.example.com".into()),
            Some("cid".into()),
            None,
            Some("-----BEGIN".into()),
        )
        .unwrap();
        assert_eq!(config.base_url(), "https://gw.example.com");
        assert!(config.scope().starts_with("okta.oag.app.manage okta.oag.app.read"));
    }

    #[test]
    fn state_location_defaults_region() {
        let location = StateLocation::new("bucket", "env/prod/terraform.tfstate", None).unwrap();
        assert_eq!(location.region, DEFAULT_REGION);
        assert_eq!(
            StateLocation::environment_key("env/", "prod"),
            "env/prod/terraform.tfstate"
        );
    }
}
