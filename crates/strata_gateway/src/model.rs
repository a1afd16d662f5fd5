use crate::error::GatewayError;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use strata_core::prelude::*;

/// `applications.json`: optional connection settings plus desired apps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayFile {
    #[serde(default)]
    pub gateway: GatewaySection,
    #[serde(default)]
    pub applications: Vec<AppConfig>,
}

impl GatewayFile {
    pub async fn load(path: &Path) -> Result<Self, GatewayError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| GatewayError::io(path, e))?;
        Ok(serde_json::from_slice(&data)?)
    }

    pub fn to_pretty_json(&self) -> Result<String, GatewayError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Values here take precedence over the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_ssl: Option<bool>,
}

impl GatewaySection {
    /// Merges the file section over environment-provided values.
    pub fn resolve(
        &self,
        hostname: Option<String>,
        client_id: Option<String>,
        key_path: Option<PathBuf>,
        key_pem: Option<String>,
    ) -> Result<GatewayConfig, ConfigError> {
        let mut config = GatewayConfig::new(
            self.hostname.clone().or(hostname),
            self.client_id.clone().or(client_id),
            self.private_key_path.clone().or(key_path),
            self.private_key.clone().or(key_pem),
        )?;
        config.verify_ssl = self.verify_ssl.unwrap_or(true);
        Ok(config)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub label: String,
    #[serde(default)]
    pub public_domain: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub protected_resources: Vec<ProtectedResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeConfig>,
}

fn default_weight() -> u32 {
    100
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedResource {
    pub url: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheckConfig>,
}

impl ProtectedResource {
    pub fn to_payload(&self) -> Value {
        let mut entry = serde_json::json!({
            "url": self.url,
            "weight": self.weight,
        });
        if let Some(hc) = &self.health_check {
            entry["healthCheck"] = serde_json::json!({
                "enabled": true,
                "path": hc.path,
                "method": hc.method,
                "expectedStatus": hc.expected_status,
                "interval": hc.interval,
                "timeout": hc.timeout,
                "unhealthyThreshold": hc.unhealthy_threshold,
                "healthyThreshold": hc.healthy_threshold,
            });
        }
        entry
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    pub path: String,
    pub method: String,
    pub expected_status: u16,
    pub interval: u32,
    pub timeout: u32,
    pub unhealthy_threshold: u32,
    pub healthy_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            path: "/health".to_string(),
            method: "GET".to_string(),
            expected_status: 200,
            interval: 10,
            timeout: 1,
            unhealthy_threshold: 3,
            healthy_threshold: 2,
        }
    }
}

fn default_source() -> String {
    "IDP".to_string()
}

fn default_target_type() -> String {
    "Header".to_string()
}

/// A header or cookie injected into proxied requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeConfig {
    #[serde(default = "default_source")]
    pub source: String,
    pub field: String,
    #[serde(rename = "type", default = "default_target_type")]
    pub target_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl AttributeConfig {
    pub fn to_payload(&self) -> Value {
        let mut payload = serde_json::json!({
            "dataSource": self.source,
            "field": self.field,
            "targetType": self.target_type,
            "name": self.name,
        });
        if let Some(value) = self.value.as_deref().filter(|v| !v.is_empty()) {
            payload["value"] = Value::String(value.to_string());
        }
        payload
    }

    /// Compares source, field, type and name; static values are not compared.
    pub fn differs_from(&self, current: &Attribute) -> bool {
        current.data_source.as_deref() != Some(self.source.as_str())
            || current.field.as_deref() != Some(self.field.as_str())
            || current.target_type.as_deref() != Some(self.target_type.as_str())
            || current.name != self.name
    }
}

fn default_pattern() -> String {
    "/*".to_string()
}

fn default_priority() -> u32 {
    100
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(rename = "type")]
    pub policy_type: String,
    #[serde(default = "default_pattern")]
    pub pattern: String,
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Value>,
}

impl PolicyConfig {
    /// Catch-all policy of the given type.
    pub fn catch_all(policy_type: impl Into<String>) -> Self {
        Self {
            policy_type: policy_type.into(),
            pattern: default_pattern(),
            priority: default_priority(),
            rules: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteResource {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub weight: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayApp {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub public_domain: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub protected_resources: Vec<RemoteResource>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GatewayApp {
    /// Converts to the config-file shape, attributes excluded.
    pub fn to_config(&self) -> AppConfig {
        AppConfig {
            label: self.label.clone(),
            public_domain: self.public_domain.clone(),
            description: self.description.clone().unwrap_or_default(),
            protected_resources: self
                .protected_resources
                .iter()
                .map(|r| ProtectedResource {
                    url: r.url.clone().unwrap_or_default(),
                    weight: r.weight.unwrap_or_else(default_weight),
                    health_check: None,
                })
                .collect(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub data_source: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub target_type: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Attribute {
    pub fn to_config(&self) -> AttributeConfig {
        AttributeConfig {
            source: self.data_source.clone().unwrap_or_else(default_source),
            field: self.field.clone().unwrap_or_default(),
            target_type: self.target_type.clone().unwrap_or_else(default_target_type),
            name: self.name.clone(),
            value: None,
        }
    }
}
