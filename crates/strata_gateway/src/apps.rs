use crate::client::GatewayClient;
use crate::error::GatewayError;
use crate::model::{AppConfig, Attribute, AttributeConfig, GatewayApp, PolicyConfig, ProtectedResource};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, BTreeSet};
use strata_http::{Clock, Method, ReqwestTransport, TokioClock, Transport};
use tracing::{info, warn};

const APPS_PATH: &str = "/api/v2/apps";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChanges {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub deleted: Vec<String>,
}

impl AttributeChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployAction {
    Create,
    Update,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployResult {
    pub label: String,
    pub action: DeployAction,
    pub app_id: Option<String>,
    pub attributes: AttributeChanges,
    pub dry_run: bool,
}

/// Application, attribute, policy and certificate management on top of
/// [`GatewayClient`].
#[derive(Clone)]
pub struct ApplicationManager<T: Transport = ReqwestTransport, C: Clock = TokioClock> {
    client: GatewayClient<T, C>,
}

impl<T: Transport, C: Clock> ApplicationManager<T, C> {
    pub fn new(client: GatewayClient<T, C>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &GatewayClient<T, C> {
        &self.client
    }

    pub async fn list_applications(&self) -> Result<Vec<GatewayApp>, GatewayError> {
        self.client.list(APPS_PATH).await
    }

    pub async fn get_application(&self, app_id: &str) -> Result<GatewayApp, GatewayError> {
        self.client.get_json(&format!("{APPS_PATH}/{app_id}")).await
    }

    /// Exact label match.
    pub async fn find_application(&self, label: &str) -> Result<Option<GatewayApp>, GatewayError> {
        Ok(self
            .list_applications()
            .await?
            .into_iter()
            .find(|app| app.label == label))
    }

    pub async fn create_application(&self, config: &AppConfig) -> Result<GatewayApp, GatewayError> {
        let public_domain = config
            .public_domain
            .as_deref()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| GatewayError::InvalidApp(format!("{}: public_domain is required", config.label)))?;
        if config.label.is_empty() {
            return Err(GatewayError::InvalidApp("label is required".to_string()));
        }

        let mut payload = Map::new();
        payload.insert("type".into(), json!("header"));
        payload.insert("label".into(), json!(config.label));
        payload.insert("publicDomain".into(), json!(public_domain));
        if !config.description.is_empty() {
            payload.insert("description".into(), json!(config.description));
        }
        if !config.protected_resources.is_empty() {
            payload.insert("protectedResources".into(), resources_payload(&config.protected_resources));
        }
        if let Some(group) = &config.group {
            payload.insert("group".into(), json!(group));
        }

        info!(label = %config.label, "Creating application");
        self.client.send_json(Method::POST, APPS_PATH, &payload).await
    }

    pub async fn update_application(&self, app_id: &str, config: &AppConfig) -> Result<Value, GatewayError> {
        let mut payload = Map::new();
        payload.insert("label".into(), json!(config.label));
        payload.insert("description".into(), json!(config.description));
        if let Some(domain) = &config.public_domain {
            payload.insert("publicDomain".into(), json!(domain));
        }
        if !config.protected_resources.is_empty() {
            payload.insert("protectedResources".into(), resources_payload(&config.protected_resources));
        }
        if let Some(group) = &config.group {
            payload.insert("group".into(), json!(group));
        }

        info!(app_id, "Updating application");
        self.client
            .send_json(Method::PUT, &format!("{APPS_PATH}/{app_id}"), &payload)
            .await
    }

    pub async fn delete_application(&self, app_id: &str) -> Result<(), GatewayError> {
        info!(app_id, "Deleting application");
        self.client.delete(&format!("{APPS_PATH}/{app_id}")).await
    }

    pub async fn list_attributes(&self, app_id: &str) -> Result<Vec<Attribute>, GatewayError> {
        self.client.list(&format!("{APPS_PATH}/{app_id}/attributes")).await
    }

    pub async fn add_attribute(&self, app_id: &str, attribute: &AttributeConfig) -> Result<Value, GatewayError> {
        info!(app_id, name = %attribute.name, "Adding attribute");
        self.client
            .send_json(
                Method::POST,
                &format!("{APPS_PATH}/{app_id}/attributes"),
                &attribute.to_payload(),
            )
            .await
    }

    pub async fn update_attribute(
        &self,
        app_id: &str,
        attribute_id: &str,
        attribute: &AttributeConfig,
    ) -> Result<Value, GatewayError> {
        info!(app_id, name = %attribute.name, "Updating attribute");
        self.client
            .send_json(
                Method::PUT,
                &format!("{APPS_PATH}/{app_id}/attributes/{attribute_id}"),
                &attribute.to_payload(),
            )
            .await
    }

    pub async fn delete_attribute(&self, app_id: &str, attribute_id: &str) -> Result<(), GatewayError> {
        info!(app_id, attribute_id, "Deleting attribute");
        self.client
            .delete(&format!("{APPS_PATH}/{app_id}/attributes/{attribute_id}"))
            .await
    }

    /// Makes the app's attributes match `desired`, keyed by attribute name.
    pub async fn sync_attributes(
        &self,
        app_id: &str,
        desired: &[AttributeConfig],
    ) -> Result<AttributeChanges, GatewayError> {
        let current: BTreeMap<String, Attribute> = self
            .list_attributes(app_id)
            .await?
            .into_iter()
            .map(|a| (a.name.clone(), a))
            .collect();
        let desired_names: BTreeSet<&str> = desired.iter().map(|a| a.name.as_str()).collect();

        let mut changes = AttributeChanges::default();
        for attribute in desired {
            match current.get(&attribute.name) {
                Some(existing) if attribute.differs_from(existing) => {
                    self.update_attribute(app_id, &existing.id, attribute).await?;
                    changes.updated.push(attribute.name.clone());
                }
                Some(_) => {}
                None => {
                    self.add_attribute(app_id, attribute).await?;
                    changes.added.push(attribute.name.clone());
                }
            }
        }

        for (name, existing) in &current {
            if !desired_names.contains(name.as_str()) {
                self.delete_attribute(app_id, &existing.id).await?;
                changes.deleted.push(name.clone());
            }
        }
        Ok(changes)
    }

    pub async fn list_policies(&self, app_id: &str) -> Result<Vec<Value>, GatewayError> {
        self.client.list(&format!("{APPS_PATH}/{app_id}/policies")).await
    }

    pub async fn add_policy(&self, app_id: &str, policy: &PolicyConfig) -> Result<Value, GatewayError> {
        info!(app_id, policy = %policy.policy_type, "Adding policy");
        self.client
            .send_json(Method::POST, &format!("{APPS_PATH}/{app_id}/policies"), policy)
            .await
    }

    pub async fn assign_certificate(&self, app_id: &str, certificate_id: &str) -> Result<Value, GatewayError> {
        self.client
            .send_json(
                Method::PUT,
                &format!("{APPS_PATH}/{app_id}/certificate"),
                &json!({ "certificateId": certificate_id }),
            )
            .await
    }

    pub async fn list_certificates(&self) -> Result<Vec<Value>, GatewayError> {
        self.client.list("/api/v2/certificates").await
    }

    /// Creates the app or updates the one with the same label. A dry run
    /// only looks the label up.
    pub async fn deploy_application(&self, config: &AppConfig, dry_run: bool) -> Result<DeployResult, GatewayError> {
        let existing = self.find_application(&config.label).await?;
        let mut result = DeployResult {
            label: config.label.clone(),
            action: if existing.is_some() {
                DeployAction::Update
            } else {
                DeployAction::Create
            },
            app_id: existing.as_ref().map(|app| app.id.clone()),
            attributes: AttributeChanges::default(),
            dry_run,
        };
        if dry_run {
            return Ok(result);
        }

        match existing {
            Some(app) => {
                self.update_application(&app.id, config).await?;
                if !config.attributes.is_empty() {
                    result.attributes = self.sync_attributes(&app.id, &config.attributes).await?;
                }
            }
            None => {
                let app = self.create_application(config).await?;
                for attribute in &config.attributes {
                    self.add_attribute(&app.id, attribute).await?;
                    result.attributes.added.push(attribute.name.clone());
                }
                if let Some(policy) = &config.policy {
                    self.add_policy(&app.id, &PolicyConfig::catch_all(policy)).await?;
                }
                result.app_id = Some(app.id);
            }
        }
        Ok(result)
    }

    /// Reads every application back into config-file shape.
    pub async fn import_applications(&self) -> Result<Vec<AppConfig>, GatewayError> {
        let apps = self.list_applications().await?;
        let mut configs = Vec::with_capacity(apps.len());

        for app in apps {
            let mut config = app.to_config();
            match self.list_attributes(&app.id).await {
                Ok(attributes) => config.attributes = attributes.iter().map(Attribute::to_config).collect(),
                Err(e) => warn!("Failed to get attributes for {}: {e}", app.id),
            }
            configs.push(config);
        }
        Ok(configs)
    }
}

fn resources_payload(resources: &[ProtectedResource]) -> Value {
    Value::Array(resources.iter().map(ProtectedResource::to_payload).collect())
}
