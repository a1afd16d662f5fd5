use crate::auth::ServiceTokenAuth;
use crate::error::PamError;
use crate::model::*;

use serde::de::DeserializeOwned;
use strata_core::prelude::*;
use strata_http::{ApiClient, Clock, ReqwestTransport, TokioClock, Transport};
use tracing::instrument;

/// Team-scoped privileged access API client.
#[derive(Clone)]
pub struct PamClient<T: Transport = ReqwestTransport, C: Clock = TokioClock> {
    team: String,
    api: ApiClient<T, ServiceTokenAuth<T, C>, C>,
}

impl PamClient {
    pub fn new(config: &PamConfig) -> Result<Self, PamError> {
        Ok(Self::with_transport(config, ReqwestTransport::new()?, TokioClock))
    }
}

impl<T: Transport, C: Clock> PamClient<T, C> {
    pub fn with_transport(config: &PamConfig, transport: T, clock: C) -> Self {
        let team_url = format!("{}/teams/{}", config.api_base, config.team);
        let auth = ServiceTokenAuth::new(
            format!("{team_url}/service_token"),
            config.key_id.clone(),
            config.key_secret.clone(),
            transport.clone(),
            clock.clone(),
        );
        Self {
            team: config.team.clone(),
            api: ApiClient::with_clock(team_url, transport, auth, clock),
        }
    }

    pub fn team(&self) -> &str {
        &self.team
    }

    #[instrument(skip(self))]
    async fn list<R: DeserializeOwned>(&self, path: &str) -> Result<Vec<R>, PamError> {
        let envelope: ListEnvelope<R> = self.api.get_json(path, &[]).await?;
        Ok(envelope.list)
    }

    pub async fn resource_groups(&self) -> Result<Vec<ResourceGroup>, PamError> {
        self.list("resource_groups").await
    }

    /// Every project when `resource_group_id` is `None`.
    pub async fn projects(&self, resource_group_id: Option<&str>) -> Result<Vec<Project>, PamError> {
        match resource_group_id {
            Some(id) => self.list(&format!("resource_groups/{id}/projects")).await,
            None => self.list("projects").await,
        }
    }

    pub async fn groups(&self) -> Result<Vec<PamGroup>, PamError> {
        self.list("groups").await
    }

    pub async fn server_enrollment_tokens(&self, project_name: &str) -> Result<Vec<serde_json::Value>, PamError> {
        self.list(&format!("projects/{project_name}/server_enrollment_tokens"))
            .await
    }

    pub async fn gateway_setup_tokens(&self) -> Result<Vec<GatewaySetupToken>, PamError> {
        self.list("gateway_setup_tokens").await
    }

    pub async fn secret_folders(
        &self,
        resource_group_id: &str,
        project_id: &str,
    ) -> Result<Vec<SecretFolder>, PamError> {
        self.list(&format!(
            "resource_groups/{resource_group_id}/projects/{project_id}/secret_folders"
        ))
        .await
    }

    pub async fn security_policies(&self) -> Result<Vec<SecurityPolicy>, PamError> {
        self.list("security_policies").await
    }
}
