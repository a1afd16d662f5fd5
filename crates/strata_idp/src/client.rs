use crate::error::IdpError;
use crate::model::*;

use strata_core::prelude::*;
use strata_http::{ApiClient, Clock, Method, ReqwestTransport, SswsToken, TokioClock, Transport};
use tracing::{debug, instrument, warn};

pub(crate) const PAGE_LIMIT: &str = "200";

fn limit() -> Vec<(&'static str, String)> {
    vec![("limit", PAGE_LIMIT.to_string())]
}

/// Core management API of one tenant (`/api/v1`).
#[derive(Clone)]
pub struct IdpClient<T: Transport = ReqwestTransport, C: Clock = TokioClock> {
    org_name: String,
    api: ApiClient<T, SswsToken, C>,
}

impl IdpClient {
    pub fn new(config: &IdpConfig) -> Result<Self, IdpError> {
        Ok(Self::with_transport(config, ReqwestTransport::new()?, TokioClock))
    }
}

impl<T: Transport, C: Clock> IdpClient<T, C> {
    pub fn with_transport(config: &IdpConfig, transport: T, clock: C) -> Self {
        Self {
            org_name: config.org_name.clone(),
            api: ApiClient::with_clock(
                config.api_url(),
                transport,
                SswsToken(config.api_token.clone()),
                clock,
            ),
        }
    }

    pub fn org_name(&self) -> &str {
        &self.org_name
    }

    pub fn api(&self) -> &ApiClient<T, SswsToken, C> {
        &self.api
    }

    /// All users; deprovisioned ones only when asked for.
    #[instrument(skip(self), fields(org = %self.org_name))]
    pub async fn list_users(&self, include_deprovisioned: bool) -> Result<Vec<User>, IdpError> {
        let mut query = limit();
        if !include_deprovisioned {
            query.push(("filter", r#"status ne "DEPROVISIONED""#.to_string()));
        }
        let users: Vec<User> = self.api.paginate("users", &query)?.collect_partial().await;
        debug!(count = users.len(), "Fetched users");
        Ok(users)
    }

    /// Groups of the given type, or every group.
    #[instrument(skip(self), fields(org = %self.org_name))]
    pub async fn list_groups(&self, group_type: Option<&str>) -> Result<Vec<Group>, IdpError> {
        let mut query = limit();
        if let Some(group_type) = group_type {
            query.push(("filter", format!(r#"type eq "{group_type}""#)));
        }
        Ok(self.api.paginate("groups", &query)?.collect_partial().await)
    }

    /// Searches by name and keeps only an exact match.
    #[instrument(skip(self), fields(org = %self.org_name))]
    pub async fn find_group_by_name(&self, name: &str) -> Result<Option<Group>, IdpError> {
        let query = [("q", name.to_string()), ("limit", PAGE_LIMIT.to_string())];
        let groups: Vec<Group> = self.api.get_json("groups", &query).await?;
        Ok(groups.into_iter().find(|g| g.name() == name))
    }

    pub async fn group_members(&self, group_id: &str) -> Result<Vec<User>, IdpError> {
        Ok(self
            .api
            .paginate(&format!("groups/{group_id}/users"), &limit())?
            .collect_partial()
            .await)
    }

    pub async fn user_groups(&self, user_id: &str) -> Result<Vec<Group>, IdpError> {
        Ok(self
            .api
            .paginate(&format!("users/{user_id}/groups"), &[])?
            .collect_partial()
            .await)
    }

    /// Follows the `manager` linked object to the manager's email.
    pub async fn manager_email(&self, user_id: &str) -> Result<Option<String>, IdpError> {
        let Some(linked) = self
            .api
            .get_optional_json::<Vec<LinkedObject>>(&format!("users/{user_id}/linkedObjects/manager"), &[])
            .await?
        else {
            return Ok(None);
        };

        let Some(href) = linked
            .into_iter()
            .next()
            .and_then(|l| l.links.self_link)
            .map(|h| h.href)
        else {
            return Ok(None);
        };

        let manager: Option<User> = self.api.get_optional_json(&href, &[]).await?;
        Ok(manager
            .map(|m| m.profile.email)
            .filter(|email| !email.is_empty()))
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, IdpError> {
        Ok(self.api.get_optional_json(&format!("users/{user_id}"), &[]).await?)
    }

    pub async fn get_group(&self, group_id: &str) -> Result<Option<Group>, IdpError> {
        Ok(self.api.get_optional_json(&format!("groups/{group_id}"), &[]).await?)
    }

    #[instrument(skip(self), fields(org = %self.org_name))]
    pub async fn list_apps(&self) -> Result<Vec<App>, IdpError> {
        Ok(self.api.paginate("apps", &limit())?.collect_partial().await)
    }

    pub async fn get_app(&self, app_id: &str) -> Result<Option<App>, IdpError> {
        Ok(self.api.get_optional_json(&format!("apps/{app_id}"), &[]).await?)
    }

    pub async fn app_users(&self, app_id: &str) -> Result<Vec<AppUser>, IdpError> {
        Ok(self
            .api
            .paginate(&format!("apps/{app_id}/users"), &limit())?
            .collect_partial()
            .await)
    }

    pub async fn app_groups(&self, app_id: &str) -> Result<Vec<AppGroup>, IdpError> {
        Ok(self
            .api
            .paginate(&format!("apps/{app_id}/groups"), &limit())?
            .collect_partial()
            .await)
    }

    /// `Ok(true)` on 204; any other status is logged and reported as `false`.
    #[instrument(skip(self), fields(org = %self.org_name))]
    pub async fn add_user_to_group(&self, group_id: &str, user_id: &str) -> Result<bool, IdpError> {
        let request = self
            .api
            .request(Method::PUT, &format!("groups/{group_id}/users/{user_id}"));
        let response = self.api.send(request).await?;

        if response.is_success() {
            return Ok(true);
        }
        warn!(status = %response.status, body = %response.text(), "Group assignment failed");
        Ok(false)
    }
}
