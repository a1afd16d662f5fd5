use crate::client::IdpClient;
use crate::error::IdpError;
use crate::filters::is_system_app;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strata_http::{Clock, Transport};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAssignment {
    pub user_id: String,
    pub email: String,
    pub status: String,
    pub scope: String,
    pub profile: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAssignment {
    pub group_id: String,
    pub group_name: String,
    pub priority: Option<i64>,
    pub profile: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppAssignments {
    pub id: String,
    pub label: String,
    pub name: String,
    pub status: String,
    pub sign_on_mode: String,
    pub user_assignments: Vec<UserAssignment>,
    pub group_assignments: Vec<GroupAssignment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentMetadata {
    pub org_name: String,
    pub exported_at: String,
    pub app_count: usize,
    pub total_user_assignments: usize,
    pub total_group_assignments: usize,
    pub apps_with_assignments: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentExport {
    pub metadata: AssignmentMetadata,
    pub applications: Vec<AppAssignments>,
}

#[derive(Debug, Clone, Default)]
pub struct AssignmentExportOptions {
    pub include_system: bool,
    /// Case-insensitive substring of the label.
    pub app_label: Option<String>,
}

/// `None` when no application survives the filters.
pub async fn export_assignments<T: Transport, C: Clock>(
    client: &IdpClient<T, C>,
    options: &AssignmentExportOptions,
    exported_at: String,
) -> Result<Option<AssignmentExport>, IdpError> {
    let mut apps = client.list_apps().await?;

    if !options.include_system {
        let before = apps.len();
        apps.retain(|app| !is_system_app(app));
        info!(excluded = before - apps.len(), "Excluded system apps");
    }
    if let Some(filter) = &options.app_label {
        let filter = filter.to_lowercase();
        apps.retain(|app| app.label.to_lowercase().contains(&filter));
        info!(count = apps.len(), %filter, "Filtered apps by label");
    }
    if apps.is_empty() {
        return Ok(None);
    }

    let mut applications = Vec::new();
    let (mut total_users, mut total_groups) = (0, 0);

    for app in &apps {
        debug!(app = %app.label, "Exporting assignments");

        let mut user_assignments = Vec::new();
        for user in client.app_users(&app.id).await? {
            let email = match user.known_email() {
                Some(email) => email,
                None => client
                    .get_user(&user.id)
                    .await?
                    .map(|u| u.profile.email)
                    .unwrap_or_default(),
            };
            user_assignments.push(UserAssignment {
                email,
                status: user.status.clone().unwrap_or_default(),
                scope: user.scope.clone().unwrap_or_default(),
                profile: user
                    .profile
                    .filter(|p| !p.is_empty())
                    .map(Value::Object),
                user_id: user.id,
            });
        }

        let mut group_assignments = Vec::new();
        for group in client.app_groups(&app.id).await? {
            let group_name = client
                .get_group(&group.id)
                .await?
                .map(|g| g.profile.name)
                .unwrap_or_default();
            group_assignments.push(GroupAssignment {
                group_id: group.id,
                group_name,
                priority: group.priority,
                profile: group.profile.filter(|p| !is_empty_value(p)),
            });
        }

        total_users += user_assignments.len();
        total_groups += group_assignments.len();

        if !user_assignments.is_empty() || !group_assignments.is_empty() {
            applications.push(AppAssignments {
                id: app.id.clone(),
                label: app.label.clone(),
                name: app.name.clone(),
                status: app.status.clone().unwrap_or_default(),
                sign_on_mode: app.sign_on_mode.clone().unwrap_or_default(),
                user_assignments,
                group_assignments,
            });
        }
    }

    Ok(Some(AssignmentExport {
        metadata: AssignmentMetadata {
            org_name: client.org_name().to_string(),
            exported_at,
            app_count: apps.len(),
            total_user_assignments: total_users,
            total_group_assignments: total_groups,
            apps_with_assignments: applications.len(),
        },
        applications,
    }))
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
