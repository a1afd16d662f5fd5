use crate::client::IdpClient;
use crate::error::IdpError;
use crate::model::{GROUP_TYPE_OKTA, Group, User};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use strata_http::{Clock, Transport};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembers {
    pub source_group_id: String,
    pub member_count: usize,
    pub member_emails: Vec<String>,
}

/// Group memberships of one tenant keyed by group name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipExport {
    pub source_org: String,
    pub exported_at: String,
    pub group_count: usize,
    pub total_members: usize,
    pub memberships: BTreeMap<String, GroupMembers>,
}

/// Group name to member emails, in the order they should be assigned.
pub type MembershipPlan = BTreeMap<String, Vec<String>>;

impl MembershipExport {
    pub fn plan(&self) -> MembershipPlan {
        self.memberships
            .iter()
            .map(|(name, group)| (name.clone(), group.member_emails.clone()))
            .collect()
    }
}

/// Counts of a membership import. Dry runs count would-be assignments as made.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub groups_found: usize,
    pub groups_missing: usize,
    pub users_matched: usize,
    pub users_missing: usize,
    pub assignments_made: usize,
    pub assignments_failed: usize,
    pub missing_groups: Vec<String>,
    pub missing_users: BTreeSet<String>,
}

impl ImportSummary {
    pub fn has_errors(&self) -> bool {
        self.assignments_failed > 0
    }
}

/// Members of every `OKTA_GROUP` group except the built-in ones.
/// Groups without members that have an email are left out.
pub async fn export_memberships<T: Transport, C: Clock>(
    client: &IdpClient<T, C>,
    exported_at: String,
) -> Result<MembershipExport, IdpError> {
    let groups = client.list_groups(Some(GROUP_TYPE_OKTA)).await?;
    info!(count = groups.len(), "Found groups");

    let mut memberships = BTreeMap::new();
    let mut total_members = 0;

    for group in groups {
        if group.is_system() {
            info!(group = group.name(), "Skipping system group");
            continue;
        }

        let member_emails: Vec<String> = client
            .group_members(&group.id)
            .await?
            .iter()
            .map(User::email_key)
            .filter(|email| !email.is_empty())
            .collect();
        if member_emails.is_empty() {
            continue;
        }

        info!(group = group.name(), members = member_emails.len(), "Exported group");
        total_members += member_emails.len();
        memberships.insert(
            group.profile.name.clone(),
            GroupMembers {
                source_group_id: group.id,
                member_count: member_emails.len(),
                member_emails,
            },
        );
    }

    Ok(MembershipExport {
        source_org: client.org_name().to_string(),
        exported_at,
        group_count: memberships.len(),
        total_members,
        memberships,
    })
}

/// Adds each listed member to the same-named group in the target tenant.
/// Users are matched by lower-cased email; unmatched groups and users are
/// recorded as missing.
pub async fn apply_memberships<T: Transport, C: Clock>(
    client: &IdpClient<T, C>,
    plan: &MembershipPlan,
    dry_run: bool,
) -> Result<ImportSummary, IdpError> {
    let users: HashMap<String, User> = client
        .list_users(true)
        .await?
        .into_iter()
        .map(|u| (u.email_key(), u))
        .filter(|(email, _)| !email.is_empty())
        .collect();
    let groups: HashMap<String, Group> = client
        .list_groups(Some(GROUP_TYPE_OKTA))
        .await?
        .into_iter()
        .map(|g| (g.profile.name.clone(), g))
        .collect();
    info!(users = users.len(), groups = groups.len(), "Indexed target tenant");

    let mut summary = ImportSummary::default();

    for (group_name, emails) in plan {
        let Some(group) = groups.get(group_name) else {
            warn!(group = %group_name, "Group not found in target");
            summary.missing_groups.push(group_name.clone());
            summary.groups_missing += 1;
            continue;
        };
        summary.groups_found += 1;

        let mut matched = 0;
        for email in emails {
            let Some(user) = users.get(&email.to_lowercase()) else {
                summary.missing_users.insert(email.clone());
                summary.users_missing += 1;
                continue;
            };
            summary.users_matched += 1;
            matched += 1;

            if dry_run {
                info!(
                    "[DRY RUN] PUT /api/v1/groups/{}/users/{} ({email} -> {group_name})",
                    group.id, user.id
                );
                summary.assignments_made += 1;
            } else if client.add_user_to_group(&group.id, &user.id).await? {
                summary.assignments_made += 1;
            } else {
                summary.assignments_failed += 1;
            }
        }

        if matched == 0 {
            warn!(group = %group_name, "No matching users found");
        } else {
            info!(group = %group_name, matched, listed = emails.len(), "Processed group");
        }
    }

    Ok(summary)
}
