use crate::client::IdpClient;
use crate::error::IdpError;
use crate::memberships::MembershipPlan;
use crate::model::User;

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use strata_http::{Clock, Transport};
use tracing::{debug, info, warn};

pub const CSV_HEADER: [&str; 10] = [
    "email",
    "first_name",
    "last_name",
    "login",
    "status",
    "department",
    "title",
    "manager_email",
    "groups",
    "custom_profile_attributes",
];

/// One line of the users export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserRow {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub login: String,
    pub status: String,
    pub department: String,
    pub title: String,
    pub manager_email: String,
    /// Comma-joined, sorted.
    pub groups: String,
    /// JSON object, or empty.
    pub custom_profile_attributes: String,
}

impl UserRow {
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.split(',').map(str::trim).filter(|g| !g.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct UserExportOptions {
    pub include_deprovisioned: bool,
    pub include_groups: bool,
    pub include_manager: bool,
    /// Only members of this group.
    pub group: Option<String>,
}

impl Default for UserExportOptions {
    fn default() -> Self {
        Self {
            include_deprovisioned: false,
            include_groups: true,
            include_manager: true,
            group: None,
        }
    }
}

pub async fn export_users<T: Transport, C: Clock>(
    client: &IdpClient<T, C>,
    options: &UserExportOptions,
) -> Result<Vec<UserRow>, IdpError> {
    let mut users = client.list_users(options.include_deprovisioned).await?;

    if let Some(name) = &options.group {
        let members: HashSet<String> = match client.find_group_by_name(name).await? {
            Some(group) => client
                .group_members(&group.id)
                .await?
                .into_iter()
                .map(|u| u.id)
                .collect(),
            None => {
                warn!(group = %name, "Group not found");
                HashSet::new()
            }
        };
        users.retain(|u| members.contains(&u.id));
        info!(group = %name, count = users.len(), "Filtered users by group");
    }

    let email_by_id: HashMap<&str, &str> = users
        .iter()
        .map(|u| (u.id.as_str(), u.profile.email.as_str()))
        .collect();

    let mut rows = Vec::with_capacity(users.len());
    for (index, user) in users.iter().enumerate() {
        let mut row = base_row(user);

        if options.include_manager {
            row.manager_email = match user
                .profile
                .manager_id
                .as_deref()
                .and_then(|id| email_by_id.get(id))
            {
                Some(email) => email.to_string(),
                None => match client.manager_email(&user.id).await {
                    Ok(email) => email.unwrap_or_default(),
                    Err(e) => {
                        debug!(user = %user.id, "Manager lookup failed: {e}");
                        String::new()
                    }
                },
            };
        }

        if options.include_groups {
            let mut names: Vec<String> = client
                .user_groups(&user.id)
                .await?
                .into_iter()
                .filter(|g| g.is_okta_group() && !g.is_system())
                .map(|g| g.profile.name)
                .collect();
            names.sort();
            row.groups = names.join(",");
        }

        rows.push(row);
        if (index + 1) % 50 == 0 {
            info!("Processed {}/{} users", index + 1, users.len());
        }
    }

    Ok(rows)
}

fn base_row(user: &User) -> UserRow {
    let profile = &user.profile;
    let custom = profile.custom_attributes();

    UserRow {
        email: profile.email.clone(),
        first_name: profile.first_name.clone().unwrap_or_default(),
        last_name: profile.last_name.clone().unwrap_or_default(),
        login: profile.login.clone(),
        status: user.status.clone().unwrap_or_else(|| "ACTIVE".to_string()),
        department: profile.department.clone().unwrap_or_default(),
        title: profile.title.clone().unwrap_or_default(),
        custom_profile_attributes: if custom.is_empty() {
            String::new()
        } else {
            serde_json::Value::Object(custom).to_string()
        },
        ..Default::default()
    }
}

/// Header row, `#` comment lines with provenance, then one row per user.
pub fn users_csv(rows: &[UserRow], org_name: &str, exported_at: &str) -> Result<Vec<u8>, IdpError> {
    let mut header = csv::Writer::from_writer(Vec::new());
    header.write_record(CSV_HEADER)?;
    let mut buf = header
        .into_inner()
        .map_err(|e| IdpError::Csv(csv::Error::from(e.into_error())))?;

    let comments = format!(
        "# Exported from Okta org: {org_name}\n# Export date: {exported_at}\n# Total users: {}\n",
        rows.len()
    );
    buf.extend_from_slice(comments.as_bytes());

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(buf);
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| IdpError::Csv(csv::Error::from(e.into_error())))
}

/// Parses a users export; comment lines and repeated header rows are skipped.
pub fn parse_users_csv(data: &[u8]) -> Result<Vec<UserRow>, IdpError> {
    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let mut rows = Vec::new();
    for record in reader.deserialize::<UserRow>() {
        let row = record?;
        if !row.email.is_empty() && row.email != CSV_HEADER[0] {
            rows.push(row);
        }
    }
    Ok(rows)
}

/// Group name to member emails, for [`apply_memberships`](crate::apply_memberships).
pub fn membership_plan(rows: &[UserRow]) -> MembershipPlan {
    let mut plan = MembershipPlan::new();
    for row in rows {
        for group in row.group_names() {
            plan.entry(group.to_string())
                .or_default()
                .push(row.email.clone());
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(email: &str, groups: &str) -> UserRow {
        UserRow {
            email: email.into(),
            first_name: "First".into(),
            login: email.into(),
            status: "ACTIVE".into(),
            groups: groups.into(),
            ..Default::default()
        }
    }

    #[test]
    fn csv_has_header_then_comments_then_rows() {
        let mut with_custom = row("a@x.com", "Eng,Ops");
        with_custom.custom_profile_attributes = r#"{"badge":"7"}"#.into();
        let rows = vec![with_custom, row("b@x.com", "")];

        let data = users_csv(&rows, "acme", "2024-05-01T00:00:00Z").unwrap();
        let text = String::from_utf8(data.clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], CSV_HEADER.join(","));
        assert_eq!(lines[1], "# Exported from Okta org: acme");
        assert_eq!(lines[3], "# Total users: 2");
        assert!(lines[4].starts_with("a@x.com,"));
        assert!(lines[4].contains(r#""Eng,Ops""#));
        assert!(lines[4].contains(r#""{""badge"":""7""}""#));

        let parsed = parse_users_csv(&data).unwrap();
        assert_eq!(parsed, rows);
    }

    #[test]
    fn repeated_header_rows_are_not_users() {
        let header = CSV_HEADER.join(",");
        let data = format!(
            "{header}\n# Exported from Okta org: acme\na@x.com,A,,a@x.com,ACTIVE,,,,Eng,\n{header}\nb@x.com,B,,b@x.com,ACTIVE,,,,Eng,\n"
        );

        let parsed = parse_users_csv(data.as_bytes()).unwrap();
        let emails: Vec<&str> = parsed.iter().map(|r| r.email.as_str()).collect();
        assert_eq!(emails, vec!["a@x.com", "b@x.com"]);

        let plan = membership_plan(&parsed);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan["Eng"], vec!["a@x.com", "b@x.com"]);
    }

    #[test]
    fn plan_inverts_rows_by_group() {
        let rows = vec![row("a@x.com", "Eng, Ops"), row("b@x.com", "Eng"), row("c@x.com", "")];
        let plan = membership_plan(&rows);

        assert_eq!(plan.len(), 2);
        assert_eq!(plan["Eng"], vec!["a@x.com", "b@x.com"]);
        assert_eq!(plan["Ops"], vec!["a@x.com"]);
    }
}
