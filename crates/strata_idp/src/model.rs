//! Remote objects as returned by the identity provider.
//!
//! Each struct names the fields this crate reads and keeps everything else in
//! an `extra` map, so nothing is lost when a record is re-serialized.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const GROUP_TYPE_OKTA: &str = "OKTA_GROUP";

/// Built-in groups that exist in every tenant and are never copied.
pub const SYSTEM_GROUPS: [&str; 2] = ["Everyone", "Administrators"];

/// Base profile attributes; anything else on a profile is a custom attribute.
pub const STANDARD_PROFILE_FIELDS: [&str; 31] = [
    "login",
    "email",
    "firstName",
    "lastName",
    "middleName",
    "honorificPrefix",
    "honorificSuffix",
    "title",
    "displayName",
    "nickName",
    "profileUrl",
    "secondEmail",
    "mobilePhone",
    "primaryPhone",
    "streetAddress",
    "city",
    "state",
    "zipCode",
    "countryCode",
    "postalAddress",
    "preferredLanguage",
    "locale",
    "timezone",
    "userType",
    "employeeNumber",
    "costCenter",
    "organization",
    "division",
    "department",
    "managerId",
    "manager",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub manager_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    /// "First Last", trimmed; falls back to the login when both are empty.
    pub fn display_name(&self) -> String {
        let name = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        );
        let name = name.trim();
        if name.is_empty() {
            self.login.clone()
        } else {
            name.to_string()
        }
    }

    /// Non-null attributes outside the standard set.
    pub fn custom_attributes(&self) -> Map<String, Value> {
        self.extra
            .iter()
            .filter(|(key, value)| {
                !value.is_null() && !STANDARD_PROFILE_FIELDS.contains(&key.as_str())
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub profile: UserProfile,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    pub fn email_key(&self) -> String {
        self.profile.email.to_lowercase()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    #[serde(default, rename = "type")]
    pub group_type: Option<String>,
    #[serde(default)]
    pub profile: GroupProfile,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Group {
    pub fn name(&self) -> &str {
        &self.profile.name
    }

    pub fn is_system(&self) -> bool {
        SYSTEM_GROUPS.contains(&self.name())
    }

    pub fn is_okta_group(&self) -> bool {
        self.group_type.as_deref() == Some(GROUP_TYPE_OKTA)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub sign_on_mode: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppUserCredentials {
    #[serde(default)]
    pub user_name: Option<String>,
}

/// A user assigned to an application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppUser {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub profile: Option<Map<String, Value>>,
    #[serde(default)]
    pub credentials: Option<AppUserCredentials>,
}

impl AppUser {
    /// Email from the app profile, else the app username.
    pub fn known_email(&self) -> Option<String> {
        self.profile
            .as_ref()
            .and_then(|p| p.get("email"))
            .and_then(Value::as_str)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .or_else(|| {
                self.credentials
                    .as_ref()
                    .and_then(|c| c.user_name.clone())
                    .filter(|u| !u.is_empty())
            })
    }
}

/// A group assigned to an application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppGroup {
    pub id: String,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub profile: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Href {
    pub href: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Links {
    #[serde(default, rename = "self")]
    pub self_link: Option<Href>,
}

/// Entry of `users/{id}/linkedObjects/{relation}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkedObject {
    #[serde(default, rename = "_links")]
    pub links: Links,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleTarget {
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default, rename = "type")]
    pub target_type: Option<String>,
}

/// `target` is sent either as one object or as a list of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BundleTargets {
    Many(Vec<BundleTarget>),
    One(BundleTarget),
}

impl BundleTargets {
    pub fn first(&self) -> Option<&BundleTarget> {
        match self {
            BundleTargets::Many(targets) => targets.first(),
            BundleTargets::One(target) => Some(target),
        }
    }
}

/// Entitlement bundle from the governance API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub target: Option<BundleTargets>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Bundle {
    pub fn target_app_id(&self) -> Option<&str> {
        self.target
            .as_ref()
            .and_then(BundleTargets::first)
            .and_then(|t| t.external_id.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectRef {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    #[serde(default)]
    pub id: String,
    #[serde(default, rename = "type")]
    pub principal_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grant {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub bundle: Option<ObjectRef>,
    #[serde(default)]
    pub principal: Option<Principal>,
    #[serde(default)]
    pub grant_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
