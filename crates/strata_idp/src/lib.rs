//! Identity provider tenants: the management API, the governance API, and the
//! exports and imports built on them.
//!
//! Exports are plain serde documents (or CSV for users) keyed by names, so
//! they can be replayed into a different tenant where every id differs.

mod assignments;
mod client;
mod documents;
mod error;
mod filters;
mod governance;
mod grants;
mod memberships;
pub mod model;
mod settings;
mod users;

pub use assignments::{
    AppAssignments, AssignmentExport, AssignmentExportOptions, AssignmentMetadata, GroupAssignment,
    UserAssignment, export_assignments,
};
pub use client::IdpClient;
pub use documents::{load_bytes, load_json, save_bytes, save_json};
pub use error::IdpError;
pub use filters::{LabelPattern, SYSTEM_APPS, is_system_app};
pub use governance::{EntitlementStatus, GovernanceClient, GrantOutcome, SettingChange, grant_payload};
pub use grants::{BundleRecord, GrantExport, GrantImportSummary, GrantRecord, export_grants, import_grants};
pub use memberships::{
    GroupMembers, ImportSummary, MembershipExport, MembershipPlan, apply_memberships,
    export_memberships,
};
pub use settings::{
    AppEntitlements, AppSelector, SettingResult, apply_setting, entitlement_report, select_apps,
    without_system_apps,
};
pub use users::{
    CSV_HEADER, UserExportOptions, UserRow, export_users, membership_plan, parse_users_csv,
    users_csv,
};
