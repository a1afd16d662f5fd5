use crate::model::*;

use std::collections::HashMap;
use std::fmt::Write;

/// Turns an arbitrary display name into a Terraform resource name.
pub fn sanitize_name(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '_' };
        if !(c == '_' && sanitized.ends_with('_')) {
            sanitized.push(c);
        }
    }
    let trimmed = sanitized.trim_matches('_');

    match trimmed.chars().next() {
        None => "unnamed".to_string(),
        Some(c) if c.is_ascii_digit() => format!("resource_{trimmed}"),
        Some(_) => trimmed.to_string(),
    }
}

/// Quoted HCL string literal.
fn quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '$' => out.push_str("$$"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// One generated resource and the command that adopts it into state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerraformBlock {
    pub code: String,
    pub import: String,
}

impl TerraformBlock {
    fn new(resource_type: &str, tf_name: &str, body: String, import_id: &str) -> Self {
        Self {
            code: format!("\nresource \"{resource_type}\" \"{tf_name}\" {{\n{body}}}\n"),
            import: format!("terraform import {resource_type}.{tf_name} {import_id}"),
        }
    }
}

/// Hands out unique Terraform names per resource type.
#[derive(Debug, Default)]
pub struct NameAllocator {
    seen: HashMap<(String, String), usize>,
}

impl NameAllocator {
    /// Duplicates get `_2`, `_3`, ... appended.
    pub fn allocate(&mut self, resource_type: &str, name: &str) -> String {
        let base = sanitize_name(name);
        let count = self
            .seen
            .entry((resource_type.to_string(), base.clone()))
            .or_insert(0);
        *count += 1;
        if *count == 1 {
            base
        } else {
            format!("{base}_{count}")
        }
    }
}

pub fn resource_group_block(rg: &ResourceGroup, tf_name: &str) -> TerraformBlock {
    let body = format!(
        "  name        = {}\n  description = {}\n",
        quoted(&rg.name),
        quoted(&rg.description)
    );
    TerraformBlock::new("oktapam_resource_group", tf_name, body, &rg.id)
}

pub fn project_block(project: &Project, tf_name: &str, rg_id: &str, rg_tf_name: &str) -> TerraformBlock {
    let body = format!(
        "  name                 = {}\n  resource_group       = oktapam_resource_group.{rg_tf_name}.id\n  ssh_certificate_type = {}\n  account_discovery    = {}\n  create_server_users  = {}\n  forward_traffic      = {}\n",
        quoted(&project.name),
        quoted(&project.ssh_certificate_type),
        project.account_discovery,
        project.create_server_users,
        project.forward_traffic,
    );
    TerraformBlock::new(
        "oktapam_resource_group_project",
        tf_name,
        body,
        &format!("{rg_id}/{}", project.id),
    )
}

pub fn group_block(group: &PamGroup, tf_name: &str) -> TerraformBlock {
    let body = format!("  name = {}\n", quoted(&group.name));
    TerraformBlock::new("oktapam_group", tf_name, body, &group.id)
}

pub fn gateway_token_block(token: &GatewaySetupToken, tf_name: &str) -> TerraformBlock {
    let description = token.description.as_deref().unwrap_or("Gateway token");
    let mut body = format!("  description = {}\n", quoted(description));
    if !token.labels.is_empty() {
        body.push_str("\n  labels = {\n");
        for (key, value) in &token.labels {
            let _ = writeln!(body, "    {key} = {}", quoted(value));
        }
        body.push_str("  }\n");
    }
    TerraformBlock::new("oktapam_gateway_setup_token", tf_name, body, &token.id)
}

pub fn secret_folder_block(
    folder: &SecretFolder,
    tf_name: &str,
    rg_tf_name: &str,
    project_tf_name: &str,
) -> TerraformBlock {
    let body = format!(
        "  name           = {}\n  description    = {}\n  resource_group = oktapam_resource_group.{rg_tf_name}.id\n  project        = oktapam_resource_group_project.{project_tf_name}.id\n",
        quoted(&folder.name),
        quoted(&folder.description),
    );
    TerraformBlock::new("oktapam_secret_folder", tf_name, body, &folder.id)
}
