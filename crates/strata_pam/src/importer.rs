use crate::client::PamClient;
use crate::error::PamError;
use crate::hcl::*;
use crate::model::*;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use strata_fs::atomic_write;
use strata_http::{Clock, Transport};
use tracing::{info, warn};

pub const TERRAFORM_FILE: &str = "opa_resources_imported.tf";
pub const COMMANDS_FILE: &str = "opa_import_commands.sh";
pub const EXPORT_FILE: &str = "opa_resources_export.json";

const RULE: &str = "# -----------------------------------------------------------------------------";

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectEntry {
    pub project: Project,
    pub resource_group_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FolderEntry {
    pub folder: SecretFolder,
    pub project_id: String,
    pub resource_group_id: String,
}

/// Everything fetched from the team. Fetch failures leave a section empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PamInventory {
    pub resource_groups: Vec<ResourceGroup>,
    pub projects: Vec<ProjectEntry>,
    pub groups: Vec<PamGroup>,
    pub gateway_tokens: Vec<GatewaySetupToken>,
    pub secret_folders: Vec<FolderEntry>,
    pub security_policies: Vec<SecurityPolicy>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub resource_groups: usize,
    pub projects: usize,
    pub groups: usize,
    pub gateway_tokens: usize,
    pub secret_folders: usize,
    pub security_policies: usize,
    pub import_commands: usize,
}

/// Generated file contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportArtifacts {
    pub terraform: String,
    pub commands: Vec<String>,
    pub script: String,
    pub export_json: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFiles {
    pub terraform: PathBuf,
    pub script: PathBuf,
    pub export: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub summary: ImportSummary,
    pub artifacts: ImportArtifacts,
    /// `None` on a dry run.
    pub written: Option<WrittenFiles>,
}

#[derive(Serialize)]
struct ExportDocument<'a> {
    exported_at: String,
    team: &'a str,
    resource_groups: &'a [ResourceGroup],
    groups: &'a [PamGroup],
    gateway_tokens: &'a [GatewaySetupToken],
    security_policies: &'a [SecurityPolicy],
}

/// Generates Terraform for resources that already exist in a team.
pub struct PamImporter<T: Transport, C: Clock> {
    client: PamClient<T, C>,
}

async fn or_empty<R>(what: &str, fetch: impl Future<Output = Result<Vec<R>, PamError>>) -> Vec<R> {
    match fetch.await {
        Ok(items) => items,
        Err(e) => {
            warn!("Could not fetch {what}: {e}");
            Vec::new()
        }
    }
}

impl<T: Transport, C: Clock> PamImporter<T, C> {
    pub fn new(client: PamClient<T, C>) -> Self {
        Self { client }
    }

    pub async fn collect(&self) -> PamInventory {
        let mut inventory = PamInventory {
            resource_groups: or_empty("resource groups", self.client.resource_groups()).await,
            ..Default::default()
        };
        info!(count = inventory.resource_groups.len(), "Fetched resource groups");

        for rg in &inventory.resource_groups {
            let projects = or_empty("projects", self.client.projects(Some(&rg.id))).await;
            inventory
                .projects
                .extend(projects.into_iter().map(|project| ProjectEntry {
                    project,
                    resource_group_id: rg.id.clone(),
                }));
        }
        info!(count = inventory.projects.len(), "Fetched projects");

        inventory.groups = or_empty("groups", self.client.groups()).await;
        inventory.gateway_tokens = or_empty("gateway setup tokens", self.client.gateway_setup_tokens()).await;

        for entry in &inventory.projects {
            let folders = match self
                .client
                .secret_folders(&entry.resource_group_id, &entry.project.id)
                .await
            {
                Ok(folders) => folders,
                Err(_) => continue,
            };
            inventory
                .secret_folders
                .extend(folders.into_iter().map(|folder| FolderEntry {
                    folder,
                    project_id: entry.project.id.clone(),
                    resource_group_id: entry.resource_group_id.clone(),
                }));
        }

        inventory.security_policies = or_empty("security policies", self.client.security_policies()).await;
        inventory
    }

    /// Fetches, renders and, unless `dry_run`, writes the three output files.
    pub async fn import_all(
        &self,
        output_dir: &Path,
        dry_run: bool,
        generated_at: DateTime<Utc>,
    ) -> Result<ImportReport, PamError> {
        let inventory = self.collect().await;
        let artifacts = render(&inventory, self.client.team(), generated_at)?;
        let summary = ImportSummary {
            resource_groups: inventory.resource_groups.len(),
            projects: inventory.projects.len(),
            groups: inventory.groups.len(),
            gateway_tokens: inventory.gateway_tokens.len(),
            secret_folders: inventory.secret_folders.len(),
            security_policies: inventory.security_policies.len(),
            import_commands: artifacts.commands.len(),
        };

        let written = if dry_run {
            None
        } else {
            Some(write_artifacts(output_dir, &artifacts).await?)
        };
        Ok(ImportReport {
            summary,
            artifacts,
            written,
        })
    }
}

fn section(blocks: &mut Vec<String>, title: &str) {
    blocks.push(format!("\n{RULE}"));
    blocks.push(format!("# {title}"));
    blocks.push(RULE.to_string());
}

/// Renders HCL, the import script and the JSON export.
pub fn render(
    inventory: &PamInventory,
    team: &str,
    generated_at: DateTime<Utc>,
) -> Result<ImportArtifacts, PamError> {
    let stamp = generated_at.to_rfc3339_opts(SecondsFormat::Secs, true);
    let banner = "# =============================================================================";
    let mut blocks = vec![format!(
        "{banner}\n# PRIVILEGED ACCESS RESOURCES - imported from the live team\n{banner}\n# Generated: {stamp}\n# Team: {team}\n#\n# Review and customize before applying\n{banner}\n"
    )];
    let mut commands = Vec::new();
    let mut names = NameAllocator::default();
    let mut push = |blocks: &mut Vec<String>, block: TerraformBlock| {
        blocks.push(block.code);
        commands.push(block.import);
    };

    let mut rg_names = std::collections::HashMap::new();
    if !inventory.resource_groups.is_empty() {
        section(&mut blocks, "Resource Groups");
    }
    for rg in &inventory.resource_groups {
        let tf_name = names.allocate("oktapam_resource_group", &rg.name);
        push(&mut blocks, resource_group_block(rg, &tf_name));
        rg_names.insert(rg.id.as_str(), tf_name);
    }

    let mut project_names = std::collections::HashMap::new();
    let mut current_rg: Option<&str> = None;
    for entry in &inventory.projects {
        let rg_id = entry.resource_group_id.as_str();
        if current_rg != Some(rg_id) {
            let rg_label = inventory
                .resource_groups
                .iter()
                .find(|rg| rg.id == rg_id)
                .map(|rg| rg.name.as_str())
                .unwrap_or("Unknown");
            blocks.push(format!("\n# Projects in {rg_label}"));
            current_rg = Some(rg_id);
        }
        let rg_tf = rg_names.get(rg_id).cloned().unwrap_or_else(|| sanitize_name(rg_id));
        let tf_name = names.allocate("oktapam_resource_group_project", &entry.project.name);
        push(&mut blocks, project_block(&entry.project, &tf_name, rg_id, &rg_tf));
        project_names.insert((rg_id, entry.project.id.as_str()), tf_name);
    }

    if !inventory.groups.is_empty() {
        section(&mut blocks, "Groups");
    }
    for group in &inventory.groups {
        let tf_name = names.allocate("oktapam_group", &group.name);
        push(&mut blocks, group_block(group, &tf_name));
    }

    if !inventory.gateway_tokens.is_empty() {
        section(&mut blocks, "Gateway Setup Tokens");
    }
    for token in &inventory.gateway_tokens {
        let label = token
            .description
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or("gateway_token");
        let tf_name = names.allocate("oktapam_gateway_setup_token", label);
        push(&mut blocks, gateway_token_block(token, &tf_name));
    }

    if !inventory.secret_folders.is_empty() {
        section(&mut blocks, "Secret Folders");
    }
    for entry in &inventory.secret_folders {
        let rg_id = entry.resource_group_id.as_str();
        let rg_tf = rg_names.get(rg_id).cloned().unwrap_or_else(|| sanitize_name(rg_id));
        let project_tf = project_names
            .get(&(rg_id, entry.project_id.as_str()))
            .cloned()
            .unwrap_or_else(|| sanitize_name(&entry.project_id));
        let tf_name = names.allocate(
            "oktapam_secret_folder",
            &format!("{project_tf}_{}", entry.folder.name),
        );
        push(
            &mut blocks,
            secret_folder_block(&entry.folder, &tf_name, &rg_tf, &project_tf),
        );
    }

    let mut script = format!(
        "#!/bin/bash\n# Privileged access resource import commands\n# Generated: {stamp}\n# Run these commands after terraform init\n\n"
    );
    for command in &commands {
        script.push_str(command);
        script.push('\n');
    }

    let export_json = serde_json::to_string_pretty(&ExportDocument {
        exported_at: stamp,
        team,
        resource_groups: &inventory.resource_groups,
        groups: &inventory.groups,
        gateway_tokens: &inventory.gateway_tokens,
        security_policies: &inventory.security_policies,
    })?;

    Ok(ImportArtifacts {
        terraform: blocks.join("\n"),
        commands,
        script,
        export_json,
    })
}

async fn write_artifacts(output_dir: &Path, artifacts: &ImportArtifacts) -> Result<WrittenFiles, PamError> {
    let written = WrittenFiles {
        terraform: output_dir.join(TERRAFORM_FILE),
        script: output_dir.join(COMMANDS_FILE),
        export: output_dir.join(EXPORT_FILE),
    };

    for (path, data) in [
        (&written.terraform, &artifacts.terraform),
        (&written.script, &artifacts.script),
        (&written.export, &artifacts.export_json),
    ] {
        atomic_write(path, data.clone())
            .await
            .map_err(|e| PamError::io(path, e))?;
        info!(path = %path.display(), "Written");
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&written.script, std::fs::Permissions::from_mode(0o755))
            .await
            .map_err(|e| PamError::io(&written.script, e))?;
    }

    Ok(written)
}
