use crate::args::StateArgs;
use crate::output::{dry_run_prefix, exit_code, print_json};

use anyhow::{Context, bail};
use clap::Subcommand;
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use strata_core::prelude::*;
use strata_fs::{ManifestBuilder, read_manifest, write_manifest};
use strata_s3::S3StateStore;
use strata_state::{
    BackupRequest, FullRestoreReport, ProvisioningOutcome, RestoreOutcome, RestoreTarget, StateBackup,
    StateRestore, backup_local, default_terraform_dir,
};
use strata_terraform::TerraformCli;
use tracing::info;

#[derive(Subcommand)]
pub enum StateCommand {
    /// Record the current state version in a state-based manifest
    Backup {
        /// Environment name (matches environments/ directory)
        #[arg(short, long)]
        environment: String,

        /// Backup directory
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        state: StateArgs,

        /// Copy a local state file instead of reading the bucket
        #[arg(long, conflicts_with = "state_bucket")]
        local_state: Option<PathBuf>,

        #[arg(long, env = "OKTA_ORG_NAME")]
        org_name: Option<String>,

        #[arg(long, default_value_t = Schedule::Manual)]
        schedule: Schedule,

        /// Also download the state at the captured version
        #[arg(long)]
        download_state: bool,
    },
    /// Bring back an earlier state version, optionally followed by plan and apply
    Restore {
        /// Manifest written by `state backup`
        #[arg(short, long, required_unless_present = "version_id", conflicts_with = "version_id")]
        manifest: Option<PathBuf>,

        /// Version to restore (requires --state-bucket and --state-key)
        #[arg(long)]
        version_id: Option<String>,

        #[command(flatten)]
        state: StateArgs,

        /// Run init, plan and apply after restoring the state
        #[arg(long)]
        full_restore: bool,

        /// Defaults to environments/<environment>/terraform when a manifest is used
        #[arg(long)]
        terraform_dir: Option<PathBuf>,

        #[arg(long)]
        auto_approve: bool,

        #[arg(long)]
        dry_run: bool,
    },
    /// List versions of the state object, newest first
    Versions {
        #[command(flatten)]
        state: StateArgs,

        #[arg(long, default_value_t = 20)]
        limit: usize,

        #[arg(long)]
        json: bool,
    },
}

pub async fn manifest(
    backup_dir: PathBuf,
    output: Option<PathBuf>,
    org_name: Option<String>,
    schedule: Schedule,
    state: StateArgs,
    state_version: Option<String>,
) -> anyhow::Result<ExitCode> {
    if !backup_dir.is_dir() {
        return Err(ConfigError::Invalid(format!("backup directory not found: {}", backup_dir.display())).into());
    }
    let output = output.unwrap_or_else(|| backup_dir.join(MANIFEST_FILE_NAME));
    let pointer = state.location()?.map(|location| {
        StateReference::Pointer(StatePointer {
            s3_bucket: location.bucket,
            s3_key: location.key,
            version_id: state_version,
        })
    });

    println!("🔍 Scanning {}...", backup_dir.display());
    let manifest = ManifestBuilder::new(&backup_dir, org_name.unwrap_or_else(|| "unknown".into()))
        .schedule(schedule)
        .state_reference(pointer)
        .build()
        .await?;
    write_manifest(&manifest, &output).await?;

    println!("✅ Manifest created: {}", output.display());
    if let Some(summary) = &manifest.summary {
        println!("  Total files: {}", summary.total_files);
        println!("  Total resources: {}", summary.total_resources);
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn run(command: StateCommand) -> anyhow::Result<ExitCode> {
    match command {
        StateCommand::Backup {
            environment,
            output,
            state,
            local_state,
            org_name,
            schedule,
            download_state,
        } => {
            let request = BackupRequest::new(
                &environment,
                org_name.unwrap_or_else(|| "unknown".into()),
                &output,
            )
            .schedule(schedule);
            println!("🚀 Creating state-based backup for {environment} in {}", output.display());

            let outcome = match (state.location()?, local_state) {
                (Some(location), _) => {
                    println!("📦 Capturing s3://{}/{}", location.bucket, location.key);
                    let store = S3StateStore::from_env(&location).await;
                    StateBackup::new(store, &location.key)
                        .backup(&request, download_state)
                        .await?
                }
                (None, Some(path)) => {
                    println!("📦 Copying local state {}", path.display());
                    backup_local(&request, &path).await?
                }
                (None, None) => bail!("either --state-bucket/--state-key or --local-state is required"),
            };

            match outcome.manifest.captured_state()? {
                CapturedState::S3(remote) => {
                    println!("  Version ID: {}", remote.version_id.as_deref().unwrap_or("N/A"));
                    println!("  ETag: {}", remote.etag.as_deref().unwrap_or("N/A"));
                    if let Some(modified) = remote.last_modified {
                        println!("  Last Modified: {modified}");
                    }
                    if let Some(path) = &remote.backup_path {
                        println!("  Downloaded to: {path}");
                    }
                }
                CapturedState::Local(local) => {
                    println!("  SHA256: {}", local.sha256);
                    println!("  Size: {} bytes", local.size_bytes);
                }
            }
            println!("✅ Manifest created: {}", outcome.manifest_path.display());
            Ok(ExitCode::SUCCESS)
        }
        StateCommand::Restore {
            manifest,
            version_id,
            state,
            full_restore,
            terraform_dir,
            auto_approve,
            dry_run,
        } => {
            let target = match (&manifest, version_id) {
                (Some(path), _) => {
                    let manifest = read_manifest(path).await?;
                    RestoreTarget::from_manifest(&manifest)
                        .with_context(|| format!("cannot restore from {}", path.display()))?
                }
                (None, Some(version)) => RestoreTarget::version(state.require_location()?, version),
                (None, None) => bail!("either --manifest or --version-id is required"),
            };

            info!(
                bucket = %target.location.bucket,
                key = %target.location.key,
                version = %target.version_id,
                "Restore target resolved"
            );
            let store = S3StateStore::from_env(&target.location).await;
            let restore = StateRestore::new(store, &target.location.key);

            if !full_restore {
                let outcome = restore.restore_state(&target.version_id, dry_run).await?;
                print_restore(&outcome);
                return Ok(ExitCode::SUCCESS);
            }

            let dir = match (terraform_dir, &target.environment) {
                (Some(dir), _) => dir,
                (None, Some(env)) => default_terraform_dir(env),
                (None, None) => bail!("--terraform-dir is required for --full-restore without a manifest"),
            };
            let tool = TerraformCli::new(&dir)?;
            println!(
                "🚀 {}Full restore of {} to {} using {}",
                dry_run_prefix(dry_run),
                target.location.key,
                target.version_id,
                dir.display()
            );

            let report = restore
                .full_restore(&tool, &target.version_id, dry_run, auto_approve)
                .await?;
            print_full_restore(&report);
            Ok(exit_code(report.is_success()))
        }
        StateCommand::Versions { state, limit, json } => {
            let location = state.require_location()?;
            let store = S3StateStore::from_env(&location).await;
            let versions = StateRestore::new(store, &location.key)
                .list_versions(limit)
                .await?;

            if json {
                let rows: Vec<_> = versions
                    .iter()
                    .map(|v| {
                        json!({
                            "version_id": v.version_id,
                            "last_modified": v.last_modified,
                            "size": v.size,
                            "is_latest": v.is_latest,
                        })
                    })
                    .collect();
                print_json(&rows)?;
                return Ok(ExitCode::SUCCESS);
            }

            println!("Versions of s3://{}/{}:", location.bucket, location.key);
            for v in &versions {
                println!(
                    "  {} {:<40} {:>25} {:>10}",
                    if v.is_latest { "*" } else { " " },
                    v.version_id,
                    v.last_modified.map(|t| t.to_rfc3339()).unwrap_or_default(),
                    v.size.map(|s| s.to_string()).unwrap_or_default()
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_restore(outcome: &RestoreOutcome) {
    match outcome {
        RestoreOutcome::AlreadyCurrent { version_id } => {
            println!("✅ State is already at version {version_id}; nothing to restore");
        }
        RestoreOutcome::DryRun { current, would_restore } => {
            println!("[DRY RUN] Current version: {}", current.as_deref().unwrap_or("N/A"));
            println!("[DRY RUN] Would restore version: {would_restore}");
        }
        RestoreOutcome::Restored {
            previous,
            restored_from,
            new,
        } => {
            println!("✅ State restored from version {restored_from}");
            println!("  Previous version: {}", previous.as_deref().unwrap_or("N/A"));
            println!("  New version: {}", new.as_deref().unwrap_or("N/A"));
        }
    }
}

fn print_full_restore(report: &FullRestoreReport) {
    print_restore(&report.state);

    match &report.provisioning {
        ProvisioningOutcome::DryRun { plan } => {
            println!("\n{}", plan.stdout);
            println!("[DRY RUN] Plan complete; apply skipped");
        }
        ProvisioningOutcome::Applied { apply, .. } => {
            println!("\n{}", apply.stdout);
            println!("✅ Terraform apply complete");
        }
        failed => {
            println!(
                "❌ Terraform {}: {}",
                failed.status(),
                failed.error().unwrap_or_default().trim()
            );
        }
    }
}
