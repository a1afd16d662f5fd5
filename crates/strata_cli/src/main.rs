mod args;
mod gateway;
mod idp;
mod output;
mod pam;
mod state;

use args::{GatewayArgs, StateArgs};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use strata_core::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Backup, restore and migration tooling for identity tenants")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a manifest describing the export files in a backup directory
    Manifest {
        /// Directory containing the exported files
        #[arg(short = 'd', long)]
        backup_dir: PathBuf,

        /// Defaults to MANIFEST.json inside the backup directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, env = "OKTA_ORG_NAME")]
        org_name: Option<String>,

        #[arg(long, default_value_t = Schedule::Manual)]
        schedule: Schedule,

        #[command(flatten)]
        state: StateArgs,

        /// State version to record alongside the bucket and key
        #[arg(long, requires = "state_bucket")]
        state_version: Option<String>,
    },
    /// Users
    Users {
        #[command(subcommand)]
        command: idp::UsersCommand,
    },
    /// Application assignments
    Assignments {
        #[command(subcommand)]
        command: idp::AssignmentsCommand,
    },
    /// Group memberships
    Memberships {
        #[command(subcommand)]
        command: idp::MembershipsCommand,
    },
    /// Entitlement bundle grants
    Grants {
        #[command(subcommand)]
        command: idp::GrantsCommand,
    },
    /// Entitlement management settings and Terraform usage
    Entitlements {
        #[command(subcommand)]
        command: idp::EntitlementsCommand,
    },
    /// Versioned Terraform state
    State {
        #[command(subcommand)]
        command: state::StateCommand,
    },
    /// Access gateway applications
    Gateway {
        #[command(flatten)]
        connection: GatewayArgs,

        #[command(subcommand)]
        command: gateway::GatewayCommand,
    },
    /// Privileged access resources
    Pam {
        #[command(subcommand)]
        command: pam::PamCommand,
    },
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Manifest {
            backup_dir,
            output,
            org_name,
            schedule,
            state,
            state_version,
        } => state::manifest(backup_dir, output, org_name, schedule, state, state_version).await,
        Commands::Users { command } => idp::users(command).await,
        Commands::Assignments { command } => idp::assignments(command).await,
        Commands::Memberships { command } => idp::memberships(command).await,
        Commands::Grants { command } => idp::grants(command).await,
        Commands::Entitlements { command } => idp::entitlements(command).await,
        Commands::State { command } => state::run(command).await,
        Commands::Gateway { connection, command } => gateway::run(connection, command).await,
        Commands::Pam { command } => pam::run(command).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn restore_needs_a_source() {
        let result = Cli::try_parse_from(["strata", "state", "restore", "--full-restore"]);
        assert!(result.is_err());

        let parsed = Cli::try_parse_from([
            "strata",
            "state",
            "restore",
            "--version-id",
            "v3",
            "--state-bucket",
            "tf",
            "--state-key",
            "acme/terraform.tfstate",
        ]);
        assert!(parsed.is_ok());
    }

    #[test]
    fn manifest_and_version_id_are_exclusive() {
        let result = Cli::try_parse_from([
            "strata",
            "state",
            "restore",
            "--manifest",
            "MANIFEST.json",
            "--version-id",
            "v3",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn entitlement_changes_need_exactly_one_selector() {
        let none = Cli::try_parse_from(["strata", "entitlements", "enable", "--dry-run"]);
        assert!(none.is_err());

        let both = Cli::try_parse_from([
            "strata",
            "entitlements",
            "enable",
            "--app-id",
            "0oa1",
            "--app-label",
            "CRM*",
        ]);
        assert!(both.is_err());

        let Commands::Entitlements {
            command: idp::EntitlementsCommand::Disable { selection, dry_run, .. },
        } = Cli::try_parse_from(["strata", "entitlements", "disable", "--app-label", "CRM*", "--dry-run"])
            .unwrap()
            .command
        else {
            panic!("expected entitlements disable");
        };
        assert!(dry_run);
        assert_eq!(selection.selector(), strata_idp::AppSelector::Label("CRM*".into()));
    }

    #[test]
    fn schedule_and_exclusions_parse() {
        let cli = Cli::try_parse_from([
            "strata",
            "-v",
            "manifest",
            "-d",
            "backups/acme",
            "--org-name",
            "acme",
            "--schedule",
            "weekly",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Manifest {
                schedule: Schedule::Weekly,
                ..
            }
        ));

        let Commands::Grants {
            command: idp::GrantsCommand::Import { exclude_apps, .. },
        } = Cli::try_parse_from([
            "strata",
            "grants",
            "import",
            "grants.json",
            "--exclude-apps",
            "Slack,Zoom",
        ])
        .unwrap()
        .command
        else {
            panic!("expected grants import");
        };
        assert_eq!(exclude_apps, vec!["Slack", "Zoom"]);
    }

    #[test]
    fn manifest_restore_instructions_are_valid_commands() {
        let now = chrono::Utc::now();
        let manifest = SnapshotManifest::state_based(
            "prod",
            "acme",
            "ops",
            Schedule::Manual,
            CapturedState::Local(LocalState {
                original_path: "terraform.tfstate".into(),
                backup_path: "backup/terraform.tfstate".into(),
                sha256: "00".repeat(32),
                size_bytes: 12,
                modified: now,
            }),
            now,
        );

        let instructions = manifest.restore_instructions.unwrap();
        assert_eq!(instructions.len(), 2);
        for (mode, text) in &instructions {
            let command = text.split('`').nth(1).unwrap();
            let cli = Cli::try_parse_from(command.split_whitespace())
                .unwrap_or_else(|e| panic!("{mode}: {e}"));

            let Commands::State {
                command: state::StateCommand::Restore { manifest, full_restore, .. },
            } = cli.command
            else {
                panic!("{mode}: expected state restore");
            };
            assert_eq!(manifest, Some(PathBuf::from(MANIFEST_FILE_NAME)));
            assert_eq!(full_restore, mode == "full_restore");
        }
    }

    #[test]
    fn detect_requires_files_or_environment() {
        assert!(Cli::try_parse_from(["strata", "entitlements", "detect"]).is_err());
        assert!(Cli::try_parse_from(["strata", "entitlements", "detect", "-e", "acme"]).is_ok());
    }
}
