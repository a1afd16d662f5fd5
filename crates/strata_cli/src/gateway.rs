use crate::args::GatewayArgs;
use crate::output::{self, dry_run_prefix, exit_code, print_json};

use anyhow::{Context, bail};
use clap::Subcommand;
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use strata_fs::atomic_write;
use strata_gateway::model::GatewaySection;
use strata_gateway::{ApplicationManager, DeployAction, GatewayClient, GatewayFile};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

#[derive(Subcommand)]
pub enum GatewayCommand {
    /// List applications
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one application with its attributes
    Show {
        /// Label or id
        app: String,
    },
    /// Create or update the applications in the config file
    Deploy {
        /// Only the application with this label
        #[arg(long)]
        app: Option<String>,

        #[arg(long)]
        dry_run: bool,
    },
    /// Delete an application
    Delete {
        /// Label or id
        app: String,

        /// Do not ask for confirmation
        #[arg(long)]
        force: bool,
    },
    /// Write every existing application to a config file
    Import {
        #[arg(short, long, default_value = "oag_applications.json")]
        output: PathBuf,
    },
    /// Check that the gateway accepts our credentials
    Health,
}

struct Session {
    manager: ApplicationManager,
    file: Option<GatewayFile>,
}

async fn connect(args: &GatewayArgs) -> anyhow::Result<Session> {
    let file = match &args.config {
        Some(path) => Some(
            GatewayFile::load(path)
                .await
                .with_context(|| format!("loading {}", path.display()))?,
        ),
        None => None,
    };
    let section = file.as_ref().map(|f| f.gateway.clone()).unwrap_or_default();
    let config = section.resolve(
        args.hostname.clone(),
        args.client_id.clone(),
        args.private_key_path.clone(),
        args.private_key.clone(),
    )?;
    debug!(hostname = %config.hostname, verify_ssl = config.verify_ssl, "Gateway configuration resolved");

    let client = GatewayClient::from_config(&config).await?;
    Ok(Session {
        manager: ApplicationManager::new(client),
        file,
    })
}

pub async fn run(args: GatewayArgs, command: GatewayCommand) -> anyhow::Result<ExitCode> {
    let Session { manager, file } = connect(&args).await?;

    match command {
        GatewayCommand::List { json } => {
            let apps = manager.list_applications().await?;
            if json {
                print_json(&apps)?;
                return Ok(ExitCode::SUCCESS);
            }

            println!("\n{:<25} {:<40} {:<35}", "ID", "Label", "Public Domain");
            output::rule();
            for app in &apps {
                println!(
                    "{:<25} {:<40} {:<35}",
                    app.id,
                    output::clip(&app.label, 38),
                    app.public_domain.as_deref().unwrap_or("-")
                );
            }
            output::rule();
            println!("\nTotal: {} applications", apps.len());
            Ok(ExitCode::SUCCESS)
        }
        GatewayCommand::Show { app } => {
            let found = match manager.find_application(&app).await? {
                Some(found) => found,
                None => manager.get_application(&app).await?,
            };
            let attributes = manager.list_attributes(&found.id).await?;
            print_json(&json!({"application": found, "attributes": attributes}))?;
            Ok(ExitCode::SUCCESS)
        }
        GatewayCommand::Deploy { app, dry_run } => {
            let Some(file) = file else {
                bail!("deploy needs an applications file (--config)");
            };
            let apps: Vec<_> = file
                .applications
                .iter()
                .filter(|config| app.as_ref().is_none_or(|label| &config.label == label))
                .collect();
            if apps.is_empty() {
                bail!("no matching applications in the config file");
            }

            let prefix = dry_run_prefix(dry_run);
            let mut failures = 0;
            for config in apps {
                match manager.deploy_application(config, dry_run).await {
                    Ok(result) => {
                        let action = match result.action {
                            DeployAction::Create => "Created",
                            DeployAction::Update => "Updated",
                        };
                        println!(
                            "✅ {prefix}{action}: {} ({})",
                            result.label,
                            result.app_id.as_deref().unwrap_or("new")
                        );
                        let changes = &result.attributes;
                        if !changes.is_empty() {
                            println!(
                                "  Attributes: {} added, {} updated, {} deleted",
                                changes.added.len(),
                                changes.updated.len(),
                                changes.deleted.len()
                            );
                        }
                    }
                    Err(e) => {
                        failures += 1;
                        println!("❌ {}: {e}", config.label);
                    }
                }
            }
            Ok(exit_code(failures == 0))
        }
        GatewayCommand::Delete { app, force } => {
            let found = match manager.find_application(&app).await? {
                Some(found) => found,
                None => manager.get_application(&app).await?,
            };
            if !force && !confirm(&format!("Delete application '{}' ({})?", found.label, found.id)).await? {
                println!("Aborted");
                return Ok(ExitCode::SUCCESS);
            }

            manager.delete_application(&found.id).await?;
            println!("✅ Deleted {} ({})", found.label, found.id);
            Ok(ExitCode::SUCCESS)
        }
        GatewayCommand::Import { output } => {
            println!("🔍 Importing applications from {}...", manager.client().hostname());
            let applications = manager.import_applications().await?;
            let exported = GatewayFile {
                gateway: GatewaySection {
                    hostname: Some(manager.client().hostname().to_string()),
                    ..Default::default()
                },
                applications,
            };

            atomic_write(&output, exported.to_pretty_json()?)
                .await
                .with_context(|| format!("writing {}", output.display()))?;
            println!(
                "✅ Wrote {} applications to {}",
                exported.applications.len(),
                output.display()
            );
            Ok(ExitCode::SUCCESS)
        }
        GatewayCommand::Health => {
            let status = manager.client().health_check().await;
            print_json(&status)?;
            Ok(exit_code(status.is_healthy()))
        }
    }
}

async fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;

    let mut answer = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut answer)
        .await?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
