use crate::args::PamArgs;

use chrono::Utc;
use clap::Subcommand;
use std::path::PathBuf;
use std::process::ExitCode;
use strata_pam::{PamClient, PamImporter};

#[derive(Subcommand)]
pub enum PamCommand {
    /// Generate Terraform and import commands for existing team resources
    Import {
        #[command(flatten)]
        pam: PamArgs,

        /// Directory for the generated files
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Print the generated files instead of writing them
        #[arg(long)]
        dry_run: bool,
    },
}

pub async fn run(command: PamCommand) -> anyhow::Result<ExitCode> {
    let PamCommand::Import { pam, output, dry_run } = command;

    let config = pam.config()?;
    let importer = PamImporter::new(PamClient::new(&config)?);
    println!("🔍 Importing resources from team {}...", config.team);

    let report = importer.import_all(&output, dry_run, Utc::now()).await?;
    let summary = &report.summary;

    if dry_run {
        println!("\n[DRY RUN] Terraform:\n");
        println!("{}", report.artifacts.terraform);
        println!("\n[DRY RUN] Import commands:\n");
        for command in &report.artifacts.commands {
            println!("{command}");
        }
    }

    println!("\nSummary:");
    println!("  Resource groups:  {}", summary.resource_groups);
    println!("  Projects:         {}", summary.projects);
    println!("  Groups:           {}", summary.groups);
    println!("  Gateway tokens:   {}", summary.gateway_tokens);
    println!("  Secret folders:   {}", summary.secret_folders);
    println!("  Security policies: {}", summary.security_policies);
    println!("  Import commands:  {}", summary.import_commands);

    match &report.written {
        Some(files) => {
            println!("\n✅ Files written:");
            println!("  {}", files.terraform.display());
            println!("  {}", files.script.display());
            println!("  {}", files.export.display());
        }
        None => println!("\n[DRY RUN] No files were written. Remove --dry-run to write them."),
    }
    Ok(ExitCode::SUCCESS)
}
