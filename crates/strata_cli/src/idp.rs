use crate::args::{AppSelection, IdpArgs};
use crate::output::{self, dry_run_prefix, exit_code, print_json, print_missing, timestamp};

use anyhow::Context;
use clap::Subcommand;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::ExitCode;
use strata_idp::{
    AppSelector, AssignmentExportOptions, EntitlementStatus, GovernanceClient, GrantExport, IdpClient,
    ImportSummary, MembershipExport, SettingChange, UserExportOptions, apply_memberships, apply_setting,
    entitlement_report, export_assignments, export_grants, export_memberships, export_users,
    import_grants, load_bytes, load_json, membership_plan, parse_users_csv, save_bytes, save_json,
    select_apps, users_csv, without_system_apps,
};
use strata_terraform::{EntitlementScanner, find_tf_files};

#[derive(Subcommand)]
pub enum UsersCommand {
    /// Export users with manager, groups and custom attributes to CSV
    Export {
        #[command(flatten)]
        idp: IdpArgs,

        #[arg(short, long, default_value = "users.csv")]
        output: PathBuf,

        #[arg(long)]
        include_deprovisioned: bool,

        /// Skip group lookups
        #[arg(long)]
        no_groups: bool,

        /// Skip manager lookups
        #[arg(long)]
        no_manager: bool,

        /// Only members of this group
        #[arg(long)]
        group: Option<String>,
    },
    /// Add users from a CSV export to their listed groups in this tenant
    Import {
        #[command(flatten)]
        idp: IdpArgs,

        /// CSV written by `users export`
        input: PathBuf,

        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
pub enum AssignmentsCommand {
    /// Export user and group assignments of every application
    Export {
        #[command(flatten)]
        idp: IdpArgs,

        #[arg(short, long, default_value = "app_assignments.json")]
        output: PathBuf,

        /// Keep built-in applications
        #[arg(long)]
        include_system: bool,

        /// Case-insensitive substring of the label
        #[arg(long)]
        app_label: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum MembershipsCommand {
    /// Export group memberships by group name and member email
    Export {
        #[command(flatten)]
        idp: IdpArgs,

        #[arg(short, long, default_value = "memberships.json")]
        output: PathBuf,
    },
    /// Recreate exported memberships in this tenant
    Import {
        #[command(flatten)]
        idp: IdpArgs,

        /// JSON written by `memberships export`
        input: PathBuf,

        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
pub enum GrantsCommand {
    /// Export entitlement bundle grants with names resolved
    Export {
        #[command(flatten)]
        idp: IdpArgs,

        #[arg(short, long, default_value = "grants.json")]
        output: PathBuf,
    },
    /// Recreate exported grants in this tenant
    Import {
        #[command(flatten)]
        idp: IdpArgs,

        /// JSON written by `grants export`
        input: PathBuf,

        /// Skip grants targeting these application labels
        #[arg(long, value_delimiter = ',')]
        exclude_apps: Vec<String>,

        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
pub enum EntitlementsCommand {
    /// Find applications targeted by entitlement resources in Terraform files
    Detect {
        /// Files to scan instead of an environment directory
        #[arg(long, num_args = 1.., required_unless_present = "environment")]
        files: Vec<PathBuf>,

        #[arg(short, long)]
        environment: Option<String>,

        #[arg(long, default_value = ".")]
        base_path: PathBuf,

        /// Look up labels of referenced app resources
        #[arg(long)]
        resolve_labels: bool,

        #[arg(long)]
        json: bool,
    },
    /// Show entitlement management for every application
    List {
        #[command(flatten)]
        idp: IdpArgs,

        #[arg(long)]
        include_system_apps: bool,

        #[arg(long)]
        json: bool,
    },
    /// Show entitlement management for selected applications
    Status {
        #[command(flatten)]
        idp: IdpArgs,

        #[command(flatten)]
        selection: AppSelection,

        #[arg(long)]
        json: bool,
    },
    /// Turn entitlement management on
    Enable {
        #[command(flatten)]
        idp: IdpArgs,

        #[command(flatten)]
        selection: AppSelection,

        #[arg(long)]
        include_system_apps: bool,

        #[arg(long)]
        dry_run: bool,
    },
    /// Turn entitlement management off
    Disable {
        #[command(flatten)]
        idp: IdpArgs,

        #[command(flatten)]
        selection: AppSelection,

        #[arg(long)]
        include_system_apps: bool,

        #[arg(long)]
        dry_run: bool,
    },
}

pub async fn users(command: UsersCommand) -> anyhow::Result<ExitCode> {
    match command {
        UsersCommand::Export {
            idp,
            output,
            include_deprovisioned,
            no_groups,
            no_manager,
            group,
        } => {
            let config = idp.config()?;
            let client = IdpClient::new(&config)?;
            println!("🔍 Exporting users from {}...", config.org_name);

            let options = UserExportOptions {
                include_deprovisioned,
                include_groups: !no_groups,
                include_manager: !no_manager,
                group,
            };
            let rows = export_users(&client, &options).await?;
            if rows.is_empty() {
                println!("❌ No users found to export");
                return Ok(ExitCode::FAILURE);
            }

            let csv = users_csv(&rows, &config.org_name, &timestamp())?;
            save_bytes(&output, csv).await?;
            println!("✅ Exported {} users to {}", rows.len(), output.display());
            Ok(ExitCode::SUCCESS)
        }
        UsersCommand::Import { idp, input, dry_run } => {
            let rows = parse_users_csv(&load_bytes(&input).await?)
                .with_context(|| format!("reading {}", input.display()))?;
            let client = IdpClient::new(&idp.config()?)?;
            println!(
                "🚀 {}Assigning {} users from {} to their groups...",
                dry_run_prefix(dry_run),
                rows.len(),
                input.display()
            );

            let summary = apply_memberships(&client, &membership_plan(&rows), dry_run).await?;
            Ok(report_memberships(&summary, dry_run))
        }
    }
}

pub async fn assignments(command: AssignmentsCommand) -> anyhow::Result<ExitCode> {
    let AssignmentsCommand::Export {
        idp,
        output,
        include_system,
        app_label,
    } = command;

    let config = idp.config()?;
    let client = IdpClient::new(&config)?;
    println!("🔍 Exporting application assignments from {}...", config.org_name);

    let options = AssignmentExportOptions {
        include_system,
        app_label,
    };
    let Some(export) = export_assignments(&client, &options, timestamp()).await? else {
        println!("⚠️  No applications matched; nothing written");
        return Ok(ExitCode::SUCCESS);
    };

    save_json(&output, &export).await?;
    let meta = &export.metadata;
    println!("✅ Exported assignments to {}", output.display());
    println!("  Applications: {} ({} with assignments)", meta.app_count, meta.apps_with_assignments);
    println!("  User assignments: {}", meta.total_user_assignments);
    println!("  Group assignments: {}", meta.total_group_assignments);
    Ok(ExitCode::SUCCESS)
}

pub async fn memberships(command: MembershipsCommand) -> anyhow::Result<ExitCode> {
    match command {
        MembershipsCommand::Export { idp, output } => {
            let config = idp.config()?;
            let client = IdpClient::new(&config)?;
            println!("🔍 Exporting group memberships from {}...", config.org_name);

            let export = export_memberships(&client, timestamp()).await?;
            save_json(&output, &export).await?;
            println!(
                "✅ Exported {} groups with {} members to {}",
                export.group_count,
                export.total_members,
                output.display()
            );
            Ok(ExitCode::SUCCESS)
        }
        MembershipsCommand::Import { idp, input, dry_run } => {
            let export: MembershipExport = load_json(&input).await?;
            let client = IdpClient::new(&idp.config()?)?;
            println!(
                "🚀 {}Importing {} groups exported from {}...",
                dry_run_prefix(dry_run),
                export.group_count,
                export.source_org
            );

            let summary = apply_memberships(&client, &export.plan(), dry_run).await?;
            Ok(report_memberships(&summary, dry_run))
        }
    }
}

fn report_memberships(summary: &ImportSummary, dry_run: bool) -> ExitCode {
    println!("\n{}Summary:", dry_run_prefix(dry_run));
    println!("  Groups found:        {}", summary.groups_found);
    println!("  Groups missing:      {}", summary.groups_missing);
    println!("  Users matched:       {}", summary.users_matched);
    println!("  Users missing:       {}", summary.users_missing);
    println!("  Assignments made:    {}", summary.assignments_made);
    println!("  Assignments failed:  {}", summary.assignments_failed);

    print_missing("Groups not found in target", &summary.missing_groups);
    print_missing("Users not found in target", &summary.missing_users);

    if dry_run {
        println!("\n[DRY RUN] No changes were made. Remove --dry-run to apply.");
    }
    exit_code(!summary.has_errors())
}

pub async fn grants(command: GrantsCommand) -> anyhow::Result<ExitCode> {
    match command {
        GrantsCommand::Export { idp, output } => {
            let config = idp.config()?;
            let client = IdpClient::new(&config)?;
            let governance = GovernanceClient::new(&config)?;
            println!("🔍 Exporting grants from {}...", config.org_name);

            let Some(export) = export_grants(&client, &governance, timestamp()).await? else {
                println!("❌ No entitlement bundles found in {}", config.org_name);
                return Ok(ExitCode::FAILURE);
            };

            save_json(&output, &export).await?;
            println!(
                "✅ Exported {} bundles and {} grants to {}",
                export.bundles.len(),
                export.grants.len(),
                output.display()
            );
            Ok(ExitCode::SUCCESS)
        }
        GrantsCommand::Import {
            idp,
            input,
            exclude_apps,
            dry_run,
        } => {
            let export: GrantExport = load_json(&input).await?;
            let config = idp.config()?;
            let client = IdpClient::new(&config)?;
            let governance = GovernanceClient::new(&config)?;
            println!(
                "🚀 {}Importing {} grants exported from {}...",
                dry_run_prefix(dry_run),
                export.grants.len(),
                export.source_org
            );

            let exclude: BTreeSet<String> = exclude_apps.into_iter().collect();
            let summary = import_grants(&client, &governance, &export, &exclude, dry_run).await?;

            println!("\n{}Summary:", dry_run_prefix(dry_run));
            println!("  Created:   {}", summary.created);
            println!("  Existing:  {}", summary.exists);
            println!("  Excluded:  {}", summary.excluded);
            println!("  Skipped:   {}", summary.skipped);
            println!("  Errors:    {}", summary.errors);
            Ok(exit_code(summary.errors == 0))
        }
    }
}

pub async fn entitlements(command: EntitlementsCommand) -> anyhow::Result<ExitCode> {
    match command {
        EntitlementsCommand::Detect {
            files,
            environment,
            base_path,
            resolve_labels,
            json,
        } => detect(files, environment, base_path, resolve_labels, json).await,
        EntitlementsCommand::List {
            idp,
            include_system_apps,
            json,
        } => {
            let config = idp.config()?;
            let client = IdpClient::new(&config)?;
            let governance = GovernanceClient::new(&config)?;

            println!("🔍 Fetching applications from {}...", config.org_name);
            let mut apps = select_apps(&client, &AppSelector::All).await?;
            if !include_system_apps {
                apps = without_system_apps(apps).0;
            }

            let report = entitlement_report(&governance, &apps).await?;
            if json {
                print_json(&report)?;
                return Ok(ExitCode::SUCCESS);
            }

            println!("\n{:<25} {:<40} {:<20} {:<10}", "ID", "Label", "Entitlement Mgmt", "Status");
            output::rule();
            for app in &report {
                println!(
                    "{:<25} {:<40} {:<20} {:<10}",
                    app.id,
                    output::clip(&app.label, 38),
                    app.entitlement_settings.display(),
                    app.status.as_deref().unwrap_or("N/A")
                );
            }
            output::rule();

            let enabled = report
                .iter()
                .filter(|app| app.entitlement_settings.is_enabled())
                .count();
            println!(
                "\nTotal: {} apps, {enabled} with entitlement management enabled",
                report.len()
            );
            Ok(ExitCode::SUCCESS)
        }
        EntitlementsCommand::Status {
            idp,
            selection,
            json,
        } => {
            let config = idp.config()?;
            let client = IdpClient::new(&config)?;
            let governance = GovernanceClient::new(&config)?;

            let apps = select_apps(&client, &selection.selector()).await?;
            let report = entitlement_report(&governance, &apps).await?;
            if json {
                print_json(&report)?;
                return Ok(ExitCode::SUCCESS);
            }

            for app in &report {
                println!("\nApp: {} ({})", app.label, app.id);
                println!("  Status: {}", app.entitlement_settings.display());
                match &app.entitlement_settings {
                    EntitlementStatus::Enabled { data } => {
                        println!("  Settings: {}", serde_json::to_string_pretty(data)?);
                    }
                    EntitlementStatus::NotEligible { error } | EntitlementStatus::Error { error } => {
                        println!("  Error: {error}");
                    }
                    EntitlementStatus::NotConfigured => {}
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        EntitlementsCommand::Enable {
            idp,
            selection,
            include_system_apps,
            dry_run,
        } => change_setting(idp, selection, include_system_apps, true, dry_run).await,
        EntitlementsCommand::Disable {
            idp,
            selection,
            include_system_apps,
            dry_run,
        } => change_setting(idp, selection, include_system_apps, false, dry_run).await,
    }
}

async fn detect(
    files: Vec<PathBuf>,
    environment: Option<String>,
    base_path: PathBuf,
    resolve_labels: bool,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let terraform_dir = environment
        .as_deref()
        .map(|env| base_path.join("environments").join(env).join("terraform"));
    let files = match (&terraform_dir, files.is_empty()) {
        (Some(dir), true) => find_tf_files(dir)?,
        _ => files,
    };

    if files.is_empty() {
        if json {
            print_json(&serde_json::json!({"apps": [], "references": [], "error": "No files found"}))?;
        } else {
            println!("No Terraform files found to scan");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let scanner = EntitlementScanner::new()?;
    let mut scan = scanner.scan_files(&files).await;
    if let Some(dir) = terraform_dir.filter(|_| resolve_labels) {
        scan.resolved_labels = scanner
            .resolve_labels(&dir, &scan.terraform_references)
            .await?;
    }

    if json {
        print_json(&scan)?;
        return Ok(ExitCode::SUCCESS);
    }

    println!("Scanned {} file(s)\n", scan.files_scanned);
    if !scan.app_ids.is_empty() {
        println!("Direct App IDs found:");
        for id in &scan.app_ids {
            println!("  - {id}");
        }
        println!();
    }
    if !scan.terraform_references.is_empty() {
        println!("Terraform App References found:");
        for reference in &scan.terraform_references {
            match scan.resolved_labels.get(reference) {
                Some(label) => println!("  - {reference} (label: \"{label}\")"),
                None => println!("  - {reference}"),
            }
        }
        println!();
    }
    println!("Total: {} app(s) with entitlement resources", scan.total());
    Ok(ExitCode::SUCCESS)
}

async fn change_setting(
    idp: IdpArgs,
    selection: AppSelection,
    include_system_apps: bool,
    enable: bool,
    dry_run: bool,
) -> anyhow::Result<ExitCode> {
    let config = idp.config()?;
    let client = IdpClient::new(&config)?;
    let governance = GovernanceClient::new(&config)?;

    let mut apps = select_apps(&client, &selection.selector()).await?;
    if !include_system_apps {
        let (kept, skipped) = without_system_apps(apps);
        if skipped > 0 {
            println!("Skipping {skipped} system app(s)");
        }
        apps = kept;
    }

    let verb = if enable { "Enabled" } else { "Disabled" };
    let prefix = dry_run_prefix(dry_run);
    let results = apply_setting(&governance, &apps, enable, dry_run).await?;

    let mut errors = 0;
    for result in &results {
        if result.change.is_ok() {
            println!("  {prefix}{verb}: {}", result.label);
        } else {
            errors += 1;
            let message = match &result.change {
                SettingChange::Error { message } => message.as_str(),
                _ => "Unknown error",
            };
            println!("  ❌ {}: {message}", result.label);
        }
    }

    println!("\n{prefix}Summary:");
    println!("  Success: {}", results.len() - errors);
    println!("  Errors: {errors}");
    if dry_run {
        println!("\n[DRY RUN] No changes were made. Remove --dry-run to apply.");
    }
    Ok(exit_code(errors == 0))
}
