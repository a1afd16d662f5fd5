use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fmt::Display;
use std::process::ExitCode;

const MISSING_SHOWN: usize = 10;
pub const RULE_WIDTH: usize = 100;

/// Current UTC time as `2026-01-01T00:00:00Z`.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn dry_run_prefix(dry_run: bool) -> &'static str {
    if dry_run { "[DRY RUN] " } else { "" }
}

pub fn exit_code(ok: bool) -> ExitCode {
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// The first few items, then a count of the rest.
pub fn missing_lines<T: Display>(items: impl IntoIterator<Item = T>) -> Vec<String> {
    let items: Vec<T> = items.into_iter().collect();
    let mut lines: Vec<String> = items
        .iter()
        .take(MISSING_SHOWN)
        .map(|item| format!("  - {item}"))
        .collect();
    if items.len() > MISSING_SHOWN {
        lines.push(format!("  ... and {} more", items.len() - MISSING_SHOWN));
    }
    lines
}

pub fn print_missing<T: Display>(title: &str, items: impl IntoIterator<Item = T>) {
    let lines = missing_lines(items);
    if lines.is_empty() {
        return;
    }
    println!("\n⚠️  {title}:");
    for line in lines {
        println!("{line}");
    }
}

/// Cuts `value` to at most `width` characters.
pub fn clip(value: &str, width: usize) -> String {
    value.chars().take(width).collect()
}

pub fn rule() {
    println!("{}", "=".repeat(RULE_WIDTH));
}
