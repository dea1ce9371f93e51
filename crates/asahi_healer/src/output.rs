//! Terminal output for the CLI - ASCII only, colored status tags.

use crate::backup::BackupEntry;
use crate::exec_log::ExecutionEntry;
use asahi_common::fix::{BatchReport, FixStatus, RestoreResult, RestoreStatus};
use asahi_common::{Recommendation, Severity};
use chrono::{DateTime, Local};
use owo_colors::OwoColorize;

fn severity_tag(severity: Severity) -> String {
    let tag = format!("[{}]", severity.as_str().to_uppercase());
    match severity {
        Severity::Critical => tag.bright_red().bold().to_string(),
        Severity::High => tag.red().to_string(),
        Severity::Medium => tag.yellow().to_string(),
        Severity::Low => tag.cyan().to_string(),
        Severity::Info => tag.dimmed().to_string(),
    }
}

fn status_tag(status: FixStatus) -> String {
    let tag = format!("[{}]", status.as_str().to_uppercase());
    match status {
        FixStatus::Success => tag.bright_green().to_string(),
        FixStatus::PartialSuccess | FixStatus::Skipped => tag.yellow().to_string(),
        FixStatus::Failed | FixStatus::Error => tag.bright_red().to_string(),
        FixStatus::Pending => tag.dimmed().to_string(),
    }
}

pub fn display_recommendations(recommendations: &[Recommendation]) {
    if recommendations.is_empty() {
        println!("{}", "No issues found.".bright_green());
        return;
    }

    for (i, rec) in recommendations.iter().enumerate() {
        println!();
        println!("{:>2}. {} {}", i + 1, severity_tag(rec.severity), rec.title.bold());
        println!("    id: {}", rec.id.dimmed());
        if !rec.description.is_empty() {
            println!("    {}", rec.description);
        }
        for cmd in &rec.fix_commands {
            println!("    $ {}", cmd.cyan());
        }
        for warning in &rec.safety_warnings {
            println!("    {} {}", "[WARNING]".yellow(), warning);
        }
    }
    println!();
}

pub fn display_batch(report: &BatchReport) {
    println!();
    for result in &report.execution_results {
        println!("{} {} ({:.1}s)", status_tag(result.status), result.title, result.execution_time);
        for err in &result.errors {
            println!("    {}", err.dimmed());
        }
        if let Some(path) = &result.backup_path {
            println!("    backup: {}", path.display());
        }
    }
    println!();

    let mode = if report.dry_run { " (dry run)" } else { "" };
    println!(
        "Total {}: {} successful, {} failed, {} skipped{}",
        report.total_fixes,
        report.successful_fixes.to_string().bright_green(),
        report.failed_fixes.to_string().bright_red(),
        report.skipped_fixes.to_string().yellow(),
        mode
    );
}

pub fn display_restore(result: &RestoreResult) {
    let tag = match result.status {
        RestoreStatus::Success => "[SUCCESS]".bright_green().to_string(),
        RestoreStatus::PartialSuccess => "[PARTIAL]".yellow().to_string(),
        RestoreStatus::Failed => "[FAILED]".bright_red().to_string(),
    };
    println!("{} {} path(s) restored", tag, result.files_restored.len());
    for path in &result.files_restored {
        println!("    {}", path);
    }
    for err in &result.errors {
        println!("    {}", err.bright_red());
    }
}

pub fn display_backups(backups: &[BackupEntry]) {
    if backups.is_empty() {
        println!("No backups.");
        return;
    }
    for backup in backups {
        let when: DateTime<Local> = backup.modified.into();
        println!("{}  {}", when.format("%Y-%m-%d %H:%M:%S").dimmed(), backup.path.display());
    }
}

pub fn display_log(entries: &[ExecutionEntry]) {
    for e in entries {
        let code = if e.exit_code == 0 {
            e.exit_code.to_string().bright_green().to_string()
        } else {
            e.exit_code.to_string().bright_red().to_string()
        };
        let dry = if e.dry_run { " [dry]" } else { "" };
        println!(
            "{} {:<12} {:>4} {:>7.2}s{} {}",
            e.timestamp.format("%Y-%m-%dT%H:%M:%SZ").dimmed(),
            e.operation,
            code,
            e.duration_secs,
            dry,
            e.command
        );
    }
}

/// Display an error
pub fn display_error(message: &str) {
    eprintln!("[ERROR] {}", message.red());
}
