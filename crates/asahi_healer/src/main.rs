//! asahi-healer - health checks and guarded fixes for Asahi Linux

use anyhow::{bail, Context, Result};
use asahi_common::{Config, Recommendation, RestoreStatus, ScanResults, ScheduledTask, VERSION};
use asahi_healer::exec_log::ExecutionLog;
use asahi_healer::output;
use asahi_healer::runner::CommandRunner;
use asahi_healer::{logging, probe, Healer, HealerOptions, HighRiskApproval, TaskOutcome};
use clap::{Args, Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "asahi-healer")]
#[command(about = "Asahi Linux system health checks and guarded fixes", long_about = None)]
#[command(version = VERSION)]
struct Cli {
    /// Config file (default: ~/.config/asahi_healer/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log commands instead of executing them
    #[arg(long, global = true)]
    dry_run: bool,

    /// Allow commands from high-risk recommendations
    #[arg(long, global = true)]
    allow_high_risk: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where scan data and AI output come from
#[derive(Args)]
struct Inputs {
    /// Read scan results from a JSON file instead of probing the host
    #[arg(long)]
    scan: Option<PathBuf>,

    /// Raw AI analysis response to merge with rule findings
    #[arg(long)]
    ai: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe the host and print scan results as JSON
    Scan,

    /// Show prioritized recommendations
    Recommend {
        #[command(flatten)]
        inputs: Inputs,
    },

    /// Apply recommendations
    Fix {
        #[command(flatten)]
        inputs: Inputs,

        /// Only apply these recommendation ids (repeatable)
        #[arg(long = "id")]
        ids: Vec<String>,
    },

    /// Write a health report
    Report {
        #[command(flatten)]
        inputs: Inputs,

        /// Output directory (default: configured report dir)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Run a scheduled task now by id
    Task {
        id: String,

        #[command(flatten)]
        inputs: Inputs,
    },

    /// Restore a backup directory
    Restore { path: PathBuf },

    /// List backups, newest first
    Backups,

    /// Remove all but the configured number of backups
    Cleanup,

    /// Show the command execution log
    Log {
        #[arg(long, default_value_t = 20)]
        tail: usize,

        /// Write the selected entries to FILE as a JSON array
        #[arg(long)]
        export: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        output::display_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let (config, source) = Config::load_with_source(cli.config.as_deref()).context("Failed to load config")?;
    logging::init(&config.logging.level);
    info!("{}", source);

    let options = HealerOptions {
        dry_run: cli.dry_run,
        approval: if cli.allow_high_risk {
            HighRiskApproval::Granted
        } else {
            HighRiskApproval::Withheld
        },
    };
    let healer = Healer::new(config, options);

    match cli.command {
        Commands::Scan => {
            let scan = live_scan(&healer).await;
            println!("{}", serde_json::to_string_pretty(&scan)?);
        }
        Commands::Recommend { inputs } => {
            let (scan, ai) = load_inputs(&healer, &inputs).await?;
            let recommendations = healer.generate(&scan, ai.as_deref());
            output::display_recommendations(&recommendations);
        }
        Commands::Fix { inputs, ids } => {
            let (scan, ai) = load_inputs(&healer, &inputs).await?;
            let recommendations = healer.generate(&scan, ai.as_deref());
            fix(&healer, recommendations, &ids).await;
        }
        Commands::Report { inputs, output: dir } => {
            let (scan, ai) = load_inputs(&healer, &inputs).await?;
            let recommendations = healer.generate(&scan, ai.as_deref());
            let dir = dir.unwrap_or_else(|| healer.config().reporting.report_dir.clone());
            let path = healer.health_report(&scan, &recommendations).write_to(&dir)?;
            println!("{} Report written to {}", "[OK]".bright_green(), path.display());
        }
        Commands::Task { id, inputs } => {
            let mut task = ScheduledTask::defaults()
                .into_iter()
                .find(|t| t.id == id)
                .with_context(|| format!("Unknown task: {}", id))?;
            // Running by hand overrides the shipped enabled flag
            task.enabled = true;
            let (scan, ai) = load_inputs(&healer, &inputs).await?;
            match healer.run_task(&mut task, &scan, ai.as_deref()).await? {
                TaskOutcome::Disabled => println!("Task {} is disabled", task.id),
                TaskOutcome::Scanned(recs) => output::display_recommendations(&recs),
                TaskOutcome::Fixed(report) => output::display_batch(&report),
                TaskOutcome::CleanedUp(removed) => println!("Removed {} backup(s)", removed.len()),
            }
        }
        Commands::Restore { path } => {
            let result = healer.executor().backups().restore_backup(&path);
            output::display_restore(&result);
            if result.status == RestoreStatus::Failed {
                bail!("Restore failed");
            }
        }
        Commands::Backups => {
            let backups = healer.executor().backups().list_backups()?;
            output::display_backups(&backups);
        }
        Commands::Cleanup => {
            let keep = healer.config().fix.backup_retention;
            let removed = healer.executor().backups().cleanup(keep)?;
            println!("{} Removed {} backup(s), kept {}", "[OK]".bright_green(), removed.len(), keep);
        }
        Commands::Log { tail, export } => {
            let Some(path) = healer.log().path() else {
                bail!("No execution log file configured");
            };
            let entries = ExecutionLog::tail(path, tail)?;
            match export {
                Some(file) => {
                    std::fs::write(&file, serde_json::to_string_pretty(&entries)?)
                        .with_context(|| format!("Failed to write {}", file.display()))?;
                    println!("{} Exported {} entries to {}", "[OK]".bright_green(), entries.len(), file.display());
                }
                None => output::display_log(&entries),
            }
        }
    }

    Ok(())
}

async fn fix(healer: &Healer, recommendations: Vec<Recommendation>, ids: &[String]) {
    let stop = healer.executor().stop_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing current fix then stopping");
            stop.store(true, Ordering::SeqCst);
        }
    });

    if healer.executor().dry_run() {
        println!("{}", "[NOTE] Dry run: no commands will be executed".cyan());
    }

    let ids = (!ids.is_empty()).then_some(ids);
    let report = healer.run_fixes(recommendations, ids).await;
    output::display_batch(&report);
}

async fn load_inputs(healer: &Healer, inputs: &Inputs) -> Result<(ScanResults, Option<String>)> {
    let scan = match &inputs.scan {
        Some(path) => read_scan(path)?,
        None => live_scan(healer).await,
    };
    let ai = match &inputs.ai {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read AI response {}", path.display()))?,
        ),
        None => None,
    };
    Ok((scan, ai))
}

fn read_scan(path: &Path) -> Result<ScanResults> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scan results {}", path.display()))?;
    Ok(ScanResults::from_json(&content)?)
}

/// Probing only reads state, so it always runs for real
async fn live_scan(healer: &Healer) -> ScanResults {
    info!("Scanning system");
    let runner = CommandRunner::new(
        false,
        Duration::from_secs(healer.config().fix.command_timeout_secs),
        Arc::clone(healer.log()),
    );
    probe::scan_system(&runner).await
}
