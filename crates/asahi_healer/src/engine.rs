//! Healer orchestrator
//!
//! Wires the pipeline together: rules + AI formatting -> merge -> finalize,
//! then hands the result to the fix executor. Also runs scheduled tasks and
//! persists reports.

use crate::backup::BackupManager;
use crate::exec_log::ExecutionLog;
use crate::fixer::FixExecutor;
use crate::preflight::{HostProbe, Preflight, SystemProbe};
use crate::runner::CommandRunner;
use crate::safety::{HighRiskApproval, SafetyGate};
use asahi_common::report::write_batch_report;
use asahi_common::{
    finalize, format_ai_response, merge, BatchReport, Config, HealthReport, Recommendation, Result,
    RuleEngine, ScanResults, ScheduledTask, TaskType,
};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Per-invocation overrides on top of the config file
#[derive(Debug, Clone, Copy, Default)]
pub struct HealerOptions {
    pub dry_run: bool,
    pub approval: HighRiskApproval,
}

/// What a scheduled task produced
#[derive(Debug)]
pub enum TaskOutcome {
    Disabled,
    Scanned(Vec<Recommendation>),
    Fixed(BatchReport),
    CleanedUp(Vec<PathBuf>),
}

pub struct Healer {
    config: Config,
    rules: RuleEngine,
    executor: FixExecutor,
    log: Arc<ExecutionLog>,
}

impl Healer {
    /// Healer against the live host
    pub fn new(config: Config, options: HealerOptions) -> Self {
        let log = Arc::new(ExecutionLog::with_file(config.logging.execution_log_path()));
        let runner = Self::runner(&config, options, Arc::clone(&log));
        let probe: Arc<dyn SystemProbe> = Arc::new(HostProbe::new(runner.clone()));
        let backups = BackupManager::new(&config.fix.backup_dir, runner.clone());
        Self::assemble(config, options, log, runner, backups, probe)
    }

    /// Healer with an explicit probe, backup manager and in-memory log
    pub fn with_parts(
        config: Config,
        options: HealerOptions,
        log: Arc<ExecutionLog>,
        backups: impl FnOnce(CommandRunner) -> BackupManager,
        probe: Arc<dyn SystemProbe>,
    ) -> Self {
        let runner = Self::runner(&config, options, Arc::clone(&log));
        let backups = backups(runner.clone());
        Self::assemble(config, options, log, runner, backups, probe)
    }

    fn runner(config: &Config, options: HealerOptions, log: Arc<ExecutionLog>) -> CommandRunner {
        CommandRunner::new(
            options.dry_run || config.fix.dry_run_by_default,
            Duration::from_secs(config.fix.command_timeout_secs),
            log,
        )
    }

    fn assemble(
        config: Config,
        options: HealerOptions,
        log: Arc<ExecutionLog>,
        runner: CommandRunner,
        backups: BackupManager,
        probe: Arc<dyn SystemProbe>,
    ) -> Self {
        let approval = if config.fix.require_confirmation_high_risk {
            options.approval
        } else {
            HighRiskApproval::Granted
        };
        let preflight = Preflight::new(probe, config.preflight.clone());
        let executor = FixExecutor::new(runner, SafetyGate::new(approval), backups, preflight)
            .with_backups(config.fix.create_backups);

        Self {
            config,
            rules: RuleEngine::new(),
            executor,
            log,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn executor(&self) -> &FixExecutor {
        &self.executor
    }

    pub fn log(&self) -> &Arc<ExecutionLog> {
        &self.log
    }

    /// Rule and AI recommendations, merged, prioritized and finalized
    pub fn generate(&self, scan: &ScanResults, ai_response: Option<&str>) -> Vec<Recommendation> {
        let mut recommendations = self.rules.generate(scan);
        let rule_count = recommendations.len();

        if let Some(response) = ai_response {
            recommendations.extend(format_ai_response(response));
        }
        info!(
            "Generated {} rule-based and {} AI recommendations",
            rule_count,
            recommendations.len() - rule_count
        );

        let merged = merge(recommendations);
        finalize(merged, scan)
    }

    pub fn health_report(&self, scan: &ScanResults, recommendations: &[Recommendation]) -> HealthReport {
        HealthReport::build(scan, recommendations)
    }

    /// Apply all recommendations, or only those in `ids`, and persist the
    /// batch report when configured
    pub async fn run_fixes(&self, recommendations: Vec<Recommendation>, ids: Option<&[String]>) -> BatchReport {
        let report = match ids {
            Some(ids) => self.executor.fix_selected(recommendations, ids).await,
            None => self.executor.fix_all(recommendations).await,
        };

        if self.config.reporting.write_fix_reports {
            if let Err(e) = write_batch_report(&report, &self.config.reporting.report_dir) {
                warn!("Failed to save fix report: {}", e);
            }
        }
        report
    }

    /// Run one scheduled task now. `scan` is the fresh scan the trigger
    /// collected; backup cleanup ignores it.
    pub async fn run_task(
        &self,
        task: &mut ScheduledTask,
        scan: &ScanResults,
        ai_response: Option<&str>,
    ) -> Result<TaskOutcome> {
        if !task.enabled {
            info!("Task {} is disabled", task.id);
            return Ok(TaskOutcome::Disabled);
        }
        info!("Running task {} ({})", task.id, task.task_type.as_str());

        let outcome = match task.task_type {
            TaskType::FullScan => {
                let recommendations = self.generate(scan, ai_response);
                HealthReport::build(scan, &recommendations).write_to(&self.config.reporting.report_dir)?;
                TaskOutcome::Scanned(recommendations)
            }
            TaskType::AutoFix => {
                let limit = self.config.fix.severity_limit()?;
                let eligible: Vec<Recommendation> = self
                    .generate(scan, ai_response)
                    .into_iter()
                    .filter(|r| r.severity.within_limit(limit))
                    .collect();
                info!("{} recommendation(s) within auto-fix limit '{}'", eligible.len(), limit);

                // Unattended runs never carry high-risk approval
                let executor = self.executor.clone().with_gate(SafetyGate::new(HighRiskApproval::Withheld));
                let report = executor.fix_all(eligible).await;
                if self.config.reporting.write_fix_reports {
                    write_batch_report(&report, &self.config.reporting.report_dir)?;
                }
                TaskOutcome::Fixed(report)
            }
            TaskType::BackupCleanup => {
                let removed = self.executor.backups().cleanup(self.config.fix.backup_retention)?;
                TaskOutcome::CleanedUp(removed)
            }
        };

        task.mark_run(Utc::now());
        Ok(outcome)
    }
}
