//! Fix executor - applies recommendations one at a time.
//!
//! Per recommendation:
//!
//! ```text
//! pending -> pre-flight failed ----------------------------> skipped
//! pending -> pre-flight ok -> backup? -> commands -> verify -> success | partial_success
//!                                           \-> halting failure -> verify -> failed
//! panic anywhere ------------------------------------------> error
//! ```
//!
//! Recommendations in a batch run strictly in sequence, critical first.
//! Each one runs in its own task so a panic becomes an `error` result
//! instead of taking the batch down.

use crate::backup::BackupManager;
use crate::preflight::Preflight;
use crate::runner::{CommandOutcome, CommandRunner};
use crate::safety::SafetyGate;
use asahi_common::fix::{BatchReport, CommandRecord, FixResult, FixStatus, VerificationResult};
use asahi_common::Recommendation;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// (command substring, stderr substring) pairs that are not real failures
pub const ACCEPTABLE_FAILURES: &[(&str, &str)] = &[
    ("systemctl reset-failed", "no failed units"),
    ("pacman -sc", "nothing to do"),
    ("systemctl restart", "unit not found"),
];

/// Exit codes tolerated for any command: general error, interrupted
pub const ACCEPTABLE_EXIT_CODES: &[i32] = &[1, 130];

/// True when a non-zero exit should not halt the fix
pub fn is_acceptable_failure(outcome: &CommandOutcome) -> bool {
    if outcome.timed_out {
        return false;
    }
    let command = outcome.command.to_lowercase();
    let stderr = outcome.stderr.to_lowercase();

    ACCEPTABLE_FAILURES
        .iter()
        .any(|(cmd, err)| command.contains(cmd) && stderr.contains(err))
        || ACCEPTABLE_EXIT_CODES.contains(&outcome.exit_code)
}

#[derive(Clone)]
pub struct FixExecutor {
    runner: CommandRunner,
    gate: SafetyGate,
    backups: Arc<BackupManager>,
    preflight: Preflight,
    create_backups: bool,
    stop: Arc<AtomicBool>,
}

impl FixExecutor {
    pub fn new(runner: CommandRunner, gate: SafetyGate, backups: BackupManager, preflight: Preflight) -> Self {
        Self {
            runner,
            gate,
            backups: Arc::new(backups),
            preflight,
            create_backups: true,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Disable backups even for recommendations that ask for one
    pub fn with_backups(mut self, enabled: bool) -> Self {
        self.create_backups = enabled;
        self
    }

    pub fn with_gate(mut self, gate: SafetyGate) -> Self {
        self.gate = gate;
        self
    }

    /// Share a stop flag with a signal handler
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn dry_run(&self) -> bool {
        self.runner.dry_run()
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    /// Apply every recommendation, critical first.
    ///
    /// A recommendation's failure never aborts the batch. When the stop flag
    /// is raised, recommendations not yet started are recorded as skipped.
    pub async fn fix_all(&self, mut recommendations: Vec<Recommendation>) -> BatchReport {
        recommendations.sort_by_key(|r| r.severity.rank());

        let backup_location = if self.dry_run() {
            None
        } else {
            Some(self.backups.root().to_path_buf())
        };
        let mut report = BatchReport::new(recommendations.len(), backup_location, self.dry_run());

        for rec in recommendations {
            if self.stop.load(Ordering::SeqCst) {
                warn!("Batch interrupted, skipping {}", rec.id);
                report.record(FixResult::skipped(&rec.id, &rec.title, "batch interrupted"));
                continue;
            }

            let executor = self.clone();
            let id = rec.id.clone();
            let title = rec.title.clone();
            let handle = tokio::spawn(async move { executor.apply_fix(&rec).await });

            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!("Fix execution error for {}: {}", title, e);
                    FixResult::error(&id, &title, format!("Unexpected error: {}", e))
                }
            };
            report.record(result);
        }

        info!(
            "Batch finished: {} successful, {} failed, {} skipped",
            report.successful_fixes, report.failed_fixes, report.skipped_fixes
        );
        report
    }

    /// Apply only the recommendations whose id is in `ids`
    pub async fn fix_selected(&self, recommendations: Vec<Recommendation>, ids: &[String]) -> BatchReport {
        for id in ids {
            if !recommendations.iter().any(|r| &r.id == id) {
                warn!("No recommendation with id {}", id);
            }
        }
        let selected = recommendations
            .into_iter()
            .filter(|r| ids.contains(&r.id))
            .collect();
        self.fix_all(selected).await
    }

    /// Apply a single recommendation
    pub async fn apply_fix(&self, rec: &Recommendation) -> FixResult {
        let start = Instant::now();
        let mut result = FixResult::pending(&rec.id, &rec.title);
        info!("Applying fix: {}", rec.title);

        self.run_stages(rec, &mut result).await;

        result.execution_time = start.elapsed().as_secs_f64();
        info!("Fix {} finished: {}", rec.id, result.status.as_str());
        result
    }

    async fn run_stages(&self, rec: &Recommendation, result: &mut FixResult) {
        if let Err(failure) = self.preflight.check(rec).await {
            warn!("Pre-flight check failed for {}: {}", rec.id, failure);
            result.status = FixStatus::Skipped;
            result.errors.push(format!("Pre-flight check failed: {}", failure));
            return;
        }

        if rec.backup_recommended && self.create_backups && !self.dry_run() {
            if let Some(path) = self.backups.create_backup(rec).await {
                result.backup_created = true;
                result.backup_path = Some(path);
            }
        }

        let halted = self.run_commands(rec, result).await;
        self.run_verification(rec, result).await;

        result.status = if halted {
            FixStatus::Failed
        } else if result.errors.is_empty() {
            FixStatus::Success
        } else {
            FixStatus::PartialSuccess
        };
    }

    /// Returns true if a command failure halted the sequence
    async fn run_commands(&self, rec: &Recommendation, result: &mut FixResult) -> bool {
        for (i, command) in rec.fix_commands.iter().enumerate() {
            let command = command.trim();
            if command.is_empty() {
                continue;
            }

            if !self.gate.is_safe(command, rec) {
                result
                    .errors
                    .push(format!("Command deemed unsafe and skipped: {}", command));
                continue;
            }

            let outcome = self.runner.run(command, &format!("fix_step_{}", i + 1)).await;
            result.commands_executed.push(command.to_string());
            result.outputs.push(CommandRecord {
                command: command.to_string(),
                returncode: outcome.exit_code,
                stdout: outcome.stdout.clone(),
                stderr: outcome.stderr.clone(),
                duration: outcome.duration.as_secs_f64(),
            });

            if !outcome.success() && !is_acceptable_failure(&outcome) {
                error!("Command failed ({}): {}", outcome.exit_code, command);
                result.errors.push(format!("Command failed: {}", command));
                let stderr = if outcome.stderr.trim().is_empty() {
                    "Unknown error"
                } else {
                    outcome.stderr.trim()
                };
                result.errors.push(format!("Error: {}", stderr));
                return true;
            }
        }
        false
    }

    async fn run_verification(&self, rec: &Recommendation, result: &mut FixResult) {
        for command in &rec.verification_commands {
            let command = command.trim();
            if command.is_empty() {
                continue;
            }
            let outcome = self.runner.run(command, "verification").await;
            result.verification_results.push(VerificationResult {
                command: command.to_string(),
                returncode: outcome.exit_code,
                output: outcome.stdout,
                successful: outcome.exit_code == 0,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn outcome(command: &str, exit_code: i32, stderr: &str) -> CommandOutcome {
        CommandOutcome {
            command: command.to_string(),
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
            duration: Duration::from_millis(5),
            timed_out: false,
            dry_run: false,
        }
    }

    #[test]
    fn test_acceptable_failure_table() {
        assert!(is_acceptable_failure(&outcome(
            "sudo systemctl reset-failed",
            4,
            "No failed units"
        )));
        assert!(is_acceptable_failure(&outcome("sudo pacman -Sc", 2, "nothing to do")));
        assert!(!is_acceptable_failure(&outcome("sudo pacman -Sc", 2, "permission denied")));
    }

    #[test]
    fn test_acceptable_exit_codes() {
        assert!(is_acceptable_failure(&outcome("grep foo bar", 1, "")));
        assert!(is_acceptable_failure(&outcome("anything", 130, "")));
        assert!(!is_acceptable_failure(&outcome("anything", 2, "")));
    }

    #[test]
    fn test_timeout_always_halts() {
        let mut o = outcome("sleep 999", -1, "Command timed out after 300 seconds");
        o.timed_out = true;
        assert!(!is_acceptable_failure(&o));
    }
}
