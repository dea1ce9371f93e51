//! Fix executor scenarios against a stubbed host.
//!
//! Commands here run for real through `sh -c` unless the runner is in
//! dry-run mode, so they stick to shell builtins.

use asahi_common::config::PreflightConfig;
use asahi_common::{Category, FixStatus, Recommendation, Severity};
use asahi_healer::backup::{BackupManager, MANIFEST_FILE};
use asahi_healer::runner::{CommandRunner, DRY_RUN_PREFIX};
use asahi_healer::{ExecutionLog, FixExecutor, HighRiskApproval, Preflight, SafetyGate, StubProbe};
use std::fs;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Harness {
    executor: FixExecutor,
    log: Arc<ExecutionLog>,
    _backups: TempDir,
}

fn harness(dry_run: bool, approval: HighRiskApproval, probe: StubProbe) -> Harness {
    let backups = TempDir::new().unwrap();
    let log = Arc::new(ExecutionLog::in_memory());
    let runner = CommandRunner::new(dry_run, Duration::from_secs(10), Arc::clone(&log));
    let manager = BackupManager::new(backups.path(), runner.clone())
        .with_targets(Vec::new())
        .without_host_snapshot();
    let preflight = Preflight::new(Arc::new(probe), PreflightConfig::default());
    let executor = FixExecutor::new(runner, SafetyGate::new(approval), manager, preflight);

    Harness {
        executor,
        log,
        _backups: backups,
    }
}

fn default_harness() -> Harness {
    harness(false, HighRiskApproval::Withheld, StubProbe::default())
}

fn rec(id: &str, severity: Severity, commands: &[&str]) -> Recommendation {
    let mut r = Recommendation::new(id, format!("Fix {}", id), severity, Category::System);
    r.fix_commands = commands.iter().map(|c| c.to_string()).collect();
    r
}

#[tokio::test]
async fn test_informational_recommendation_succeeds_without_commands() {
    let h = default_harness();
    let result = h.executor.apply_fix(&rec("info", Severity::Info, &[])).await;

    assert_eq!(result.status, FixStatus::Success);
    assert!(result.commands_executed.is_empty());
    assert!(result.errors.is_empty());
    assert!(h.log.entries().is_empty());
}

#[tokio::test]
async fn test_destructive_command_never_runs_and_batch_continues() {
    let h = default_harness();
    let batch = h
        .executor
        .fix_all(vec![
            rec("format_disk", Severity::Critical, &["mkfs.ext4 /dev/sda1"]),
            rec("echo", Severity::Low, &["echo ok"]),
        ])
        .await;

    assert_eq!(batch.total_fixes, 2);
    assert!(batch.is_consistent());

    let first = &batch.execution_results[0];
    assert_eq!(first.recommendation_id, "format_disk");
    assert_ne!(first.status, FixStatus::Success);
    assert!(first.commands_executed.is_empty());
    assert!(first
        .errors
        .contains(&"Command deemed unsafe and skipped: mkfs.ext4 /dev/sda1".to_string()));

    let second = &batch.execution_results[1];
    assert_eq!(second.status, FixStatus::Success);
    assert_eq!(second.outputs[0].stdout.trim(), "ok");

    assert!(h.log.entries().iter().all(|e| !e.command.contains("mkfs")));
}

#[tokio::test]
async fn test_batch_runs_critical_first() {
    let h = default_harness();
    let batch = h
        .executor
        .fix_all(vec![
            rec("low", Severity::Low, &["true"]),
            rec("critical", Severity::Critical, &["true"]),
            rec("medium", Severity::Medium, &["true"]),
        ])
        .await;

    let order: Vec<&str> = batch
        .execution_results
        .iter()
        .map(|r| r.recommendation_id.as_str())
        .collect();
    assert_eq!(order, vec!["critical", "medium", "low"]);
    assert_eq!(batch.successful_fixes, 3);
}

#[tokio::test]
async fn test_dry_run_executes_nothing() {
    let h = harness(true, HighRiskApproval::Withheld, StubProbe::default());
    let mut r = rec("dry", Severity::Medium, &["echo hi"]);
    r.backup_recommended = true;

    let batch = h.executor.fix_all(vec![r]).await;
    assert!(batch.dry_run);
    assert!(batch.backup_location.is_none());

    let result = &batch.execution_results[0];
    assert_eq!(result.status, FixStatus::Success);
    assert!(!result.backup_created);
    assert!(result.outputs[0].stdout.starts_with(DRY_RUN_PREFIX));
    assert!(h.log.entries().iter().all(|e| e.dry_run));
}

#[tokio::test]
async fn test_halting_failure_still_verifies() {
    let h = default_harness();
    let mut r = rec("halt", Severity::High, &["exit 3", "echo never"]);
    r.verification_commands = vec!["echo verified".to_string()];

    let result = h.executor.apply_fix(&r).await;

    assert_eq!(result.status, FixStatus::Failed);
    assert_eq!(result.commands_executed, vec!["exit 3"]);
    assert_eq!(
        result.errors,
        vec!["Command failed: exit 3".to_string(), "Error: Unknown error".to_string()]
    );
    assert_eq!(result.verification_results.len(), 1);
    assert!(result.verification_results[0].successful);
    assert_eq!(result.verification_results[0].output.trim(), "verified");
}

#[tokio::test]
async fn test_halting_failure_reports_stderr() {
    let h = default_harness();
    let result = h
        .executor
        .apply_fix(&rec("stderr", Severity::High, &["echo broken >&2; exit 4"]))
        .await;

    assert_eq!(result.status, FixStatus::Failed);
    assert_eq!(result.errors[1], "Error: broken");
}

#[tokio::test]
async fn test_exit_code_one_does_not_halt() {
    let h = default_harness();
    let result = h
        .executor
        .apply_fix(&rec("grep", Severity::Low, &["false", "echo after"]))
        .await;

    assert_eq!(result.status, FixStatus::Success);
    assert_eq!(result.commands_executed.len(), 2);
    assert_eq!(result.outputs[0].returncode, 1);
}

#[tokio::test]
async fn test_verification_failure_does_not_change_status() {
    let h = default_harness();
    let mut r = rec("verify", Severity::Low, &["true"]);
    r.verification_commands = vec!["exit 2".to_string()];

    let result = h.executor.apply_fix(&r).await;
    assert_eq!(result.status, FixStatus::Success);
    assert!(!result.verification_passed());
}

#[tokio::test]
async fn test_busy_package_manager_skips_fix() {
    let probe = StubProbe {
        processes: ["pacman".to_string()].into_iter().collect(),
        ..StubProbe::default()
    };
    let h = harness(false, HighRiskApproval::Withheld, probe);

    let result = h
        .executor
        .apply_fix(&rec("cache", Severity::Low, &["pacman -Sc --noconfirm"]))
        .await;

    assert_eq!(result.status, FixStatus::Skipped);
    assert!(result.commands_executed.is_empty());
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("Pre-flight check failed: package manager busy"));
    assert!(h.log.entries().is_empty());
}

#[tokio::test]
async fn test_missing_sudo_skips_only_elevated_fixes() {
    let probe = StubProbe {
        sudo: false,
        ..StubProbe::default()
    };
    let h = harness(true, HighRiskApproval::Withheld, probe);

    let batch = h
        .executor
        .fix_all(vec![
            rec("elevated", Severity::High, &["sudo journalctl --vacuum-time=7d"]),
            rec("plain", Severity::Low, &["df -h"]),
        ])
        .await;

    assert_eq!(batch.execution_results[0].status, FixStatus::Skipped);
    assert_eq!(batch.execution_results[1].status, FixStatus::Success);
    assert_eq!(batch.skipped_fixes, 1);
    assert_eq!(batch.successful_fixes, 1);
}

#[tokio::test]
async fn test_stop_flag_skips_remaining_fixes() {
    let h = default_harness();
    h.executor.stop_flag().store(true, Ordering::SeqCst);

    let batch = h
        .executor
        .fix_all(vec![rec("a", Severity::High, &["true"]), rec("b", Severity::Low, &["true"])])
        .await;

    assert_eq!(batch.skipped_fixes, 2);
    assert!(batch
        .execution_results
        .iter()
        .all(|r| r.status == FixStatus::Skipped && r.errors == vec!["batch interrupted".to_string()]));
    assert!(h.log.entries().is_empty());
}

#[tokio::test]
async fn test_high_risk_needs_approval() {
    let mut r = rec("risky", Severity::High, &["echo risky"]);
    r.risk_level = "high".to_string();

    let withheld = default_harness().executor.apply_fix(&r).await;
    assert_eq!(withheld.status, FixStatus::PartialSuccess);
    assert!(withheld.commands_executed.is_empty());
    assert_eq!(
        withheld.errors,
        vec!["Command deemed unsafe and skipped: echo risky".to_string()]
    );

    let granted = harness(false, HighRiskApproval::Granted, StubProbe::default())
        .executor
        .apply_fix(&r)
        .await;
    assert_eq!(granted.status, FixStatus::Success);
    assert_eq!(granted.commands_executed, vec!["echo risky"]);
}

#[tokio::test]
async fn test_fix_selected_ignores_unknown_ids() {
    let h = default_harness();
    let batch = h
        .executor
        .fix_selected(
            vec![rec("a", Severity::Low, &["true"]), rec("b", Severity::Low, &["true"])],
            &["b".to_string(), "missing".to_string()],
        )
        .await;

    assert_eq!(batch.total_fixes, 1);
    assert_eq!(batch.execution_results[0].recommendation_id, "b");
}

#[tokio::test]
async fn test_backup_taken_before_commands() {
    let backups = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    let target = data.path().join("settings.conf");
    fs::write(&target, "before").unwrap();

    let log = Arc::new(ExecutionLog::in_memory());
    let runner = CommandRunner::new(false, Duration::from_secs(10), Arc::clone(&log));
    let manager = BackupManager::new(backups.path(), runner.clone())
        .with_targets(vec![target.to_string_lossy().to_string()])
        .without_host_snapshot();
    let preflight = Preflight::new(Arc::new(StubProbe::default()), PreflightConfig::default());
    let executor = FixExecutor::new(runner, SafetyGate::default(), manager, preflight);

    let mut r = rec("rewrite", Severity::Medium, &[]);
    r.fix_commands = vec![format!("echo after > '{}'", target.display())];
    r.backup_recommended = true;

    let result = executor.apply_fix(&r).await;
    assert_eq!(result.status, FixStatus::Success);
    assert!(result.backup_created);

    let backup_dir = result.backup_path.unwrap();
    assert!(backup_dir.join(MANIFEST_FILE).exists());
    assert!(backup_dir.starts_with(backups.path()));
    assert_eq!(fs::read_to_string(&target).unwrap().trim(), "after");
}
