//! Command runner - executes one shell command with a timeout.
//!
//! Runs `sh -c <command>` with the parent's environment and returns a
//! structured outcome. It never fails: spawn errors and timeouts become
//! synthetic outcomes with exit code -1. Every invocation lands in the
//! execution log.

use crate::exec_log::{ExecutionEntry, ExecutionLog};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Maximum output length to capture per stream
const MAX_OUTPUT_BYTES: usize = 64 * 1024; // 64KB

/// Default timeout for commands
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Prefix of the synthetic stdout returned in dry-run mode
pub const DRY_RUN_PREFIX: &str = "DRY RUN: would execute:";

/// Result of one command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub timed_out: bool,
    pub dry_run: bool,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Clone)]
pub struct CommandRunner {
    dry_run: bool,
    timeout: Duration,
    log: Arc<ExecutionLog>,
}

impl CommandRunner {
    pub fn new(dry_run: bool, timeout: Duration, log: Arc<ExecutionLog>) -> Self {
        Self { dry_run, timeout, log }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn log(&self) -> &Arc<ExecutionLog> {
        &self.log
    }

    /// Run `command`, tagging the log entry with `operation`
    pub async fn run(&self, command: &str, operation: &str) -> CommandOutcome {
        let start = Instant::now();

        let outcome = if self.dry_run {
            info!("[DRY RUN] Would execute: {}", command);
            CommandOutcome {
                command: command.to_string(),
                exit_code: 0,
                stdout: format!("{} {}", DRY_RUN_PREFIX, command),
                stderr: String::new(),
                duration: start.elapsed(),
                timed_out: false,
                dry_run: true,
            }
        } else {
            debug!("Executing: {}", command);
            self.execute(command, start).await
        };

        self.log.record(ExecutionEntry {
            timestamp: Utc::now(),
            operation: operation.to_string(),
            command: command.to_string(),
            exit_code: outcome.exit_code,
            duration_secs: outcome.duration.as_secs_f64(),
            dry_run: outcome.dry_run,
            timed_out: outcome.timed_out,
        });

        outcome
    }

    async fn execute(&self, command: &str, start: Instant) -> CommandOutcome {
        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(c) => c,
            Err(e) => {
                warn!("Failed to spawn '{}': {}", command, e);
                return self.synthetic(command, format!("OS error: {}", e), start, false);
            }
        };

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => CommandOutcome {
                command: command.to_string(),
                exit_code: output.status.code().unwrap_or(-1),
                stdout: truncate_output(&output.stdout),
                stderr: truncate_output(&output.stderr),
                duration: start.elapsed(),
                timed_out: false,
                dry_run: false,
            },
            Ok(Err(e)) => self.synthetic(command, format!("OS error: {}", e), start, false),
            Err(_) => {
                warn!("Command timed out after {}s: {}", self.timeout.as_secs(), command);
                self.synthetic(
                    command,
                    format!("Command timed out after {} seconds", self.timeout.as_secs()),
                    start,
                    true,
                )
            }
        }
    }

    fn synthetic(&self, command: &str, stderr: String, start: Instant, timed_out: bool) -> CommandOutcome {
        CommandOutcome {
            command: command.to_string(),
            exit_code: -1,
            stdout: String::new(),
            stderr,
            duration: start.elapsed(),
            timed_out,
            dry_run: false,
        }
    }
}

fn truncate_output(bytes: &[u8]) -> String {
    let slice = if bytes.len() > MAX_OUTPUT_BYTES {
        &bytes[..MAX_OUTPUT_BYTES]
    } else {
        bytes
    };
    String::from_utf8_lossy(slice).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner(dry_run: bool, timeout_secs: u64) -> CommandRunner {
        CommandRunner::new(
            dry_run,
            Duration::from_secs(timeout_secs),
            Arc::new(ExecutionLog::in_memory()),
        )
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let r = runner(true, 5);
        let dir = tempfile::TempDir::new().unwrap();
        let marker = dir.path().join("marker");
        let cmd = format!("touch {}", marker.display());

        let out = r.run(&cmd, "fix").await;
        assert_eq!(out.exit_code, 0);
        assert!(out.stdout.starts_with("DRY RUN"));
        assert!(out.dry_run);
        assert!(!marker.exists());

        let entries = r.log().entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].dry_run);
    }

    #[tokio::test]
    async fn test_captures_streams_and_exit_code() {
        let out = runner(false, 5).run("echo out; echo err >&2; exit 3", "fix").await;
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
        assert!(!out.success());
    }

    #[tokio::test]
    async fn test_timeout_is_synthetic_failure() {
        let out = runner(false, 1).run("sleep 5", "fix").await;
        assert_eq!(out.exit_code, -1);
        assert!(out.timed_out);
        assert!(out.stderr.contains("timed out"));
    }

    #[test]
    fn test_truncate_output() {
        let big = vec![b'a'; MAX_OUTPUT_BYTES + 10];
        assert_eq!(truncate_output(&big).len(), MAX_OUTPUT_BYTES);
        assert_eq!(truncate_output(b"short"), "short");
    }
}
