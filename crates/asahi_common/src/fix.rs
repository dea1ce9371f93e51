//! Fix execution records: per-recommendation results, batch summaries
//! and restore results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Terminal (and initial) states of a single fix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixStatus {
    Pending,
    Success,
    PartialSuccess,
    Failed,
    Skipped,
    Error,
}

impl FixStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixStatus::Pending => "pending",
            FixStatus::Success => "success",
            FixStatus::PartialSuccess => "partial_success",
            FixStatus::Failed => "failed",
            FixStatus::Skipped => "skipped",
            FixStatus::Error => "error",
        }
    }
}

/// One executed fix command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub command: String,
    pub returncode: i32,
    pub stdout: String,
    pub stderr: String,
    /// Seconds
    pub duration: f64,
}

/// One executed verification command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub command: String,
    pub returncode: i32,
    pub output: String,
    pub successful: bool,
}

/// Execution record for a single recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixResult {
    pub recommendation_id: String,
    pub title: String,
    pub status: FixStatus,
    pub commands_executed: Vec<String>,
    pub outputs: Vec<CommandRecord>,
    pub backup_created: bool,
    pub backup_path: Option<PathBuf>,
    pub verification_results: Vec<VerificationResult>,
    pub errors: Vec<String>,
    /// Seconds
    pub execution_time: f64,
    pub timestamp: DateTime<Utc>,
}

impl FixResult {
    pub fn pending(recommendation_id: &str, title: &str) -> Self {
        Self {
            recommendation_id: recommendation_id.to_string(),
            title: title.to_string(),
            status: FixStatus::Pending,
            commands_executed: Vec::new(),
            outputs: Vec::new(),
            backup_created: false,
            backup_path: None,
            verification_results: Vec::new(),
            errors: Vec::new(),
            execution_time: 0.0,
            timestamp: Utc::now(),
        }
    }

    /// Result for a fix that ended outside the normal state machine
    pub fn error(recommendation_id: &str, title: &str, message: impl Into<String>) -> Self {
        let mut result = Self::pending(recommendation_id, title);
        result.status = FixStatus::Error;
        result.errors.push(message.into());
        result
    }

    pub fn skipped(recommendation_id: &str, title: &str, reason: impl Into<String>) -> Self {
        let mut result = Self::pending(recommendation_id, title);
        result.status = FixStatus::Skipped;
        result.errors.push(reason.into());
        result
    }

    pub fn verification_passed(&self) -> bool {
        self.verification_results.iter().all(|v| v.successful)
    }
}

/// Aggregate of one `fix_all` run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub total_fixes: usize,
    pub successful_fixes: usize,
    pub failed_fixes: usize,
    pub skipped_fixes: usize,
    pub execution_results: Vec<FixResult>,
    pub backup_location: Option<PathBuf>,
    pub dry_run: bool,
    pub execution_time: DateTime<Utc>,
}

impl BatchReport {
    pub fn new(total: usize, backup_location: Option<PathBuf>, dry_run: bool) -> Self {
        Self {
            total_fixes: total,
            successful_fixes: 0,
            failed_fixes: 0,
            skipped_fixes: 0,
            execution_results: Vec::with_capacity(total),
            backup_location,
            dry_run,
            execution_time: Utc::now(),
        }
    }

    /// Append a finished result and bump the matching counter.
    ///
    /// `success` counts as successful, `failed` and `error` as failed,
    /// everything else (skipped, partial_success) as skipped.
    pub fn record(&mut self, result: FixResult) {
        match result.status {
            FixStatus::Success => self.successful_fixes += 1,
            FixStatus::Failed | FixStatus::Error => self.failed_fixes += 1,
            FixStatus::Skipped | FixStatus::PartialSuccess | FixStatus::Pending => {
                self.skipped_fixes += 1
            }
        }
        self.execution_results.push(result);
    }

    /// Counts always add up to the number of recorded results
    pub fn is_consistent(&self) -> bool {
        self.successful_fixes + self.failed_fixes + self.skipped_fixes == self.execution_results.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreStatus {
    Success,
    PartialSuccess,
    Failed,
}

/// Outcome of restoring a backup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoreResult {
    pub status: RestoreStatus,
    pub files_restored: Vec<String>,
    pub errors: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl RestoreResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: RestoreStatus::Failed,
            files_restored: Vec::new(),
            errors: vec![error.into()],
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_counts_follow_status() {
        let mut batch = BatchReport::new(4, None, true);
        let mut ok = FixResult::pending("a", "A");
        ok.status = FixStatus::Success;
        let mut partial = FixResult::pending("b", "B");
        partial.status = FixStatus::PartialSuccess;
        batch.record(ok);
        batch.record(partial);
        batch.record(FixResult::skipped("c", "C", "Pre-flight check failed"));
        batch.record(FixResult::error("d", "D", "panicked"));

        assert_eq!(batch.successful_fixes, 1);
        assert_eq!(batch.skipped_fixes, 2);
        assert_eq!(batch.failed_fixes, 1);
        assert!(batch.is_consistent());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&FixStatus::PartialSuccess).unwrap();
        assert_eq!(json, "\"partial_success\"");
    }
}
