//! Scheduled maintenance task model.
//!
//! Only the data model lives here. Deciding when a task is due belongs to
//! whatever drives the healer (cron, a systemd timer); the healer runs one
//! task at a time on request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    FullScan,
    AutoFix,
    BackupCleanup,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::FullScan => "full_scan",
            TaskType::AutoFix => "auto_fix",
            TaskType::BackupCleanup => "backup_cleanup",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: String,
    pub name: String,
    /// Cron expression, stored verbatim
    pub schedule: String,
    pub task_type: TaskType,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_run: Option<DateTime<Utc>>,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

fn default_enabled() -> bool {
    true
}

impl ScheduledTask {
    pub fn new(id: impl Into<String>, name: impl Into<String>, schedule: impl Into<String>, task_type: TaskType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            schedule: schedule.into(),
            task_type,
            enabled: true,
            last_run: None,
            next_run: None,
            parameters: BTreeMap::new(),
        }
    }

    /// The stock task set: daily scan, weekly low-severity auto-fix,
    /// monthly backup cleanup. Auto-fix ships disabled.
    pub fn defaults() -> Vec<Self> {
        let mut auto_fix = Self::new("weekly_auto_fix", "Weekly Auto Fix", "0 3 * * 0", TaskType::AutoFix);
        auto_fix.enabled = false;
        vec![
            Self::new("daily_scan", "Daily Health Scan", "0 2 * * *", TaskType::FullScan),
            auto_fix,
            Self::new("monthly_cleanup", "Monthly Backup Cleanup", "0 4 1 * *", TaskType::BackupCleanup),
        ]
    }

    pub fn mark_run(&mut self, at: DateTime<Utc>) {
        self.last_run = Some(at);
    }
}
