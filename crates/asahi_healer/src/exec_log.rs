//! Execution log - append-only audit trail of every command the healer runs.
//!
//! Entries are kept in memory for the current run and, when a path is
//! configured, appended to a JSONL file (one entry per line).
//!
//! Example line:
//! {"timestamp":"2026-10-16T09:12:03Z","operation":"fix","command":"free -h","exit_code":0,"duration_secs":0.01,"dry_run":false}

use asahi_common::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEntry {
    pub timestamp: DateTime<Utc>,
    /// What the command was run for: fix, verify, preflight, backup
    pub operation: String,
    pub command: String,
    pub exit_code: i32,
    pub duration_secs: f64,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub timed_out: bool,
}

/// Execution log shared by every runner in a process
#[derive(Debug, Default)]
pub struct ExecutionLog {
    entries: Mutex<Vec<ExecutionEntry>>,
    path: Option<PathBuf>,
}

impl ExecutionLog {
    /// In-memory only
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// In-memory plus JSONL file at `path`
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            path: Some(path.into()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record an entry. File write failures are logged, never returned.
    pub fn record(&self, entry: ExecutionEntry) {
        if let Some(path) = &self.path {
            if let Err(e) = append_line(path, &entry) {
                warn!("Failed to write execution log {}: {}", path.display(), e);
            }
        }
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }

    /// Entries recorded during this run
    pub fn entries(&self) -> Vec<ExecutionEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Export this run's entries as a pretty JSON array
    pub fn export(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&self.entries())?)?;
        Ok(())
    }

    /// Read persisted entries, oldest first. Unparseable lines are skipped.
    pub fn load(path: &Path) -> Result<Vec<ExecutionEntry>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("Skipping bad execution log line: {}", e),
            }
        }
        Ok(entries)
    }

    /// Last `n` persisted entries
    pub fn tail(path: &Path, n: usize) -> Result<Vec<ExecutionEntry>> {
        let mut entries = Self::load(path)?;
        let skip = entries.len().saturating_sub(n);
        Ok(entries.split_off(skip))
    }
}

fn append_line(path: &Path, entry: &ExecutionEntry) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", serde_json::to_string(entry)?)?;
    Ok(())
}
