//! Backup manager - best-effort copies of configuration paths taken before a
//! fix mutates the system, plus restore and retention cleanup.
//!
//! Layout of one backup:
//!
//! ```text
//! <root>/<recommendation_id>_<YYYYmmdd_HHMMSS>/
//!     manifest.json
//!     etc/fstab
//!     etc/systemd/system/...
//! ```
//!
//! Copied paths are stored relative to `/` inside the backup directory.

use crate::runner::CommandRunner;
use asahi_common::fix::{RestoreResult, RestoreStatus};
use asahi_common::recommendation::id_timestamp;
use asahi_common::{HealerError, Recommendation, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use sysinfo::System;
use tracing::{error, info, warn};
use walkdir::WalkDir;

pub const MANIFEST_FILE: &str = "manifest.json";

/// Paths captured before every fix. `*` matches within one path component.
pub const DEFAULT_TARGETS: &[&str] = &[
    "/etc/systemd/system",
    "/etc/pacman.conf",
    "/etc/fstab",
    "/etc/hosts",
    "/home/*/.config",
];

/// Host state recorded alongside copied files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub timestamp: DateTime<Utc>,
    pub kernel: String,
    pub hostname: String,
    #[serde(default)]
    pub installed_packages: BTreeMap<String, String>,
    #[serde(default)]
    pub running_services: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupManifest {
    pub recommendation: Recommendation,
    pub backup_time: DateTime<Utc>,
    pub system_info: SystemSnapshot,
    pub files_backed_up: Vec<String>,
}

/// The part of a manifest restore depends on
#[derive(Debug, Deserialize)]
struct RestoreManifest {
    #[serde(default)]
    files_backed_up: Vec<String>,
}

/// A backup directory found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub path: PathBuf,
    pub modified: SystemTime,
}

#[derive(Debug, Clone)]
pub struct BackupManager {
    root: PathBuf,
    targets: Vec<String>,
    runner: CommandRunner,
    snapshot_host: bool,
}

impl BackupManager {
    pub fn new(root: impl Into<PathBuf>, runner: CommandRunner) -> Self {
        Self {
            root: root.into(),
            targets: DEFAULT_TARGETS.iter().map(|t| t.to_string()).collect(),
            runner,
            snapshot_host: true,
        }
    }

    /// Replace the captured path list
    pub fn with_targets(mut self, targets: Vec<String>) -> Self {
        self.targets = targets;
        self
    }

    /// Skip package and service listing in the manifest
    pub fn without_host_snapshot(mut self) -> Self {
        self.snapshot_host = false;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Back up the target paths for `recommendation`.
    ///
    /// Returns None in dry-run mode or when the backup directory itself
    /// cannot be written. Individual paths that fail to copy are logged and
    /// left out of the manifest.
    pub async fn create_backup(&self, recommendation: &Recommendation) -> Option<PathBuf> {
        if self.runner.dry_run() {
            return None;
        }

        match self.try_create(recommendation).await {
            Ok(path) => {
                info!("Backup created at {}", path.display());
                Some(path)
            }
            Err(e) => {
                error!("Failed to create backup for {}: {}", recommendation.id, e);
                None
            }
        }
    }

    async fn try_create(&self, recommendation: &Recommendation) -> Result<PathBuf> {
        let name = format!("{}_{}", recommendation.id.replace('/', "_"), id_timestamp());
        let backup_path = self.root.join(name);
        fs::create_dir_all(&backup_path)?;

        let system_info = self.system_snapshot().await;
        let mut files_backed_up = Vec::new();

        for target in &self.targets {
            for source in expand_target(target) {
                match copy_into_backup(&source, &backup_path) {
                    Ok(()) => files_backed_up.push(source.to_string_lossy().to_string()),
                    Err(e) => warn!("Failed to backup {}: {}", source.display(), e),
                }
            }
        }

        let manifest = BackupManifest {
            recommendation: recommendation.clone(),
            backup_time: Utc::now(),
            system_info,
            files_backed_up,
        };
        fs::write(
            backup_path.join(MANIFEST_FILE),
            serde_json::to_string_pretty(&manifest)?,
        )?;

        Ok(backup_path)
    }

    async fn system_snapshot(&self) -> SystemSnapshot {
        let mut snapshot = SystemSnapshot {
            timestamp: Utc::now(),
            kernel: System::kernel_version().unwrap_or_else(|| "unknown".to_string()),
            hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
            ..Default::default()
        };

        if !self.snapshot_host {
            return snapshot;
        }

        let packages = self.runner.run("pacman -Q", "backup").await;
        if packages.success() {
            snapshot.installed_packages = packages
                .stdout
                .lines()
                .filter_map(|line| line.split_once(' '))
                .map(|(name, version)| (name.to_string(), version.to_string()))
                .collect();
        }

        let services = self
            .runner
            .run(
                "systemctl list-units --type=service --state=running --no-legend",
                "backup",
            )
            .await;
        if services.success() {
            snapshot.running_services = services
                .stdout
                .lines()
                .filter_map(|line| line.split_whitespace().next())
                .map(str::to_string)
                .collect();
        }

        snapshot
    }

    /// Copy every recorded path back over the live one. Never fails: all
    /// problems end up in the result.
    pub fn restore_backup(&self, backup_path: &Path) -> RestoreResult {
        if !backup_path.exists() {
            return RestoreResult::failed(format!(
                "Backup directory not found: {}",
                backup_path.display()
            ));
        }

        let manifest_path = backup_path.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return RestoreResult::failed("Backup manifest not found");
        }

        let manifest: RestoreManifest = match fs::read_to_string(&manifest_path)
            .map_err(HealerError::from)
            .and_then(|text| serde_json::from_str(&text).map_err(HealerError::from))
        {
            Ok(m) => m,
            Err(e) => return RestoreResult::failed(format!("Restore failed: {}", e)),
        };

        let mut result = RestoreResult {
            status: RestoreStatus::Failed,
            files_restored: Vec::new(),
            errors: Vec::new(),
            timestamp: Utc::now(),
        };

        for original in &manifest.files_backed_up {
            let original_path = Path::new(original);
            let saved = backup_path.join(relative_to_root(original_path));
            if !saved.exists() {
                continue;
            }
            match restore_path(&saved, original_path) {
                Ok(()) => result.files_restored.push(original.clone()),
                Err(e) => result.errors.push(format!("Failed to restore {}: {}", original, e)),
            }
        }

        result.status = if result.errors.is_empty() {
            RestoreStatus::Success
        } else {
            RestoreStatus::PartialSuccess
        };
        info!(
            "Restored {} path(s) from {} ({} error(s))",
            result.files_restored.len(),
            backup_path.display(),
            result.errors.len()
        );
        result
    }

    /// Backup directories under the root, newest first
    pub fn list_backups(&self) -> Result<Vec<BackupEntry>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if meta.is_dir() {
                backups.push(BackupEntry {
                    path: entry.path(),
                    modified: meta.modified()?,
                });
            }
        }
        backups.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(backups)
    }

    /// Delete all but the `keep` most recent backups. Returns removed paths.
    pub fn cleanup(&self, keep: usize) -> Result<Vec<PathBuf>> {
        let mut removed = Vec::new();
        for old in self.list_backups()?.into_iter().skip(keep) {
            match fs::remove_dir_all(&old.path) {
                Ok(()) => {
                    info!("Cleaned up old backup: {}", old.path.display());
                    removed.push(old.path);
                }
                Err(e) => error!("Failed to remove backup {}: {}", old.path.display(), e),
            }
        }
        Ok(removed)
    }
}

/// Expand `*` components of a target against the live filesystem
pub fn expand_target(target: &str) -> Vec<PathBuf> {
    if !target.contains('*') {
        let path = PathBuf::from(target);
        return if path.exists() { vec![path] } else { Vec::new() };
    }

    let mut candidates = vec![PathBuf::new()];
    for component in Path::new(target).components() {
        let part = component.as_os_str().to_string_lossy();
        if !part.contains('*') {
            candidates = candidates.into_iter().map(|c| c.join(component)).collect();
            continue;
        }

        let pattern = match wildcard_regex(&part) {
            Some(re) => re,
            None => return Vec::new(),
        };
        let mut next = Vec::new();
        for dir in &candidates {
            let entries = match fs::read_dir(dir) {
                Ok(e) => e,
                Err(_) => continue,
            };
            for entry in entries.flatten() {
                if pattern.is_match(&entry.file_name().to_string_lossy()) {
                    next.push(entry.path());
                }
            }
        }
        next.sort();
        candidates = next;
    }

    candidates.into_iter().filter(|p| p.exists()).collect()
}

fn wildcard_regex(part: &str) -> Option<Regex> {
    let body = part
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{}$", body)).ok()
}

fn relative_to_root(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect()
}

fn copy_into_backup(source: &Path, backup_dir: &Path) -> Result<()> {
    let target = backup_dir.join(relative_to_root(source));
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    if source.is_dir() {
        copy_tree(source, &target)
    } else {
        fs::copy(source, &target)?;
        Ok(())
    }
}

fn restore_path(saved: &Path, original: &Path) -> Result<()> {
    if let Some(parent) = original.parent() {
        fs::create_dir_all(parent)?;
    }
    if saved.is_dir() {
        if original.exists() {
            fs::remove_dir_all(original)?;
        }
        copy_tree(saved, original)
    } else {
        fs::copy(saved, original)?;
        Ok(())
    }
}

fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry.map_err(|e| HealerError::Backup(e.to_string()))?;
        let rel = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| HealerError::Backup(e.to_string()))?;
        let dest = to.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&dest)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, dest: &Path) -> Result<()> {
    let target = fs::read_link(link)?;
    if dest.symlink_metadata().is_ok() {
        fs::remove_file(dest)?;
    }
    std::os::unix::fs::symlink(target, dest)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, dest: &Path) -> Result<()> {
    fs::copy(link, dest)?;
    Ok(())
}
