//! Pre-flight checks run before any fix command.
//!
//! Production code uses `HostProbe`, which reads the live system through
//! sysinfo and the filesystem. Tests use `StubProbe` with fixed answers.
//!
//! Every check fails closed: a probe error counts as a failed check.

use crate::runner::CommandRunner;
use asahi_common::config::PreflightConfig;
use asahi_common::{HealerError, Recommendation, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sysinfo::{Disks, System};
use thiserror::Error;
use tracing::{debug, warn};

const MB: u64 = 1024 * 1024;

/// Package managers and the lock file each one holds while busy
pub const PACKAGE_MANAGERS: &[(&str, &str)] = &[
    ("pacman", "/var/lib/pacman/db.lck"),
    ("dnf", "/var/run/dnf.pid"),
    ("apt", "/var/lib/dpkg/lock"),
    ("yum", "/var/run/yum.pid"),
];

/// Point-in-time resource reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceSnapshot {
    pub available_memory_bytes: u64,
    pub root_free_bytes: u64,
    pub load_one: f64,
    pub cpu_count: usize,
}

/// Why pre-flight refused to run a fix
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PreflightFailure {
    #[error("insufficient memory: {available_mb}MB available, {required_mb}MB required")]
    InsufficientMemory { available_mb: u64, required_mb: u64 },

    #[error("insufficient disk space on /: {free_mb}MB free, {required_mb}MB required")]
    InsufficientDisk { free_mb: u64, required_mb: u64 },

    #[error("load average {load:.2} exceeds limit {limit:.2}")]
    LoadTooHigh { load: f64, limit: f64 },

    #[error("resource probe failed: {0}")]
    ResourceProbe(String),

    #[error("sudo access required but not available")]
    SudoUnavailable,

    #[error("package manager busy: {0}")]
    PackageManagerBusy(String),

    #[error("another systemctl operation is running")]
    ServiceManagerBusy,
}

/// Read-only view of the host used by pre-flight
#[async_trait]
pub trait SystemProbe: Send + Sync {
    async fn resources(&self) -> Result<ResourceSnapshot>;

    /// Non-interactive privilege elevation works
    async fn sudo_available(&self) -> bool;

    /// Names of running processes
    async fn process_names(&self) -> Result<HashSet<String>>;

    fn path_exists(&self, path: &Path) -> bool;
}

/// Probe backed by the live system
pub struct HostProbe {
    runner: CommandRunner,
}

impl HostProbe {
    /// `runner` is used for the sudo check; in dry-run mode that check passes
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl SystemProbe for HostProbe {
    async fn resources(&self) -> Result<ResourceSnapshot> {
        let mut system = System::new();
        system.refresh_memory();

        let disks = Disks::new_with_refreshed_list();
        let root_free_bytes = disks
            .list()
            .iter()
            .find(|d| d.mount_point() == Path::new("/"))
            .map(|d| d.available_space())
            .ok_or_else(|| HealerError::Probe("root filesystem not found".to_string()))?;

        Ok(ResourceSnapshot {
            available_memory_bytes: system.available_memory(),
            root_free_bytes,
            load_one: System::load_average().one,
            cpu_count: num_cpus::get(),
        })
    }

    async fn sudo_available(&self) -> bool {
        self.runner.run("sudo -n true", "preflight").await.success()
    }

    async fn process_names(&self) -> Result<HashSet<String>> {
        let mut system = System::new();
        system.refresh_processes();
        Ok(system
            .processes()
            .values()
            .map(|p| p.name().to_string())
            .collect())
    }

    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Probe with fixed answers
#[derive(Debug, Clone)]
pub struct StubProbe {
    pub resources: std::result::Result<ResourceSnapshot, String>,
    pub sudo: bool,
    pub processes: HashSet<String>,
    pub existing_paths: HashSet<PathBuf>,
}

impl Default for StubProbe {
    /// A quiet, well-provisioned machine
    fn default() -> Self {
        Self {
            resources: Ok(ResourceSnapshot {
                available_memory_bytes: 8 * 1024 * MB,
                root_free_bytes: 100 * 1024 * MB,
                load_one: 0.5,
                cpu_count: 8,
            }),
            sudo: true,
            processes: HashSet::new(),
            existing_paths: HashSet::new(),
        }
    }
}

#[async_trait]
impl SystemProbe for StubProbe {
    async fn resources(&self) -> Result<ResourceSnapshot> {
        self.resources.clone().map_err(HealerError::Probe)
    }

    async fn sudo_available(&self) -> bool {
        self.sudo
    }

    async fn process_names(&self) -> Result<HashSet<String>> {
        Ok(self.processes.clone())
    }

    fn path_exists(&self, path: &Path) -> bool {
        self.existing_paths.contains(path)
    }
}

/// Runs the pre-flight checks against a probe
#[derive(Clone)]
pub struct Preflight {
    probe: Arc<dyn SystemProbe>,
    thresholds: PreflightConfig,
}

impl Preflight {
    pub fn new(probe: Arc<dyn SystemProbe>, thresholds: PreflightConfig) -> Self {
        Self { probe, thresholds }
    }

    /// All checks must pass. Returns the first failure.
    pub async fn check(&self, rec: &Recommendation) -> std::result::Result<(), PreflightFailure> {
        self.check_resources().await?;

        if rec.needs_elevation() && !self.probe.sudo_available().await {
            return Err(PreflightFailure::SudoUnavailable);
        }

        self.check_conflicts(rec).await?;

        if rec.requires_reboot {
            debug!("{} requires a reboot, to be done manually", rec.id);
        }
        Ok(())
    }

    pub async fn check_resources(&self) -> std::result::Result<(), PreflightFailure> {
        let snapshot = self
            .probe
            .resources()
            .await
            .map_err(|e| PreflightFailure::ResourceProbe(e.to_string()))?;
        let t = &self.thresholds;

        if snapshot.available_memory_bytes < t.min_available_memory_mb * MB {
            return Err(PreflightFailure::InsufficientMemory {
                available_mb: snapshot.available_memory_bytes / MB,
                required_mb: t.min_available_memory_mb,
            });
        }
        if snapshot.root_free_bytes < t.min_free_disk_mb * MB {
            return Err(PreflightFailure::InsufficientDisk {
                free_mb: snapshot.root_free_bytes / MB,
                required_mb: t.min_free_disk_mb,
            });
        }
        let limit = snapshot.cpu_count as f64 * t.max_load_per_core;
        if snapshot.load_one > limit {
            return Err(PreflightFailure::LoadTooHigh {
                load: snapshot.load_one,
                limit,
            });
        }
        Ok(())
    }

    /// Advisory detection only; nothing is locked
    pub async fn check_conflicts(&self, rec: &Recommendation) -> std::result::Result<(), PreflightFailure> {
        let touches_packages = rec
            .fix_commands
            .iter()
            .any(|c| PACKAGE_MANAGERS.iter().any(|(pm, _)| c.contains(pm)));
        let restarts_service = rec
            .fix_commands
            .iter()
            .any(|c| c.contains("systemctl") && c.contains("restart"));

        if !touches_packages && !restarts_service {
            return Ok(());
        }

        let processes = match self.probe.process_names().await {
            Ok(p) => p,
            Err(e) => {
                warn!("Process listing failed, assuming busy: {}", e);
                return Err(PreflightFailure::PackageManagerBusy(
                    "process list unavailable".to_string(),
                ));
            }
        };

        if touches_packages {
            for (manager, lock) in PACKAGE_MANAGERS {
                if self.probe.path_exists(Path::new(lock)) {
                    return Err(PreflightFailure::PackageManagerBusy(format!("{} exists", lock)));
                }
                if processes.contains(*manager) {
                    return Err(PreflightFailure::PackageManagerBusy(format!("{} is running", manager)));
                }
            }
        }

        if restarts_service && processes.contains("systemctl") {
            return Err(PreflightFailure::ServiceManagerBusy);
        }

        Ok(())
    }
}
