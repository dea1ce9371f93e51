//! Configuration management for Asahi Healer.
//!
//! Loads settings from `$XDG_CONFIG_HOME/asahi_healer/config.toml` or uses
//! defaults. Every field has a default so partial files work.

use crate::error::{HealerError, Result};
use crate::recommendation::Severity;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application directory name under the XDG base dirs
pub const APP_DIR: &str = "asahi_healer";

/// Fix execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixConfig {
    #[serde(default)]
    pub dry_run_by_default: bool,

    #[serde(default = "default_true")]
    pub create_backups: bool,

    /// When false, high-risk recommendations run without explicit approval
    #[serde(default = "default_true")]
    pub require_confirmation_high_risk: bool,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Mildest severity scheduled auto-fix is allowed to apply
    #[serde(default = "default_auto_fix_limit")]
    pub auto_fix_severity_limit: String,

    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// Number of backup directories kept by cleanup
    #[serde(default = "default_backup_retention")]
    pub backup_retention: usize,
}

fn default_true() -> bool {
    true
}

fn default_command_timeout() -> u64 {
    300
}

fn default_auto_fix_limit() -> String {
    "low".to_string()
}

fn default_backup_dir() -> PathBuf {
    home_dir().join(".asahi_healer_backups")
}

fn default_backup_retention() -> usize {
    10
}

impl Default for FixConfig {
    fn default() -> Self {
        Self {
            dry_run_by_default: false,
            create_backups: default_true(),
            require_confirmation_high_risk: default_true(),
            command_timeout_secs: default_command_timeout(),
            auto_fix_severity_limit: default_auto_fix_limit(),
            backup_dir: default_backup_dir(),
            backup_retention: default_backup_retention(),
        }
    }
}

impl FixConfig {
    pub fn severity_limit(&self) -> Result<Severity> {
        Severity::parse(&self.auto_fix_severity_limit).ok_or_else(|| {
            HealerError::Config(format!(
                "unknown auto_fix_severity_limit '{}'",
                self.auto_fix_severity_limit
            ))
        })
    }
}

/// Resource thresholds checked before any fix runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreflightConfig {
    #[serde(default = "default_min_memory")]
    pub min_available_memory_mb: u64,

    #[serde(default = "default_min_disk")]
    pub min_free_disk_mb: u64,

    #[serde(default = "default_max_load_per_core")]
    pub max_load_per_core: f64,
}

fn default_min_memory() -> u64 {
    500
}

fn default_min_disk() -> u64 {
    1024
}

fn default_max_load_per_core() -> f64 {
    2.0
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            min_available_memory_mb: default_min_memory(),
            min_free_disk_mb: default_min_disk(),
            max_load_per_core: default_max_load_per_core(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingConfig {
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,

    #[serde(default = "default_true")]
    pub write_fix_reports: bool,
}

fn default_report_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| home_dir().join(".local/share"))
        .join(APP_DIR)
        .join("reports")
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            report_dir: default_report_dir(),
            write_fix_reports: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSONL execution log; defaults under the XDG state dir
    #[serde(default)]
    pub execution_log: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            execution_log: None,
        }
    }
}

impl LoggingConfig {
    pub fn execution_log_path(&self) -> PathBuf {
        self.execution_log.clone().unwrap_or_else(|| {
            dirs::state_dir()
                .unwrap_or_else(|| home_dir().join(".local/state"))
                .join(APP_DIR)
                .join("execution.jsonl")
        })
    }
}

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fix: FixConfig,

    #[serde(default)]
    pub preflight: PreflightConfig,

    #[serde(default)]
    pub reporting: ReportingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where a loaded `Config` came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Nothing at this path
    Defaults(PathBuf),
    File(PathBuf),
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Defaults(path) => write!(f, "No config at {}, using defaults", path.display()),
            ConfigSource::File(path) => write!(f, "Loaded config from {}", path.display()),
        }
    }
}

impl Config {
    /// Default config file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| home_dir().join(".config"))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Load from `path`, or the default location. A missing file yields
    /// defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_source(path).map(|(config, _)| config)
    }

    /// Like `load`, also saying where the values came from. Nothing is
    /// logged here, so callers can report the source once logging is up.
    pub fn load_with_source(path: Option<&Path>) -> Result<(Self, ConfigSource)> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);

        if !path.exists() {
            return Ok((Self::default(), ConfigSource::Defaults(path)));
        }

        let content = fs::read_to_string(&path)?;
        let config = Self::parse(&content)?;
        Ok((config, ConfigSource::File(path)))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.fix.severity_limit()?;
        Ok(config)
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("/root"))
}
