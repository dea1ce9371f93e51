//! Typed view of the scan results handed to the recommendation pipeline.
//!
//! Only the keys the rules and reports read are modelled. Every field is
//! optional or defaulted so partial scans deserialize, and unknown keys are
//! ignored.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Results of a full system scan, keyed by scan category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanResults {
    pub os_health: OsHealth,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsHealth {
    pub system_info: SystemInfo,
    pub memory_usage: MemoryUsage,
    pub disk_usage: DiskUsage,
    pub systemd_services: ServiceHealth,
    pub thermal_status: ThermalStatus,
    pub network_health: NetworkHealth,
    /// Free-form Asahi findings keyed by probe name
    pub asahi_specific: BTreeMap<String, AsahiFindings>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemInfo {
    pub hostname: Option<String>,
    pub kernel: Option<String>,
    pub distribution: Option<String>,
    pub uptime: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryUsage {
    pub memory_percent: Option<f64>,
    pub memory_pressure: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskUsage {
    /// Mount point -> usage
    pub partitions: BTreeMap<String, PartitionUsage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionUsage {
    pub device: Option<String>,
    pub fstype: Option<String>,
    pub percent: f64,
    pub critical: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceHealth {
    pub failed: Option<u32>,
    pub failed_services: Vec<String>,
}

impl ServiceHealth {
    /// Count of failed units, preferring the explicit counter
    pub fn failed_count(&self) -> usize {
        self.failed
            .map(|n| n as usize)
            .unwrap_or(self.failed_services.len())
            .max(self.failed_services.len())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermalStatus {
    pub thermal_zones: BTreeMap<String, ThermalZone>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermalZone {
    pub temperature: f64,
    pub critical: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkHealth {
    pub connectivity: Connectivity,
}

/// Absent values mean "not probed" and count as healthy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Connectivity {
    pub internet: Option<bool>,
    pub dns: Option<bool>,
}

/// Asahi probes report either a list of findings or an arbitrary value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AsahiFindings {
    List(Vec<String>),
    Other(serde_json::Value),
}

impl AsahiFindings {
    pub fn issues(&self) -> &[String] {
        match self {
            AsahiFindings::List(items) => items,
            AsahiFindings::Other(_) => &[],
        }
    }

    /// Number of issues this probe contributes to summaries
    pub fn issue_count(&self) -> usize {
        match self {
            AsahiFindings::List(items) => items.len(),
            AsahiFindings::Other(serde_json::Value::Null) => 0,
            AsahiFindings::Other(_) => 1,
        }
    }
}

impl ScanResults {
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn hostname(&self) -> &str {
        self.os_health.system_info.hostname.as_deref().unwrap_or("unknown")
    }

    pub fn kernel(&self) -> &str {
        self.os_health.system_info.kernel.as_deref().unwrap_or("unknown")
    }

    pub fn distribution(&self) -> &str {
        self.os_health
            .system_info
            .distribution
            .as_deref()
            .unwrap_or("unknown")
    }

    /// Highest partition usage percent, 0 when no partitions were scanned
    pub fn max_disk_percent(&self) -> f64 {
        self.os_health
            .disk_usage
            .partitions
            .values()
            .map(|p| p.percent)
            .fold(0.0, f64::max)
    }
}
