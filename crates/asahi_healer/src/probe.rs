//! Live scan probe - builds `ScanResults` from the running system.
//!
//! Covers host info, memory, disks, thermal zones and failed systemd
//! units. Sysinfo reads run on the blocking pool while the systemctl query
//! runs alongside; results are joined into one typed scan.

use crate::runner::CommandRunner;
use asahi_common::scan::{
    DiskUsage, MemoryUsage, OsHealth, PartitionUsage, ServiceHealth, SystemInfo, ThermalStatus,
    ThermalZone,
};
use asahi_common::ScanResults;
use std::collections::BTreeMap;
use sysinfo::{Components, Disks, System};
use tracing::{debug, warn};

/// Disk usage at or above this percent marks a partition critical
pub const DISK_CRITICAL_PERCENT: f64 = 90.0;

/// Memory usage above this percent sets `memory_pressure`
pub const MEMORY_PRESSURE_PERCENT: f64 = 85.0;

const FAILED_UNITS_CMD: &str = "systemctl --failed --no-legend --plain";

/// Snapshot of what sysinfo can tell us
struct HostReadings {
    system_info: SystemInfo,
    memory_usage: MemoryUsage,
    disk_usage: DiskUsage,
    thermal_status: ThermalStatus,
}

/// Run a full live scan. `runner` must not be in dry-run mode for the
/// service query to see real data.
pub async fn scan_system(runner: &CommandRunner) -> ScanResults {
    let host = tokio::task::spawn_blocking(read_host);
    let services = query_failed_units(runner);

    let (host, systemd_services) = tokio::join!(host, services);
    let host = match host {
        Ok(h) => h,
        Err(e) => {
            warn!("Host probe task failed: {}", e);
            HostReadings {
                system_info: SystemInfo::default(),
                memory_usage: MemoryUsage::default(),
                disk_usage: DiskUsage::default(),
                thermal_status: ThermalStatus::default(),
            }
        }
    };

    ScanResults {
        os_health: OsHealth {
            system_info: host.system_info,
            memory_usage: host.memory_usage,
            disk_usage: host.disk_usage,
            systemd_services,
            thermal_status: host.thermal_status,
            ..Default::default()
        },
    }
}

fn read_host() -> HostReadings {
    let mut system = System::new();
    system.refresh_memory();

    let memory_percent = if system.total_memory() > 0 {
        Some(system.used_memory() as f64 / system.total_memory() as f64 * 100.0)
    } else {
        None
    };

    HostReadings {
        system_info: SystemInfo {
            hostname: System::host_name(),
            kernel: System::kernel_version(),
            distribution: System::long_os_version().or_else(System::name),
            uptime: Some(format_uptime(System::uptime())),
        },
        memory_usage: MemoryUsage {
            memory_percent,
            memory_pressure: memory_percent.map_or(false, |p| p > MEMORY_PRESSURE_PERCENT),
        },
        disk_usage: read_disks(),
        thermal_status: read_thermal(),
    }
}

fn read_disks() -> DiskUsage {
    let disks = Disks::new_with_refreshed_list();
    let mut partitions = BTreeMap::new();

    for disk in disks.list() {
        let total = disk.total_space();
        if total == 0 {
            continue;
        }
        let percent = used_percent(total, disk.available_space());
        partitions.insert(
            disk.mount_point().to_string_lossy().to_string(),
            PartitionUsage {
                device: Some(disk.name().to_string_lossy().to_string()),
                fstype: Some(disk.file_system().to_string_lossy().to_string()),
                percent,
                critical: percent >= DISK_CRITICAL_PERCENT,
            },
        );
    }

    DiskUsage { partitions }
}

fn read_thermal() -> ThermalStatus {
    let components = Components::new_with_refreshed_list();
    let thermal_zones = components
        .list()
        .iter()
        .map(|c| {
            let temperature = c.temperature() as f64;
            let critical = c.critical().map_or(false, |limit| c.temperature() >= limit);
            (c.label().to_string(), ThermalZone { temperature, critical })
        })
        .collect();
    ThermalStatus { thermal_zones }
}

async fn query_failed_units(runner: &CommandRunner) -> ServiceHealth {
    let outcome = runner.run(FAILED_UNITS_CMD, "scan").await;
    if !outcome.success() {
        debug!("Failed unit query unavailable: {}", outcome.stderr.trim());
        return ServiceHealth::default();
    }
    let failed_services = parse_failed_units(&outcome.stdout);
    ServiceHealth {
        failed: Some(failed_services.len() as u32),
        failed_services,
    }
}

/// Share of `total` in use. Reported free space can exceed the total on
/// some filesystems; that reads as 0%.
fn used_percent(total: u64, available: u64) -> f64 {
    total.saturating_sub(available) as f64 / total as f64 * 100.0
}

/// First column of each non-empty `systemctl --failed --plain` line
pub fn parse_failed_units(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else {
        format!("{}h {}m", hours, minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_failed_units() {
        let out = "bluetooth.service loaded failed failed Bluetooth service\n\
                   \n\
                   cups.socket       loaded failed failed CUPS Scheduler\n";
        assert_eq!(parse_failed_units(out), vec!["bluetooth.service", "cups.socket"]);
        assert!(parse_failed_units("").is_empty());
    }

    #[test]
    fn test_used_percent() {
        assert_eq!(used_percent(200, 50), 75.0);
        assert_eq!(used_percent(100, 100), 0.0);
        assert_eq!(used_percent(100, 150), 0.0);
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(59), "0h 0m");
        assert_eq!(format_uptime(3_700), "1h 1m");
        assert_eq!(format_uptime(90_061), "1d 1h 1m");
    }
}
