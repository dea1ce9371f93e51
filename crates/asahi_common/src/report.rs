//! Health report built from scan results and finalized recommendations,
//! plus JSON report persistence for fix runs.

use crate::error::Result;
use crate::fix::BatchReport;
use crate::recommendation::{id_timestamp, Recommendation, Severity};
use crate::scan::ScanResults;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const REPORT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallHealth {
    Good,
    Fair,
    Concerning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaHealth {
    Good,
    Concerning,
    Poor,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub report_version: String,
    pub hostname: String,
    pub kernel: String,
    pub distribution: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutiveSummary {
    pub overall_health: OverallHealth,
    pub critical_issues_count: usize,
    pub high_priority_issues_count: usize,
    pub key_findings: Vec<String>,
    pub immediate_actions_required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthOverview {
    pub system_uptime: String,
    pub memory_health: AreaHealth,
    pub disk_health: AreaHealth,
    pub network_health: AreaHealth,
    pub service_health: AreaHealth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationSummary {
    pub total_count: usize,
    pub by_severity: BTreeMap<String, usize>,
    pub detailed_recommendations: Vec<Recommendation>,
}

/// Full system health report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub metadata: ReportMetadata,
    pub executive_summary: ExecutiveSummary,
    pub system_health_overview: HealthOverview,
    pub recommendations: RecommendationSummary,
    pub next_steps: Vec<String>,
    pub references: Vec<String>,
}

impl HealthReport {
    pub fn build(scan: &ScanResults, recommendations: &[Recommendation]) -> Self {
        Self {
            metadata: ReportMetadata {
                generated_at: Utc::now(),
                report_version: REPORT_VERSION.to_string(),
                hostname: scan.hostname().to_string(),
                kernel: scan.kernel().to_string(),
                distribution: scan.distribution().to_string(),
            },
            executive_summary: executive_summary(scan, recommendations),
            system_health_overview: health_overview(scan),
            recommendations: RecommendationSummary {
                total_count: recommendations.len(),
                by_severity: count_by_severity(recommendations),
                detailed_recommendations: recommendations.to_vec(),
            },
            next_steps: next_steps(recommendations),
            references: vec![
                "Asahi Linux Documentation: https://asahilinux.org/docs/".to_string(),
                "Asahi Linux GitHub: https://github.com/AsahiLinux".to_string(),
                "Known Issues: https://github.com/AsahiLinux/docs/wiki/Broken-Software".to_string(),
            ],
        }
    }

    /// Write as `system_health_report_<timestamp>.json` under `dir`
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        write_json(dir, "system_health_report", self)
    }
}

/// Write a fix run report as `fix_report_<timestamp>.json` under `dir`
pub fn write_batch_report(report: &BatchReport, dir: &Path) -> Result<PathBuf> {
    write_json(dir, "fix_report", report)
}

fn write_json<T: Serialize>(dir: &Path, prefix: &str, value: &T) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}_{}.json", prefix, id_timestamp()));
    fs::write(&path, serde_json::to_string_pretty(value)?)?;
    info!("Report saved to {}", path.display());
    Ok(path)
}

fn severity_count(recommendations: &[Recommendation], severity: Severity) -> usize {
    recommendations.iter().filter(|r| r.severity == severity).count()
}

pub fn count_by_severity(recommendations: &[Recommendation]) -> BTreeMap<String, usize> {
    Severity::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), severity_count(recommendations, *s)))
        .collect()
}

fn executive_summary(scan: &ScanResults, recommendations: &[Recommendation]) -> ExecutiveSummary {
    let critical = severity_count(recommendations, Severity::Critical);
    let high = severity_count(recommendations, Severity::High);

    let overall_health = if critical > 0 {
        OverallHealth::Critical
    } else if high > 2 {
        OverallHealth::Concerning
    } else if high > 0 {
        OverallHealth::Fair
    } else {
        OverallHealth::Good
    };

    let os = &scan.os_health;
    let mut key_findings = Vec::new();

    if os.memory_usage.memory_pressure {
        key_findings.push(format!(
            "High memory usage detected: {:.1}%",
            os.memory_usage.memory_percent.unwrap_or(0.0)
        ));
    }
    for (mount, usage) in &os.disk_usage.partitions {
        if usage.critical {
            key_findings.push(format!("Critical disk space on {}: {:.1}% used", mount, usage.percent));
        }
    }
    let asahi_issues: usize = os.asahi_specific.values().map(|f| f.issue_count()).sum();
    if asahi_issues > 0 {
        key_findings.push(format!("{} Asahi Linux specific issues detected", asahi_issues));
    }

    ExecutiveSummary {
        overall_health,
        critical_issues_count: critical,
        high_priority_issues_count: high,
        key_findings,
        immediate_actions_required: critical > 0 || high > 2,
    }
}

fn health_overview(scan: &ScanResults) -> HealthOverview {
    let os = &scan.os_health;

    let memory_percent = os.memory_usage.memory_percent.unwrap_or(0.0);
    let memory_health = if memory_percent > 90.0 {
        AreaHealth::Critical
    } else if memory_percent > 75.0 {
        AreaHealth::Concerning
    } else {
        AreaHealth::Good
    };

    let max_disk = scan.max_disk_percent();
    let disk_health = if max_disk > 90.0 {
        AreaHealth::Critical
    } else if max_disk > 80.0 {
        AreaHealth::Concerning
    } else {
        AreaHealth::Good
    };

    let conn = &os.network_health.connectivity;
    let network_health = if conn.internet == Some(false) {
        AreaHealth::Poor
    } else if conn.dns == Some(false) {
        AreaHealth::Concerning
    } else {
        AreaHealth::Good
    };

    let failed = os.systemd_services.failed_count();
    let service_health = if failed > 5 {
        AreaHealth::Poor
    } else if failed > 0 {
        AreaHealth::Concerning
    } else {
        AreaHealth::Good
    };

    HealthOverview {
        system_uptime: os.system_info.uptime.clone().unwrap_or_else(|| "unknown".to_string()),
        memory_health,
        disk_health,
        network_health,
        service_health,
    }
}

fn next_steps(recommendations: &[Recommendation]) -> Vec<String> {
    let critical = severity_count(recommendations, Severity::Critical);
    let high = severity_count(recommendations, Severity::High);
    let mut steps = Vec::new();

    if critical > 0 {
        steps.push(format!("Immediately address {} critical issue(s)", critical));
        steps.push("Create system backup before making changes".to_string());
    }
    if high > 0 {
        steps.push(format!(
            "Plan to address {} high-priority issue(s) within 24-48 hours",
            high
        ));
    }
    steps.extend(
        [
            "Schedule regular system health scans",
            "Monitor system performance after applying fixes",
            "Update system packages regularly",
            "Review Asahi Linux community updates for new developments",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommendation::Category;
    use tempfile::TempDir;

    fn recs(severities: &[Severity]) -> Vec<Recommendation> {
        severities
            .iter()
            .enumerate()
            .map(|(i, s)| Recommendation::new(format!("r{}", i), format!("t{}", i), *s, Category::System))
            .collect()
    }

    #[test]
    fn test_overall_health_levels() {
        let scan = ScanResults::default();
        let r = HealthReport::build(&scan, &recs(&[Severity::Low]));
        assert_eq!(r.executive_summary.overall_health, OverallHealth::Good);
        let r = HealthReport::build(&scan, &recs(&[Severity::High]));
        assert_eq!(r.executive_summary.overall_health, OverallHealth::Fair);
        let r = HealthReport::build(&scan, &recs(&[Severity::High, Severity::High, Severity::High]));
        assert_eq!(r.executive_summary.overall_health, OverallHealth::Concerning);
        assert!(r.executive_summary.immediate_actions_required);
        let r = HealthReport::build(&scan, &recs(&[Severity::Critical]));
        assert_eq!(r.executive_summary.overall_health, OverallHealth::Critical);
        assert_eq!(r.next_steps[0], "Immediately address 1 critical issue(s)");
    }

    #[test]
    fn test_overview_thresholds() {
        let scan = ScanResults::from_json(
            r#"{"os_health": {
                "memory_usage": {"memory_percent": 80, "memory_pressure": false},
                "disk_usage": {"partitions": {"/": {"percent": 95.0, "critical": true}}},
                "systemd_services": {"failed_services": ["a.service"]}
            }}"#,
        )
        .unwrap();
        let r = HealthReport::build(&scan, &[]);
        assert_eq!(r.system_health_overview.memory_health, AreaHealth::Concerning);
        assert_eq!(r.system_health_overview.disk_health, AreaHealth::Critical);
        assert_eq!(r.system_health_overview.service_health, AreaHealth::Concerning);
        assert_eq!(r.system_health_overview.network_health, AreaHealth::Good);
        assert_eq!(r.executive_summary.key_findings, vec!["Critical disk space on /: 95.0% used"]);
    }

    #[test]
    fn test_counts_cover_every_severity() {
        let counts = count_by_severity(&recs(&[Severity::Info, Severity::Info]));
        assert_eq!(counts.len(), 5);
        assert_eq!(counts["info"], 2);
        assert_eq!(counts["critical"], 0);
    }

    #[test]
    fn test_write_report() {
        let dir = TempDir::new().unwrap();
        let report = HealthReport::build(&ScanResults::default(), &[]);
        let path = report.write_to(dir.path()).unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("system_health_report_"));
        let text = fs::read_to_string(path).unwrap();
        assert!(text.contains("\"overall_health\": \"good\""));
    }
}
