//! Rule engine
//!
//! A fixed, ordered table of condition -> recommendation rules evaluated
//! against scan results. Rules are independent: every rule whose predicate
//! holds fires. A predicate that errors is logged and skipped for this run.

use crate::error::{HealerError, Result};
use crate::recommendation::{id_timestamp, Category, Recommendation, Severity};
use crate::scan::ScanResults;
use tracing::{debug, error};

/// Memory usage above this percentage triggers `high_memory_usage`
pub const HIGH_MEMORY_PERCENT: f64 = 85.0;

/// Predicate over scan results
pub type Predicate = fn(&ScanResults) -> Result<bool>;

/// Static recommendation content for a rule
#[derive(Debug, Clone, Copy)]
pub struct RuleTemplate {
    pub title: &'static str,
    pub description: &'static str,
    pub severity: Severity,
    pub category: Category,
    pub fix_commands: &'static [&'static str],
    pub fix_description: &'static str,
    pub verification_commands: &'static [&'static str],
    pub prevention_measures: &'static [&'static str],
    pub risk_level: Option<&'static str>,
    pub backup_recommended: bool,
}

/// One entry of the rule table
#[derive(Clone, Copy)]
pub struct Rule {
    pub id: &'static str,
    pub predicate: Predicate,
    pub template: RuleTemplate,
}

impl Rule {
    /// Build the recommendation for a firing rule
    pub fn instantiate(&self) -> Recommendation {
        let t = &self.template;
        let mut rec = Recommendation::new(
            format!("rule_{}_{}", self.id, id_timestamp()),
            t.title,
            t.severity,
            t.category,
        );
        rec.description = t.description.to_string();
        rec.fix_commands = t.fix_commands.iter().map(|c| c.to_string()).collect();
        rec.fix_description = t.fix_description.to_string();
        rec.verification_commands = t.verification_commands.iter().map(|c| c.to_string()).collect();
        rec.prevention_measures = t.prevention_measures.iter().map(|c| c.to_string()).collect();
        if let Some(risk) = t.risk_level {
            rec.risk_level = risk.to_string();
        }
        rec.backup_recommended = t.backup_recommended;
        rec.ai_confidence = 1.0;
        rec
    }
}

/// Evaluates the rule table against scan results
pub struct RuleEngine {
    rules: Vec<Rule>,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleEngine {
    /// Engine with the built-in rule table
    pub fn new() -> Self {
        Self {
            rules: builtin_rules(),
        }
    }

    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Generate rule-based recommendations. Never fails.
    pub fn generate(&self, scan: &ScanResults) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();

        for rule in &self.rules {
            match (rule.predicate)(scan) {
                Ok(true) => {
                    debug!("Rule {} fired", rule.id);
                    recommendations.push(rule.instantiate());
                }
                Ok(false) => {}
                Err(e) => error!("Rule {} failed: {}", rule.id, e),
            }
        }

        recommendations
    }
}

/// The built-in rule table, in evaluation order
pub fn builtin_rules() -> Vec<Rule> {
    vec![
        Rule {
            id: "high_memory_usage",
            predicate: high_memory_usage,
            template: RuleTemplate {
                title: "High Memory Usage Detected",
                description: "System memory usage is above 85%, which may cause performance issues",
                severity: Severity::High,
                category: Category::Performance,
                fix_commands: &[
                    "sudo systemctl restart systemd-oomd",
                    "free -h",
                    "ps aux --sort=-%mem | head -10",
                ],
                fix_description: "Restart OOM daemon and identify memory-hungry processes",
                verification_commands: &[],
                prevention_measures: &[],
                risk_level: None,
                backup_recommended: false,
            },
        },
        Rule {
            id: "disk_space_critical",
            predicate: disk_space_critical,
            template: RuleTemplate {
                title: "Critical Disk Space Issue",
                description: "One or more partitions are critically low on disk space",
                severity: Severity::Critical,
                category: Category::System,
                fix_commands: &[
                    "sudo pacman -Sc",
                    "sudo journalctl --vacuum-time=7d",
                    "du -sh /var/log/* | sort -hr",
                    "df -h",
                ],
                fix_description: "Clean package cache, rotate logs, and check disk usage",
                verification_commands: &[],
                prevention_measures: &[],
                risk_level: None,
                backup_recommended: false,
            },
        },
        Rule {
            id: "rust_jemalloc_issue",
            predicate: rust_jemalloc_issue,
            template: RuleTemplate {
                title: "Rust/jemalloc 16K Page Size Issue",
                description: "Rust from Arch repos may not work with 16K page size",
                severity: Severity::Medium,
                category: Category::AsahiSpecific,
                fix_commands: &[
                    "curl --proto \"=https\" --tlsv1.2 -sSf https://sh.rustup.rs | sh",
                    "source ~/.cargo/env",
                    "rustup default stable",
                ],
                fix_description: "Install Rust via rustup instead of system packages",
                verification_commands: &[],
                prevention_measures: &[],
                risk_level: None,
                backup_recommended: false,
            },
        },
        Rule {
            id: "failed_services",
            predicate: failed_services,
            template: RuleTemplate {
                title: "Failed Systemd Services",
                description: "One or more systemd services have failed",
                severity: Severity::Medium,
                category: Category::System,
                fix_commands: &["systemctl --failed", "sudo systemctl reset-failed"],
                fix_description: "Review failed services and reset their state",
                verification_commands: &[],
                prevention_measures: &[],
                risk_level: None,
                backup_recommended: false,
            },
        },
        Rule {
            id: "thermal_critical",
            predicate: thermal_critical,
            template: RuleTemplate {
                title: "Critical Temperature Reported",
                description: "A thermal zone is reporting a critical temperature",
                severity: Severity::High,
                category: Category::Hardware,
                fix_commands: &["sensors", "ps aux --sort=-%cpu | head -10"],
                fix_description: "Check sensor readings and identify CPU-heavy processes",
                verification_commands: &["cat /sys/class/thermal/thermal_zone*/temp"],
                prevention_measures: &["Keep ventilation clear and avoid sustained full load"],
                risk_level: None,
                backup_recommended: false,
            },
        },
        Rule {
            id: "dns_resolution_failure",
            predicate: dns_resolution_failure,
            template: RuleTemplate {
                title: "DNS Resolution Failing",
                description: "The network is reachable but name resolution is failing",
                severity: Severity::Medium,
                category: Category::Network,
                fix_commands: &["resolvectl status", "sudo systemctl restart systemd-resolved"],
                fix_description: "Inspect resolver state and restart systemd-resolved",
                verification_commands: &["resolvectl query asahilinux.org"],
                prevention_measures: &[],
                risk_level: None,
                backup_recommended: false,
            },
        },
    ]
}

fn high_memory_usage(scan: &ScanResults) -> Result<bool> {
    let percent = match scan.os_health.memory_usage.memory_percent {
        Some(p) => p,
        None => return Ok(false),
    };
    if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
        return Err(HealerError::rule(
            "high_memory_usage",
            format!("memory_percent out of range: {}", percent),
        ));
    }
    Ok(percent > HIGH_MEMORY_PERCENT)
}

fn disk_space_critical(scan: &ScanResults) -> Result<bool> {
    Ok(scan
        .os_health
        .disk_usage
        .partitions
        .values()
        .any(|p| p.critical))
}

fn rust_jemalloc_issue(scan: &ScanResults) -> Result<bool> {
    Ok(scan
        .os_health
        .asahi_specific
        .values()
        .flat_map(|findings| findings.issues())
        .any(|issue| {
            let lower = issue.to_lowercase();
            lower.contains("rust") && lower.contains("jemalloc")
        }))
}

fn failed_services(scan: &ScanResults) -> Result<bool> {
    Ok(scan.os_health.systemd_services.failed_count() > 0)
}

fn thermal_critical(scan: &ScanResults) -> Result<bool> {
    Ok(scan
        .os_health
        .thermal_status
        .thermal_zones
        .values()
        .any(|z| z.critical))
}

fn dns_resolution_failure(scan: &ScanResults) -> Result<bool> {
    let c = &scan.os_health.network_health.connectivity;
    Ok(c.internet != Some(false) && c.dns == Some(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(json: &str) -> ScanResults {
        ScanResults::from_json(json).unwrap()
    }

    #[test]
    fn test_empty_scan_fires_nothing() {
        let recs = RuleEngine::new().generate(&ScanResults::default());
        assert!(recs.is_empty());
    }

    #[test]
    fn test_memory_threshold_is_exclusive() {
        let at = scan(r#"{"os_health": {"memory_usage": {"memory_percent": 85}}}"#);
        assert!(!high_memory_usage(&at).unwrap());
        let above = scan(r#"{"os_health": {"memory_usage": {"memory_percent": 85.5}}}"#);
        assert!(high_memory_usage(&above).unwrap());
    }

    #[test]
    fn test_out_of_range_memory_is_an_error() {
        let bad = scan(r#"{"os_health": {"memory_usage": {"memory_percent": 140}}}"#);
        assert!(high_memory_usage(&bad).is_err());
        // The engine swallows it and the rule simply does not fire
        assert!(RuleEngine::new().generate(&bad).is_empty());
    }

    #[test]
    fn test_jemalloc_match_is_case_insensitive() {
        let s = scan(r#"{"os_health": {"asahi_specific": {"page_size": ["Rust binaries crash in JEMALLOC"]}}}"#);
        assert!(rust_jemalloc_issue(&s).unwrap());
    }

    #[test]
    fn test_dns_rule_needs_explicit_failure() {
        let unknown = scan(r#"{"os_health": {"network_health": {"connectivity": {}}}}"#);
        assert!(!dns_resolution_failure(&unknown).unwrap());
        let offline = scan(r#"{"os_health": {"network_health": {"connectivity": {"internet": false, "dns": false}}}}"#);
        assert!(!dns_resolution_failure(&offline).unwrap());
        let broken = scan(r#"{"os_health": {"network_health": {"connectivity": {"internet": true, "dns": false}}}}"#);
        assert!(dns_resolution_failure(&broken).unwrap());
    }

    #[test]
    fn test_rule_ids_are_unique() {
        let rules = builtin_rules();
        let mut ids: Vec<_> = rules.iter().map(|r| r.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), rules.len());
    }
}
