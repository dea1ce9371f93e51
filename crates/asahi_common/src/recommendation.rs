//! Recommendation model shared by the rule engine, the AI formatter,
//! the merger and the fix executor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a recommendation. Declaration order is the priority order:
/// `Critical` sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    #[default]
    Medium,
    Low,
    Info,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    /// Sort rank: critical=0 ... info=4
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
            Severity::Info => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }

    /// Case-insensitive parse. Returns None for unknown values.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Some(Severity::Critical),
            "high" => Some(Severity::High),
            "medium" => Some(Severity::Medium),
            "low" => Some(Severity::Low),
            "info" => Some(Severity::Info),
            _ => None,
        }
    }

    /// Parse, coercing unknown values to `Medium`.
    pub fn parse_lenient(s: &str) -> Self {
        Self::parse(s).unwrap_or(Severity::Medium)
    }

    /// True when this severity is `limit` or milder.
    pub fn within_limit(&self, limit: Severity) -> bool {
        self.rank() >= limit.rank()
    }

    pub fn is_high_impact(&self) -> bool {
        matches!(self, Severity::Critical | Severity::High)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Area of the system a recommendation applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[default]
    System,
    Hardware,
    Software,
    Network,
    Security,
    Performance,
    AsahiSpecific,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::System => "system",
            Category::Hardware => "hardware",
            Category::Software => "software",
            Category::Network => "network",
            Category::Security => "security",
            Category::Performance => "performance",
            Category::AsahiSpecific => "asahi_specific",
        }
    }

    /// Case-insensitive parse, coercing unknown values to `System`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "hardware" => Category::Hardware,
            "software" => Category::Software,
            "network" => Category::Network,
            "security" => Category::Security,
            "performance" => Category::Performance,
            "asahi_specific" => Category::AsahiSpecific,
            _ => Category::System,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host identity attached during finalization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemContext {
    pub hostname: String,
    pub kernel: String,
    pub distribution: String,
}

/// Rough estimate of what applying a recommendation will disturb
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimatedImpact {
    pub performance_improvement: String,
    pub stability_improvement: String,
    pub affected_services: Vec<String>,
    pub downtime_estimate: String,
}

/// A proposed remediation, rule-based or AI-derived
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub category: Category,
    pub impact: String,
    /// Ordered shell commands. Empty means informational only.
    #[serde(default)]
    pub fix_commands: Vec<String>,
    #[serde(default)]
    pub fix_description: String,
    /// Free text, typically low/medium/high/critical
    pub risk_level: String,
    #[serde(default)]
    pub verification_commands: Vec<String>,
    #[serde(default)]
    pub prevention_measures: Vec<String>,
    pub estimated_time: String,
    #[serde(default)]
    pub requires_reboot: bool,
    #[serde(default)]
    pub backup_recommended: bool,
    /// In [0, 1]
    pub ai_confidence: f64,
    pub created_at: DateTime<Utc>,

    // Added by finalization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_context: Option<SystemContext>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub safety_warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_impact: Option<EstimatedImpact>,
}

impl Recommendation {
    /// Create a recommendation with the defaults used by rule-based generation
    pub fn new(id: impl Into<String>, title: impl Into<String>, severity: Severity, category: Category) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            severity,
            category,
            impact: "System performance or stability may be affected".to_string(),
            fix_commands: Vec::new(),
            fix_description: String::new(),
            risk_level: "low".to_string(),
            verification_commands: Vec::new(),
            prevention_measures: Vec::new(),
            estimated_time: "5 minutes".to_string(),
            requires_reboot: false,
            backup_recommended: false,
            ai_confidence: 1.0,
            created_at: Utc::now(),
            system_context: None,
            safety_warnings: Vec::new(),
            estimated_impact: None,
        }
    }

    /// Recommendations without fix commands are informational
    pub fn is_informational(&self) -> bool {
        self.fix_commands.iter().all(|c| c.trim().is_empty())
    }

    pub fn is_high_risk(&self) -> bool {
        matches!(
            self.risk_level.trim().to_lowercase().as_str(),
            "high" | "critical"
        )
    }

    /// True if any fix command asks for privilege elevation
    pub fn needs_elevation(&self) -> bool {
        self.fix_commands.iter().any(|c| c.contains("sudo"))
    }
}

/// Timestamp suffix used in generated ids and file names
pub fn id_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}
