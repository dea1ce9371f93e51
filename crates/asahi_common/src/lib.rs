//! Shared types and pure logic for Asahi Healer.
//!
//! Everything here is side-effect free apart from config loading and report
//! writing: recommendation model, rule engine, AI response formatting,
//! merging, finalization and the health report.

pub mod ai_format;
pub mod config;
pub mod error;
pub mod finalize;
pub mod fix;
pub mod merge;
pub mod recommendation;
pub mod report;
pub mod rules;
pub mod scan;
pub mod schedule;

pub use ai_format::{format_ai_recommendation, format_ai_response, parse_ai_response};
pub use config::{Config, ConfigSource};
pub use error::{HealerError, Result};
pub use finalize::finalize;
pub use fix::{BatchReport, CommandRecord, FixResult, FixStatus, RestoreResult, RestoreStatus, VerificationResult};
pub use merge::merge;
pub use recommendation::{Category, Recommendation, Severity};
pub use report::HealthReport;
pub use rules::RuleEngine;
pub use scan::ScanResults;
pub use schedule::{ScheduledTask, TaskType};

/// Version of the healer crates
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
