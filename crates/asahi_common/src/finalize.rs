//! Finalization: attach host context, safety warnings and an impact
//! estimate to merged recommendations.

use crate::recommendation::{Category, EstimatedImpact, Recommendation, SystemContext};
use crate::scan::ScanResults;

/// Patterns that earn a "review carefully" warning. Broader than the
/// safety gate's deny-list: these are flagged, not blocked.
const REVIEW_PATTERNS: &[&str] = &["rm -rf", "dd if=", "mkfs", "fdisk", ">>", "curl | sh", "wget | sh"];

/// Finalize every recommendation in place order
pub fn finalize(recommendations: Vec<Recommendation>, scan: &ScanResults) -> Vec<Recommendation> {
    recommendations
        .into_iter()
        .map(|rec| finalize_one(rec, scan))
        .collect()
}

pub fn finalize_one(mut rec: Recommendation, scan: &ScanResults) -> Recommendation {
    rec.system_context = Some(SystemContext {
        hostname: scan.hostname().to_string(),
        kernel: scan.kernel().to_string(),
        distribution: scan.distribution().to_string(),
    });
    rec.fix_commands = clean_commands(&rec.fix_commands);
    rec.safety_warnings = safety_warnings(&rec);
    rec.estimated_impact = Some(estimate_impact(&rec));
    rec
}

/// Trim commands and drop blank ones
pub fn clean_commands(commands: &[String]) -> Vec<String> {
    commands
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Human-readable warnings, deduplicated in first-seen order
pub fn safety_warnings(rec: &Recommendation) -> Vec<String> {
    let mut warnings: Vec<String> = Vec::new();
    let mut push = |w: String| {
        if !warnings.contains(&w) {
            warnings.push(w);
        }
    };

    if rec.severity.is_high_impact() {
        push("High-impact change - create system backup before proceeding".to_string());
    }
    if rec.requires_reboot {
        push("System reboot required - save all work before applying".to_string());
    }
    if rec.needs_elevation() {
        push("Requires administrative privileges".to_string());
    }
    if rec.is_high_risk() {
        push("High-risk operation - review commands carefully".to_string());
    }
    for cmd in &rec.fix_commands {
        let lower = cmd.to_lowercase();
        if REVIEW_PATTERNS.iter().any(|p| lower.contains(p)) {
            push(format!("Potentially dangerous command - review carefully: {}", cmd));
        }
    }

    warnings
}

pub fn estimate_impact(rec: &Recommendation) -> EstimatedImpact {
    let performance_improvement = if rec.category == Category::Performance {
        "medium to high"
    } else {
        "unknown"
    };

    let affected_services: Vec<String> = rec
        .fix_commands
        .iter()
        .filter(|cmd| cmd.contains("systemctl"))
        .filter_map(|cmd| {
            let parts: Vec<&str> = cmd.split_whitespace().collect();
            if parts.len() > 2 {
                parts.last().map(|s| s.to_string())
            } else {
                None
            }
        })
        .collect();

    let downtime_estimate = if rec.requires_reboot {
        "2-5 minutes (reboot)"
    } else if !affected_services.is_empty() {
        "30 seconds - 2 minutes"
    } else {
        "0 minutes"
    };

    EstimatedImpact {
        performance_improvement: performance_improvement.to_string(),
        stability_improvement: "unknown".to_string(),
        affected_services,
        downtime_estimate: downtime_estimate.to_string(),
    }
}
