//! Safety gate - the single filter every fix command passes before it runs.
//!
//! Rejects, in order:
//! 1. commands containing a deny-listed destructive substring (any casing)
//! 2. recursive deletes of `/` and `dd` writes to a device, whatever the
//!    flag or operand order
//! 3. downloads fed to a shell, through a pipe or a substitution
//! 4. anything mentioning reboot / shutdown / poweroff / halt
//! 5. any command of a high or critical risk recommendation, unless high-risk
//!    approval was granted when the gate was built
//!
//! False positives are acceptable here, false negatives are not.

use asahi_common::Recommendation;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Destructive substrings, matched case-insensitively
pub const DENY_LIST: &[&str] = &[
    "rm -rf /",
    "mkfs",
    "fdisk",
    "parted",
    "dd if=",
    "curl | sh",
    "wget | sh",
    "format",
    "del /s",
    "> /dev/",
];

/// A download whose output reaches a shell through any later pipe stage:
/// `curl .. | sh`, `curl .. | tee f | sh`, `wget .. | sudo -E bash`
static PIPE_TO_SHELL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:curl|wget)\b.*\|\s*(?:sudo\s+(?:-\S+\s+)*)?(?:env\s+)?(?:ba|z|da|k)?sh\b")
        .expect("static regex")
});

/// A shell running a download through substitution:
/// `sh -c "$(curl ..)"`, `bash <(curl ..)`
static SHELL_SUBSTITUTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:(?:ba|z|da|k)?sh|source)\b.*(?:\$\(|<\(|`)\s*(?:sudo\s+)?(?:curl|wget)\b")
        .expect("static regex")
});

/// `dd` with an output operand on a device node, in any operand order
static DD_TO_DEVICE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bdd\b[^;&|]*\bof=/dev/").expect("static regex"));

/// Matched as plain substrings
const POWER_STATE: &[&str] = &["reboot", "shutdown", "poweroff", "halt"];

/// Whether commands of high/critical risk recommendations may run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighRiskApproval {
    #[default]
    Withheld,
    Granted,
}

/// Why a command was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    DenyListed(&'static str),
    RecursiveRootDelete,
    DeviceWrite,
    PipeToShell,
    PowerStateChange,
    HighRiskUnapproved(String),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::DenyListed(pattern) => write!(f, "matches dangerous pattern '{}'", pattern),
            Rejection::RecursiveRootDelete => f.write_str("recursively deletes the root filesystem"),
            Rejection::DeviceWrite => f.write_str("writes directly to a device"),
            Rejection::PipeToShell => f.write_str("pipes a download into a shell"),
            Rejection::PowerStateChange => f.write_str("reboot/shutdown requires manual execution"),
            Rejection::HighRiskUnapproved(level) => {
                write!(f, "risk level '{}' requires confirmation", level)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyGate {
    approval: HighRiskApproval,
}

impl SafetyGate {
    pub fn new(approval: HighRiskApproval) -> Self {
        Self { approval }
    }

    pub fn approval(&self) -> HighRiskApproval {
        self.approval
    }

    /// Pure function of (command, recommendation risk, approval)
    pub fn is_safe(&self, command: &str, recommendation: &Recommendation) -> bool {
        match self.check(command, recommendation) {
            Ok(()) => true,
            Err(reason) => {
                warn!("Blocked command '{}': {}", command, reason);
                false
            }
        }
    }

    pub fn check(&self, command: &str, recommendation: &Recommendation) -> Result<(), Rejection> {
        let lower = command.to_lowercase();

        if let Some(pattern) = DENY_LIST.iter().find(|p| lower.contains(*p)) {
            return Err(Rejection::DenyListed(*pattern));
        }
        if deletes_root(&lower) {
            return Err(Rejection::RecursiveRootDelete);
        }
        if DD_TO_DEVICE.is_match(command) {
            return Err(Rejection::DeviceWrite);
        }
        if PIPE_TO_SHELL.is_match(command) || SHELL_SUBSTITUTION.is_match(command) {
            return Err(Rejection::PipeToShell);
        }
        if POWER_STATE.iter().any(|word| lower.contains(word)) {
            return Err(Rejection::PowerStateChange);
        }
        if recommendation.is_high_risk() && self.approval != HighRiskApproval::Granted {
            return Err(Rejection::HighRiskUnapproved(recommendation.risk_level.clone()));
        }
        Ok(())
    }
}

/// True when some `rm` in the command is recursive and has `/` or `/*` as
/// an operand. Flags may be split (`-r -f`), combined (`-fr`) or long.
fn deletes_root(command: &str) -> bool {
    command
        .split(|c: char| matches!(c, ';' | '&' | '|' | '\n'))
        .any(|segment| {
            let mut words = segment.split_whitespace().map(|w| w.trim_matches(|c: char| c == '"' || c == '\''));
            if !words.any(|w| w == "rm" || w.ends_with("/rm")) {
                return false;
            }
            let mut recursive = false;
            let mut root = false;
            for word in words {
                match word {
                    "--recursive" => recursive = true,
                    "/" | "/*" => root = true,
                    w if w.starts_with('-') && !w.starts_with("--") => {
                        recursive |= w.contains(|c: char| c == 'r' || c == 'R');
                    }
                    _ => {}
                }
            }
            recursive && root
        })
}
