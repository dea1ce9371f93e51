//! Error types for Asahi Healer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HealerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Rule '{rule}' failed: {reason}")]
    Rule { rule: String, reason: String },

    #[error("System probe error: {0}")]
    Probe(String),

    #[error("Backup error: {0}")]
    Backup(String),

    #[error("Restore error: {0}")]
    Restore(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HealerError {
    pub fn rule(rule: &str, reason: impl Into<String>) -> Self {
        HealerError::Rule {
            rule: rule.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HealerError>;
