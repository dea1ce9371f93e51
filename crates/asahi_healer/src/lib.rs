//! Asahi Healer runtime: command execution, safety gate, backups,
//! pre-flight checks, the fix executor and the orchestrator that ties them
//! to the pure pipeline in `asahi_common`.

pub mod backup;
pub mod engine;
pub mod exec_log;
pub mod fixer;
pub mod logging;
pub mod output;
pub mod preflight;
pub mod probe;
pub mod runner;
pub mod safety;

pub use backup::BackupManager;
pub use engine::{Healer, HealerOptions, TaskOutcome};
pub use exec_log::{ExecutionEntry, ExecutionLog};
pub use fixer::FixExecutor;
pub use preflight::{HostProbe, Preflight, PreflightFailure, StubProbe, SystemProbe};
pub use runner::{CommandOutcome, CommandRunner};
pub use safety::{HighRiskApproval, SafetyGate};
