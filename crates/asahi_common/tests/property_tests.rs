//! Property-based tests for the recommendation pipeline.
//!
//! Uses a small xorshift generator instead of an external crate.
//!
//! ## Invariants Tested
//!
//! - Merging never grows the list
//! - Every fix, verification and prevention step survives a merge
//! - Merged output is ordered by severity, then confidence descending
//! - Batch counters always add up to the recorded results
//! - Severity limit filtering never admits a more severe recommendation

use asahi_common::fix::{BatchReport, FixResult, FixStatus};
use asahi_common::merge::merge;
use asahi_common::{Category, Recommendation, Severity};
use std::collections::HashSet;

/// Simple pseudo-random number generator for test inputs
/// Uses xorshift64 algorithm
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

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() as f64) / (u64::MAX as f64)
    }

    fn next_range(&mut self, min: u64, max: u64) -> u64 {
        if max <= min {
            return min;
        }
        min + (self.next_u64() % (max - min))
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.next_range(0, items.len() as u64) as usize]
    }
}

const WORDS: &[&str] = &["disk", "memory", "high", "usage", "service", "failed", "swap", "dns"];
const COMMANDS: &[&str] = &["free -h", "df -h", "systemctl --failed", "sensors", "uptime"];

fn random_recommendation(rng: &mut TestRng, i: usize) -> Recommendation {
    let words = rng.next_range(1, 4);
    let title: Vec<&str> = (0..words).map(|_| rng.pick(WORDS)).collect();
    let severity = Severity::ALL[rng.next_range(0, 5) as usize];

    let mut rec = Recommendation::new(format!("r{}", i), title.join(" "), severity, Category::System);
    rec.ai_confidence = rng.next_f64();
    rec.fix_commands = (0..rng.next_range(0, 3)).map(|_| rng.pick(COMMANDS).to_string()).collect();
    rec.verification_commands = (0..rng.next_range(0, 2)).map(|_| rng.pick(COMMANDS).to_string()).collect();
    rec.prevention_measures = (0..rng.next_range(0, 2)).map(|k| format!("measure {} {}", i, k)).collect();
    rec
}

fn random_batch(rng: &mut TestRng) -> Vec<Recommendation> {
    let n = rng.next_range(0, 12) as usize;
    (0..n).map(|i| random_recommendation(rng, i)).collect()
}

#[test]
fn prop_merge_never_grows() {
    for seed in 1..200 {
        let mut rng = TestRng::new(seed);
        let input = random_batch(&mut rng);
        let len = input.len();
        let out = merge(input);
        assert!(out.len() <= len, "seed {}: {} > {}", seed, out.len(), len);
    }
}

#[test]
fn prop_merge_loses_no_steps() {
    for seed in 1..200 {
        let mut rng = TestRng::new(seed);
        let input = random_batch(&mut rng);

        let collect = |recs: &[Recommendation]| -> HashSet<String> {
            recs.iter()
                .flat_map(|r| {
                    r.fix_commands
                        .iter()
                        .chain(&r.verification_commands)
                        .chain(&r.prevention_measures)
                        .cloned()
                })
                .collect()
        };

        let before = collect(&input);
        let after = collect(&merge(input));
        assert!(before.is_subset(&after), "seed {}: steps lost", seed);
    }
}

#[test]
fn prop_merge_output_sorted() {
    for seed in 1..200 {
        let mut rng = TestRng::new(seed);
        let out = merge(random_batch(&mut rng));
        for pair in out.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(
                a.severity.rank() < b.severity.rank()
                    || (a.severity == b.severity && a.ai_confidence >= b.ai_confidence),
                "seed {}: {} ({}) before {} ({})",
                seed,
                a.severity,
                a.ai_confidence,
                b.severity,
                b.ai_confidence
            );
        }
    }
}

#[test]
fn prop_merged_confidence_in_range() {
    for seed in 1..200 {
        let mut rng = TestRng::new(seed);
        for rec in merge(random_batch(&mut rng)) {
            assert!((0.0..=1.0).contains(&rec.ai_confidence));
        }
    }
}

#[test]
fn prop_batch_counts_consistent() {
    let statuses = [
        FixStatus::Success,
        FixStatus::PartialSuccess,
        FixStatus::Failed,
        FixStatus::Skipped,
        FixStatus::Error,
    ];
    for seed in 1..100 {
        let mut rng = TestRng::new(seed);
        let n = rng.next_range(0, 20) as usize;
        let mut report = BatchReport::new(n, None, false);
        for i in 0..n {
            let mut result = FixResult::pending(&format!("r{}", i), "t");
            result.status = statuses[rng.next_range(0, statuses.len() as u64) as usize];
            report.record(result);
        }
        assert!(report.is_consistent());
        assert_eq!(report.execution_results.len(), report.total_fixes);
    }
}

#[test]
fn prop_severity_limit_is_a_floor() {
    for limit in Severity::ALL {
        for severity in Severity::ALL {
            if severity.within_limit(limit) {
                assert!(severity.rank() >= limit.rank());
            }
        }
    }
}
