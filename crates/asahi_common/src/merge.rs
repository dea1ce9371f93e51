//! Recommendation merger
//!
//! Greedy single-pass grouping by title similarity, then a per-group merge
//! and a priority sort. Grouping depends on arrival order: a recommendation
//! joins the first existing group whose key is similar enough, and the key
//! is the lower-cased title of the group's first member.

use crate::recommendation::Recommendation;
use std::collections::HashSet;
use tracing::debug;

/// Titles with a word-set Jaccard similarity above this are merged
pub const SIMILARITY_THRESHOLD: f64 = 0.7;

/// Word-set Jaccard similarity of two titles, case-insensitive
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let words_a: HashSet<&str> = a.split_whitespace().collect();
    let words_b: HashSet<&str> = b.split_whitespace().collect();

    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }

    let intersection = words_a.intersection(&words_b).count();
    let union = words_a.union(&words_b).count();
    intersection as f64 / union as f64
}

/// Merge similar recommendations and sort by priority.
///
/// Output is never longer than the input, and every fix, verification and
/// prevention step of the input survives in some output recommendation.
pub fn merge(recommendations: Vec<Recommendation>) -> Vec<Recommendation> {
    let mut groups: Vec<(String, Vec<Recommendation>)> = Vec::new();

    for rec in recommendations {
        let title = rec.title.to_lowercase();
        match groups
            .iter_mut()
            .find(|(key, _)| title_similarity(&title, key) > SIMILARITY_THRESHOLD)
        {
            Some((_, members)) => members.push(rec),
            None => groups.push((title, vec![rec])),
        }
    }

    let mut merged: Vec<Recommendation> = groups
        .into_iter()
        .map(|(key, members)| {
            if members.len() > 1 {
                debug!("Merging {} recommendations similar to '{}'", members.len(), key);
            }
            merge_group(members)
        })
        .collect();

    sort_by_priority(&mut merged);
    merged
}

/// Merge one group into a single recommendation.
///
/// The most severe member is the base (first one wins on ties). Fix
/// descriptions are concatenated; commands, verifications and preventions
/// are deduplicated in first-seen order; confidence is averaged.
pub fn merge_group(mut group: Vec<Recommendation>) -> Recommendation {
    if group.len() == 1 {
        return group.remove(0);
    }

    let base_idx = group
        .iter()
        .enumerate()
        .min_by_key(|(i, r)| (r.severity.rank(), *i))
        .map(|(i, _)| i)
        .unwrap_or(0);

    let mut commands = Vec::new();
    let mut descriptions = Vec::new();
    let mut verifications = Vec::new();
    let mut preventions = Vec::new();
    let mut confidence_sum = 0.0;

    for rec in &group {
        commands.extend(rec.fix_commands.iter().cloned());
        if !rec.fix_description.is_empty() {
            descriptions.push(rec.fix_description.clone());
        }
        verifications.extend(rec.verification_commands.iter().cloned());
        preventions.extend(rec.prevention_measures.iter().cloned());
        confidence_sum += rec.ai_confidence;
    }
    let confidence = confidence_sum / group.len() as f64;

    let mut base = group.swap_remove(base_idx);
    base.fix_commands = dedup_ordered(commands);
    base.fix_description = descriptions.join("\n\n");
    base.verification_commands = dedup_ordered(verifications);
    base.prevention_measures = dedup_ordered(preventions);
    base.ai_confidence = confidence;
    base
}

/// Severity first (critical first), then confidence descending. Stable.
pub fn sort_by_priority(recommendations: &mut [Recommendation]) {
    recommendations.sort_by(|a, b| {
        a.severity
            .rank()
            .cmp(&b.severity.rank())
            .then_with(|| b.ai_confidence.total_cmp(&a.ai_confidence))
    });
}

fn dedup_ordered(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
