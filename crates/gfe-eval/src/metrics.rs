//! Quality Metrics module
//!
//! Turns match results into true/false positive and false negative counts,
//! per action type and overall, with precision, recall and F1 derived from
//! them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::matcher::{MatchKind, MatchResult};

/// Key of the all-actions row in an aggregated table
pub const TOTAL_KEY: &str = "TOTAL";

// ============================================================================
// Counts
// ============================================================================

/// Confusion counts for one action type or for a whole evaluation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCounts {
    /// True positives (AI event paired with ground truth)
    #[serde(rename = "TP")]
    pub true_positives: usize,
    /// False positives (AI event with no ground-truth pair)
    #[serde(rename = "FP")]
    pub false_positives: usize,
    /// False negatives (ground-truth event never claimed)
    #[serde(rename = "FN")]
    pub false_negatives: usize,
}

impl MatchCounts {
    pub fn new(true_positives: usize, false_positives: usize, false_negatives: usize) -> Self {
        Self {
            true_positives,
            false_positives,
            false_negatives,
        }
    }

    /// Count one result
    pub fn record(&mut self, kind: MatchKind) {
        match kind {
            MatchKind::TruePositive => self.true_positives += 1,
            MatchKind::FalsePositive => self.false_positives += 1,
            MatchKind::FalseNegative => self.false_negatives += 1,
        }
    }

    /// Add another set of counts
    pub fn add(&mut self, other: &MatchCounts) {
        self.true_positives += other.true_positives;
        self.false_positives += other.false_positives;
        self.false_negatives += other.false_negatives;
    }

    /// Calculate precision (TP / (TP + FP)), 0 when nothing was predicted
    pub fn precision(&self) -> f64 {
        ratio(
            self.true_positives,
            self.true_positives + self.false_positives,
        )
    }

    /// Calculate recall (TP / (TP + FN)), 0 when there is no ground truth
    pub fn recall(&self) -> f64 {
        ratio(
            self.true_positives,
            self.true_positives + self.false_negatives,
        )
    }

    /// Calculate F1 score (2 * P * R / (P + R))
    pub fn f1_score(&self) -> f64 {
        harmonic_mean(self.precision(), self.recall())
    }

    /// Counts together with the derived scores
    pub fn scores(&self) -> EventScores {
        EventScores {
            counts: *self,
            precision: self.precision(),
            recall: self.recall(),
            f1: self.f1_score(),
        }
    }
}

/// Counts plus derived precision, recall and F1
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EventScores {
    #[serde(flatten)]
    pub counts: MatchCounts,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Unweighted mean of per-action scores
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AveragedScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

// ============================================================================
// Aggregation
// ============================================================================

/// Per-action scores, with the all-actions row kept apart
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tally {
    pub per_action: BTreeMap<String, EventScores>,
    pub total: EventScores,
}

/// Count results per action type and overall.
///
/// True and false positives are grouped by the AI event's action, false
/// negatives by the ground-truth event's action.
pub fn tally(results: &[MatchResult]) -> Tally {
    let mut per_action: BTreeMap<String, MatchCounts> = BTreeMap::new();
    let mut total = MatchCounts::default();

    for result in results {
        per_action
            .entry(result.action().to_string())
            .or_default()
            .record(result.kind);
        total.record(result.kind);
    }

    Tally {
        per_action: per_action
            .into_iter()
            .map(|(action, counts)| (action, counts.scores()))
            .collect(),
        total: total.scores(),
    }
}

/// Flat table keyed by action, with the overall row under [`TOTAL_KEY`].
///
/// An action literally named `TOTAL` is shadowed in this table; use
/// [`tally`] to keep both.
pub fn aggregate(results: &[MatchResult]) -> BTreeMap<String, EventScores> {
    let Tally {
        mut per_action,
        total,
    } = tally(results);
    per_action.insert(TOTAL_KEY.to_string(), total);
    per_action
}

/// Macro-average per-action rows
pub fn macro_average(per_action: &BTreeMap<String, EventScores>) -> AveragedScores {
    if per_action.is_empty() {
        return AveragedScores::default();
    }

    let n = per_action.len() as f64;
    AveragedScores {
        precision: per_action.values().map(|s| s.precision).sum::<f64>() / n,
        recall: per_action.values().map(|s| s.recall).sum::<f64>() / n,
        f1: per_action.values().map(|s| s.f1).sum::<f64>() / n,
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn harmonic_mean(p: f64, r: f64) -> f64 {
    if p + r == 0.0 {
        0.0
    } else {
        2.0 * p * r / (p + r)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use gfe_core::Event;

    #[test]
    fn test_counts_precision() {
        let counts = MatchCounts::new(8, 2, 0);
        assert!((counts.precision() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_counts_recall() {
        let counts = MatchCounts::new(8, 0, 2);
        assert!((counts.recall() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_counts_f1() {
        // P = 0.8, R = 0.8, F1 = 0.8
        let counts = MatchCounts::new(80, 20, 20);
        assert!((counts.f1_score() - 0.8).abs() < 1e-9);

        // P = 1.0, R = 0.5, F1 = 2/3
        let counts = MatchCounts::new(1, 0, 1);
        assert!((counts.f1_score() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_denominators() {
        let empty = MatchCounts::default();
        assert_eq!(empty.precision(), 0.0);
        assert_eq!(empty.recall(), 0.0);
        assert_eq!(empty.f1_score(), 0.0);

        let only_misses = MatchCounts::new(0, 0, 3);
        assert_eq!(only_misses.precision(), 0.0);
        assert_eq!(only_misses.recall(), 0.0);
        assert_eq!(only_misses.f1_score(), 0.0);
    }

    #[test]
    fn test_aggregate_groups_by_action() {
        let shot = Event::new("a1", 10.0, "Shot");
        let shot_gt = Event::new("g1", 11.0, "Shot");
        let kickout = Event::new("a2", 50.0, "Kickout");
        let turnover_gt = Event::new("g2", 90.0, "Turnover");

        let results = vec![
            MatchResult::true_positive(&shot, &shot_gt),
            MatchResult::false_positive(&kickout),
            MatchResult::false_negative(&turnover_gt),
        ];

        let table = aggregate(&results);
        assert_eq!(table.len(), 4);
        assert_eq!(table["Shot"].counts, MatchCounts::new(1, 0, 0));
        assert_eq!(table["Kickout"].counts, MatchCounts::new(0, 1, 0));
        assert_eq!(table["Turnover"].counts, MatchCounts::new(0, 0, 1));
        assert_eq!(table[TOTAL_KEY].counts, MatchCounts::new(1, 1, 1));
        assert!((table[TOTAL_KEY].precision - 0.5).abs() < 1e-9);
        assert!((table[TOTAL_KEY].recall - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_empty() {
        let table = aggregate(&[]);
        assert_eq!(table.len(), 1);
        assert_eq!(table[TOTAL_KEY], MatchCounts::default().scores());
    }

    #[test]
    fn test_macro_average() {
        let shot = Event::new("a1", 10.0, "Shot");
        let kickout = Event::new("a2", 50.0, "Kickout");

        let results = vec![
            MatchResult::true_positive(&shot, &shot),
            MatchResult::false_positive(&kickout),
        ];

        let averaged = macro_average(&tally(&results).per_action);
        assert!((averaged.precision - 0.5).abs() < 1e-9);
        assert!((averaged.recall - 0.5).abs() < 1e-9);
        assert!((averaged.f1 - 0.5).abs() < 1e-9);

        assert_eq!(macro_average(&tally(&[]).per_action), AveragedScores::default());
    }

    #[test]
    fn test_action_named_total_keeps_its_row() {
        let ai = Event::new("a1", 10.0, "TOTAL");
        let gt = Event::new("g1", 11.0, "TOTAL");
        let shot = Event::new("a2", 40.0, "Shot");

        let results = vec![
            MatchResult::true_positive(&ai, &gt),
            MatchResult::false_positive(&shot),
        ];

        let tally = tally(&results);
        assert_eq!(tally.per_action.len(), 2);
        assert_eq!(tally.per_action["TOTAL"].counts, MatchCounts::new(1, 0, 0));
        assert_eq!(tally.total.counts, MatchCounts::new(1, 1, 0));

        let averaged = macro_average(&tally.per_action);
        assert!((averaged.f1 - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_scores_serialize_with_short_keys() {
        let json = serde_json::to_value(MatchCounts::new(3, 1, 2).scores()).unwrap();
        assert_eq!(json["TP"], 3);
        assert_eq!(json["FP"], 1);
        assert_eq!(json["FN"], 2);
        assert!(json["f1"].is_number());
    }
}
