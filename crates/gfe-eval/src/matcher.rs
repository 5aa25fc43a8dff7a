//! Greedy Bipartite Matcher
//!
//! Pairs AI events with ground-truth events one at a time, in AI input
//! order, always taking the closest unclaimed candidate the predicate
//! accepts. The pairing is greedy, not globally optimal: an earlier AI
//! event may claim a candidate that a later one would have matched.

use serde::{Deserialize, Serialize};
use tracing::debug;

use gfe_core::Event;

use crate::predicate::MatchPredicate;

/// Classification of one match result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchKind {
    TruePositive,
    FalsePositive,
    FalseNegative,
}

/// Outcome of pairing one AI event with one ground-truth event, or of
/// failing to pair either of them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub kind: MatchKind,

    /// Present for true and false positives
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_event: Option<Event>,

    /// Present for true positives and false negatives
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt_event: Option<Event>,

    /// Absolute time difference, true positives only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_delta: Option<f64>,
}

impl MatchResult {
    pub fn true_positive(ai: &Event, gt: &Event) -> Self {
        Self {
            kind: MatchKind::TruePositive,
            ai_event: Some(ai.clone()),
            gt_event: Some(gt.clone()),
            time_delta: Some(ai.time_delta(gt)),
        }
    }

    pub fn false_positive(ai: &Event) -> Self {
        Self {
            kind: MatchKind::FalsePositive,
            ai_event: Some(ai.clone()),
            gt_event: None,
            time_delta: None,
        }
    }

    pub fn false_negative(gt: &Event) -> Self {
        Self {
            kind: MatchKind::FalseNegative,
            ai_event: None,
            gt_event: Some(gt.clone()),
            time_delta: None,
        }
    }

    /// The event that represents this result: the AI event when there is one
    pub fn primary_event(&self) -> Option<&Event> {
        self.ai_event.as_ref().or(self.gt_event.as_ref())
    }

    /// Action used for per-type grouping
    pub fn action(&self) -> &str {
        self.primary_event().map_or("", |e| e.action.as_str())
    }

    /// Time used to place this result on a timeline
    pub fn time(&self) -> f64 {
        self.primary_event().map_or(0.0, |e| e.time)
    }
}

/// Match AI events against ground truth.
///
/// Returns one result per AI event (in input order) followed by one false
/// negative per unclaimed ground-truth event (in input order). When two
/// candidates are equally close, the one earlier in `gt` wins.
pub fn match_events(ai: &[Event], gt: &[Event], predicate: &MatchPredicate) -> Vec<MatchResult> {
    let mut claimed = vec![false; gt.len()];
    let mut results = Vec::with_capacity(ai.len() + gt.len());

    for ai_event in ai {
        let mut best: Option<(usize, f64)> = None;

        for (idx, gt_event) in gt.iter().enumerate() {
            if claimed[idx] || !predicate.matches(ai_event, gt_event) {
                continue;
            }
            let delta = ai_event.time_delta(gt_event);
            if best.map_or(true, |(_, best_delta)| delta < best_delta) {
                best = Some((idx, delta));
            }
        }

        match best {
            Some((idx, _)) => {
                claimed[idx] = true;
                results.push(MatchResult::true_positive(ai_event, &gt[idx]));
            }
            None => results.push(MatchResult::false_positive(ai_event)),
        }
    }

    let matched = claimed.iter().filter(|c| **c).count();
    results.extend(
        gt.iter()
            .zip(&claimed)
            .filter(|(_, taken)| !**taken)
            .map(|(gt_event, _)| MatchResult::false_negative(gt_event)),
    );

    debug!(
        "Matched {} of {} AI events against {} ground-truth events ({}, ±{}s)",
        matched,
        ai.len(),
        gt.len(),
        predicate.level(),
        predicate.tolerance_seconds()
    );

    results
}
