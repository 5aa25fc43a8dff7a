//! Evaluation reports
//!
//! Machine-readable JSON report and a plain-text timeline rendering.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gfe_core::{Event, GfeError, Result, StrictnessLevel};

use crate::matcher::{MatchKind, MatchResult};
use crate::metrics::{macro_average, tally, AveragedScores, EventScores};

/// Per-source record counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCounts {
    pub ai: usize,
    pub gt: usize,
}

/// Full result of evaluating one AI event list against one ground-truth list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub level: StrictnessLevel,
    pub tolerance_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<f64>,
    pub time_origin_offset: f64,

    /// Scores per action type
    pub per_event: BTreeMap<String, EventScores>,

    /// Scores over all actions
    pub micro: EventScores,

    /// Unweighted mean of the per-action scores
    #[serde(rename = "macro")]
    pub macro_average: AveragedScores,

    /// Every match result, ground-truth times already aligned
    pub detailed_matches: Vec<MatchResult>,

    /// Malformed records skipped while loading
    pub dropped: SourceCounts,

    /// Events outside the evaluation window
    pub filtered: SourceCounts,
}

/// Settings echoed into a report
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportContext {
    pub level: StrictnessLevel,
    pub tolerance_seconds: f64,
    pub time_limit: Option<f64>,
    pub time_origin_offset: f64,
    pub dropped: SourceCounts,
    pub filtered: SourceCounts,
}

impl EvaluationReport {
    /// Score match results and assemble the report
    pub fn build(context: ReportContext, results: Vec<MatchResult>) -> Self {
        let tally = tally(&results);
        let macro_average = macro_average(&tally.per_action);

        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            level: context.level,
            tolerance_seconds: context.tolerance_seconds,
            time_limit: context.time_limit,
            time_origin_offset: context.time_origin_offset,
            per_event: tally.per_action,
            micro: tally.total,
            macro_average,
            detailed_matches: results,
            dropped: context.dropped,
            filtered: context.filtered,
        }
    }

    /// Overall F1
    pub fn f1(&self) -> f64 {
        self.micro.f1
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| GfeError::Other(e.into()))
    }
}

/// Render a report as a summary followed by a chronological timeline
pub fn render_text(report: &EvaluationReport) -> String {
    let micro = &report.micro;
    let mut lines = vec![format!(
        "=== Event Evaluation Report ({}, ±{:.1}s) ===\n",
        report.level, report.tolerance_seconds
    )];

    if let Some(limit) = report.time_limit {
        lines.push(format!("Window: first {}", format_clock(limit)));
    }
    if report.time_origin_offset != 0.0 {
        lines.push(format!(
            "Ground-truth offset: {:+.1}s",
            report.time_origin_offset
        ));
    }
    lines.push("Overall:".to_string());
    lines.push(format!("  Precision: {:.1}%", micro.precision * 100.0));
    lines.push(format!("  Recall:    {:.1}%", micro.recall * 100.0));
    lines.push(format!("  F1 Score:  {:.1}%", micro.f1 * 100.0));
    lines.push(format!(
        "  TP: {} | FP: {} | FN: {}",
        micro.counts.true_positives, micro.counts.false_positives, micro.counts.false_negatives
    ));
    lines.push(format!(
        "  Macro F1:  {:.1}%",
        report.macro_average.f1 * 100.0
    ));
    if report.dropped != SourceCounts::default() || report.filtered != SourceCounts::default() {
        lines.push(format!(
            "  Dropped: {} AI / {} GT | Outside window: {} AI / {} GT",
            report.dropped.ai, report.dropped.gt, report.filtered.ai, report.filtered.gt
        ));
    }

    if !report.per_event.is_empty() {
        lines.push("\nPer event type:".to_string());
        for (action, scores) in &report.per_event {
            lines.push(format!(
                "  {:<12} P {:>5.1}%  R {:>5.1}%  F1 {:>5.1}%  (TP {} / FP {} / FN {})",
                action,
                scores.precision * 100.0,
                scores.recall * 100.0,
                scores.f1 * 100.0,
                scores.counts.true_positives,
                scores.counts.false_positives,
                scores.counts.false_negatives,
            ));
        }
    }

    let mut timeline: Vec<&MatchResult> = report.detailed_matches.iter().collect();
    timeline.sort_by(|a, b| a.time().total_cmp(&b.time()));

    if !timeline.is_empty() {
        lines.push("\nTimeline:".to_string());
    }
    lines.extend(timeline.into_iter().map(|r| format!("  {}", timeline_line(r))));

    lines.join("\n") + "\n"
}

fn timeline_line(result: &MatchResult) -> String {
    match (result.kind, &result.ai_event, &result.gt_event) {
        (MatchKind::TruePositive, Some(ai), Some(gt)) => format!(
            "✅ {} {} matched GT {} at {} (Δ{:.1}s)",
            format_clock(ai.time),
            describe(ai),
            gt.id,
            format_clock(gt.time),
            result.time_delta.unwrap_or_default()
        ),
        (MatchKind::FalsePositive, Some(ai), _) => format!(
            "⚠️ {} {} not in ground truth",
            format_clock(ai.time),
            describe(ai)
        ),
        (MatchKind::FalseNegative, _, Some(gt)) => format!(
            "❌ {} {} missed",
            format_clock(gt.time),
            describe(gt)
        ),
        _ => format!("? {:?}", result.kind),
    }
}

fn describe(event: &Event) -> String {
    let qualifiers: Vec<&str> = [event.team.as_deref(), event.outcome.as_deref()]
        .into_iter()
        .flatten()
        .collect();

    if qualifiers.is_empty() {
        event.action.clone()
    } else {
        format!("{} ({})", event.action, qualifiers.join(", "))
    }
}

/// Format seconds as `MM:SS`, or `H:MM:SS` past the hour
pub fn format_clock(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ReportContext {
        ReportContext {
            level: StrictnessLevel::Strict,
            tolerance_seconds: 20.0,
            time_limit: Some(600.0),
            time_origin_offset: 0.0,
            dropped: SourceCounts { ai: 1, gt: 0 },
            filtered: SourceCounts::default(),
        }
    }

    fn sample_results() -> Vec<MatchResult> {
        let ai_shot = Event::new("a1", 70.0, "Shot")
            .with_team("home")
            .with_outcome("Point");
        let gt_shot = Event::new("g1", 72.0, "Shot")
            .with_team("home")
            .with_outcome("Point");
        let ai_kickout = Event::new("a2", 30.0, "Kickout").with_team("away");
        let gt_foul = Event::new("g2", 125.0, "Foul");

        vec![
            MatchResult::true_positive(&ai_shot, &gt_shot),
            MatchResult::false_positive(&ai_kickout),
            MatchResult::false_negative(&gt_foul),
        ]
    }

    #[test]
    fn test_build_splits_total() {
        let report = EvaluationReport::build(context(), sample_results());

        assert!(!report.per_event.contains_key(crate::metrics::TOTAL_KEY));
        assert_eq!(report.per_event.len(), 3);
        assert_eq!(report.micro.counts.true_positives, 1);
        assert_eq!(report.micro.counts.false_positives, 1);
        assert_eq!(report.micro.counts.false_negatives, 1);
        assert_eq!(report.detailed_matches.len(), 3);
    }

    #[test]
    fn test_action_named_total_stays_in_per_event() {
        let ai = Event::new("a1", 10.0, "TOTAL");
        let gt = Event::new("g1", 12.0, "TOTAL");
        let missed = Event::new("g2", 80.0, "Shot");

        let report = EvaluationReport::build(
            context(),
            vec![
                MatchResult::true_positive(&ai, &gt),
                MatchResult::false_negative(&missed),
            ],
        );

        assert_eq!(report.per_event.len(), 2);
        assert_eq!(report.per_event["TOTAL"].counts.true_positives, 1);
        assert_eq!(report.per_event["TOTAL"].counts.false_negatives, 0);
        assert_eq!(report.micro.counts.true_positives, 1);
        assert_eq!(report.micro.counts.false_negatives, 1);
        assert!((report.macro_average.f1 - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_json_shape() {
        let report = EvaluationReport::build(context(), sample_results());
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(json["level"], "strict");
        assert_eq!(json["per_event"]["Shot"]["TP"], 1);
        assert_eq!(json["micro"]["FN"], 1);
        assert!(json["macro"]["f1"].is_number());
        assert_eq!(json["detailed_matches"][0]["kind"], "TruePositive");
        assert_eq!(json["detailed_matches"][0]["time_delta"], 2.0);
        assert!(json["detailed_matches"][1].get("gt_event").is_none());
        assert_eq!(json["dropped"]["ai"], 1);
        assert_eq!(json["time_limit"], 600.0);
    }

    #[test]
    fn test_render_text_timeline_is_chronological() {
        let report = EvaluationReport::build(context(), sample_results());
        let text = render_text(&report);

        assert!(text.contains("Event Evaluation Report (strict, ±20.0s)"));
        assert!(text.contains("Window: first 10:00"));
        assert!(text.contains("Dropped: 1 AI / 0 GT"));
        assert!(text.contains("  TP: 1 | FP: 1 | FN: 1\n"));
        assert!(text.ends_with("missed\n"));

        let fp = text.find("⚠️ 00:30 Kickout (away)").unwrap();
        let tp = text.find("✅ 01:10 Shot (home, Point) matched GT g1 at 01:12 (Δ2.0s)").unwrap();
        let missed = text.find("❌ 02:05 Foul missed").unwrap();
        assert!(fp < tp && tp < missed);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0.0), "00:00");
        assert_eq!(format_clock(75.4), "01:15");
        assert_eq!(format_clock(3725.0), "1:02:05");
        assert_eq!(format_clock(-3.0), "00:00");
    }
}
