//! GFE Eval - Event matching and scoring
//!
//! Scores a list of AI-detected match events (kickouts, shots, turnovers,
//! fouls, ...) against a hand-annotated ground-truth list:
//! 1. Load both lists ([`loader`])
//! 2. Align the ground-truth time origin and apply the evaluation window
//! 3. Pair events greedily under a strictness level ([`predicate`], [`matcher`])
//! 4. Count and score the pairs ([`metrics`]) into a report ([`report`])
//!
//! Several matches can be scored in one run with [`batch`].

pub mod batch;
pub mod loader;
pub mod matcher;
pub mod metrics;
pub mod predicate;
pub mod report;

pub use batch::{run_batch, BatchManifest, BatchReport, MatchEntry, MatchOutcome};
pub use loader::{load_events, parse_json_events, parse_xml_events, LoadedEvents};
pub use matcher::{match_events, MatchKind, MatchResult};
pub use metrics::{aggregate, macro_average, tally, EventScores, MatchCounts, Tally, TOTAL_KEY};
pub use predicate::MatchPredicate;
pub use report::{render_text, EvaluationReport, ReportContext, SourceCounts};

use std::path::Path;

use gfe_core::{Event, EvaluationConfig, EventSource, GfeError, Result, StrictnessLevel};
use tracing::info;

// ============================================================================
// Settings
// ============================================================================

/// Matching tolerance and evaluation window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalSettings {
    /// Maximum time difference for two events to pair (seconds)
    pub tolerance_seconds: f64,
    /// Only events at or before this time are evaluated
    pub time_limit: Option<f64>,
    /// Seconds added to every ground-truth time before matching
    pub time_origin_offset: f64,
}

impl Default for EvalSettings {
    fn default() -> Self {
        Self {
            tolerance_seconds: 20.0,
            time_limit: None,
            time_origin_offset: 0.0,
        }
    }
}

impl From<&EvaluationConfig> for EvalSettings {
    fn from(config: &EvaluationConfig) -> Self {
        Self {
            tolerance_seconds: config.tolerance_seconds,
            time_limit: config.time_limit,
            time_origin_offset: config.time_origin_offset,
        }
    }
}

// ============================================================================
// Evaluator
// ============================================================================

/// Event lists after alignment and windowing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparedEvents {
    pub ai: Vec<Event>,
    pub gt: Vec<Event>,
    pub dropped: SourceCounts,
    pub filtered: SourceCounts,
}

/// Scores AI event lists against ground truth
#[derive(Debug, Clone)]
pub struct Evaluator {
    settings: EvalSettings,
}

impl Evaluator {
    /// Create an evaluator, rejecting unusable settings up front
    pub fn new(settings: EvalSettings) -> Result<Self> {
        if !settings.tolerance_seconds.is_finite() || settings.tolerance_seconds <= 0.0 {
            return Err(GfeError::InvalidSetting(format!(
                "tolerance must be a positive number of seconds, got {}",
                settings.tolerance_seconds
            )));
        }
        if let Some(limit) = settings.time_limit {
            if !limit.is_finite() || limit < 0.0 {
                return Err(GfeError::InvalidSetting(format!(
                    "time limit must be a non-negative number of seconds, got {limit}"
                )));
            }
        }
        if !settings.time_origin_offset.is_finite() {
            return Err(GfeError::InvalidSetting(format!(
                "time origin offset must be finite, got {}",
                settings.time_origin_offset
            )));
        }

        Ok(Self { settings })
    }

    pub fn settings(&self) -> &EvalSettings {
        &self.settings
    }

    /// Shift ground truth onto the AI time origin and drop events outside the window
    pub fn prepare(&self, ai: &LoadedEvents, gt: &LoadedEvents) -> PreparedEvents {
        let (ai_events, ai_filtered) = self.window(ai.events.iter().cloned());
        let (gt_events, gt_filtered) = self.window(
            gt.events
                .iter()
                .map(|e| e.shifted(self.settings.time_origin_offset)),
        );

        PreparedEvents {
            ai: ai_events,
            gt: gt_events,
            dropped: SourceCounts {
                ai: ai.dropped,
                gt: gt.dropped,
            },
            filtered: SourceCounts {
                ai: ai_filtered,
                gt: gt_filtered,
            },
        }
    }

    fn window(&self, events: impl Iterator<Item = Event>) -> (Vec<Event>, usize) {
        let limit = self.settings.time_limit.unwrap_or(f64::INFINITY);
        let mut filtered = 0;
        let kept = events
            .filter(|e| {
                let inside = e.time >= 0.0 && e.time <= limit;
                if !inside {
                    filtered += 1;
                }
                inside
            })
            .collect();

        (kept, filtered)
    }

    /// Evaluate already prepared events at one strictness level
    pub fn evaluate_prepared(
        &self,
        prepared: &PreparedEvents,
        level: StrictnessLevel,
    ) -> Result<EvaluationReport> {
        let predicate = MatchPredicate::new(level, self.settings.tolerance_seconds)?;
        let results = match_events(&prepared.ai, &prepared.gt, &predicate);

        let report = EvaluationReport::build(
            ReportContext {
                level,
                tolerance_seconds: self.settings.tolerance_seconds,
                time_limit: self.settings.time_limit,
                time_origin_offset: self.settings.time_origin_offset,
                dropped: prepared.dropped,
                filtered: prepared.filtered,
            },
            results,
        );

        info!(
            "Evaluation ({}): TP={} FP={} FN={} precision={:.3} recall={:.3} f1={:.3}",
            level,
            report.micro.counts.true_positives,
            report.micro.counts.false_positives,
            report.micro.counts.false_negatives,
            report.micro.precision,
            report.micro.recall,
            report.micro.f1
        );

        Ok(report)
    }

    /// Evaluate two event lists at one strictness level
    pub fn evaluate_events(
        &self,
        ai: &LoadedEvents,
        gt: &LoadedEvents,
        level: StrictnessLevel,
    ) -> Result<EvaluationReport> {
        self.evaluate_prepared(&self.prepare(ai, gt), level)
    }

    /// Evaluate two event lists once per requested strictness level
    pub fn evaluate_levels(
        &self,
        ai: &LoadedEvents,
        gt: &LoadedEvents,
        levels: &[StrictnessLevel],
    ) -> Result<Vec<EvaluationReport>> {
        let prepared = self.prepare(ai, gt);
        levels
            .iter()
            .map(|level| self.evaluate_prepared(&prepared, *level))
            .collect()
    }

    /// Load both files and evaluate them once per requested strictness level
    pub fn evaluate_files(
        &self,
        ai_path: impl AsRef<Path>,
        gt_path: impl AsRef<Path>,
        levels: &[StrictnessLevel],
    ) -> Result<Vec<EvaluationReport>> {
        let ai = load_events(ai_path, EventSource::Ai)?;
        let gt = load_events(gt_path, EventSource::GroundTruth)?;
        self.evaluate_levels(&ai, &gt, levels)
    }
}
