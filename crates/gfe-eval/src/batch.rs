//! Batch evaluation
//!
//! Scores several matches listed in a TOML manifest. Each match is an
//! independent evaluation, so they run on a bounded pool of blocking tasks
//! and are put back into manifest order once all have finished.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use gfe_core::{GfeError, Result, StrictnessLevel};

use crate::metrics::{EventScores, MatchCounts};
use crate::report::{format_clock, EvaluationReport};
use crate::{EvalSettings, Evaluator};

// ============================================================================
// Manifest
// ============================================================================

/// List of matches to evaluate in one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchManifest {
    #[serde(default, rename = "match")]
    pub matches: Vec<MatchEntry>,
}

/// One match: an AI event file and its ground truth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEntry {
    pub name: String,
    pub ai: PathBuf,
    pub gt: PathBuf,

    /// Overrides the run-wide tolerance for this match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance_seconds: Option<f64>,

    /// Overrides the run-wide ground-truth offset for this match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_origin_offset: Option<f64>,

    /// Overrides the run-wide evaluation window for this match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<f64>,
}

impl MatchEntry {
    /// Run-wide settings with this entry's overrides applied
    pub fn settings(&self, base: &EvalSettings) -> EvalSettings {
        EvalSettings {
            tolerance_seconds: self.tolerance_seconds.unwrap_or(base.tolerance_seconds),
            time_limit: self.time_limit.or(base.time_limit),
            time_origin_offset: self.time_origin_offset.unwrap_or(base.time_origin_offset),
        }
    }
}

impl BatchManifest {
    /// Load a manifest; relative event paths resolve against the manifest's directory
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => GfeError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => GfeError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        let mut manifest: BatchManifest =
            toml::from_str(&content).map_err(|e| GfeError::Parse {
                origin: path.display().to_string(),
                message: e.to_string(),
            })?;

        if let Some(base) = path.parent() {
            manifest.resolve_paths(base);
        }

        Ok(manifest)
    }

    fn resolve_paths(&mut self, base: &Path) {
        for entry in &mut self.matches {
            if entry.ai.is_relative() {
                entry.ai = base.join(&entry.ai);
            }
            if entry.gt.is_relative() {
                entry.gt = base.join(&entry.gt);
            }
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Result of evaluating one manifest entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub name: String,

    /// Set when the match could not be evaluated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// One report per strictness level
    #[serde(default)]
    pub reports: Vec<EvaluationReport>,
}

impl MatchOutcome {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Report for a given level, if evaluated
    pub fn report(&self, level: StrictnessLevel) -> Option<&EvaluationReport> {
        self.reports.iter().find(|r| r.level == level)
    }
}

/// Scores summed over all successfully evaluated matches at one level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelTotals {
    pub level: StrictnessLevel,
    pub matches: usize,
    pub micro: EventScores,
}

/// Result of a batch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub matches: Vec<MatchOutcome>,
    pub totals: Vec<LevelTotals>,
    pub failed: usize,
}

impl BatchReport {
    fn build(matches: Vec<MatchOutcome>, levels: &[StrictnessLevel]) -> Self {
        let totals = levels
            .iter()
            .map(|level| {
                let mut counts = MatchCounts::default();
                let mut evaluated = 0;
                for report in matches.iter().filter_map(|m| m.report(*level)) {
                    counts.add(&report.micro.counts);
                    evaluated += 1;
                }
                LevelTotals {
                    level: *level,
                    matches: evaluated,
                    micro: counts.scores(),
                }
            })
            .collect();
        let failed = matches.iter().filter(|m| m.is_failed()).count();

        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            matches,
            totals,
            failed,
        }
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| GfeError::Other(e.into()))
    }

    /// One line per match plus the summed totals
    pub fn render_text(&self) -> String {
        let mut lines = vec![format!(
            "=== Batch Evaluation Report ({} matches, {} failed) ===",
            self.matches.len(),
            self.failed
        )];

        for outcome in &self.matches {
            match &outcome.error {
                Some(error) => lines.push(format!("  {}: FAILED ({})", outcome.name, error)),
                None => {
                    let scores: Vec<String> = outcome
                        .reports
                        .iter()
                        .map(|r| {
                            let window = r
                                .time_limit
                                .map(|l| format!(" ≤{}", format_clock(l)))
                                .unwrap_or_default();
                            format!("{}{} F1 {:.1}%", r.level, window, r.f1() * 100.0)
                        })
                        .collect();
                    lines.push(format!("  {}: {}", outcome.name, scores.join(" | ")));
                }
            }
        }

        lines.push("Totals:".to_string());
        for total in &self.totals {
            lines.push(format!(
                "  {:<7} P {:.1}%  R {:.1}%  F1 {:.1}%  (TP {} / FP {} / FN {}) over {} matches",
                total.level.to_string(),
                total.micro.precision * 100.0,
                total.micro.recall * 100.0,
                total.micro.f1 * 100.0,
                total.micro.counts.true_positives,
                total.micro.counts.false_positives,
                total.micro.counts.false_negatives,
                total.matches
            ));
        }

        lines.join("\n") + "\n"
    }
}

// ============================================================================
// Runner
// ============================================================================

/// Evaluate every manifest entry at each level, at most `max_concurrency` at a time.
///
/// A match that fails (missing file, unreadable document) is recorded as
/// failed and does not stop the others.
pub async fn run_batch(
    manifest: &BatchManifest,
    base: &EvalSettings,
    levels: &[StrictnessLevel],
    max_concurrency: usize,
) -> BatchReport {
    let shared_levels: Arc<[StrictnessLevel]> = levels.into();

    info!(
        "Evaluating {} matches with up to {} in parallel",
        manifest.matches.len(),
        max_concurrency.max(1)
    );

    let mut outcomes: Vec<(usize, MatchOutcome)> =
        stream::iter(manifest.matches.iter().cloned().enumerate())
            .map(|(index, entry)| {
                let settings = entry.settings(base);
                let levels = Arc::clone(&shared_levels);
                async move {
                    let name = entry.name.clone();
                    let joined = tokio::task::spawn_blocking(move || {
                        evaluate_entry(&entry, settings, &levels)
                    })
                    .await;

                    let outcome = match joined {
                        Ok(Ok(reports)) => MatchOutcome {
                            name,
                            error: None,
                            reports,
                        },
                        Ok(Err(e)) => {
                            warn!("Match {} failed: {}", name, e);
                            MatchOutcome {
                                name,
                                error: Some(e.to_string()),
                                reports: Vec::new(),
                            }
                        }
                        Err(e) => {
                            warn!("Match {} evaluation task aborted: {}", name, e);
                            MatchOutcome {
                                name,
                                error: Some(format!("evaluation task aborted: {e}")),
                                reports: Vec::new(),
                            }
                        }
                    };

                    (index, outcome)
                }
            })
            .buffer_unordered(max_concurrency.max(1))
            .collect()
            .await;

    outcomes.sort_by_key(|(index, _)| *index);
    let matches = outcomes.into_iter().map(|(_, outcome)| outcome).collect();

    BatchReport::build(matches, levels)
}

fn evaluate_entry(
    entry: &MatchEntry,
    settings: EvalSettings,
    levels: &[StrictnessLevel],
) -> Result<Vec<EvaluationReport>> {
    Evaluator::new(settings)?.evaluate_files(&entry.ai, &entry.gt, levels)
}
