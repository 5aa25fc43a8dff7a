//! Batch Runner Tests

use std::fs;
use std::path::Path;

use gfe_core::StrictnessLevel;
use gfe_eval::{run_batch, BatchManifest, EvalSettings};

fn write_match(dir: &Path, name: &str, ai: &str, gt: &str) {
    fs::write(dir.join(format!("{name}_ai.json")), ai).unwrap();
    fs::write(dir.join(format!("{name}_gt.json")), gt).unwrap();
}

fn write_manifest(dir: &Path) -> std::path::PathBuf {
    write_match(
        dir,
        "final",
        r#"[{"time": 10, "action": "Shot", "team": "home", "outcome": "Point"}]"#,
        r#"[{"time": 12, "action": "Shot", "team": "home", "outcome": "Point", "id": "g1"}]"#,
    );
    write_match(
        dir,
        "semi",
        r#"[{"time": 50, "action": "Kickout", "team": "away", "outcome": "Won"},
            {"time": 80, "action": "Foul", "team": "home"}]"#,
        r#"[{"time": 95, "action": "Kickout", "team": "home", "outcome": "Won", "id": "g1"}]"#,
    );

    let manifest = dir.join("batch.toml");
    fs::write(
        &manifest,
        r#"
[[match]]
name = "final"
ai = "final_ai.json"
gt = "final_gt.json"

[[match]]
name = "quarter"
ai = "quarter_ai.json"
gt = "quarter_gt.json"

[[match]]
name = "semi"
ai = "semi_ai.json"
gt = "semi_gt.json"
time_origin_offset = -40.0
"#,
    )
    .unwrap();

    manifest
}

#[tokio::test]
async fn test_batch_keeps_manifest_order_and_sums_totals() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = BatchManifest::from_file(write_manifest(dir.path())).unwrap();

    let report = run_batch(
        &manifest,
        &EvalSettings::default(),
        &[StrictnessLevel::Strict, StrictnessLevel::Medium],
        2,
    )
    .await;

    let names: Vec<&str> = report.matches.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["final", "quarter", "semi"]);

    // The quarter-final files do not exist
    assert_eq!(report.failed, 1);
    assert!(report.matches[1].is_failed());
    assert!(report.matches[1]
        .error
        .as_deref()
        .unwrap()
        .contains("File not found"));

    // Semi-final ground truth shifts from 95s to 55s, inside the 20s window
    let semi = &report.matches[2];
    let semi_medium = semi.report(StrictnessLevel::Medium).unwrap();
    assert_eq!(semi_medium.micro.counts.true_positives, 1);
    assert_eq!(semi_medium.micro.counts.false_positives, 1);
    let semi_strict = semi.report(StrictnessLevel::Strict).unwrap();
    assert_eq!(semi_strict.micro.counts.true_positives, 0);

    let strict = &report.totals[0];
    assert_eq!(strict.level, StrictnessLevel::Strict);
    assert_eq!(strict.matches, 2);
    assert_eq!(strict.micro.counts.true_positives, 1);
    assert_eq!(strict.micro.counts.false_positives, 2);
    assert_eq!(strict.micro.counts.false_negatives, 1);

    let medium = &report.totals[1];
    assert_eq!(medium.micro.counts.true_positives, 2);
    assert_eq!(medium.micro.counts.false_positives, 1);
    assert_eq!(medium.micro.counts.false_negatives, 0);
}

#[tokio::test]
async fn test_batch_text_rendering() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = BatchManifest::from_file(write_manifest(dir.path())).unwrap();

    let report = run_batch(&manifest, &EvalSettings::default(), &[StrictnessLevel::Loose], 1).await;
    let text = report.render_text();

    assert!(text.contains("3 matches, 1 failed"));
    assert!(text.contains("final: loose F1 100.0%"));
    assert!(text.contains("quarter: FAILED"));

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["failed"], 1);
    assert_eq!(json["totals"][0]["level"], "loose");
}

#[test]
fn test_empty_manifest_runs() {
    let report = tokio_test::block_on(run_batch(
        &BatchManifest::default(),
        &EvalSettings::default(),
        &[StrictnessLevel::Strict],
        4,
    ));

    assert!(report.matches.is_empty());
    assert_eq!(report.failed, 0);
    assert_eq!(report.totals[0].matches, 0);
    assert_eq!(report.totals[0].micro.f1, 0.0);
}
