//! End-to-end analysis of the reference scenario, loaded from JSON documents
//! on disk the same way the monitor loads them.

use std::path::PathBuf;

use safeguard_common::{DangerType, Heuristics, PullFlag, RiskLevel, SafeguardError};
use safeguard_graph::testutil::fixture_scenario;
use safeguard_graph::{analyze, AnalysisContext};
use tempfile::TempDir;

fn write_fixture(dir: &TempDir) -> (PathBuf, PathBuf) {
    let (graph, annotations) = fixture_scenario().documents();
    let graph_path = dir.path().join("graph.json");
    let annotations_path = dir.path().join("annotations.json");
    std::fs::write(&graph_path, serde_json::to_string_pretty(&graph).unwrap()).unwrap();
    std::fs::write(
        &annotations_path,
        serde_json::to_string_pretty(&annotations).unwrap(),
    )
    .unwrap();
    (graph_path, annotations_path)
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

#[test]
fn kid1_is_critical_and_directly_connected() {
    let dir = TempDir::new().unwrap();
    let (graph_path, annotations_path) = write_fixture(&dir);
    let ctx = AnalysisContext::load(&graph_path, &annotations_path).unwrap();
    let report = analyze(&ctx, &Heuristics::default());

    let source_of = |id: &str| report.danger_sources.iter().find(|s| s.node_id == id);
    assert_eq!(
        source_of("predator1").map(|s| s.danger_type),
        Some(DangerType::ConvictedPredator)
    );
    assert_eq!(
        source_of("targeting1").map(|s| s.danger_type),
        Some(DangerType::HighKidTargeting)
    );

    let kid1 = report
        .kids_in_danger_pull
        .iter()
        .find(|r| r.kid == "kid1")
        .expect("kid1 should be in danger pull");
    assert_eq!(kid1.risk_level, RiskLevel::Critical);
    assert!(kid1.has_flag(PullFlag::DirectConvictedConnection));
    assert!(!kid1.immediate_dangers.is_empty());
}

#[test]
fn unreachable_kid_is_not_in_pull() {
    let ctx = fixture_scenario().build();
    let report = analyze(&ctx, &Heuristics::default());
    assert!(report.kids_in_danger_pull.iter().all(|r| r.kid != "kid5"));
}

#[test]
fn isolated_kid_with_no_adults_is_not_in_pull() {
    let ctx = fixture_scenario().kid("alone").build();
    let report = analyze(&ctx, &Heuristics::default());
    assert!(report.kids_in_danger_pull.iter().all(|r| r.kid != "alone"));
    assert_eq!(report.safety_scores["alone"].score, 0.3);
}

#[test]
fn critical_kid_yields_intervention_recommendation() {
    let ctx = fixture_scenario().build();
    let report = analyze(&ctx, &Heuristics::default());
    let first = &report.recommendations[0];
    assert_eq!(first.priority, safeguard_common::Severity::Critical);
    assert!(first.message.contains("kid"));
}

// ---------------------------------------------------------------------------
// Input errors
// ---------------------------------------------------------------------------

#[test]
fn missing_graph_is_an_input_error() {
    let dir = TempDir::new().unwrap();
    let err = AnalysisContext::load(&dir.path().join("nope.json"), &dir.path().join("a.json"))
        .unwrap_err();
    assert!(matches!(err, SafeguardError::Input(_)));
}

#[test]
fn malformed_annotations_are_an_input_error() {
    let dir = TempDir::new().unwrap();
    let (graph_path, annotations_path) = write_fixture(&dir);
    std::fs::write(&annotations_path, "{not json").unwrap();
    let err = AnalysisContext::load(&graph_path, &annotations_path).unwrap_err();
    assert!(matches!(err, SafeguardError::Input(msg) if msg.contains("malformed")));
}
