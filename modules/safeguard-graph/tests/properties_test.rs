//! Properties that must hold for any graph shape.

use safeguard_common::{DangerType, Heuristics};
use safeguard_graph::testutil::{fixture_scenario, GraphBuilder};
use safeguard_graph::{analyze_at, AnalysisContext};

fn mixed_graph() -> GraphBuilder {
    fixture_scenario()
        .alias_adult("alias1")
        .named("alias1", "Sam Lee 1990")
        .kid("kid6")
        .adult("coach")
        .convicted("convicted2")
        .star("alias1", &["kid5", "kid6"])
        .star("coach", &["kid6", "convicted2", "predator1"])
        .edge("kid2", "kid3")
}

fn graphs() -> Vec<AnalysisContext> {
    vec![
        GraphBuilder::new().build(),
        GraphBuilder::new().kid("solo").build(),
        fixture_scenario().build(),
        mixed_graph().build(),
    ]
}

#[test]
fn scores_are_bounded_and_pull_non_negative() {
    let h = Heuristics::default();
    for ctx in graphs() {
        let report = analyze_at(&ctx, &h, chrono::Utc::now());
        for entry in report.safety_scores.values() {
            assert!((0.0..=1.0).contains(&entry.score), "score {}", entry.score);
        }
        for record in &report.kids_in_danger_pull {
            assert!(record.total_pull >= 0.0);
        }
        for source in &report.danger_sources {
            assert!((0.0..=1.0).contains(&source.base_pull_strength));
        }
    }
}

#[test]
fn analysis_is_idempotent() {
    let h = Heuristics::default();
    let now = chrono::Utc::now();
    for ctx in graphs() {
        let first = analyze_at(&ctx, &h, now);
        let second = analyze_at(&ctx, &h, now);
        assert_eq!(first.danger_sources, second.danger_sources);
        assert_eq!(first.kids_in_danger_pull, second.kids_in_danger_pull);
        assert_eq!(first.safety_scores, second.safety_scores);
        assert_eq!(first, second);
    }
}

#[test]
fn empty_graph_produces_empty_report() {
    let ctx = GraphBuilder::new().build();
    let report = analyze_at(&ctx, &Heuristics::default(), chrono::Utc::now());
    assert_eq!(report.metadata.total_nodes, 0);
    assert!(report.danger_sources.is_empty());
    assert!(report.kids_in_danger_pull.is_empty());
    assert!(report.danger_zones.is_empty());
    assert!(report.safety_scores.is_empty());
    assert!(report.recommendations.is_empty());
}

#[test]
fn more_convicted_neighbors_never_weaken_an_associate() {
    let h = Heuristics::default();
    let mut builder = GraphBuilder::new()
        .adult("hub")
        .kid("k")
        .edge("hub", "k")
        .convicted("c0")
        .convicted("c1")
        .star("hub", &["c0", "c1"]);

    let mut last_strength = 0.0;
    let mut last_pull = 0.0;
    for i in 2..7 {
        let ctx = builder.build();
        let report = analyze_at(&ctx, &h, chrono::Utc::now());
        let strength = report
            .danger_sources
            .iter()
            .find(|s| s.node_id == "hub" && s.danger_type == DangerType::PredatorAssociate)
            .map(|s| s.base_pull_strength)
            .unwrap();
        let pull = report
            .kids_in_danger_pull
            .iter()
            .find(|r| r.kid == "k")
            .map(|r| r.total_pull)
            .unwrap();
        assert!(strength >= last_strength, "strength fell at {i}");
        assert!(pull >= last_pull, "pull fell at {i}");
        last_strength = strength;
        last_pull = pull;

        let id = format!("c{i}");
        builder = builder.convicted(&id).edge("hub", &id);
    }
}

#[test]
fn convicted_adult_neighbors_never_weaken_a_targeting_adult() {
    let h = Heuristics::default();
    let strongest = |builder: &GraphBuilder| {
        analyze_at(&builder.build(), &h, chrono::Utc::now())
            .danger_sources
            .iter()
            .filter(|s| s.node_id == "hub")
            .map(|s| s.base_pull_strength)
            .fold(0.0_f64, f64::max)
    };
    let kid_pull = |builder: &GraphBuilder| {
        analyze_at(&builder.build(), &h, chrono::Utc::now())
            .kids_in_danger_pull
            .iter()
            .find(|r| r.kid == "k1")
            .map(|r| r.total_pull)
            .unwrap_or(0.0)
    };

    let mut builder = GraphBuilder::new()
        .adult("hub")
        .kid("k1")
        .kid("k2")
        .kid("k3")
        .kid("k4")
        .kid("k5")
        .star("hub", &["k1", "k2", "k3", "k4", "k5"]);
    let mut last_strength = strongest(&builder);
    let mut last_pull = kid_pull(&builder);
    assert!((last_strength - 0.96).abs() < 1e-9);

    for i in 0..4 {
        let id = format!("p{i}");
        builder = builder.convicted_adult(&id).edge("hub", &id);
        let strength = strongest(&builder);
        let pull = kid_pull(&builder);
        assert!(strength >= last_strength, "strength fell after {id}");
        assert!(pull >= last_pull, "pull fell after {id}");
        last_strength = strength;
        last_pull = pull;
    }
}
