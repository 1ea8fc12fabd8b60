use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use safeguard_common::{
    DangerSource, DangerZone, Heuristics, PullRecord, Recommendation, SafetyScoreEntry,
};

use crate::classify::classify_nodes;
use crate::context::AnalysisContext;
use crate::danger::identify_danger_sources;
use crate::patterns::{
    adults_targeting_kids, alias_networks, convicted_networks, vulnerable_kids, AliasNetwork,
    ConvictedNetwork, TargetingAdult, VulnerableKid,
};
use crate::pull::compute_pull;
use crate::recommend::generate_recommendations;
use crate::safety::score_nodes;
use crate::zones::map_danger_zones;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetadata {
    pub generated_at: DateTime<Utc>,
    pub heuristics_version: u32,
    pub total_nodes: usize,
    pub total_edges: usize,
    pub total_kids: usize,
    pub total_adults: usize,
    pub total_unknown: usize,
    pub convicted_count: usize,
    pub alias_count: usize,
    pub danger_source_count: usize,
    pub kids_in_pull: usize,
}

/// The analysis document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisReport {
    pub metadata: AnalysisMetadata,
    pub adults_targeting_kids: Vec<TargetingAdult>,
    pub vulnerable_kids: Vec<VulnerableKid>,
    pub convicted_networks: Vec<ConvictedNetwork>,
    pub alias_networks: Vec<AliasNetwork>,
    pub kids_in_danger_pull: Vec<PullRecord>,
    pub danger_zones: Vec<DangerZone>,
    pub danger_sources: Vec<DangerSource>,
    pub safety_scores: BTreeMap<String, SafetyScoreEntry>,
    pub recommendations: Vec<Recommendation>,
}

pub fn analyze(ctx: &AnalysisContext, h: &Heuristics) -> AnalysisReport {
    analyze_at(ctx, h, Utc::now())
}

/// Full one-shot analysis stamped with `now`. Everything except the timestamp
/// is a deterministic function of the inputs.
pub fn analyze_at(ctx: &AnalysisContext, h: &Heuristics, now: DateTime<Utc>) -> AnalysisReport {
    let classes = classify_nodes(ctx);
    let danger_sources = identify_danger_sources(ctx, &classes, h);
    let kids_in_danger_pull = compute_pull(ctx, &classes, &danger_sources, h);
    let danger_zones = map_danger_zones(ctx, &classes, &danger_sources, h);
    let safety_scores = score_nodes(ctx, &classes, &danger_sources, &kids_in_danger_pull, h);
    let alias_networks = alias_networks(ctx, &classes);
    let recommendations =
        generate_recommendations(&kids_in_danger_pull, &danger_zones, &alias_networks, &[]);

    let metadata = AnalysisMetadata {
        generated_at: now,
        heuristics_version: h.version,
        total_nodes: ctx.node_count(),
        total_edges: ctx.edge_count(),
        total_kids: classes.kids().count(),
        total_adults: classes.adults().count(),
        total_unknown: classes.unknown().count(),
        convicted_count: classes.convicted().count(),
        alias_count: classes.aliases().count(),
        danger_source_count: danger_sources.len(),
        kids_in_pull: kids_in_danger_pull.len(),
    };

    info!(
        nodes = metadata.total_nodes,
        danger_sources = metadata.danger_source_count,
        kids_in_pull = metadata.kids_in_pull,
        zones = danger_zones.len(),
        "Analysis complete"
    );

    AnalysisReport {
        metadata,
        adults_targeting_kids: adults_targeting_kids(ctx, &classes, h),
        vulnerable_kids: vulnerable_kids(ctx, &classes, &danger_sources, h),
        convicted_networks: convicted_networks(ctx, &classes, h),
        alias_networks,
        kids_in_danger_pull,
        danger_zones,
        danger_sources,
        safety_scores,
        recommendations,
    }
}
