//! Danger-pattern reports included in the analysis document.

use std::collections::{BTreeSet, HashSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use safeguard_common::{ConvictionDetails, DangerSource, Heuristics, RiskLevel};

use crate::classify::Classification;
use crate::context::AnalysisContext;
use crate::traverse::explore_cluster;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetingAdult {
    pub node: String,
    pub name: String,
    pub kid_connections: usize,
    pub adult_connections: usize,
    pub total_connections: usize,
    pub kid_ratio: f64,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VulnerableKid {
    pub node: String,
    pub name: String,
    pub adult_connections: usize,
    pub risk_factors: Vec<String>,
    pub risk_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConvictedNetwork {
    pub epicenter: String,
    pub name: String,
    pub conviction_details: Option<ConvictionDetails>,
    pub direct_connections: usize,
    pub kids_in_network: usize,
    pub network_size: usize,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AliasNetwork {
    pub members: Vec<String>,
    pub kid_connections: usize,
    pub size: usize,
}

const CONVICTED_NEIGHBOR_WEIGHT: f64 = 0.4;
const ALIAS_NEIGHBOR_WEIGHT: f64 = 0.2;
const SOURCE_NEIGHBOR_WEIGHT: f64 = 0.3;
const MANY_ADULTS_WEIGHT: f64 = 0.2;

pub fn adults_targeting_kids(
    ctx: &AnalysisContext,
    classes: &Classification,
    h: &Heuristics,
) -> Vec<TargetingAdult> {
    let mut found: Vec<TargetingAdult> = classes
        .adults()
        .filter(|&idx| ctx.degree(idx) >= h.targeting_min_connections)
        .filter_map(|idx| {
            let mix = classes.neighbor_mix(ctx, idx);
            let ratio = mix.kid_ratio()?;
            if ratio < h.targeting_ratio {
                return None;
            }
            Some(TargetingAdult {
                node: ctx.id(idx).to_string(),
                name: ctx.name(idx).to_string(),
                kid_connections: mix.kids,
                adult_connections: mix.adults,
                total_connections: ctx.degree(idx),
                kid_ratio: ratio,
                risk_level: if ratio > h.targeting_critical_ratio {
                    RiskLevel::Critical
                } else {
                    RiskLevel::High
                },
            })
        })
        .collect();

    found.sort_by(|a, b| {
        b.kid_ratio
            .total_cmp(&a.kid_ratio)
            .then(b.kid_connections.cmp(&a.kid_connections))
    });
    found
}

pub fn vulnerable_kids(
    ctx: &AnalysisContext,
    classes: &Classification,
    sources: &[DangerSource],
    h: &Heuristics,
) -> Vec<VulnerableKid> {
    let source_ids: HashSet<&str> = sources.iter().map(|s| s.node_id.as_str()).collect();

    let mut found: Vec<VulnerableKid> = classes
        .kids()
        .filter_map(|idx| {
            let mix = classes.neighbor_mix(ctx, idx);
            let mut risk_factors = Vec::new();
            let mut risk_score = 0.0;

            if mix.adults > h.vulnerable_adult_connections {
                risk_factors.push(format!("{} adult connections", mix.adults));
                risk_score += MANY_ADULTS_WEIGHT;
            }
            if mix.convicted > 0 {
                risk_factors.push(format!("{} convicted connection(s)", mix.convicted));
                risk_score += CONVICTED_NEIGHBOR_WEIGHT;
            }
            if mix.aliases > 0 {
                risk_factors.push(format!("{} suspected alias connection(s)", mix.aliases));
                risk_score += ALIAS_NEIGHBOR_WEIGHT;
            }
            let source_neighbors = ctx
                .neighbors(idx)
                .iter()
                .filter(|&&n| source_ids.contains(ctx.id(n)))
                .count();
            if source_neighbors > 0 {
                risk_factors.push(format!("{source_neighbors} danger source connection(s)"));
                risk_score += SOURCE_NEIGHBOR_WEIGHT;
            }

            if risk_factors.is_empty() {
                return None;
            }
            Some(VulnerableKid {
                node: ctx.id(idx).to_string(),
                name: ctx.name(idx).to_string(),
                adult_connections: mix.adults,
                risk_factors,
                risk_score: f64::min(risk_score, 1.0),
            })
        })
        .collect();

    found.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score));
    found
}

pub fn convicted_networks(
    ctx: &AnalysisContext,
    classes: &Classification,
    h: &Heuristics,
) -> Vec<ConvictedNetwork> {
    classes
        .convicted()
        .map(|idx| {
            let cluster = explore_cluster(ctx, idx, h.network_cluster_depth);
            let members: Vec<usize> = cluster
                .iter()
                .filter(|&&(_, depth)| depth > 0)
                .map(|&(n, _)| n)
                .collect();
            ConvictedNetwork {
                epicenter: ctx.id(idx).to_string(),
                name: ctx.name(idx).to_string(),
                conviction_details: ctx
                    .annotation(idx)
                    .and_then(|a| a.conviction_details.clone()),
                direct_connections: ctx.degree(idx),
                kids_in_network: members.iter().filter(|&&n| classes.class(n).is_kid()).count(),
                network_size: members.len(),
                members: members.iter().map(|&n| ctx.id(n).to_string()).collect(),
            }
        })
        .collect()
}

/// Connected components of the subgraph induced by suspected-alias nodes.
pub fn alias_networks(ctx: &AnalysisContext, classes: &Classification) -> Vec<AliasNetwork> {
    let mut seen = vec![false; ctx.node_count()];
    let mut networks = Vec::new();

    for start in classes.aliases() {
        if seen[start] {
            continue;
        }
        seen[start] = true;
        let mut component = BTreeSet::new();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            component.insert(node);
            for &n in ctx.neighbors(node) {
                if !seen[n] && classes.class(n).suspected_alias {
                    seen[n] = true;
                    stack.push(n);
                }
            }
        }

        let kid_connections: usize = component
            .iter()
            .map(|&n| classes.neighbor_mix(ctx, n).kids)
            .sum();
        if component.len() == 1 && kid_connections == 0 {
            continue;
        }
        networks.push(AliasNetwork {
            size: component.len(),
            members: component.iter().map(|&n| ctx.id(n).to_string()).collect(),
            kid_connections,
        });
    }

    networks.sort_by(|a, b| b.kid_connections.cmp(&a.kid_connections));
    networks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify_nodes;
    use crate::danger::identify_danger_sources;
    use crate::testutil::{fixture_scenario, GraphBuilder};

    #[test]
    fn fixture_patterns() {
        let ctx = fixture_scenario().build();
        let classes = classify_nodes(&ctx);
        let h = Heuristics::default();
        let sources = identify_danger_sources(&ctx, &classes, &h);

        let targeting = adults_targeting_kids(&ctx, &classes, &h);
        assert_eq!(targeting.len(), 1);
        assert_eq!(targeting[0].node, "targeting1");
        assert_eq!(targeting[0].kid_connections, 4);
        assert_eq!(targeting[0].total_connections, 5);
        assert_eq!(targeting[0].risk_level, RiskLevel::Critical);

        let vulnerable = vulnerable_kids(&ctx, &classes, &sources, &h);
        assert_eq!(vulnerable[0].node, "kid1");
        // convicted neighbor + danger source neighbor
        assert!((vulnerable[0].risk_score - 0.7).abs() < 1e-9);
        assert!(vulnerable.iter().all(|v| v.node != "kid5"));

        let networks = convicted_networks(&ctx, &classes, &h);
        assert_eq!(networks.len(), 1);
        assert_eq!(networks[0].epicenter, "predator1");
        assert_eq!(networks[0].direct_connections, 1);
        assert_eq!(networks[0].members, vec!["kid1", "targeting1"]);
        assert_eq!(networks[0].kids_in_network, 1);
    }

    #[test]
    fn alias_components_group_connected_aliases() {
        let ctx = GraphBuilder::new()
            .alias_adult("x1")
            .alias_adult("x2")
            .alias_adult("x3")
            .kid("k1")
            .kid("k2")
            .edge("x1", "x2")
            .edge("x1", "k1")
            .edge("x2", "k2")
            .build();
        let classes = classify_nodes(&ctx);
        let networks = alias_networks(&ctx, &classes);
        // x3 is isolated with no kids and is omitted.
        assert_eq!(networks.len(), 1);
        assert_eq!(networks[0].members, vec!["x1", "x2"]);
        assert_eq!(networks[0].kid_connections, 2);
        assert_eq!(networks[0].size, 2);
    }
}
