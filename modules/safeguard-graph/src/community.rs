//! Community detection by greedy local moves and bridge-node discovery.
//!
//! The score a node gets for a community is the share of its neighbors already
//! in that community. This is a local proxy only; there is no null-model term,
//! so results differ from true modularity optimization.

use std::collections::{BTreeMap, BTreeSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use safeguard_common::{BridgeNode, Community, Heuristics};

use crate::context::AnalysisContext;

const TOP_INFLUENTIAL: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InfluentialNode {
    pub node: String,
    pub name: String,
    pub pagerank: f64,
    pub degree: usize,
    pub betweenness: f64,
    pub community: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommunityAnalysis {
    pub communities: Vec<Community>,
    pub bridge_nodes: Vec<BridgeNode>,
    pub influential_nodes: Vec<InfluentialNode>,
    pub overlapping_nodes: Vec<BridgeNode>,
    pub insights: Vec<String>,
}

fn share_in(ctx: &AnalysisContext, assignment: &[usize], node: usize, community: usize) -> f64 {
    let inside = ctx
        .neighbors(node)
        .iter()
        .filter(|&&n| assignment[n] == community)
        .count();
    inside as f64 / ctx.degree(node) as f64
}

/// Raw community label per node after the local-move passes.
pub fn detect_communities(ctx: &AnalysisContext, max_passes: usize) -> Vec<usize> {
    let mut assignment: Vec<usize> = (0..ctx.node_count()).collect();

    for pass in 0..max_passes {
        let mut moved = 0usize;
        for node in 0..ctx.node_count() {
            if ctx.degree(node) == 0 {
                continue;
            }
            let current = assignment[node];
            let current_score = share_in(ctx, &assignment, node, current);

            let candidates: BTreeSet<usize> =
                ctx.neighbors(node).iter().map(|&n| assignment[n]).collect();
            // Ascending scan with `>=`: ties go to the highest label.
            let best = candidates
                .into_iter()
                .map(|c| (c, share_in(ctx, &assignment, node, c)))
                .fold(None, |best: Option<(usize, f64)>, (c, score)| match best {
                    Some((_, top)) if score < top => best,
                    _ => Some((c, score)),
                });
            if let Some((community, score)) = best {
                if community != current && score > current_score {
                    assignment[node] = community;
                    moved += 1;
                }
            }
        }
        debug!(pass, moved, "Community pass complete");
        if moved == 0 {
            break;
        }
    }

    assignment
}

/// Group raw labels, drop groups below `min_size` and renumber the rest in
/// order of their lowest member. Returns the communities (largest first) and
/// each node's surviving community id.
fn finalize(
    ctx: &AnalysisContext,
    assignment: &[usize],
    min_size: usize,
) -> (Vec<Community>, Vec<Option<usize>>) {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (node, &label) in assignment.iter().enumerate() {
        groups.entry(label).or_default().push(node);
    }
    let mut survivors: Vec<Vec<usize>> = groups
        .into_values()
        .filter(|members| members.len() >= min_size)
        .collect();
    survivors.sort_by_key(|members| members[0]);

    let mut membership = vec![None; ctx.node_count()];
    let mut communities: Vec<Community> = survivors
        .into_iter()
        .enumerate()
        .map(|(id, members)| {
            for &m in &members {
                membership[m] = Some(id);
            }
            Community {
                id,
                size: members.len(),
                members: members.iter().map(|&m| ctx.id(m).to_string()).collect(),
            }
        })
        .collect();
    communities.sort_by(|a, b| b.size.cmp(&a.size));
    (communities, membership)
}

/// Nodes whose neighborhood touches at least two surviving communities,
/// counting the node's own. Sorted by score, highest first.
pub fn find_bridges(ctx: &AnalysisContext, membership: &[Option<usize>]) -> Vec<BridgeNode> {
    let mut bridges: Vec<(usize, BridgeNode)> = (0..ctx.node_count())
        .filter_map(|node| {
            let own = membership[node];
            let spanned: BTreeSet<usize> = ctx
                .neighbors(node)
                .iter()
                .filter_map(|&n| membership[n])
                .chain(own)
                .collect();
            if spanned.len() < 2 {
                return None;
            }
            let connected_communities: Vec<usize> =
                spanned.iter().copied().filter(|&c| Some(c) != own).collect();
            Some((
                node,
                BridgeNode {
                    node_id: ctx.id(node).to_string(),
                    name: ctx.name(node).to_string(),
                    own_community: own,
                    bridge_score: spanned.len() as f64 / ctx.degree(node) as f64,
                    connected_communities,
                },
            ))
        })
        .collect();

    bridges.sort_by(|(ia, a), (ib, b)| b.bridge_score.total_cmp(&a.bridge_score).then(ia.cmp(ib)));
    bridges.into_iter().map(|(_, b)| b).collect()
}

fn influential_nodes(ctx: &AnalysisContext, membership: &[Option<usize>]) -> Vec<InfluentialNode> {
    let mut ranked: Vec<usize> = (0..ctx.node_count()).collect();
    ranked.sort_by(|&a, &b| {
        let (na, nb) = (ctx.node(a), ctx.node(b));
        nb.pagerank
            .total_cmp(&na.pagerank)
            .then(ctx.degree(b).cmp(&ctx.degree(a)))
            .then(na.id.cmp(&nb.id))
    });
    ranked
        .into_iter()
        .take(TOP_INFLUENTIAL)
        .map(|idx| {
            let node = ctx.node(idx);
            InfluentialNode {
                node: node.id.clone(),
                name: node.name.clone(),
                pagerank: node.pagerank,
                degree: ctx.degree(idx),
                betweenness: node.betweenness,
                community: membership[idx],
            }
        })
        .collect()
}

fn insights(
    ctx: &AnalysisContext,
    communities: &[Community],
    bridges: &[BridgeNode],
    overlapping: &[BridgeNode],
) -> Vec<String> {
    let mut insights = Vec::new();

    match communities.first() {
        Some(largest) => insights.push(format!(
            "Detected {} communities; the largest has {} members",
            communities.len(),
            largest.size
        )),
        None => insights.push("No communities detected".to_string()),
    }
    if let Some(top) = bridges.first() {
        insights.push(format!(
            "{} bridge nodes connect communities; strongest is {} (score {:.2})",
            bridges.len(),
            top.name,
            top.bridge_score
        ));
    }
    if !overlapping.is_empty() {
        insights.push(format!(
            "{} nodes sit in the overlap of several communities",
            overlapping.len()
        ));
    }
    if ctx.node_count() > 0 {
        let clustered: usize = communities.iter().map(|c| c.size).sum();
        let unclustered = ctx.node_count() - clustered;
        insights.push(format!(
            "{:.0}% of nodes are not part of any community",
            unclustered as f64 / ctx.node_count() as f64 * 100.0
        ));
    }

    insights
}

pub fn analyze_communities(ctx: &AnalysisContext, h: &Heuristics) -> CommunityAnalysis {
    let assignment = detect_communities(ctx, h.community_max_passes);
    let (communities, membership) = finalize(ctx, &assignment, h.community_min_size);
    let bridge_nodes = find_bridges(ctx, &membership);
    let overlapping_nodes: Vec<BridgeNode> = bridge_nodes
        .iter()
        .filter(|b| b.connected_communities.len() >= 2)
        .cloned()
        .collect();
    let influential_nodes = influential_nodes(ctx, &membership);
    let insights = insights(ctx, &communities, &bridge_nodes, &overlapping_nodes);

    debug!(
        communities = communities.len(),
        bridges = bridge_nodes.len(),
        "Community analysis complete"
    );

    CommunityAnalysis {
        communities,
        bridge_nodes,
        influential_nodes,
        overlapping_nodes,
        insights,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::GraphBuilder;

    fn triangle_pair() -> GraphBuilder {
        GraphBuilder::new()
            .unknown("a1")
            .unknown("a2")
            .unknown("a3")
            .unknown("b1")
            .unknown("b2")
            .unknown("b3")
            .edge("a1", "a2")
            .edge("a2", "a3")
            .edge("a1", "a3")
            .edge("b1", "b2")
            .edge("b2", "b3")
            .edge("b1", "b3")
            .edge("a3", "b1")
    }

    #[test]
    fn triangles_stay_separate() {
        let ctx = triangle_pair().build();
        let assignment = detect_communities(&ctx, 10);
        assert_eq!(assignment[0], assignment[1]);
        assert_eq!(assignment[1], assignment[2]);
        assert_eq!(assignment[3], assignment[4]);
        assert_ne!(assignment[2], assignment[3]);
    }

    #[test]
    fn connecting_endpoints_are_top_bridges() {
        let analysis = analyze_communities(&triangle_pair().build(), &Heuristics::default());
        assert_eq!(analysis.communities.len(), 2);
        let top: Vec<&str> = analysis
            .bridge_nodes
            .iter()
            .take(2)
            .map(|b| b.node_id.as_str())
            .collect();
        assert_eq!(top, vec!["a3", "b1"]);
        assert!((analysis.bridge_nodes[0].bridge_score - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(analysis.bridge_nodes[0].connected_communities.len(), 1);
        assert!(analysis.overlapping_nodes.is_empty());
    }

    #[test]
    fn singletons_are_discarded() {
        let ctx = GraphBuilder::new()
            .unknown("solo")
            .unknown("x")
            .unknown("y")
            .edge("x", "y")
            .build();
        let analysis = analyze_communities(&ctx, &Heuristics::default());
        assert_eq!(analysis.communities.len(), 1);
        assert_eq!(analysis.communities[0].members, vec!["x", "y"]);
        assert_eq!(analysis.communities[0].id, 0);
    }

    #[test]
    fn influential_by_pagerank_then_degree() {
        let ctx = GraphBuilder::new()
            .unknown("low")
            .unknown("high")
            .unknown("hub")
            .unknown("leaf")
            .pagerank("high", 0.9)
            .pagerank("hub", 0.5)
            .pagerank("leaf", 0.5)
            .star("hub", &["low", "leaf"])
            .build();
        let analysis = analyze_communities(&ctx, &Heuristics::default());
        let order: Vec<&str> = analysis
            .influential_nodes
            .iter()
            .map(|n| n.node.as_str())
            .collect();
        assert_eq!(order, vec!["high", "hub", "leaf", "low"]);
    }

    #[test]
    fn hub_touching_three_communities_overlaps() {
        let ctx = GraphBuilder::new()
            .unknown("hub")
            .unknown("a")
            .unknown("b")
            .unknown("c")
            .star("hub", &["a", "b", "c"])
            .build();
        let membership = vec![None, Some(0), Some(1), Some(2)];
        let bridges = find_bridges(&ctx, &membership);
        assert_eq!(bridges.len(), 1);
        assert_eq!(bridges[0].node_id, "hub");
        assert_eq!(bridges[0].own_community, None);
        assert_eq!(bridges[0].connected_communities, vec![0, 1, 2]);
        assert_eq!(bridges[0].bridge_score, 1.0);
    }

    #[test]
    fn empty_graph() {
        let analysis = analyze_communities(&GraphBuilder::new().build(), &Heuristics::default());
        assert!(analysis.communities.is_empty());
        assert!(analysis.bridge_nodes.is_empty());
        assert_eq!(analysis.insights, vec!["No communities detected".to_string()]);
    }
}
