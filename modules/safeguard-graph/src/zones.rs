//! Single-epicenter danger zones around each source.

use tracing::debug;

use safeguard_common::{AffectedNode, DangerSource, DangerZone, Heuristics};

use crate::classify::Classification;
use crate::context::AnalysisContext;
use crate::danger::resolve_sources;
use crate::pull::decayed_pull;
use crate::traverse::bounded_distances;

/// Weight applied to a kid's pull when accumulating the zone risk score.
const KID_WEIGHT: f64 = 2.0;

/// One zone per danger source: every node within `max_distance` hops of the
/// epicenter with its un-amplified pull. Zones are ordered by risk score,
/// affected nodes by pull strength.
pub fn map_danger_zones(
    ctx: &AnalysisContext,
    classes: &Classification,
    sources: &[DangerSource],
    h: &Heuristics,
) -> Vec<DangerZone> {
    let mut zones: Vec<DangerZone> = resolve_sources(ctx, sources)
        .into_iter()
        .map(|resolved| {
            let strength = resolved.source.base_pull_strength;
            let mut reached: Vec<(usize, u32)> =
                bounded_distances(ctx, resolved.idx, h.max_distance)
                    .into_iter()
                    .filter(|&(_, d)| d > 0)
                    .collect();
            // HashMap order is arbitrary; fix it before the stable sort below.
            reached.sort_by_key(|&(idx, d)| (d, idx));

            let mut affected_nodes = Vec::with_capacity(reached.len());
            let mut total_kids_affected = 0;
            let mut zone_risk_score = 0.0;
            for (idx, distance) in reached {
                let pull_strength = decayed_pull(strength, distance, h.decay);
                let is_kid = classes.class(idx).is_kid();
                if is_kid {
                    total_kids_affected += 1;
                    zone_risk_score += pull_strength * KID_WEIGHT;
                } else {
                    zone_risk_score += pull_strength;
                }
                affected_nodes.push(AffectedNode {
                    node: ctx.id(idx).to_string(),
                    distance,
                    pull_strength,
                    is_kid,
                });
            }
            affected_nodes.sort_by(|a, b| b.pull_strength.total_cmp(&a.pull_strength));

            DangerZone {
                epicenter: resolved.source.node_id.clone(),
                epicenter_name: resolved.source.name.clone(),
                danger_type: resolved.source.danger_type,
                affected_nodes,
                total_kids_affected,
                zone_risk_score,
            }
        })
        .collect();

    zones.sort_by(|a, b| b.zone_risk_score.total_cmp(&a.zone_risk_score));
    debug!(zones = zones.len(), "Danger zones mapped");
    zones
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify_nodes;
    use crate::danger::identify_danger_sources;
    use crate::testutil::{fixture_scenario, GraphBuilder};
    use safeguard_common::DangerType;

    fn zones_for(builder: &GraphBuilder) -> Vec<DangerZone> {
        let ctx = builder.build();
        let classes = classify_nodes(&ctx);
        let h = Heuristics::default();
        let sources = identify_danger_sources(&ctx, &classes, &h);
        map_danger_zones(&ctx, &classes, &sources, &h)
    }

    #[test]
    fn zone_weights_kids_double_and_excludes_epicenter() {
        // p - k (1.0, kid) ; p - a (1.0) ; a - k2 (0.6, kid)
        let builder = GraphBuilder::new()
            .convicted_adult("p")
            .kid("k")
            .adult("a")
            .kid("k2")
            .star("p", &["k", "a"])
            .edge("a", "k2");
        let zones = zones_for(&builder);
        assert_eq!(zones.len(), 1);
        let zone = &zones[0];
        assert_eq!(zone.epicenter, "p");
        assert_eq!(zone.affected_nodes.len(), 3);
        assert!(zone.affected_nodes.iter().all(|n| n.node != "p"));
        assert_eq!(zone.total_kids_affected, 2);
        assert!((zone.zone_risk_score - (2.0 + 1.0 + 1.2)).abs() < 1e-9);
        assert_eq!(zone.affected_nodes[2].node, "k2");
        assert_eq!(zone.affected_nodes[2].distance, 2);
    }

    #[test]
    fn zones_sorted_by_risk() {
        let zones = zones_for(&fixture_scenario());
        assert!(zones.len() >= 2);
        assert!(zones
            .windows(2)
            .all(|w| w[0].zone_risk_score >= w[1].zone_risk_score));
        let targeting = zones
            .iter()
            .find(|z| z.danger_type == DangerType::HighKidTargeting)
            .unwrap();
        assert_eq!(targeting.epicenter, "targeting1");
        // kid1..kid4 directly, kid5 is unreachable.
        assert_eq!(targeting.total_kids_affected, 4);
    }

    #[test]
    fn isolated_source_has_empty_zone() {
        let zones = zones_for(&GraphBuilder::new().convicted_adult("p"));
        assert_eq!(zones.len(), 1);
        assert!(zones[0].affected_nodes.is_empty());
        assert_eq!(zones[0].zone_risk_score, 0.0);
    }
}
