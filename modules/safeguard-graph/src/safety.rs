//! Per-node safety scores in [0, 1] with the factors behind each adjustment.

use std::collections::{BTreeMap, HashMap};

use safeguard_common::{
    DangerSource, Heuristics, PullFlag, PullRecord, SafetyLevel, SafetyScoreEntry,
};

use crate::classify::Classification;
use crate::context::AnalysisContext;
use crate::traverse::distance_to_nearest;

const BASELINE: f64 = 0.5;
const KID_BASELINE: f64 = 0.3;

/// Hops searched for the nearest convicted node.
const CONVICTED_PROXIMITY_HOPS: u32 = 2;

/// Score every node in [0, 1]; higher is safer. Each adjustment is recorded
/// as a factor string.
pub fn score_nodes(
    ctx: &AnalysisContext,
    classes: &Classification,
    sources: &[DangerSource],
    pull: &[PullRecord],
    h: &Heuristics,
) -> BTreeMap<String, SafetyScoreEntry> {
    let pull_by_kid: HashMap<&str, &PullRecord> =
        pull.iter().map(|r| (r.kid.as_str(), r)).collect();

    // Strongest record when a node is a source under several rules.
    let mut source_strength: HashMap<&str, f64> = HashMap::new();
    for s in sources {
        let entry = source_strength.entry(s.node_id.as_str()).or_insert(0.0);
        *entry = entry.max(s.base_pull_strength);
    }

    (0..ctx.node_count())
        .map(|idx| {
            let class = classes.class(idx);
            let id = ctx.id(idx);
            let mut score = BASELINE;
            let mut factors = Vec::new();

            if class.is_kid() {
                score = KID_BASELINE;
                factors.push(format!("Kid baseline {KID_BASELINE}"));

                let adults = classes.neighbor_mix(ctx, idx).adults;
                if adults > h.vulnerable_adult_connections {
                    score -= 0.2;
                    factors.push(format!("{adults} adult connections"));
                }
                if let Some(record) = pull_by_kid.get(id) {
                    score -= record.total_pull * 0.5;
                    factors.push(format!("In danger pull ({:.2})", record.total_pull));
                    if !record.immediate_dangers.is_empty() {
                        score -= 0.3;
                        factors.push(format!(
                            "{} immediate danger(s)",
                            record.immediate_dangers.len()
                        ));
                    }
                    if record.has_flag(PullFlag::DirectConvictedConnection) {
                        score -= 0.4;
                        factors.push("Direct connection to convicted profile".to_string());
                    }
                }
            } else if class.is_adult() {
                if let Some(ratio) = classes.neighbor_mix(ctx, idx).kid_ratio() {
                    if ratio > 0.5 {
                        score -= 0.4;
                        factors.push(format!("Kid connection ratio {:.0}%", ratio * 100.0));
                    }
                }
                if let Some(&strength) = source_strength.get(id) {
                    score -= strength * 0.6;
                    factors.push(format!("Danger source (strength {strength:.2})"));
                }
            }

            let annotation = ctx.annotation(idx);
            if annotation.is_some_and(|a| a.is_confirmed_conviction()) {
                score -= 0.5;
                factors.push("Confirmed conviction".to_string());
            } else if annotation.is_some_and(|a| a.is_high_risk()) {
                score -= 0.3;
                factors.push("High risk annotation".to_string());
            }

            let nearest = distance_to_nearest(ctx, idx, CONVICTED_PROXIMITY_HOPS, |n| {
                classes.class(n).convicted
            });
            if let Some(d) = nearest {
                score -= (3 - d) as f64 * 0.1;
                factors.push(format!("Convicted profile {d} hop(s) away"));
            }

            if class.suspected_alias {
                score -= 0.2;
                factors.push("Suspected alias profile".to_string());
            }

            let score = score.clamp(0.0, 1.0);
            (
                id.to_string(),
                SafetyScoreEntry {
                    score,
                    level: SafetyLevel::from_score(score),
                    factors,
                },
            )
        })
        .collect()
}
