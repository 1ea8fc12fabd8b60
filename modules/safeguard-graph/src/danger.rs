//! Rule-based danger sources and their base pull strengths.

use tracing::debug;

use safeguard_common::{DangerSource, DangerType, Heuristics, RiskLevel};

use crate::classify::Classification;
use crate::context::AnalysisContext;

/// Danger sources resolved to node indices, for the propagation passes.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedSource<'a> {
    pub idx: usize,
    pub source: &'a DangerSource,
}

pub fn resolve_sources<'a>(
    ctx: &AnalysisContext,
    sources: &'a [DangerSource],
) -> Vec<ResolvedSource<'a>> {
    sources
        .iter()
        .filter_map(|source| {
            ctx.index_of(&source.node_id)
                .map(|idx| ResolvedSource { idx, source })
        })
        .collect()
}

fn level_amplifier(level: RiskLevel, h: &Heuristics) -> f64 {
    match level {
        RiskLevel::Critical => h.critical_amplifier,
        RiskLevel::High => h.high_amplifier,
        RiskLevel::Medium => h.medium_amplifier,
    }
}

/// Apply the level amplifier and any extra multiplier, then clamp to 1.0.
fn final_strength(raw: f64, level: RiskLevel, extra: f64, h: &Heuristics) -> f64 {
    (raw * level_amplifier(level, h) * extra).clamp(0.0, 1.0)
}

fn source(
    ctx: &AnalysisContext,
    idx: usize,
    danger_type: DangerType,
    danger_level: RiskLevel,
    base_pull_strength: f64,
    description: String,
) -> DangerSource {
    DangerSource {
        node_id: ctx.id(idx).to_string(),
        name: ctx.name(idx).to_string(),
        danger_type,
        danger_level,
        base_pull_strength,
        description,
    }
}

fn conviction_description(ctx: &AnalysisContext, idx: usize) -> String {
    let details = ctx.annotation(idx).and_then(|a| a.conviction_details.as_ref());
    match details {
        Some(d) => {
            let parts: Vec<&str> = [
                d.kind.as_deref(),
                d.crime_category.as_deref(),
                d.date.as_deref(),
            ]
            .into_iter()
            .flatten()
            .collect();
            if parts.is_empty() {
                "Confirmed conviction".to_string()
            } else {
                format!("Confirmed conviction ({})", parts.join(", "))
            }
        }
        None => "Confirmed conviction or high-risk annotation".to_string(),
    }
}

/// Scan classified nodes for the four source patterns. A node matching several
/// rules yields one independent record per rule. Sorted by strength, strongest first.
pub fn identify_danger_sources(
    ctx: &AnalysisContext,
    classes: &Classification,
    h: &Heuristics,
) -> Vec<DangerSource> {
    let mut sources = Vec::new();

    for idx in classes.convicted() {
        let level = RiskLevel::Critical;
        sources.push(source(
            ctx,
            idx,
            DangerType::ConvictedPredator,
            level,
            final_strength(h.convicted_strength, level, 1.0, h),
            conviction_description(ctx, idx),
        ));
    }

    for idx in classes.adults() {
        if ctx.degree(idx) < h.targeting_min_connections {
            continue;
        }
        let mix = classes.neighbor_mix(ctx, idx);
        let Some(ratio) = mix.kid_ratio() else {
            continue;
        };
        if ratio < h.targeting_ratio {
            continue;
        }
        let level = if ratio > h.targeting_critical_ratio {
            RiskLevel::Critical
        } else {
            RiskLevel::High
        };
        let extra = if mix.kids > h.mass_targeting_kids {
            h.mass_targeting_boost
        } else {
            1.0
        };
        sources.push(source(
            ctx,
            idx,
            DangerType::HighKidTargeting,
            level,
            final_strength(h.targeting_strength * ratio, level, extra, h),
            format!(
                "Adult with {} kid connections ({:.0}% of categorized friends)",
                mix.kids,
                ratio * 100.0
            ),
        ));
    }

    for idx in classes.aliases() {
        let mix = classes.neighbor_mix(ctx, idx);
        let Some(ratio) = mix.kid_ratio() else {
            continue;
        };
        if ratio < h.alias_ratio {
            continue;
        }
        let level = if ratio > h.alias_high_ratio {
            RiskLevel::High
        } else {
            RiskLevel::Medium
        };
        sources.push(source(
            ctx,
            idx,
            DangerType::AliasPredator,
            level,
            final_strength(h.alias_strength * ratio, level, 1.0, h),
            format!(
                "Suspected alias profile with {} kid connections ({:.0}% kids)",
                mix.kids,
                ratio * 100.0
            ),
        ));
    }

    for idx in classes.adults() {
        let convicted = classes.neighbor_mix(ctx, idx).convicted;
        if convicted < h.associate_min_convicted {
            continue;
        }
        let level = if convicted >= h.associate_high_convicted {
            RiskLevel::High
        } else {
            RiskLevel::Medium
        };
        let extra = if convicted > h.associate_hub_convicted {
            h.associate_hub_boost
        } else {
            1.0
        };
        let raw = h.associate_base_strength + h.associate_step * convicted as f64;
        sources.push(source(
            ctx,
            idx,
            DangerType::PredatorAssociate,
            level,
            final_strength(raw, level, extra, h),
            format!("Adult connected to {convicted} convicted profiles"),
        ));
    }

    sources.sort_by(|a, b| b.base_pull_strength.total_cmp(&a.base_pull_strength));
    debug!(count = sources.len(), "Danger sources identified");
    sources
}
