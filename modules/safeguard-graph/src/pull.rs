//! Gravitational pull: how strongly each kid is drawn toward danger sources.
//!
//! For one kid and one source at hop distance `d` (within `max_distance`):
//!
//!   pull = base_pull_strength * decay^(d - 1)
//!
//! A kid's total is the plain sum over reachable sources; when two or more
//! sources contribute, the *sum* is multiplied by the network amplifier.
//! Amplifying after summing (rather than per source) makes multi-source
//! exposure super-linear and is observable in the output, so it is kept.

use std::collections::HashSet;

use tracing::debug;

use safeguard_common::{
    DangerSource, DangerType, EscapeRoute, EscapeRouteType, Heuristics, PullFlag, PullRecord,
    PullSource, RiskLevel,
};

use crate::classify::Classification;
use crate::context::AnalysisContext;
use crate::danger::{resolve_sources, ResolvedSource};
use crate::traverse::bounded_distances;

/// Pull contributed by a source of `strength` at `distance` hops.
pub fn decayed_pull(strength: f64, distance: u32, decay: f64) -> f64 {
    strength * decay.powi(distance.saturating_sub(1) as i32)
}

pub fn pull_risk_level(total_pull: f64, h: &Heuristics) -> RiskLevel {
    if total_pull > h.critical_pull {
        RiskLevel::Critical
    } else if total_pull > h.high_pull {
        RiskLevel::High
    } else {
        RiskLevel::Medium
    }
}

/// Compute pull records for every kid whose total pull exceeds the reporting
/// cutoff. Records are ordered by total pull, strongest first.
pub fn compute_pull(
    ctx: &AnalysisContext,
    classes: &Classification,
    sources: &[DangerSource],
    h: &Heuristics,
) -> Vec<PullRecord> {
    let resolved = resolve_sources(ctx, sources);
    let source_nodes: HashSet<usize> = resolved.iter().map(|s| s.idx).collect();

    let mut records: Vec<PullRecord> = classes
        .kids()
        .filter_map(|kid| pull_for_kid(ctx, classes, &resolved, &source_nodes, kid, h))
        .collect();

    records.sort_by(|a, b| b.total_pull.total_cmp(&a.total_pull));
    debug!(kids_in_pull = records.len(), "Pull propagation complete");
    records
}

fn pull_for_kid(
    ctx: &AnalysisContext,
    classes: &Classification,
    sources: &[ResolvedSource<'_>],
    source_nodes: &HashSet<usize>,
    kid: usize,
    h: &Heuristics,
) -> Option<PullRecord> {
    let distances = bounded_distances(ctx, kid, h.max_distance);

    let mut pull_sources: Vec<PullSource> = sources
        .iter()
        .filter(|s| s.idx != kid)
        .filter_map(|s| {
            let &distance = distances.get(&s.idx)?;
            Some(PullSource {
                source: s.source.node_id.clone(),
                name: s.source.name.clone(),
                danger_type: s.source.danger_type,
                distance,
                pull_strength: decayed_pull(s.source.base_pull_strength, distance, h.decay),
            })
        })
        .collect();

    let mut total_pull: f64 = pull_sources.iter().map(|p| p.pull_strength).sum();
    if pull_sources.len() >= 2 {
        total_pull *= h.network_amplifier;
    }
    if total_pull <= h.min_reported_pull {
        return None;
    }

    pull_sources.sort_by(|a, b| b.pull_strength.total_cmp(&a.pull_strength));
    let immediate_dangers: Vec<PullSource> = pull_sources
        .iter()
        .filter(|p| p.distance == 1)
        .cloned()
        .collect();

    let flags = pull_flags(total_pull, &pull_sources, &immediate_dangers, h);
    let escape_routes = escape_routes(ctx, classes, sources, source_nodes, kid, h);

    Some(PullRecord {
        kid: ctx.id(kid).to_string(),
        name: ctx.name(kid).to_string(),
        total_pull,
        risk_level: pull_risk_level(total_pull, h),
        pull_sources,
        flags,
        immediate_dangers,
        escape_routes,
    })
}

fn pull_flags(
    total_pull: f64,
    pull_sources: &[PullSource],
    immediate: &[PullSource],
    h: &Heuristics,
) -> Vec<PullFlag> {
    let mut flags = Vec::new();

    if total_pull > h.extreme_pull_flag {
        flags.push(PullFlag::ExtremePull);
    } else if total_pull > h.high_pull_flag {
        flags.push(PullFlag::HighPull);
    }

    let convicted = |p: &PullSource| p.danger_type == DangerType::ConvictedPredator;
    if pull_sources.iter().any(convicted) {
        flags.push(PullFlag::ConvictedPredatorInNetwork);
    }
    if immediate.iter().any(convicted) {
        flags.push(PullFlag::DirectConvictedConnection);
    }
    if pull_sources.iter().filter(|p| p.danger_type.is_predator()).count() > 2 {
        flags.push(PullFlag::MultiplePredatorExposure);
    }
    if immediate.len() > 1 {
        flags.push(PullFlag::MultipleImmediateDangers);
    }

    flags
}

/// Sum of `strength / distance` over every source within `hops` of `node`.
fn exposure(
    ctx: &AnalysisContext,
    sources: &[ResolvedSource<'_>],
    node: usize,
    hops: u32,
) -> f64 {
    let distances = bounded_distances(ctx, node, hops);
    sources
        .iter()
        .filter_map(|s| {
            let &d = distances.get(&s.idx)?;
            (d > 0).then(|| s.source.base_pull_strength / d as f64)
        })
        .sum()
}

/// Direct neighbors a kid could lean on: non-convicted adults with low exposure
/// and other kids, least exposed first. Danger sources never qualify.
fn escape_routes(
    ctx: &AnalysisContext,
    classes: &Classification,
    sources: &[ResolvedSource<'_>],
    source_nodes: &HashSet<usize>,
    kid: usize,
    h: &Heuristics,
) -> Vec<EscapeRoute> {
    let mut routes: Vec<EscapeRoute> = ctx
        .neighbors(kid)
        .iter()
        .filter(|n| !source_nodes.contains(n))
        .filter_map(|&n| {
            let class = classes.class(n);
            let route_type = if class.is_kid() {
                EscapeRouteType::PeerKid
            } else if class.is_adult() && !class.convicted {
                EscapeRouteType::SafeAdult
            } else {
                return None;
            };
            let exposure = exposure(ctx, sources, n, h.escape_hops);
            if route_type == EscapeRouteType::SafeAdult && exposure >= h.safe_exposure {
                return None;
            }
            Some(EscapeRoute {
                node: ctx.id(n).to_string(),
                name: ctx.name(n).to_string(),
                route_type,
                exposure,
            })
        })
        .collect();

    routes.sort_by(|a, b| a.exposure.total_cmp(&b.exposure));
    routes
}
