//! Snapshot construction and the diff between consecutive snapshots.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;

use safeguard_common::{
    Alert, AlertType, ChangeThresholds, RiskLevel, Severity, Snapshot, SnapshotKid,
    SnapshotSource, SnapshotZone,
};
use safeguard_graph::AnalysisReport;

/// Absorbs float noise so an increase of exactly the threshold still counts.
const EPSILON: f64 = 1e-9;

pub fn build_snapshot(report: &AnalysisReport, timestamp: DateTime<Utc>) -> Snapshot {
    let danger_sources = report
        .danger_sources
        .iter()
        .map(|s| SnapshotSource {
            node_id: s.node_id.clone(),
            danger_type: s.danger_type,
            danger_level: s.danger_level,
            base_pull_strength: s.base_pull_strength,
        })
        .collect();

    let kids_in_pull = report
        .kids_in_danger_pull
        .iter()
        .map(|r| SnapshotKid {
            kid: r.kid.clone(),
            total_pull: r.total_pull,
            risk_level: r.risk_level,
        })
        .collect();

    // One entry per epicenter; zones arrive strongest first.
    let mut seen = HashSet::new();
    let danger_zones = report
        .danger_zones
        .iter()
        .filter(|z| seen.insert(z.epicenter.as_str()))
        .map(|z| SnapshotZone {
            epicenter: z.epicenter.clone(),
            kids_affected: z.total_kids_affected,
            zone_risk_score: z.zone_risk_score,
        })
        .collect();

    Snapshot {
        timestamp,
        danger_sources,
        kids_in_pull,
        danger_zones,
        total_kids: report.metadata.total_kids,
        total_flags: report.kids_in_danger_pull.iter().map(|r| r.flags.len()).sum(),
    }
}

/// Alerts for meaningful change from `previous` to `current`. The first
/// snapshot ever (no `previous`) is a baseline and raises nothing.
pub fn detect_changes(
    previous: Option<&Snapshot>,
    current: &Snapshot,
    thresholds: &ChangeThresholds,
    now: DateTime<Utc>,
) -> Vec<Alert> {
    let Some(previous) = previous else {
        info!("Baseline snapshot recorded, no comparison");
        return Vec::new();
    };

    let mut alerts = Vec::new();

    let was_critical: HashSet<&str> = previous
        .kids_in_pull
        .iter()
        .filter(|k| k.risk_level == RiskLevel::Critical)
        .map(|k| k.kid.as_str())
        .collect();
    for kid in &current.kids_in_pull {
        if kid.risk_level == RiskLevel::Critical && !was_critical.contains(kid.kid.as_str()) {
            alerts.push(Alert::new(
                AlertType::NewCriticalKid,
                Severity::Critical,
                now,
                format!("Kid {} entered critical danger pull", kid.kid),
                json!({ "kid": kid.kid, "totalPull": kid.total_pull }),
            ));
        }
    }

    let previous_pull: HashMap<&str, f64> = previous
        .kids_in_pull
        .iter()
        .map(|k| (k.kid.as_str(), k.total_pull))
        .collect();
    for kid in &current.kids_in_pull {
        let Some(&before) = previous_pull.get(kid.kid.as_str()) else {
            continue;
        };
        let increase = kid.total_pull - before;
        if increase + EPSILON >= thresholds.pull_increase {
            alerts.push(Alert::new(
                AlertType::PullIncrease,
                Severity::High,
                now,
                format!(
                    "Danger pull on kid {} rose from {before:.2} to {:.2}",
                    kid.kid, kid.total_pull
                ),
                json!({
                    "kid": kid.kid,
                    "previous": before,
                    "current": kid.total_pull,
                    "increase": increase,
                }),
            ));
        }
    }

    let known_sources: HashSet<&str> = previous
        .danger_sources
        .iter()
        .map(|s| s.node_id.as_str())
        .collect();
    let mut reported = HashSet::new();
    for source in &current.danger_sources {
        let id = source.node_id.as_str();
        if known_sources.contains(id) || !reported.insert(id) {
            continue;
        }
        alerts.push(Alert::new(
            AlertType::NewDangerSource,
            Severity::High,
            now,
            format!("New danger source identified: {id}"),
            json!({
                "nodeId": id,
                "dangerType": source.danger_type,
                "dangerLevel": source.danger_level,
                "basePullStrength": source.base_pull_strength,
            }),
        ));
    }

    let previous_zones: HashMap<&str, usize> = previous
        .danger_zones
        .iter()
        .map(|z| (z.epicenter.as_str(), z.kids_affected))
        .collect();
    for zone in &current.danger_zones {
        let Some(&before) = previous_zones.get(zone.epicenter.as_str()) else {
            continue;
        };
        let growth = (zone.kids_affected as f64 - before as f64) / before.max(1) as f64;
        if growth + EPSILON >= thresholds.zone_expansion {
            alerts.push(Alert::new(
                AlertType::ZoneExpansion,
                Severity::High,
                now,
                format!(
                    "Danger zone around {} grew from {before} to {} kids",
                    zone.epicenter, zone.kids_affected
                ),
                json!({
                    "epicenter": zone.epicenter,
                    "previous": before,
                    "current": zone.kids_affected,
                    "growth": growth,
                }),
            ));
        }
    }

    alerts
}
