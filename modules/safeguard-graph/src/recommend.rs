//! Prioritized follow-up actions derived from an analysis and new alerts.

use safeguard_common::{
    Alert, AlertType, DangerZone, PullRecord, Recommendation, RecommendationType, RiskLevel,
    Severity,
};

use crate::patterns::AliasNetwork;

/// More kids in pull than this triggers an education recommendation.
const EDUCATION_THRESHOLD: usize = 10;
/// Zones reaching at least this many kids are worth watching.
const ZONE_KIDS_THRESHOLD: usize = 3;

fn recommendation(
    priority: Severity,
    recommendation_type: RecommendationType,
    message: String,
    action: &str,
) -> Recommendation {
    Recommendation {
        priority,
        recommendation_type,
        message,
        action: action.to_string(),
    }
}

/// Fixed rules over the current analysis and any alerts raised this cycle.
/// Ordered by priority, most urgent first.
pub fn generate_recommendations(
    kids_in_pull: &[PullRecord],
    zones: &[DangerZone],
    alias_networks: &[AliasNetwork],
    alerts: &[Alert],
) -> Vec<Recommendation> {
    let mut recs = Vec::new();

    let critical: Vec<&str> = kids_in_pull
        .iter()
        .filter(|r| r.risk_level == RiskLevel::Critical)
        .map(|r| r.name.as_str())
        .collect();
    if !critical.is_empty() {
        recs.push(recommendation(
            Severity::Critical,
            RecommendationType::ImmediateIntervention,
            format!(
                "{} kid(s) under critical danger pull: {}",
                critical.len(),
                critical.join(", ")
            ),
            "Contact guardians and review these connections immediately",
        ));
    }

    let new_sources = alerts
        .iter()
        .filter(|a| a.alert_type == AlertType::NewDangerSource)
        .count();
    if new_sources > 0 {
        recs.push(recommendation(
            Severity::High,
            RecommendationType::Investigate,
            format!("{new_sources} new danger source(s) appeared since the last check"),
            "Investigate the new profiles and verify their annotations",
        ));
    }

    let isolated = kids_in_pull
        .iter()
        .filter(|r| r.risk_level >= RiskLevel::High && r.escape_routes.is_empty())
        .count();
    if isolated > 0 {
        recs.push(recommendation(
            Severity::High,
            RecommendationType::StrengthenSupport,
            format!("{isolated} high-risk kid(s) have no safe adult or peer connection"),
            "Connect these kids with trusted adults or peer support",
        ));
    }

    if kids_in_pull.len() > EDUCATION_THRESHOLD {
        recs.push(recommendation(
            Severity::Medium,
            RecommendationType::ExpandEducation,
            format!("{} kids are within reach of danger sources", kids_in_pull.len()),
            "Expand online-safety education for this network",
        ));
    }

    let wide_zones: Vec<&DangerZone> = zones
        .iter()
        .filter(|z| z.total_kids_affected >= ZONE_KIDS_THRESHOLD)
        .collect();
    if let Some(top) = wide_zones.first() {
        recs.push(recommendation(
            Severity::Medium,
            RecommendationType::MonitorZone,
            format!(
                "{} danger zone(s) reach {ZONE_KIDS_THRESHOLD}+ kids; largest risk around {} ({} kids)",
                wide_zones.len(),
                top.epicenter_name,
                top.total_kids_affected
            ),
            "Increase monitoring frequency around these epicenters",
        ));
    }

    let kid_facing_aliases: usize = alias_networks
        .iter()
        .filter(|n| n.kid_connections > 0)
        .count();
    if kid_facing_aliases > 0 {
        recs.push(recommendation(
            Severity::Medium,
            RecommendationType::ReviewAliases,
            format!("{kid_facing_aliases} suspected alias network(s) connect to kids"),
            "Review alias profiles for identity links to known offenders",
        ));
    }

    recs.sort_by(|a, b| b.priority.cmp(&a.priority));
    recs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use safeguard_common::EscapeRoute;

    fn record(kid: &str, total_pull: f64, risk_level: RiskLevel) -> PullRecord {
        PullRecord {
            kid: kid.to_string(),
            name: kid.to_string(),
            total_pull,
            risk_level,
            pull_sources: vec![],
            flags: vec![],
            immediate_dangers: vec![],
            escape_routes: vec![],
        }
    }

    #[test]
    fn nothing_to_recommend() {
        assert!(generate_recommendations(&[], &[], &[], &[]).is_empty());
    }

    #[test]
    fn critical_kid_comes_first() {
        let mut supported = record("k2", 0.4, RiskLevel::Medium);
        supported.escape_routes.push(EscapeRoute {
            node: "p".into(),
            name: "p".into(),
            route_type: safeguard_common::EscapeRouteType::SafeAdult,
            exposure: 0.0,
        });
        let alert = Alert::new(
            AlertType::NewDangerSource,
            Severity::High,
            Utc::now(),
            "new".into(),
            serde_json::json!({}),
        );
        let recs = generate_recommendations(
            &[record("k1", 2.0, RiskLevel::Critical), supported],
            &[],
            &[],
            &[alert],
        );
        assert_eq!(recs[0].recommendation_type, RecommendationType::ImmediateIntervention);
        assert_eq!(recs[0].priority, Severity::Critical);
        assert!(recs
            .iter()
            .any(|r| r.recommendation_type == RecommendationType::Investigate));
        assert!(recs
            .iter()
            .any(|r| r.recommendation_type == RecommendationType::StrengthenSupport));
        assert!(recs.windows(2).all(|w| w[0].priority >= w[1].priority));
    }

    #[test]
    fn many_kids_in_pull_expands_education() {
        let kids: Vec<PullRecord> = (0..11)
            .map(|i| record(&format!("k{i}"), 0.4, RiskLevel::Medium))
            .collect();
        let recs = generate_recommendations(&kids, &[], &[], &[]);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].recommendation_type, RecommendationType::ExpandEducation);
    }
}
