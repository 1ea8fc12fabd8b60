use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use safeguard_common::{Alert, SafeguardError, Snapshot};
use safeguard_graph::{AnalysisReport, CommunityAnalysis};

use crate::store::{commit_all, stage_json, StagedWrite};
use crate::types::MonitorStatus;

pub const ANALYSIS_REPORT_FILE: &str = "analysis-report.json";
pub const COMMUNITY_REPORT_FILE: &str = "community-analysis.json";

const RECENT_ALERTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Trend {
    pub first: usize,
    pub last: usize,
    pub change: i64,
    pub direction: TrendDirection,
}

impl Trend {
    fn between(first: usize, last: usize) -> Self {
        let change = last as i64 - first as i64;
        let direction = match change {
            c if c > 0 => TrendDirection::Increasing,
            c if c < 0 => TrendDirection::Decreasing,
            _ => TrendDirection::Stable,
        };
        Self {
            first,
            last,
            change,
            direction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Trends {
    pub snapshots_analyzed: usize,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub kids_in_pull: Trend,
    pub danger_sources: Trend,
    pub danger_zones: Trend,
    pub total_flags: Trend,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AlertSummary {
    pub total: usize,
    pub by_severity: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
    pub last_24_hours: usize,
}

/// Status plus history-derived analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MonitorReport {
    pub status: MonitorStatus,
    pub trends: Option<Trends>,
    pub alert_summary: AlertSummary,
    pub recent_alerts: Vec<Alert>,
}

/// Compare the oldest and newest retained snapshot. `None` with no history.
pub fn compute_trends(snapshots: &[Snapshot]) -> Option<Trends> {
    let first = snapshots.first()?;
    let last = snapshots.last()?;
    Some(Trends {
        snapshots_analyzed: snapshots.len(),
        period_start: first.timestamp,
        period_end: last.timestamp,
        kids_in_pull: Trend::between(first.kids_in_pull.len(), last.kids_in_pull.len()),
        danger_sources: Trend::between(first.danger_sources.len(), last.danger_sources.len()),
        danger_zones: Trend::between(first.danger_zones.len(), last.danger_zones.len()),
        total_flags: Trend::between(first.total_flags, last.total_flags),
    })
}

pub fn summarize_alerts(alerts: &[Alert], now: DateTime<Utc>) -> AlertSummary {
    let day_ago = now - Duration::hours(24);
    let mut summary = AlertSummary {
        total: alerts.len(),
        ..Default::default()
    };
    for alert in alerts {
        *summary.by_severity.entry(alert.severity.to_string()).or_default() += 1;
        *summary.by_type.entry(alert.alert_type.to_string()).or_default() += 1;
        if alert.timestamp >= day_ago {
            summary.last_24_hours += 1;
        }
    }
    summary
}

/// The newest alerts, newest first.
pub fn recent_alerts(alerts: &[Alert]) -> Vec<Alert> {
    alerts.iter().rev().take(RECENT_ALERTS).cloned().collect()
}

/// Stage the analysis and community documents for `dir` without replacing
/// the current ones.
pub fn stage_documents(
    dir: &Path,
    analysis: &AnalysisReport,
    communities: &CommunityAnalysis,
) -> Result<Vec<StagedWrite>, SafeguardError> {
    Ok(vec![
        stage_json(&dir.join(ANALYSIS_REPORT_FILE), analysis)?,
        stage_json(&dir.join(COMMUNITY_REPORT_FILE), communities)?,
    ])
}

/// Write the analysis and community documents into `dir`.
pub fn save_documents(
    dir: &Path,
    analysis: &AnalysisReport,
    communities: &CommunityAnalysis,
) -> Result<(PathBuf, PathBuf), SafeguardError> {
    let analysis_path = dir.join(ANALYSIS_REPORT_FILE);
    let community_path = dir.join(COMMUNITY_REPORT_FILE);
    commit_all(stage_documents(dir, analysis, communities)?)?;
    info!(
        analysis = %analysis_path.display(),
        communities = %community_path.display(),
        "Analysis documents saved"
    );
    Ok((analysis_path, community_path))
}
