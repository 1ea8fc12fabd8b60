use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use safeguard_common::{Alert, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitorState {
    Idle,
    Running,
    Error,
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Headline counts from the most recent snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CurrentCounts {
    pub danger_sources: usize,
    pub kids_in_pull: usize,
    pub danger_zones: usize,
    pub total_kids: usize,
    pub total_flags: usize,
}

impl From<&Snapshot> for CurrentCounts {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            danger_sources: snapshot.danger_sources.len(),
            kids_in_pull: snapshot.kids_in_pull.len(),
            danger_zones: snapshot.danger_zones.len(),
            total_kids: snapshot.total_kids,
            total_flags: snapshot.total_flags,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MonitorStatus {
    pub state: MonitorState,
    pub scheduled: bool,
    pub interval_minutes: u64,
    pub last_check: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub checks_completed: u64,
    pub checks_failed: u64,
    pub alerts_raised: u64,
    pub current: Option<CurrentCounts>,
    pub snapshot_count: usize,
    pub alert_count: usize,
}

/// Result of one successful monitoring cycle.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub snapshot: Snapshot,
    pub alerts: Vec<Alert>,
    pub stats: CycleStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CycleStats {
    pub danger_sources: usize,
    pub kids_in_pull: usize,
    pub danger_zones: usize,
    pub alerts_raised: usize,
    pub elapsed_ms: u128,
}

impl fmt::Display for CycleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "danger_sources={} kids_in_pull={} danger_zones={} alerts_raised={} elapsed_ms={}",
            self.danger_sources,
            self.kids_in_pull,
            self.danger_zones,
            self.alerts_raised,
            self.elapsed_ms,
        )
    }
}
