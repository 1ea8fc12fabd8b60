use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Annotation category marking a verified conviction.
pub const CONFIRMED_CONVICTION: &str = "confirmed-conviction";

// --- Input documents ---

fn default_depth() -> u32 {
    1
}

/// A person in the connection graph. `id` is the profile URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Discovery distance from a seed profile.
    #[serde(default = "default_depth")]
    pub depth: u32,
    #[serde(default, alias = "profileImage")]
    pub profile_image: Option<String>,
    // Structural metrics computed upstream; read-only here.
    #[serde(default)]
    pub degree: f64,
    #[serde(default)]
    pub pagerank: f64,
    #[serde(default)]
    pub betweenness: f64,
    #[serde(default)]
    pub closeness: f64,
}

impl Node {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            depth: 1,
            profile_image: None,
            degree: 0.0,
            pagerank: 0.0,
            betweenness: 0.0,
            closeness: 0.0,
        }
    }

    pub fn with_profile_image(mut self, url: &str) -> Self {
        self.profile_image = Some(url.to_string());
        self
    }

    pub fn has_profile_image(&self) -> bool {
        self.profile_image
            .as_deref()
            .is_some_and(|img| !img.trim().is_empty())
    }
}

/// Undirected friendship edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Edge {
    pub source: String,
    pub target: String,
}

impl Edge {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Demographic {
    Kids,
    Adult,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for Demographic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Demographic::Kids => write!(f, "kids"),
            Demographic::Adult => write!(f, "adult"),
            Demographic::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RiskTag {
    Low,
    Medium,
    High,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConvictionDetails {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub crime_category: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub jurisdiction: Option<String>,
}

/// Free-form risk annotation keyed by node url. Every field is optional;
/// a missing annotation behaves like an empty one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    #[serde(default)]
    pub demographic: Option<Demographic>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub risk: Option<RiskTag>,
    #[serde(default)]
    pub conviction_details: Option<ConvictionDetails>,
}

impl Annotation {
    pub fn kid() -> Self {
        Self {
            demographic: Some(Demographic::Kids),
            ..Default::default()
        }
    }

    pub fn adult() -> Self {
        Self {
            demographic: Some(Demographic::Adult),
            ..Default::default()
        }
    }

    pub fn convicted(mut self) -> Self {
        self.category = Some(CONFIRMED_CONVICTION.to_string());
        self
    }

    pub fn with_risk(mut self, risk: RiskTag) -> Self {
        self.risk = Some(risk);
        self
    }

    pub fn is_confirmed_conviction(&self) -> bool {
        self.category.as_deref() == Some(CONFIRMED_CONVICTION)
    }

    pub fn is_high_risk(&self) -> bool {
        self.risk == Some(RiskTag::High)
    }
}

// --- Danger sources ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DangerType {
    ConvictedPredator,
    HighKidTargeting,
    AliasPredator,
    PredatorAssociate,
}

impl DangerType {
    /// Associates are risky by proximity; the other three are predator patterns.
    pub fn is_predator(&self) -> bool {
        !matches!(self, DangerType::PredatorAssociate)
    }
}

impl std::fmt::Display for DangerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DangerType::ConvictedPredator => write!(f, "CONVICTED_PREDATOR"),
            DangerType::HighKidTargeting => write!(f, "HIGH_KID_TARGETING"),
            DangerType::AliasPredator => write!(f, "ALIAS_PREDATOR"),
            DangerType::PredatorAssociate => write!(f, "PREDATOR_ASSOCIATE"),
        }
    }
}

/// Three-step level shared by danger sources and pull records.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
            RiskLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DangerSource {
    pub node_id: String,
    pub name: String,
    pub danger_type: DangerType,
    pub danger_level: RiskLevel,
    /// Final strength after amplifiers, clamped to 1.0.
    pub base_pull_strength: f64,
    pub description: String,
}

// --- Pull propagation ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PullSource {
    pub source: String,
    pub name: String,
    pub danger_type: DangerType,
    pub distance: u32,
    pub pull_strength: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PullFlag {
    ExtremePull,
    HighPull,
    ConvictedPredatorInNetwork,
    DirectConvictedConnection,
    MultiplePredatorExposure,
    MultipleImmediateDangers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscapeRouteType {
    SafeAdult,
    PeerKid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EscapeRoute {
    pub node: String,
    pub name: String,
    pub route_type: EscapeRouteType,
    /// Sum of strength/distance to every source within the escape horizon.
    pub exposure: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PullRecord {
    pub kid: String,
    pub name: String,
    /// Amplified sum; may exceed 1.0.
    pub total_pull: f64,
    pub risk_level: RiskLevel,
    pub pull_sources: Vec<PullSource>,
    pub flags: Vec<PullFlag>,
    pub immediate_dangers: Vec<PullSource>,
    pub escape_routes: Vec<EscapeRoute>,
}

impl PullRecord {
    pub fn has_flag(&self, flag: PullFlag) -> bool {
        self.flags.contains(&flag)
    }
}

// --- Danger zones ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AffectedNode {
    pub node: String,
    pub distance: u32,
    pub pull_strength: f64,
    pub is_kid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DangerZone {
    pub epicenter: String,
    pub epicenter_name: String,
    pub danger_type: DangerType,
    pub affected_nodes: Vec<AffectedNode>,
    pub total_kids_affected: usize,
    pub zone_risk_score: f64,
}

// --- Safety scores ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyLevel {
    Safe,
    Caution,
    Danger,
    Critical,
}

impl SafetyLevel {
    pub fn from_score(score: f64) -> Self {
        if score > 0.7 {
            SafetyLevel::Safe
        } else if score > 0.4 {
            SafetyLevel::Caution
        } else if score > 0.2 {
            SafetyLevel::Danger
        } else {
            SafetyLevel::Critical
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SafetyScoreEntry {
    pub score: f64,
    pub level: SafetyLevel,
    pub factors: Vec<String>,
}

// --- Communities ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Community {
    pub id: usize,
    pub members: Vec<String>,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BridgeNode {
    pub node_id: String,
    pub name: String,
    /// None when the node's own community was too small to survive.
    pub own_community: Option<usize>,
    /// Surviving communities among the neighbors, excluding `own_community`.
    pub connected_communities: Vec<usize>,
    pub bridge_score: f64,
}

// --- Monitoring ---

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    NewCriticalKid,
    PullIncrease,
    NewDangerSource,
    ZoneExpansion,
    MonitoringError,
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertType::NewCriticalKid => write!(f, "NEW_CRITICAL_KID"),
            AlertType::PullIncrease => write!(f, "PULL_INCREASE"),
            AlertType::NewDangerSource => write!(f, "NEW_DANGER_SOURCE"),
            AlertType::ZoneExpansion => write!(f, "ZONE_EXPANSION"),
            AlertType::MonitoringError => write!(f, "MONITORING_ERROR"),
        }
    }
}

/// Structured alert handed to the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Alert {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub details: serde_json::Value,
}

impl Alert {
    pub fn new(
        alert_type: AlertType,
        severity: Severity,
        timestamp: DateTime<Utc>,
        message: String,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            alert_type,
            severity,
            timestamp,
            message,
            details,
        }
    }
}

/// Danger source as recorded in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SnapshotSource {
    pub node_id: String,
    pub danger_type: DangerType,
    pub danger_level: RiskLevel,
    pub base_pull_strength: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SnapshotKid {
    pub kid: String,
    pub total_pull: f64,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SnapshotZone {
    pub epicenter: String,
    pub kids_affected: usize,
    pub zone_risk_score: f64,
}

/// One immutable monitoring observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub danger_sources: Vec<SnapshotSource>,
    pub kids_in_pull: Vec<SnapshotKid>,
    pub danger_zones: Vec<SnapshotZone>,
    pub total_kids: usize,
    pub total_flags: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationType {
    ImmediateIntervention,
    Investigate,
    ExpandEducation,
    MonitorZone,
    ReviewAliases,
    StrengthenSupport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Recommendation {
    pub priority: Severity,
    #[serde(rename = "type")]
    pub recommendation_type: RecommendationType,
    pub message: String,
    pub action: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotation_parses_camel_case_fields() {
        let json = r#"{
            "demographic": "adult",
            "category": "confirmed-conviction",
            "risk": "high",
            "convictionDetails": {"type": "felony", "crimeCategory": "abuse", "date": "2019-04-01"}
        }"#;
        let a: Annotation = serde_json::from_str(json).unwrap();
        assert_eq!(a.demographic, Some(Demographic::Adult));
        assert!(a.is_confirmed_conviction());
        assert!(a.is_high_risk());
        let details = a.conviction_details.unwrap();
        assert_eq!(details.kind.as_deref(), Some("felony"));
        assert_eq!(details.crime_category.as_deref(), Some("abuse"));
        assert!(details.jurisdiction.is_none());
    }

    #[test]
    fn unrecognized_demographic_falls_back_to_unknown() {
        let a: Annotation =
            serde_json::from_str(r#"{"demographic": "teen", "risk": "extreme"}"#).unwrap();
        assert_eq!(a.demographic, Some(Demographic::Unknown));
        assert_eq!(a.risk, Some(RiskTag::Unknown));
    }

    #[test]
    fn node_defaults_missing_metrics() {
        let n: Node =
            serde_json::from_str(r#"{"id": "https://fb.example/a", "name": "A"}"#).unwrap();
        assert_eq!(n.depth, 1);
        assert_eq!(n.pagerank, 0.0);
        assert!(!n.has_profile_image());
    }

    #[test]
    fn blank_profile_image_counts_as_missing() {
        let n = Node::new("a", "A").with_profile_image("  ");
        assert!(!n.has_profile_image());
    }

    #[test]
    fn safety_level_thresholds() {
        assert_eq!(SafetyLevel::from_score(0.71), SafetyLevel::Safe);
        assert_eq!(SafetyLevel::from_score(0.7), SafetyLevel::Caution);
        assert_eq!(SafetyLevel::from_score(0.4), SafetyLevel::Danger);
        assert_eq!(SafetyLevel::from_score(0.2), SafetyLevel::Critical);
        assert_eq!(SafetyLevel::from_score(0.0), SafetyLevel::Critical);
    }

    #[test]
    fn severity_orders_and_parses() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Info < Severity::Low);
        assert_eq!("High".parse::<Severity>(), Ok(Severity::High));
        assert!("urgent".parse::<Severity>().is_err());
    }

    #[test]
    fn alert_serializes_type_field() {
        let alert = Alert::new(
            AlertType::NewDangerSource,
            Severity::High,
            Utc::now(),
            "new source".to_string(),
            serde_json::json!({"node": "x"}),
        );
        let v = serde_json::to_value(&alert).unwrap();
        assert_eq!(v["type"], "NEW_DANGER_SOURCE");
        assert_eq!(v["severity"], "HIGH");
    }
}
