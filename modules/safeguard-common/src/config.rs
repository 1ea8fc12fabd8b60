use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::SafeguardError;
use crate::types::Severity;

/// Bumped whenever a default in [`Heuristics`] changes.
pub const HEURISTICS_VERSION: u32 = 1;

/// Named heuristic constants used by the analysis engine.
///
/// Every threshold, decay and multiplier the analytics use lives here so a
/// behavior change is a visible, versioned config change rather than an edited
/// literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Heuristics {
    pub version: u32,

    // Propagation
    pub max_distance: u32,
    pub decay: f64,
    pub network_amplifier: f64,
    pub min_reported_pull: f64,
    pub critical_pull: f64,
    pub high_pull: f64,
    pub extreme_pull_flag: f64,
    pub high_pull_flag: f64,

    // Danger source rules
    pub convicted_strength: f64,
    pub targeting_strength: f64,
    pub alias_strength: f64,
    pub associate_base_strength: f64,
    pub associate_step: f64,
    pub targeting_min_connections: usize,
    pub targeting_ratio: f64,
    pub targeting_critical_ratio: f64,
    pub alias_ratio: f64,
    pub alias_high_ratio: f64,
    pub associate_min_convicted: usize,
    pub associate_high_convicted: usize,

    // Amplifiers
    pub critical_amplifier: f64,
    pub high_amplifier: f64,
    pub medium_amplifier: f64,
    pub mass_targeting_kids: usize,
    pub mass_targeting_boost: f64,
    pub associate_hub_convicted: usize,
    pub associate_hub_boost: f64,

    // Escape routes
    pub escape_hops: u32,
    pub safe_exposure: f64,

    // Scoring and structure
    pub vulnerable_adult_connections: usize,
    pub community_max_passes: usize,
    pub community_min_size: usize,
    pub network_cluster_depth: u32,
}

impl Default for Heuristics {
    fn default() -> Self {
        Self {
            version: HEURISTICS_VERSION,
            max_distance: 3,
            decay: 0.6,
            network_amplifier: 1.5,
            min_reported_pull: 0.3,
            critical_pull: 0.8,
            high_pull: 0.5,
            extreme_pull_flag: 1.0,
            high_pull_flag: 0.6,
            convicted_strength: 1.0,
            targeting_strength: 0.8,
            alias_strength: 0.7,
            associate_base_strength: 0.5,
            associate_step: 0.1,
            targeting_min_connections: 5,
            targeting_ratio: 0.7,
            targeting_critical_ratio: 0.8,
            alias_ratio: 0.5,
            alias_high_ratio: 0.7,
            associate_min_convicted: 2,
            associate_high_convicted: 3,
            critical_amplifier: 1.2,
            high_amplifier: 1.0,
            medium_amplifier: 0.8,
            mass_targeting_kids: 20,
            mass_targeting_boost: 1.3,
            associate_hub_convicted: 3,
            associate_hub_boost: 1.2,
            escape_hops: 2,
            safe_exposure: 0.3,
            vulnerable_adult_connections: 10,
            community_max_passes: 10,
            community_min_size: 2,
            network_cluster_depth: 2,
        }
    }
}

impl Heuristics {
    /// Load overrides from a JSON file. Fields absent from the file keep their defaults.
    pub fn from_path(path: &Path) -> Result<Self, SafeguardError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SafeguardError::Config(format!("cannot read heuristics {}: {e}", path.display()))
        })?;
        let heuristics: Heuristics = serde_json::from_str(&raw).map_err(|e| {
            SafeguardError::Config(format!("malformed heuristics {}: {e}", path.display()))
        })?;
        heuristics.validate()?;
        Ok(heuristics)
    }

    /// Reject values the engine cannot interpret. Nothing is clamped.
    pub fn validate(&self) -> Result<(), SafeguardError> {
        if self.max_distance == 0 {
            return Err(config_err("max_distance must be at least 1"));
        }
        if self.escape_hops == 0 {
            return Err(config_err("escape_hops must be at least 1"));
        }
        if !(self.decay.is_finite() && self.decay > 0.0 && self.decay <= 1.0) {
            return Err(config_err(format!("decay must be in (0, 1], got {}", self.decay)));
        }
        if !(self.network_amplifier.is_finite() && self.network_amplifier >= 1.0) {
            return Err(config_err(format!(
                "network_amplifier must be >= 1, got {}",
                self.network_amplifier
            )));
        }

        let ratios = [
            ("targeting_ratio", self.targeting_ratio),
            ("targeting_critical_ratio", self.targeting_critical_ratio),
            ("alias_ratio", self.alias_ratio),
            ("alias_high_ratio", self.alias_high_ratio),
        ];
        for (name, value) in ratios {
            if !(value.is_finite() && (0.0..=1.0).contains(&value)) {
                return Err(config_err(format!("{name} must be in [0, 1], got {value}")));
            }
        }

        let non_negative = [
            ("min_reported_pull", self.min_reported_pull),
            ("critical_pull", self.critical_pull),
            ("high_pull", self.high_pull),
            ("extreme_pull_flag", self.extreme_pull_flag),
            ("high_pull_flag", self.high_pull_flag),
            ("convicted_strength", self.convicted_strength),
            ("targeting_strength", self.targeting_strength),
            ("alias_strength", self.alias_strength),
            ("associate_base_strength", self.associate_base_strength),
            ("associate_step", self.associate_step),
            ("critical_amplifier", self.critical_amplifier),
            ("high_amplifier", self.high_amplifier),
            ("medium_amplifier", self.medium_amplifier),
            ("mass_targeting_boost", self.mass_targeting_boost),
            ("associate_hub_boost", self.associate_hub_boost),
            ("safe_exposure", self.safe_exposure),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(config_err(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }

        if self.high_pull > self.critical_pull {
            return Err(config_err("high_pull must not exceed critical_pull"));
        }
        if self.community_max_passes == 0 {
            return Err(config_err("community_max_passes must be at least 1"));
        }
        Ok(())
    }
}

/// Thresholds for the snapshot change detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChangeThresholds {
    /// Minimum totalPull increase for one kid that raises an alert.
    pub pull_increase: f64,
    /// Minimum relative growth of a zone's affected-kid count.
    pub zone_expansion: f64,
}

impl Default for ChangeThresholds {
    fn default() -> Self {
        Self {
            pull_increase: 0.2,
            zone_expansion: 0.3,
        }
    }
}

/// Monitor configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub data_dir: PathBuf,
    pub graph_path: PathBuf,
    pub annotations_path: PathBuf,
    pub interval_minutes: u64,
    pub retention_days: u32,
    pub thresholds: ChangeThresholds,
    pub dispatch_timeout_secs: u64,
    pub slack_webhook_url: Option<String>,
    pub alert_webhook_url: Option<String>,
    /// Lowest severity forwarded to remote channels.
    pub min_remote_severity: Severity,
    pub heuristics: Heuristics,
}

impl MonitorConfig {
    /// Defaults rooted at `data_dir`, inputs expected at `graph.json` / `annotations.json`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            graph_path: data_dir.join("graph.json"),
            annotations_path: data_dir.join("annotations.json"),
            data_dir,
            interval_minutes: 60,
            retention_days: 30,
            thresholds: ChangeThresholds::default(),
            dispatch_timeout_secs: 10,
            slack_webhook_url: None,
            alert_webhook_url: None,
            min_remote_severity: Severity::Info,
            heuristics: Heuristics::default(),
        }
    }

    /// Load configuration from environment variables, validating every value.
    pub fn from_env() -> Result<Self, SafeguardError> {
        let data_dir = env::var("SAFEGUARD_DATA_DIR").unwrap_or_else(|_| "data".to_string());
        let mut config = Self::with_data_dir(data_dir);

        if let Ok(path) = env::var("SAFEGUARD_GRAPH_PATH") {
            config.graph_path = PathBuf::from(path);
        }
        if let Ok(path) = env::var("SAFEGUARD_ANNOTATIONS_PATH") {
            config.annotations_path = PathBuf::from(path);
        }

        config.interval_minutes = parse_env("CHECK_INTERVAL_MINUTES", config.interval_minutes)?;
        config.retention_days = parse_env("HISTORY_RETENTION_DAYS", config.retention_days)?;
        config.thresholds.pull_increase =
            parse_env("PULL_INCREASE_THRESHOLD", config.thresholds.pull_increase)?;
        config.thresholds.zone_expansion =
            parse_env("ZONE_EXPANSION_THRESHOLD", config.thresholds.zone_expansion)?;
        config.dispatch_timeout_secs =
            parse_env("DISPATCH_TIMEOUT_SECS", config.dispatch_timeout_secs)?;
        config.min_remote_severity = parse_env("ALERT_MIN_SEVERITY", config.min_remote_severity)?;

        config.slack_webhook_url = optional_env("SLACK_WEBHOOK_URL");
        config.alert_webhook_url = optional_env("ALERT_WEBHOOK_URL");

        if let Some(path) = optional_env("SAFEGUARD_HEURISTICS") {
            config.heuristics = Heuristics::from_path(Path::new(&path))?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SafeguardError> {
        if self.interval_minutes == 0 {
            return Err(config_err("CHECK_INTERVAL_MINUTES must be greater than 0"));
        }
        if self.retention_days == 0 {
            return Err(config_err("HISTORY_RETENTION_DAYS must be greater than 0"));
        }
        if self.dispatch_timeout_secs == 0 {
            return Err(config_err("DISPATCH_TIMEOUT_SECS must be greater than 0"));
        }
        let thresholds = [
            ("PULL_INCREASE_THRESHOLD", self.thresholds.pull_increase),
            ("ZONE_EXPANSION_THRESHOLD", self.thresholds.zone_expansion),
        ];
        for (name, value) in thresholds {
            if !(value.is_finite() && value > 0.0) {
                return Err(config_err(format!("{name} must be a positive number, got {value}")));
            }
        }
        self.heuristics.validate()
    }

    /// Log the effective configuration. Webhook URLs are reduced to their host.
    pub fn log_summary(&self) {
        info!(
            data_dir = %self.data_dir.display(),
            graph = %self.graph_path.display(),
            annotations = %self.annotations_path.display(),
            interval_minutes = self.interval_minutes,
            retention_days = self.retention_days,
            pull_increase = self.thresholds.pull_increase,
            zone_expansion = self.thresholds.zone_expansion,
            heuristics_version = self.heuristics.version,
            slack = %redact(self.slack_webhook_url.as_deref()),
            webhook = %redact(self.alert_webhook_url.as_deref()),
            "Monitor configuration loaded"
        );
    }
}

fn config_err(msg: impl Into<String>) -> SafeguardError {
    SafeguardError::Config(msg.into())
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T, SafeguardError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| config_err(format!("{key}={raw:?} is invalid: {e}"))),
        None => Ok(default),
    }
}

fn redact(url: Option<&str>) -> String {
    match url {
        None => "disabled".to_string(),
        Some(url) => {
            let host = url
                .split("://")
                .nth(1)
                .and_then(|rest| rest.split('/').next())
                .unwrap_or("?");
            format!("{host}/***")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Heuristics::default().validate().is_ok());
        assert!(MonitorConfig::with_data_dir("data").validate().is_ok());
    }

    #[test]
    fn decay_out_of_range_is_rejected() {
        let h = Heuristics {
            decay: 1.5,
            ..Default::default()
        };
        assert!(matches!(h.validate(), Err(SafeguardError::Config(_))));
    }

    #[test]
    fn zero_max_distance_is_rejected() {
        let h = Heuristics {
            max_distance: 0,
            ..Default::default()
        };
        assert!(h.validate().is_err());
    }

    #[test]
    fn nan_threshold_is_rejected_not_clamped() {
        let mut config = MonitorConfig::with_data_dir("data");
        config.thresholds.pull_increase = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut config = MonitorConfig::with_data_dir("data");
        config.interval_minutes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_heuristics_json_keeps_defaults() {
        let h: Heuristics = serde_json::from_str(r#"{"decay": 0.5}"#).unwrap();
        assert_eq!(h.decay, 0.5);
        assert_eq!(h.network_amplifier, 1.5);
        assert_eq!(h.version, HEURISTICS_VERSION);
    }

    #[test]
    fn redact_keeps_only_host() {
        assert_eq!(
            redact(Some("https://hooks.slack.com/services/T000/B000/XXXX")),
            "hooks.slack.com/***"
        );
        assert_eq!(redact(None), "disabled");
    }
}
