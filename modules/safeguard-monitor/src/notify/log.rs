use async_trait::async_trait;
use tracing::{error, info, warn};

use safeguard_common::{Alert, Severity};

use super::backend::AlertChannel;

/// Writes every alert to the tracing log. Always enabled.
pub struct LogChannel;

#[async_trait]
impl AlertChannel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    fn is_remote(&self) -> bool {
        false
    }

    async fn send(&self, alert: &Alert) -> anyhow::Result<()> {
        let id = alert.id.to_string();
        match alert.severity {
            Severity::Critical => error!(
                id = id.as_str(),
                alert_type = %alert.alert_type,
                message = alert.message.as_str(),
                "ALERT"
            ),
            Severity::High | Severity::Medium => warn!(
                id = id.as_str(),
                alert_type = %alert.alert_type,
                severity = %alert.severity,
                message = alert.message.as_str(),
                "ALERT"
            ),
            Severity::Low | Severity::Info => info!(
                id = id.as_str(),
                alert_type = %alert.alert_type,
                severity = %alert.severity,
                message = alert.message.as_str(),
                "ALERT"
            ),
        }
        Ok(())
    }
}
