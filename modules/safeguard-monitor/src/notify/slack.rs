use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use safeguard_common::{Alert, Severity};

use super::backend::AlertChannel;

/// Slack incoming webhook channel.
pub struct SlackWebhook {
    webhook_url: String,
    http: reqwest::Client,
}

impl SlackWebhook {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            http: reqwest::Client::new(),
        }
    }

    fn severity_emoji(severity: Severity) -> &'static str {
        match severity {
            Severity::Info | Severity::Low => ":information_source:",
            Severity::Medium => ":warning:",
            Severity::High => ":exclamation:",
            Severity::Critical => ":rotating_light:",
        }
    }
}

#[async_trait]
impl AlertChannel for SlackWebhook {
    fn name(&self) -> &str {
        "slack"
    }

    async fn send(&self, alert: &Alert) -> anyhow::Result<()> {
        let emoji = Self::severity_emoji(alert.severity);
        let text = format!(
            "{emoji} *Safeguard Monitor: {}*\n\
             *Type:* {}\n\
             *Raised:* {}\n\n\
             {}",
            alert.severity,
            alert.alert_type,
            alert.timestamp.format("%Y-%m-%d %H:%M UTC"),
            alert.message,
        );

        let payload = json!({
            "text": text,
            "unfurl_links": false,
        });

        let resp = self
            .http
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Slack webhook returned non-success");
            anyhow::bail!("Slack webhook returned {status}");
        }

        Ok(())
    }
}
