use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{info, warn};
use uuid::Uuid;

use safeguard_common::{Alert, MonitorConfig, SafeguardError, Severity};

use super::backend::AlertChannel;
use super::log::LogChannel;
use super::slack::SlackWebhook;
use super::webhook::WebhookChannel;

/// One failed delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelFailure {
    pub channel: String,
    pub alert_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchSummary {
    pub delivered: usize,
    /// Remote deliveries skipped by the severity floor.
    pub filtered: usize,
    pub failures: Vec<ChannelFailure>,
}

impl DispatchSummary {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

impl std::fmt::Display for DispatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "delivered={} filtered={} failed={}",
            self.delivered,
            self.filtered,
            self.failures.len()
        )
    }
}

/// Fans each alert out to every channel concurrently. Every send runs under
/// its own timeout; a failing or slow channel never affects the others.
#[derive(Clone)]
pub struct AlertDispatcher {
    channels: Vec<Arc<dyn AlertChannel>>,
    timeout: Duration,
    min_remote_severity: Severity,
}

impl AlertDispatcher {
    pub fn new(timeout: Duration, min_remote_severity: Severity) -> Self {
        Self {
            channels: Vec::new(),
            timeout,
            min_remote_severity,
        }
    }

    pub fn with_channel(mut self, channel: impl AlertChannel + 'static) -> Self {
        self.channels.push(Arc::new(channel));
        self
    }

    /// Log channel always; Slack and the generic webhook when configured.
    pub fn from_config(config: &MonitorConfig) -> Self {
        let mut dispatcher = Self::new(
            Duration::from_secs(config.dispatch_timeout_secs),
            config.min_remote_severity,
        )
        .with_channel(LogChannel);

        match &config.slack_webhook_url {
            Some(url) => {
                info!("Slack notifications enabled");
                dispatcher = dispatcher.with_channel(SlackWebhook::new(url.clone()));
            }
            None => info!("No SLACK_WEBHOOK_URL set, Slack notifications disabled"),
        }
        if let Some(url) = &config.alert_webhook_url {
            info!("Webhook notifications enabled");
            dispatcher = dispatcher.with_channel(WebhookChannel::new(url.clone()));
        }
        dispatcher
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    async fn deliver(
        &self,
        channel: &dyn AlertChannel,
        alert: &Alert,
    ) -> Result<(), SafeguardError> {
        match tokio::time::timeout(self.timeout, channel.send(alert)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SafeguardError::dispatch(channel.name(), format!("{e:#}"))),
            Err(_) => Err(SafeguardError::dispatch(
                channel.name(),
                format!("timed out after {:?}", self.timeout),
            )),
        }
    }

    pub async fn dispatch(&self, alerts: &[Alert]) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        let mut sends = Vec::new();

        for alert in alerts {
            for channel in &self.channels {
                if channel.is_remote() && alert.severity < self.min_remote_severity {
                    summary.filtered += 1;
                    continue;
                }
                let channel = Arc::clone(channel);
                sends.push(async move {
                    let result = self.deliver(channel.as_ref(), alert).await;
                    (alert.id, result)
                });
            }
        }

        for (alert_id, result) in join_all(sends).await {
            match result {
                Ok(()) => summary.delivered += 1,
                Err(e) => {
                    warn!(error = %e, alert_id = %alert_id, "Alert delivery failed");
                    let (channel, reason) = match e {
                        SafeguardError::Dispatch { channel, reason } => (channel, reason),
                        other => ("unknown".to_string(), other.to_string()),
                    };
                    summary.failures.push(ChannelFailure {
                        channel,
                        alert_id,
                        reason,
                    });
                }
            }
        }

        if !alerts.is_empty() {
            info!(alerts = alerts.len(), "Alert dispatch complete. {summary}");
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::noop::NoopChannel;
    use async_trait::async_trait;
    use chrono::Utc;
    use safeguard_common::AlertType;
    use std::sync::Mutex;

    struct Recording(Arc<Mutex<Vec<Uuid>>>);

    #[async_trait]
    impl AlertChannel for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, alert: &Alert) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(alert.id);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl AlertChannel for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn send(&self, _alert: &Alert) -> anyhow::Result<()> {
            anyhow::bail!("connection refused")
        }
    }

    struct Hanging;

    #[async_trait]
    impl AlertChannel for Hanging {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn send(&self, _alert: &Alert) -> anyhow::Result<()> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
    }

    fn alert(severity: Severity) -> Alert {
        Alert::new(
            AlertType::NewDangerSource,
            severity,
            Utc::now(),
            "test".into(),
            serde_json::Value::Null,
        )
    }

    #[tokio::test]
    async fn failures_are_isolated_per_channel() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = AlertDispatcher::new(Duration::from_millis(50), Severity::Info)
            .with_channel(Failing)
            .with_channel(Hanging)
            .with_channel(Recording(seen.clone()));

        let a = alert(Severity::High);
        let summary = dispatcher.dispatch(std::slice::from_ref(&a)).await;

        assert_eq!(summary.delivered, 1);
        assert_eq!(summary.failed(), 2);
        assert_eq!(*seen.lock().unwrap(), vec![a.id]);
        let failed: Vec<&str> = summary.failures.iter().map(|f| f.channel.as_str()).collect();
        assert!(failed.contains(&"failing"));
        assert!(failed.contains(&"hanging"));
        assert!(summary
            .failures
            .iter()
            .any(|f| f.reason.contains("timed out")));
    }

    #[tokio::test]
    async fn severity_floor_applies_to_remote_channels_only() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = AlertDispatcher::new(Duration::from_secs(1), Severity::High)
            .with_channel(NoopChannel)
            .with_channel(Recording(seen.clone()));

        let summary = dispatcher
            .dispatch(&[alert(Severity::Medium), alert(Severity::Critical)])
            .await;

        assert_eq!(summary.filtered, 1);
        assert_eq!(summary.delivered, 3);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn config_without_urls_has_log_only() {
        let config = MonitorConfig::with_data_dir("data");
        assert_eq!(AlertDispatcher::from_config(&config).channel_names(), vec!["log"]);
    }
}
