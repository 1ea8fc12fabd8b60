use async_trait::async_trait;

use safeguard_common::Alert;

use super::backend::AlertChannel;

/// Generic webhook: POSTs the alert itself as JSON.
pub struct WebhookChannel {
    url: String,
    http: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(url: String) -> Self {
        Self {
            url,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AlertChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, alert: &Alert) -> anyhow::Result<()> {
        let resp = self.http.post(&self.url).json(alert).send().await?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("webhook returned {status}");
        }
        Ok(())
    }
}
