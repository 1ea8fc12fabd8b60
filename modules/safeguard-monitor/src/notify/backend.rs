use async_trait::async_trait;

use safeguard_common::Alert;

/// A destination for alerts.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    /// Channel name used in logs and dispatch results.
    fn name(&self) -> &str;

    /// Remote channels are subject to the dispatcher's severity floor.
    fn is_remote(&self) -> bool {
        true
    }

    /// Deliver a single alert.
    async fn send(&self, alert: &Alert) -> anyhow::Result<()>;
}
