use async_trait::async_trait;

use safeguard_common::Alert;

use super::backend::AlertChannel;

/// Channel that accepts and drops every alert.
pub struct NoopChannel;

#[async_trait]
impl AlertChannel for NoopChannel {
    fn name(&self) -> &str {
        "noop"
    }

    fn is_remote(&self) -> bool {
        false
    }

    async fn send(&self, _alert: &Alert) -> anyhow::Result<()> {
        Ok(())
    }
}
