//! Outbound publish with bounded retry
//!
//! A publish is acknowledged or it fails; there is no other result. Transient
//! failures (socket drops, timeouts, stalls) are retried by the configured
//! [`RetryStrategy`]; a relay-side rejection is returned immediately.

use crate::backoff::{retry, RetryStrategy};
use crate::metrics::RelayerMetrics;
use crate::protocol::{PublishOptions, PublishParams};
use crate::provider::{call, RpcSender};
use relaykit_core::Result;
use std::sync::Arc;

pub struct Publisher {
    rpc: Arc<dyn RpcSender>,
    strategy: Arc<dyn RetryStrategy>,
    metrics: Option<Arc<RelayerMetrics>>,
}

impl Publisher {
    pub fn new(
        rpc: Arc<dyn RpcSender>,
        strategy: Arc<dyn RetryStrategy>,
        metrics: Option<Arc<RelayerMetrics>>,
    ) -> Self {
        Self { rpc, strategy, metrics }
    }

    #[tracing::instrument(skip(self, message, opts), fields(ttl = opts.ttl, tag = opts.tag))]
    pub async fn publish(&self, topic: &str, message: &str, opts: PublishOptions) -> Result<()> {
        let params = PublishParams {
            topic: topic.to_string(),
            message: message.to_string(),
            ttl: opts.ttl,
            tag: opts.tag,
            prompt: opts.prompt,
        };

        retry(
            self.strategy.as_ref(),
            |_attempt| {
                let rpc = Arc::clone(&self.rpc);
                let params = params.clone();
                async move { call::<_, serde_json::Value>(rpc.as_ref(), &params).await }
            },
            |attempt, delay, err| {
                tracing::warn!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "publish failed, retrying"
                );
                if let Some(ref m) = self.metrics {
                    m.record_publish_retry();
                }
            },
        )
        .await?;

        tracing::debug!("publish acknowledged");
        Ok(())
    }
}
