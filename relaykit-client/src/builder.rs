//! Relayer configuration
//!
//! [`RelayerBuilder`] collects the options and collaborators a [`Relayer`]
//! needs and hands them over as a [`RelayerOptions`] value. Nothing here is
//! global: two relayers built in one process share no state.
//!
//! # Examples
//!
//! ```rust,no_run
//! use relaykit_client::{ExponentialBackoff, RelayerBuilder, StaticJwtSigner};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> relaykit_core::Result<()> {
//! let relayer = RelayerBuilder::new("my-project-id")
//!     .relay_url("wss://relay.example.com")
//!     .signer(Arc::new(StaticJwtSigner::new("pre-issued-jwt")))
//!     .connection_timeout(Duration::from_secs(10))
//!     .publish_retry(Arc::new(
//!         ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(2))
//!             .with_max_attempts(5),
//!     ))
//!     .with_default_observability()
//!     .service_name("my-wallet")
//!     .init()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::auth::{DefaultRelayUrlBuilder, JwtSigner, RelayUrlBuilder};
use crate::backoff::{ExponentialBackoff, RetryStrategy};
use crate::connection::{ConnectionFactory, WsConnectionFactory};
use crate::metrics::RelayerMetrics;
use crate::relayer::Relayer;
use crate::subscriber::DEFAULT_RESUBSCRIBE_BATCH_SIZE;
use relaykit_core::{Error, KeyValueStorage, MemoryStorage, ObservabilityConfig, Result};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_RELAY_URL: &str = "wss://relay.walletconnect.org";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_STORAGE_PREFIX: &str = "relaykit@1:core";

/// Everything a [`Relayer`] is constructed from
#[derive(Clone)]
pub struct RelayerOptions {
    pub project_id: String,
    pub relay_url: String,
    /// `None` waits for a connect indefinitely
    pub connection_timeout: Option<Duration>,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub resubscribe_batch_size: usize,
    pub storage_prefix: String,
    pub publish_retry: Arc<dyn RetryStrategy>,
    pub connection_factory: Arc<dyn ConnectionFactory>,
    pub signer: Arc<dyn JwtSigner>,
    pub url_builder: Arc<dyn RelayUrlBuilder>,
    pub storage: Arc<dyn KeyValueStorage>,
    pub metrics: Option<Arc<RelayerMetrics>>,
}

impl std::fmt::Debug for RelayerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayerOptions")
            .field("project_id", &self.project_id)
            .field("relay_url", &self.relay_url)
            .field("connection_timeout", &self.connection_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("poll_interval", &self.poll_interval)
            .field("resubscribe_batch_size", &self.resubscribe_batch_size)
            .field("storage_prefix", &self.storage_prefix)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

/// Builder for [`RelayerOptions`] and the [`Relayer`] itself
pub struct RelayerBuilder {
    project_id: String,
    relay_url: String,
    connection_timeout: Option<Duration>,
    request_timeout: Duration,
    poll_interval: Duration,
    resubscribe_batch_size: usize,
    storage_prefix: String,
    publish_retry: Arc<dyn RetryStrategy>,
    connection_factory: Arc<dyn ConnectionFactory>,
    signer: Option<Arc<dyn JwtSigner>>,
    url_builder: Arc<dyn RelayUrlBuilder>,
    storage: Arc<dyn KeyValueStorage>,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
}

impl RelayerBuilder {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            relay_url: DEFAULT_RELAY_URL.to_string(),
            connection_timeout: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            resubscribe_batch_size: DEFAULT_RESUBSCRIBE_BATCH_SIZE,
            storage_prefix: DEFAULT_STORAGE_PREFIX.to_string(),
            publish_retry: Arc::new(ExponentialBackoff::default()),
            connection_factory: Arc::new(WsConnectionFactory),
            signer: None,
            url_builder: Arc::new(DefaultRelayUrlBuilder),
            storage: Arc::new(MemoryStorage::new()),
            observability_config: None,
            service_name: None,
        }
    }

    pub fn relay_url(mut self, url: impl Into<String>) -> Self {
        self.relay_url = url.into();
        self
    }

    /// Treat a connect that takes longer than `timeout` as a stall
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = Some(timeout);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// How often a caller waiting for the connection re-checks it
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn resubscribe_batch_size(mut self, size: usize) -> Self {
        self.resubscribe_batch_size = size;
        self
    }

    pub fn storage_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.storage_prefix = prefix.into();
        self
    }

    pub fn publish_retry(mut self, strategy: Arc<dyn RetryStrategy>) -> Self {
        self.publish_retry = strategy;
        self
    }

    pub fn connection_factory(mut self, factory: Arc<dyn ConnectionFactory>) -> Self {
        self.connection_factory = factory;
        self
    }

    pub fn signer(mut self, signer: Arc<dyn JwtSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn url_builder(mut self, builder: Arc<dyn RelayUrlBuilder>) -> Self {
        self.url_builder = builder;
        self
    }

    pub fn storage(mut self, storage: Arc<dyn KeyValueStorage>) -> Self {
        self.storage = storage;
        self
    }

    /// Enable OpenTelemetry observability with custom configuration
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Enable OpenTelemetry observability with default configuration
    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Service name for observability (used if observability is enabled)
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Resolve defaults and initialize observability if configured
    pub fn into_options(self) -> Result<RelayerOptions> {
        let signer = self
            .signer
            .ok_or_else(|| Error::InvalidRequest("a JWT signer is required".to_string()))?;

        let metrics = if let Some(mut config) = self.observability_config {
            if let Some(name) = self.service_name {
                config.service_name = name;
            }

            relaykit_core::init_observability(config.clone())
                .map_err(|e| Error::Internal(format!("Failed to initialize observability: {}", e)))?;

            Some(Arc::new(RelayerMetrics::new(config.service_name)))
        } else {
            None
        };

        Ok(RelayerOptions {
            project_id: self.project_id,
            relay_url: self.relay_url,
            connection_timeout: self.connection_timeout,
            request_timeout: self.request_timeout,
            poll_interval: self.poll_interval,
            resubscribe_batch_size: self.resubscribe_batch_size,
            storage_prefix: self.storage_prefix,
            publish_retry: self.publish_retry,
            connection_factory: self.connection_factory,
            signer,
            url_builder: self.url_builder,
            storage: self.storage,
            metrics,
        })
    }

    /// Build the relayer without connecting
    pub fn build(self) -> Result<Relayer> {
        Ok(Relayer::new(self.into_options()?))
    }

    /// Build the relayer and run [`Relayer::init`]
    pub async fn init(self) -> Result<Relayer> {
        let relayer = self.build()?;
        relayer.init().await?;
        Ok(relayer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticJwtSigner;
    use crate::backoff::FixedDelay;

    #[test]
    fn test_builder_defaults() {
        let builder = RelayerBuilder::new("project");

        assert_eq!(builder.project_id, "project");
        assert_eq!(builder.relay_url, DEFAULT_RELAY_URL);
        assert!(builder.connection_timeout.is_none());
        assert_eq!(builder.request_timeout, Duration::from_secs(30));
        assert_eq!(builder.poll_interval, Duration::from_secs(1));
        assert_eq!(builder.resubscribe_batch_size, 500);
        assert!(builder.signer.is_none());
        assert!(builder.observability_config.is_none());
        assert!(builder.service_name.is_none());
    }

    #[test]
    fn test_builder_requires_signer() {
        let result = RelayerBuilder::new("project").into_options();
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_builder_chaining() {
        let options = RelayerBuilder::new("project")
            .relay_url("wss://relay.example.com")
            .connection_timeout(Duration::from_secs(3))
            .request_timeout(Duration::from_secs(7))
            .poll_interval(Duration::from_millis(20))
            .resubscribe_batch_size(50)
            .storage_prefix("wallet")
            .publish_retry(Arc::new(FixedDelay::new(Duration::from_millis(1))))
            .signer(Arc::new(StaticJwtSigner::new("jwt")))
            .into_options()
            .unwrap();

        assert_eq!(options.relay_url, "wss://relay.example.com");
        assert_eq!(options.connection_timeout, Some(Duration::from_secs(3)));
        assert_eq!(options.request_timeout, Duration::from_secs(7));
        assert_eq!(options.poll_interval, Duration::from_millis(20));
        assert_eq!(options.resubscribe_batch_size, 50);
        assert_eq!(options.storage_prefix, "wallet");
        assert!(options.metrics.is_none());
    }

    #[test]
    fn test_builder_observability_config() {
        let config = ObservabilityConfig::new("test-relayer")
            .with_endpoint("http://localhost:4317")
            .with_log_level("debug");

        let builder = RelayerBuilder::new("project").with_observability(config);

        let obs_config = builder.observability_config.unwrap();
        assert_eq!(obs_config.service_name, "test-relayer");
        assert_eq!(obs_config.log_level, "debug");
    }

    #[test]
    fn test_builder_default_observability() {
        let builder = RelayerBuilder::new("project")
            .with_default_observability()
            .service_name("my-service");

        assert_eq!(builder.observability_config.unwrap().service_name, "relaykit");
        assert_eq!(builder.service_name, Some("my-service".to_string()));
    }

    #[tokio::test]
    async fn test_build_does_not_connect() {
        let relayer = RelayerBuilder::new("project")
            .signer(Arc::new(StaticJwtSigner::new("jwt")))
            .build()
            .unwrap();

        assert!(!relayer.is_initialized());
        assert!(!relayer.is_connected());
        assert!(relayer.provider().is_none());
    }
}
