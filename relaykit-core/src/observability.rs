//! Logging, tracing and metrics bootstrap
//!
//! Components log through the `tracing` macros and never install a
//! subscriber themselves. An application (or the relayer builder, when asked)
//! calls [`init_observability`] once at startup. That installs a
//! `tracing-subscriber` registry with an `EnvFilter` and a fmt layer (JSON by
//! default). When enabled it also installs OTLP span and metric exporters
//! behind the OpenTelemetry globals; `RelayerMetrics` records into the meter
//! provider installed here.
//!
//! [`shutdown_observability`] flushes and shuts down whatever providers were
//! installed. Calling it twice, or without a prior init, is harmless.
//!
//! # Environment Variables
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: collector endpoint
//! - `RUST_LOG`: log level filter (e.g. "info", "relaykit_client=debug")
//!
//! ```rust,no_run
//! use relaykit_core::ObservabilityConfig;
//!
//! let config = ObservabilityConfig::new("wallet-relay")
//!     .with_endpoint("http://localhost:4317")
//!     .with_traces(false);
//! relaykit_core::init_observability(config).expect("observability");
//! // ...
//! relaykit_core::shutdown_observability();
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const DEFAULT_ENDPOINT: &str = "http://localhost:4317";

/// Providers installed by the last successful init, kept for shutdown
static INSTALLED: Mutex<Option<InstalledProviders>> = Mutex::new(None);

#[derive(Default)]
struct InstalledProviders {
    tracer: Option<SdkTracerProvider>,
    meter: Option<SdkMeterProvider>,
}

/// Observability settings
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Reported as `service.name` on every span and metric
    pub service_name: String,
    pub service_version: String,
    pub otlp_endpoint: String,
    pub enable_traces: bool,
    pub enable_metrics: bool,
    /// Filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// JSON log lines; plain text otherwise
    pub json_logs: bool,
    pub metrics_interval: Duration,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self::from_env("relaykit")
    }
}

impl ObservabilityConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self::from_env(service_name)
    }

    /// Endpoint and log level come from `OTEL_EXPORTER_OTLP_ENDPOINT` and
    /// `RUST_LOG` when set
    pub fn from_env(service_name: impl Into<String>) -> Self {
        let env_or = |name: &str, fallback: &str| std::env::var(name).unwrap_or_else(|_| fallback.to_string());
        Self {
            service_name: service_name.into(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: env_or("OTEL_EXPORTER_OTLP_ENDPOINT", DEFAULT_ENDPOINT),
            enable_traces: true,
            enable_metrics: true,
            log_level: env_or("RUST_LOG", "info"),
            json_logs: true,
            metrics_interval: Duration::from_secs(30),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = endpoint.into();
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    pub fn with_traces(mut self, enable: bool) -> Self {
        self.enable_traces = enable;
        self
    }

    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    pub fn with_json_logs(mut self, enable: bool) -> Self {
        self.json_logs = enable;
        self
    }

    pub fn with_metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval = interval;
        self
    }

    fn resource(&self) -> Resource {
        use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, SERVICE_VERSION};

        Resource::builder_empty()
            .with_attributes([
                KeyValue::new(SERVICE_NAME, self.service_name.clone()),
                KeyValue::new(SERVICE_VERSION, self.service_version.clone()),
            ])
            .build()
    }
}

/// Install the tracing subscriber and, if enabled, the OTLP pipelines
///
/// Fails if a global subscriber is already installed. Exporter providers
/// built before that failure are shut down again.
pub fn init_observability(config: ObservabilityConfig) -> Result<(), BoxError> {
    let mut installed = InstalledProviders::default();

    if config.enable_traces {
        installed.tracer = Some(span_pipeline(&config)?);
    }
    if config.enable_metrics {
        installed.meter = Some(metric_pipeline(&config)?);
    }

    let tracer = installed
        .tracer
        .as_ref()
        .map(|provider| provider.tracer(config.service_name.clone()));
    if let Err(e) = install_subscriber(&config, tracer) {
        installed.shutdown();
        return Err(e);
    }

    if let Some(provider) = &installed.tracer {
        global::set_tracer_provider(provider.clone());
    }
    if let Some(provider) = &installed.meter {
        global::set_meter_provider(provider.clone());
    }

    tracing::info!(
        service_name = %config.service_name,
        otlp_endpoint = %config.otlp_endpoint,
        traces = config.enable_traces,
        metrics = config.enable_metrics,
        "observability initialized"
    );

    let previous = lock_installed().replace(installed);
    if let Some(previous) = previous {
        previous.shutdown();
    }
    Ok(())
}

fn span_pipeline(config: &ObservabilityConfig) -> Result<SdkTracerProvider, BoxError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.as_str())
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(config.resource())
        .with_sampler(Sampler::AlwaysOn)
        .build())
}

fn metric_pipeline(config: &ObservabilityConfig) -> Result<SdkMeterProvider, BoxError> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.as_str())
        .build()?;

    let reader = PeriodicReader::builder(exporter)
        .with_interval(config.metrics_interval)
        .build();

    Ok(SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(config.resource())
        .build())
}

fn install_subscriber(
    config: &ObservabilityConfig,
    tracer: Option<opentelemetry_sdk::trace::Tracer>,
) -> Result<(), BoxError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)?,
    };

    let base = tracing_subscriber::fmt::layer().with_target(true).with_line_number(true);
    let fmt_layer = if config.json_logs {
        base.json().boxed()
    } else {
        base.boxed()
    };

    tracing_subscriber::registry()
        .with(tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer)))
        .with(filter)
        .with(fmt_layer)
        .try_init()?;
    Ok(())
}

fn lock_installed() -> std::sync::MutexGuard<'static, Option<InstalledProviders>> {
    INSTALLED.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InstalledProviders {
    fn shutdown(self) {
        if let Some(provider) = self.tracer {
            if let Err(e) = provider.shutdown() {
                tracing::warn!(error = %e, "tracer provider shutdown failed");
            }
        }
        if let Some(provider) = self.meter {
            if let Err(e) = provider.shutdown() {
                tracing::warn!(error = %e, "meter provider shutdown failed");
            }
        }
    }
}

/// Flush and shut down the exporters installed by [`init_observability`]
pub fn shutdown_observability() {
    let installed = lock_installed().take();
    if let Some(installed) = installed {
        tracing::info!("observability shutdown");
        installed.shutdown();
    }
}
