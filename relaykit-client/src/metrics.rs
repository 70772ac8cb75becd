//! Relayer metrics definitions
//!
//! OpenTelemetry instruments describing relay health. They are exported to
//! whatever meter provider `init_observability` installed; without one the
//! global no-op provider swallows them.
//!
//! # Metrics Collected
//!
//! - **connection.state**: current socket state (gauge)
//! - **requests.total** / **request.duration**: relay RPCs by method and status
//! - **errors.total**: errors by kind
//! - **transport.restarts**: transport restart attempts (counter)
//! - **transport.stalls**: connects that exceeded the connection timeout
//! - **messages.delivered** / **messages.deduplicated**: inbound pipeline outcome
//! - **subscriptions.active**: canonical subscriptions held (gauge)
//! - **publish.retries**: publish attempts that were retried
//!
//! ```rust,no_run
//! use relaykit_client::RelayerMetrics;
//!
//! let metrics = RelayerMetrics::new("wallet-relayer");
//! metrics.record_request("irn_publish", "success", 0.042);
//! ```

use crate::connection_state::ConnectionState;
use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    KeyValue,
};

/// Instruments recorded by the relayer and its components
pub struct RelayerMetrics {
    pub connection_state: Gauge<i64>,
    pub requests_total: Counter<u64>,
    /// Seconds from send to response
    pub request_duration: Histogram<f64>,
    pub errors_total: Counter<u64>,
    pub transport_restarts: Counter<u64>,
    pub transport_stalls: Counter<u64>,
    pub messages_delivered: Counter<u64>,
    pub messages_deduplicated: Counter<u64>,
    pub subscriptions_active: Gauge<i64>,
    pub publish_retries: Counter<u64>,
}

impl RelayerMetrics {
    pub fn new(service_name: impl Into<String>) -> Self {
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            connection_state: meter
                .i64_gauge("relaykit.relayer.connection.state")
                .with_description("Connection state (0=disconnected, 1=connecting, 2=connected)")
                .build(),
            requests_total: meter
                .u64_counter("relaykit.relayer.requests.total")
                .with_description("Relay RPCs sent")
                .build(),
            request_duration: meter
                .f64_histogram("relaykit.relayer.request.duration")
                .with_description("Relay RPC duration in seconds")
                .build(),
            errors_total: meter
                .u64_counter("relaykit.relayer.errors.total")
                .with_description("Errors observed by the relayer")
                .build(),
            transport_restarts: meter
                .u64_counter("relaykit.relayer.transport.restarts")
                .with_description("Transport restart attempts")
                .build(),
            transport_stalls: meter
                .u64_counter("relaykit.relayer.transport.stalls")
                .with_description("Connect attempts that exceeded the connection timeout")
                .build(),
            messages_delivered: meter
                .u64_counter("relaykit.relayer.messages.delivered")
                .with_description("Inbound messages delivered to listeners")
                .build(),
            messages_deduplicated: meter
                .u64_counter("relaykit.relayer.messages.deduplicated")
                .with_description("Inbound messages dropped as duplicates")
                .build(),
            subscriptions_active: meter
                .i64_gauge("relaykit.relayer.subscriptions.active")
                .with_description("Topics with at least one relay subscription")
                .build(),
            publish_retries: meter
                .u64_counter("relaykit.relayer.publish.retries")
                .with_description("Publish attempts retried after a transient failure")
                .build(),
        }
    }

    pub fn update_connection_state(&self, state: ConnectionState) {
        self.connection_state.record(state.metric_value(), &[]);
    }

    pub fn record_request(&self, method: &str, status: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.requests_total.add(1, attributes);
        self.request_duration.record(duration_secs, attributes);
    }

    pub fn record_error(&self, kind: &str) {
        self.errors_total
            .add(1, &[KeyValue::new("error_type", kind.to_string())]);
    }

    pub fn record_transport_restart(&self) {
        self.transport_restarts.add(1, &[]);
    }

    pub fn record_transport_stall(&self) {
        self.transport_stalls.add(1, &[]);
    }

    pub fn record_message(&self, duplicate: bool) {
        if duplicate {
            self.messages_deduplicated.add(1, &[]);
        } else {
            self.messages_delivered.add(1, &[]);
        }
    }

    pub fn update_active_subscriptions(&self, count: usize) {
        self.subscriptions_active.record(count as i64, &[]);
    }

    pub fn record_publish_retry(&self) {
        self.publish_retries.add(1, &[]);
    }
}
