//! Relay transport over WebSocket
//!
//! This crate keeps one resilient JSON-RPC 2.0 connection to a relay and
//! builds topic-addressed publish/subscribe on top of it.
//!
//! # Core Features
//!
//! - **Connection**: pluggable transport, tokio-tungstenite by default
//! - **Provider**: request/response correlation with per-request timeouts
//! - **Subscriber**: idempotent subscriptions, persisted and batch-resubscribed
//!   after every reconnect
//! - **Publisher**: publish with bounded retry of transient failures
//! - **MessageTracker**: per-topic dedup of delivered and published payloads
//! - **Relayer**: single-flight transport restarts, stall recovery and the
//!   inbound message pipeline
//! - **Observability**: OpenTelemetry metrics and `tracing` spans
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use relaykit_client::{RelayerBuilder, RelayerEvent, StaticJwtSigner};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let relayer = RelayerBuilder::new("my-project-id")
//!         .signer(Arc::new(StaticJwtSigner::new("pre-issued-jwt")))
//!         .init()
//!         .await?;
//!
//!     let _messages = relayer.events().subscribe(|event| {
//!         if let RelayerEvent::Message(message) = event {
//!             println!("{} -> {}", message.topic, message.message);
//!         }
//!     });
//!
//!     relayer.subscribe("topic", None).await?;
//!     relayer.publish("topic", "hello", None).await?;
//!     Ok(())
//! }
//! ```

mod auth;
mod backoff;
mod builder;
mod connection;
mod connection_state;
mod events;
mod message_tracker;
mod metrics;
mod protocol;
mod provider;
mod publisher;
mod relayer;
mod request;
mod subscriber;

pub use auth::{DefaultRelayUrlBuilder, JwtSigner, RelayUrlBuilder, RelayUrlParams, StaticJwtSigner};
pub use backoff::{retry, ExponentialBackoff, FixedDelay, NoRetry, RetryStrategy};
pub use builder::{
    RelayerBuilder, RelayerOptions, DEFAULT_POLL_INTERVAL, DEFAULT_RELAY_URL, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_STORAGE_PREFIX,
};
pub use connection::{Connection, ConnectionEvent, ConnectionFactory, WsConnection, WsConnectionFactory};
pub use connection_state::{ConnectionState, StateTracker};
pub use events::{EventBus, EventStream, Once, Subscription};
pub use message_tracker::{hash_message, MessageTracker};
pub use metrics::RelayerMetrics;
pub use protocol::{
    ActiveSubscription, BatchSubscribeParams, MessageEvent, ProtocolOptions, PublishOptions, PublishParams,
    SubscribeOptions, SubscribeParams, SubscriptionData, SubscriptionParams, UnsubscribeOptions, UnsubscribeParams,
    DEFAULT_PUBLISH_TTL, RELAY_PROTOCOL, RELAY_VERSION, SUBSCRIPTION_METHOD_SUFFIX,
};
pub use provider::{call, Provider, ProviderEvent, RpcSender};
pub use publisher::Publisher;
pub use relayer::{Relayer, RelayerEvent};
pub use request::RequestManager;
pub use subscriber::{Subscriber, SubscriberEvent, TopicMap, DEFAULT_RESUBSCRIBE_BATCH_SIZE};
