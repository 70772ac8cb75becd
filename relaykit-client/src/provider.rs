//! JSON-RPC provider over a [`Connection`]
//!
//! The provider correlates responses with requests by id and re-emits
//! everything else. Inbound frames are decoded once:
//!
//! - a response completes the pending request with the same id, or is dropped
//!   when nothing is waiting for it
//! - a request or notification is re-emitted untouched as
//!   [`ProviderEvent::RawMessage`] for the owner to interpret
//!
//! When the connection closes every pending request fails with
//! `Error::ConnectionClosed` instead of waiting out its timeout.

use crate::connection::{Connection, ConnectionEvent};
use crate::events::{EventBus, Subscription};
use crate::metrics::RelayerMetrics;
use crate::request::RequestManager;
use async_trait::async_trait;
use relaykit_core::{codec, Error, Id, JsonRpcMessage, JsonRpcRequest, JsonRpcResponse, Result, RpcMethod};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Something the provider observed
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    Connected,
    Disconnected,
    /// Unsolicited request or notification, as received
    RawMessage(String),
    Error(Error),
}

/// Sends a request and resolves with the response `result`
#[async_trait]
pub trait RpcSender: Send + Sync {
    async fn send_request(&self, method: &'static str, params: serde_json::Value) -> Result<serde_json::Value>;
}

/// Typed request through any [`RpcSender`]; the method comes from `P`
pub async fn call<P, R>(sender: &dyn RpcSender, params: &P) -> Result<R>
where
    P: RpcMethod + Serialize + Sync,
    R: DeserializeOwned,
{
    let value = serde_json::to_value(params)?;
    let result = sender.send_request(P::METHOD, value).await?;
    Ok(serde_json::from_value(result)?)
}

struct ProviderInner {
    connection: Arc<dyn Connection>,
    requests: RequestManager,
    events: EventBus<ProviderEvent>,
    request_timeout: Duration,
    metrics: Option<Arc<RelayerMetrics>>,
}

impl ProviderInner {
    fn on_connection_event(&self, event: &ConnectionEvent) {
        match event {
            ConnectionEvent::Opened => self.events.emit(ProviderEvent::Connected),
            ConnectionEvent::Closed => {
                let failed = self.requests.fail_all(Error::ConnectionClosed);
                if failed > 0 {
                    tracing::debug!(failed, "failed pending requests on disconnect");
                }
                self.events.emit(ProviderEvent::Disconnected);
            }
            ConnectionEvent::Payload(text) => self.on_payload(text),
            ConnectionEvent::Error(err) => {
                if let Some(ref m) = self.metrics {
                    m.record_error(err.kind());
                }
                self.events.emit(ProviderEvent::Error(err.clone()));
            }
        }
    }

    fn on_payload(&self, text: &str) {
        match codec::decode(text) {
            Ok(JsonRpcMessage::Response(response)) => {
                let id = response.id.clone();
                if !self.requests.complete(response) {
                    tracing::debug!(%id, "dropping response with no pending request");
                }
            }
            Ok(_) => self.events.emit(ProviderEvent::RawMessage(text.to_string())),
            Err(e) => {
                tracing::warn!(error = %e, "undecodable frame from relay");
                self.events.emit(ProviderEvent::Error(e));
            }
        }
    }
}

/// Request/response correlation on top of one connection
pub struct Provider {
    inner: Arc<ProviderInner>,
    _listener: Subscription,
}

impl Provider {
    pub fn new(connection: Arc<dyn Connection>, request_timeout: Duration) -> Self {
        Self::with_metrics(connection, request_timeout, None)
    }

    pub fn with_metrics(
        connection: Arc<dyn Connection>,
        request_timeout: Duration,
        metrics: Option<Arc<RelayerMetrics>>,
    ) -> Self {
        let inner = Arc::new(ProviderInner {
            connection,
            requests: RequestManager::new(),
            events: EventBus::new(),
            request_timeout,
            metrics,
        });

        let weak: Weak<ProviderInner> = Arc::downgrade(&inner);
        let listener = inner.connection.events().subscribe(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.on_connection_event(event);
            }
        });

        Self {
            inner,
            _listener: listener,
        }
    }

    pub fn events(&self) -> &EventBus<ProviderEvent> {
        &self.inner.events
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.inner.connection
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connection.is_connected()
    }

    pub fn is_connecting(&self) -> bool {
        self.inner.connection.is_connecting()
    }

    pub fn is_paused(&self) -> bool {
        self.inner.connection.is_paused()
    }

    pub fn pending_requests(&self) -> usize {
        self.inner.requests.pending_count()
    }

    pub async fn connect(&self) -> Result<()> {
        self.inner.connection.open().await
    }

    /// Close the connection and fail whatever is still pending
    pub async fn disconnect(&self) -> Result<()> {
        let result = self.inner.connection.close().await;
        self.inner.requests.fail_all(Error::ConnectionClosed);
        result
    }

    /// Send a typed request; the method name comes from the params type
    pub async fn request<P, R>(&self, params: &P) -> Result<R>
    where
        P: RpcMethod + Serialize + Sync,
        R: DeserializeOwned,
    {
        let value = serde_json::to_value(params)?;
        let result = self.request_raw(P::METHOD, value).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Send a request and wait for its `result`, bounded by the request timeout
    #[tracing::instrument(skip_all, fields(method = %method))]
    pub async fn request_raw(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let start = Instant::now();
        let id = self.inner.requests.next_id();
        let request = JsonRpcRequest::new(method, Some(params), id.clone());
        let payload = codec::encode_request(&request)?;

        let rx = self.inner.requests.register(id.clone());
        if let Err(e) = self.inner.connection.send(payload).await {
            self.inner.requests.remove(&id);
            self.record(method, "error", start, Some(&e));
            return Err(e);
        }

        tracing::debug!(%id, "request sent, waiting for response");

        let response = match tokio::time::timeout(self.inner.request_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                self.inner.requests.remove(&id);
                Err(Error::Timeout {
                    method: method.to_string(),
                    timeout_ms: u64::try_from(self.inner.request_timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
        };

        match response.and_then(JsonRpcResponse::into_result) {
            Ok(result) => {
                self.record(method, "success", start, None);
                tracing::debug!(duration_secs = start.elapsed().as_secs_f64(), "request completed");
                Ok(result)
            }
            Err(e) => {
                self.record(method, "error", start, Some(&e));
                tracing::warn!(error = %e, "request failed");
                Err(e)
            }
        }
    }

    /// Acknowledge an inbound request
    pub async fn respond(&self, id: Id, result: serde_json::Value) -> Result<()> {
        let response = JsonRpcResponse::success(result, id);
        let payload = codec::encode_response(&response)?;
        self.inner.connection.send(payload).await
    }

    fn record(&self, method: &str, status: &str, start: Instant, error: Option<&Error>) {
        if let Some(ref m) = self.inner.metrics {
            m.record_request(method, status, start.elapsed().as_secs_f64());
            if let Some(e) = error {
                m.record_error(e.kind());
            }
        }
    }
}

#[async_trait]
impl RpcSender for Provider {
    async fn send_request(&self, method: &'static str, params: serde_json::Value) -> Result<serde_json::Value> {
        self.request_raw(method, params).await
    }
}
