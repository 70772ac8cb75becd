//! Common test utilities for relaykit-client integration tests
//!
//! [`MockRelay`] is an in-memory relay that plugs in as the relayer's
//! [`ConnectionFactory`]. It answers the `irn_*` methods, records every
//! request and acknowledgment, and lets a test drop the socket, stall
//! connects, fail publishes or push messages.
//!
//! [`MockWsServer`] is a real WebSocket server for exercising `WsConnection`.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use relaykit_client::{
    Connection, ConnectionEvent, ConnectionFactory, ConnectionState, EventBus, FixedDelay, Relayer, RelayerBuilder,
    StateTracker, StaticJwtSigner,
};
use relaykit_core::{codec, JsonRpcErrorData, JsonRpcMessage, JsonRpcResponse, KeyValueStorage, MemoryStorage};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Shared state behind every connection the mock relay hands out
#[derive(Default)]
struct RelayState {
    connects: AtomicUsize,
    stall_connects: AtomicBool,
    failing_publishes: AtomicU32,
    dropping_publishes: AtomicU32,
    next_subscription: AtomicUsize,
    next_push: AtomicI64,
    requests: Mutex<Vec<(String, Value)>>,
    acks: Mutex<Vec<Value>>,
    urls: Mutex<Vec<String>>,
    current: Mutex<Option<Arc<MockConnection>>>,
}

/// Scripted in-memory relay
#[derive(Clone, Default)]
pub struct MockRelay {
    state: Arc<RelayState>,
}

impl MockRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful socket opens so far
    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Dialed URLs, one per created connection
    pub fn urls(&self) -> Vec<String> {
        self.state.urls.lock().unwrap().clone()
    }

    /// Params of every request received for `method`
    pub fn requests(&self, method: &str) -> Vec<Value> {
        self.state
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }

    /// Result values the client sent back for pushed messages
    pub fn acks(&self) -> Vec<Value> {
        self.state.acks.lock().unwrap().clone()
    }

    /// Make every future connect hang until the caller gives up
    pub fn stall_connects(&self, stall: bool) {
        self.state.stall_connects.store(stall, Ordering::SeqCst);
    }

    /// Reject the next `count` publishes with a relay error
    pub fn fail_publishes(&self, count: u32) {
        self.state.failing_publishes.store(count, Ordering::SeqCst);
    }

    /// Drop the socket instead of answering the next `count` publishes
    pub fn drop_on_publish(&self, count: u32) {
        self.state.dropping_publishes.store(count, Ordering::SeqCst);
    }

    /// Close the current socket from the relay side
    pub fn drop_socket(&self) {
        if let Some(connection) = self.current() {
            connection.remote_close();
        }
    }

    /// Deliver an `irn_subscription` push on the current socket
    pub fn push(&self, topic: &str, message: &str) {
        let id = 1_000 + self.state.next_push.fetch_add(1, Ordering::SeqCst);
        let frame = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "irn_subscription",
            "params": {
                "id": format!("push-{}", id),
                "data": {
                    "topic": topic,
                    "message": message,
                    "publishedAt": 1_700_000_000_000i64,
                }
            }
        });
        self.push_raw(&frame.to_string());
    }

    /// Deliver an arbitrary frame on the current socket
    pub fn push_raw(&self, frame: &str) {
        if let Some(connection) = self.current() {
            connection.events.emit(ConnectionEvent::Payload(frame.to_string()));
        }
    }

    fn current(&self) -> Option<Arc<MockConnection>> {
        self.state.current.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConnectionFactory for MockRelay {
    async fn create_connection(&self, url: &str) -> relaykit_core::Result<Arc<dyn Connection>> {
        self.state.urls.lock().unwrap().push(url.to_string());
        let connection = Arc::new(MockConnection {
            url: url.to_string(),
            state: StateTracker::new(),
            events: EventBus::new(),
            relay: Arc::clone(&self.state),
        });
        *self.state.current.lock().unwrap() = Some(Arc::clone(&connection));
        Ok(connection)
    }
}

pub struct MockConnection {
    url: String,
    state: StateTracker,
    events: EventBus<ConnectionEvent>,
    relay: Arc<RelayState>,
}

impl MockConnection {
    fn remote_close(&self) {
        if self.state.transition(ConnectionState::Disconnected) != ConnectionState::Disconnected {
            self.events.emit(ConnectionEvent::Closed);
        }
    }

    fn reply(&self, response: JsonRpcResponse) {
        if let Ok(frame) = codec::encode_response(&response) {
            self.events.emit(ConnectionEvent::Payload(frame));
        }
    }

    fn answer(&self, method: &str, params: &Value) -> Option<Result<Value, JsonRpcErrorData>> {
        let relay = &self.relay;
        let answer = match method {
            "irn_subscribe" => Ok(json!(format!(
                "sub-{}",
                relay.next_subscription.fetch_add(1, Ordering::SeqCst)
            ))),
            "irn_batchSubscribe" => {
                let count = params["topics"].as_array().map(Vec::len).unwrap_or(0);
                let ids: Vec<String> = (0..count)
                    .map(|_| format!("sub-{}", relay.next_subscription.fetch_add(1, Ordering::SeqCst)))
                    .collect();
                Ok(json!(ids))
            }
            "irn_unsubscribe" => Ok(json!(true)),
            "irn_publish" => {
                if take_one(&relay.dropping_publishes) {
                    return None;
                }
                if take_one(&relay.failing_publishes) {
                    Err(JsonRpcErrorData::new(-32600, "publish rejected"))
                } else {
                    Ok(json!(true))
                }
            }
            other => Err(JsonRpcErrorData::method_not_found(other)),
        };
        Some(answer)
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl Connection for MockConnection {
    fn url(&self) -> &str {
        &self.url
    }

    async fn open(&self) -> relaykit_core::Result<()> {
        if self.state.is_connected() {
            return Ok(());
        }
        if self.relay.stall_connects.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.state.transition(ConnectionState::Connected);
        self.relay.connects.fetch_add(1, Ordering::SeqCst);
        self.events.emit(ConnectionEvent::Opened);
        Ok(())
    }

    async fn close(&self) -> relaykit_core::Result<()> {
        self.remote_close();
        Ok(())
    }

    async fn send(&self, payload: String) -> relaykit_core::Result<()> {
        if !self.state.is_connected() {
            return Err(relaykit_core::Error::ConnectionClosed);
        }

        match codec::decode(&payload)? {
            JsonRpcMessage::Request(request) => {
                let params = request.params.clone().unwrap_or(Value::Null);
                self.relay
                    .requests
                    .lock()
                    .unwrap()
                    .push((request.method.clone(), params.clone()));

                match self.answer(&request.method, &params) {
                    Some(Ok(result)) => self.reply(JsonRpcResponse::success(result, request.id)),
                    Some(Err(error)) => self.reply(JsonRpcResponse::error(error, request.id)),
                    None => self.remote_close(),
                }
            }
            JsonRpcMessage::Response(response) => {
                if let Some(result) = response.result {
                    self.relay.acks.lock().unwrap().push(result);
                }
            }
            JsonRpcMessage::Notification(_) => {}
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    fn is_connecting(&self) -> bool {
        self.state.is_connecting()
    }

    fn is_paused(&self) -> bool {
        self.state.is_paused()
    }

    fn events(&self) -> &EventBus<ConnectionEvent> {
        &self.events
    }
}

/// Memory storage whose writes fail while switched on
#[derive(Clone, Default)]
pub struct FlakyStorage {
    inner: MemoryStorage,
    failing: Arc<AtomicBool>,
}

impl FlakyStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyValueStorage for FlakyStorage {
    async fn keys(&self) -> relaykit_core::Result<Vec<String>> {
        self.inner.keys().await
    }

    async fn has_item(&self, key: &str) -> relaykit_core::Result<bool> {
        self.inner.has_item(key).await
    }

    async fn get_item(&self, key: &str) -> relaykit_core::Result<Option<Value>> {
        self.inner.get_item(key).await
    }

    async fn set_item(&self, key: &str, value: Value) -> relaykit_core::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(relaykit_core::Error::Storage("write rejected".to_string()));
        }
        self.inner.set_item(key, value).await
    }

    async fn remove_item(&self, key: &str) -> relaykit_core::Result<()> {
        self.inner.remove_item(key).await
    }
}

/// Builder preset wired to `relay` with short timings
pub fn builder(relay: &MockRelay) -> RelayerBuilder {
    builder_with_storage(relay, Arc::new(MemoryStorage::new()))
}

pub fn builder_with_storage(relay: &MockRelay, storage: Arc<dyn KeyValueStorage>) -> RelayerBuilder {
    RelayerBuilder::new("test-project")
        .relay_url("wss://relay.test")
        .signer(Arc::new(StaticJwtSigner::new("test-jwt")))
        .connection_factory(Arc::new(relay.clone()))
        .storage(storage)
        .request_timeout(Duration::from_secs(2))
        .poll_interval(Duration::from_millis(10))
        .publish_retry(Arc::new(
            FixedDelay::new(Duration::from_millis(20)).with_max_attempts(3),
        ))
}

/// Initialized relayer against `relay`
pub async fn relayer(relay: &MockRelay) -> Relayer {
    builder(relay).init().await.unwrap()
}

/// Poll `condition` until it holds or `timeout` passes
pub async fn wait_until<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Mock WebSocket server for `WsConnection` tests
///
/// Every text frame received is forwarded to the test, then passed to the
/// handler; a returned string is written back to the client.
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    message_rx: Option<mpsc::Receiver<String>>,
}

impl MockWsServer {
    /// Start a server that echoes every frame
    pub async fn new() -> Self {
        Self::with_handler(|msg| async move { Some(msg) }).await
    }

    pub async fn with_handler<F, Fut>(handler: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + Clone + 'static,
        Fut: std::future::Future<Output = Option<String>> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (msg_tx, msg_rx) = mpsc::channel::<String>(100);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    accept_result = listener.accept() => {
                        let Ok((stream, _)) = accept_result else { continue };
                        let msg_tx = msg_tx.clone();
                        let handler = handler.clone();

                        tokio::spawn(async move {
                            let Ok(ws_stream) = accept_async(stream).await else { return };
                            let (mut write, mut read) = ws_stream.split();

                            while let Some(Ok(msg)) = read.next().await {
                                if let Message::Text(text) = msg {
                                    let _ = msg_tx.send(text.clone()).await;
                                    if let Some(response) = handler(text).await {
                                        let _ = write.send(Message::Text(response)).await;
                                    }
                                }
                            }
                        });
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            message_rx: Some(msg_rx),
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Next frame the server received, or `None` after 5 seconds
    pub async fn wait_for_message(&mut self) -> Option<String> {
        let rx = self.message_rx.as_mut()?;
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .ok()
            .flatten()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// JSON-RPC success response frame
pub fn mock_response(id: i64, result: Value) -> String {
    json!({
        "jsonrpc": "2.0",
        "result": result,
        "id": id
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_creation() {
        let server = MockWsServer::new().await;
        assert!(server.url().starts_with("ws://127.0.0.1:"));
        server.shutdown().await;
    }

    #[test]
    fn test_mock_response_format() {
        let response = mock_response(1, json!(true));
        assert!(response.contains("\"jsonrpc\":\"2.0\""));
        assert!(response.contains("\"id\":1"));
        assert!(response.contains("\"result\":true"));
    }
}
