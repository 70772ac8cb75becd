//! Duplex connection contract and the WebSocket implementation
//!
//! The provider depends only on [`Connection`]; the platform supplies
//! instances through a [`ConnectionFactory`]. [`WsConnection`] is the default,
//! built on tokio-tungstenite.
//!
//! A connection reports what happens on the socket through its
//! [`EventBus<ConnectionEvent>`]:
//!
//! - `Opened` after `open` succeeds
//! - `Payload(text)` for every inbound text frame, in arrival order
//! - `Error(err)` for transport failures
//! - `Closed` exactly once per opened socket, whoever closed it

use crate::connection_state::{ConnectionState, StateTracker};
use crate::events::EventBus;
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use relaykit_core::{Error, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// How long `close` waits for the peer to finish the close handshake
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Something that happened on a connection
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    Opened,
    Closed,
    Payload(String),
    Error(Error),
}

/// An open/close-able duplex text channel to the relay
#[async_trait]
pub trait Connection: Send + Sync {
    /// Endpoint this connection dials
    fn url(&self) -> &str;

    async fn open(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;

    async fn send(&self, payload: String) -> Result<()>;

    fn is_connected(&self) -> bool;

    fn is_connecting(&self) -> bool;

    /// Whether the platform has suspended the socket (e.g. app in background)
    fn is_paused(&self) -> bool;

    fn events(&self) -> &EventBus<ConnectionEvent>;
}

/// Creates connections for a fully formatted relay URL
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn create_connection(&self, url: &str) -> Result<Arc<dyn Connection>>;
}

/// Factory for [`WsConnection`]
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnectionFactory;

#[async_trait]
impl ConnectionFactory for WsConnectionFactory {
    async fn create_connection(&self, url: &str) -> Result<Arc<dyn Connection>> {
        Ok(Arc::new(WsConnection::new(url)))
    }
}

struct WsInner {
    url: String,
    state: StateTracker,
    sink: tokio::sync::Mutex<Option<WsSink>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    events: EventBus<ConnectionEvent>,
}

impl WsInner {
    fn take_reader(&self) -> Option<JoinHandle<()>> {
        self.reader
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    async fn mark_closed(&self) {
        if self.state.transition(ConnectionState::Disconnected) != ConnectionState::Disconnected {
            self.sink.lock().await.take();
            tracing::debug!(url = %self.url, "socket closed");
            self.events.emit(ConnectionEvent::Closed);
        }
    }
}

/// Drops a half-finished connect back to `Disconnected`, including when the
/// `open` future is cancelled by a timeout
struct ConnectingReset<'a>(&'a StateTracker);

impl Drop for ConnectingReset<'_> {
    fn drop(&mut self) {
        self.0
            .transition_from(ConnectionState::Connecting, ConnectionState::Disconnected);
    }
}

/// WebSocket connection over tokio-tungstenite
pub struct WsConnection {
    inner: Arc<WsInner>,
}

impl WsConnection {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(WsInner {
                url: url.into(),
                state: StateTracker::new(),
                sink: tokio::sync::Mutex::new(None),
                reader: Mutex::new(None),
                events: EventBus::new(),
            }),
        }
    }

    /// Mark the socket as suspended or resumed by the platform
    pub fn set_paused(&self, paused: bool) {
        self.inner.state.set_paused(paused);
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.get()
    }

    async fn read_loop(inner: Arc<WsInner>, mut stream: SplitStream<WsStream>) {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => inner.events.emit(ConnectionEvent::Payload(text)),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => inner.events.emit(ConnectionEvent::Payload(text)),
                    Err(_) => tracing::debug!(url = %inner.url, "dropping non-UTF-8 binary frame"),
                },
                Ok(Message::Close(frame)) => {
                    tracing::debug!(url = %inner.url, ?frame, "close frame received");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(url = %inner.url, error = %e, "socket read failed");
                    inner
                        .events
                        .emit(ConnectionEvent::Error(Error::WebSocket(e.to_string())));
                    break;
                }
            }
        }

        inner.mark_closed().await;
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        if let Some(reader) = self.inner.take_reader() {
            reader.abort();
        }
    }
}

#[async_trait]
impl Connection for WsConnection {
    fn url(&self) -> &str {
        &self.inner.url
    }

    #[tracing::instrument(skip(self), fields(url = %self.inner.url))]
    async fn open(&self) -> Result<()> {
        if !self
            .inner
            .state
            .transition_from(ConnectionState::Disconnected, ConnectionState::Connecting)
        {
            return match self.inner.state.get() {
                ConnectionState::Connected => Ok(()),
                _ => Err(Error::WebSocket("connection attempt already in progress".to_string())),
            };
        }

        let _reset = ConnectingReset(&self.inner.state);
        let stream = match connect_async(self.inner.url.as_str()).await {
            Ok((stream, _response)) => stream,
            Err(e) => {
                let err = Error::WebSocket(e.to_string());
                self.inner.events.emit(ConnectionEvent::Error(err.clone()));
                return Err(err);
            }
        };

        let (sink, stream) = stream.split();
        *self.inner.sink.lock().await = Some(sink);
        self.inner.state.transition(ConnectionState::Connected);

        let reader = tokio::spawn(Self::read_loop(Arc::clone(&self.inner), stream));
        *self
            .inner
            .reader
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(reader);

        tracing::debug!("socket opened");
        self.inner.events.emit(ConnectionEvent::Opened);
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(url = %self.inner.url))]
    async fn close(&self) -> Result<()> {
        let sink = self.inner.sink.lock().await.take();
        if let Some(mut sink) = sink {
            if let Err(e) = sink.close().await {
                tracing::debug!(error = %e, "close frame not delivered");
            }
        }

        if let Some(mut reader) = self.inner.take_reader() {
            if tokio::time::timeout(CLOSE_HANDSHAKE_TIMEOUT, &mut reader)
                .await
                .is_err()
            {
                reader.abort();
            }
        }

        self.inner.mark_closed().await;
        Ok(())
    }

    async fn send(&self, payload: String) -> Result<()> {
        let mut sink = self.inner.sink.lock().await;
        let sink = sink.as_mut().ok_or(Error::ConnectionClosed)?;
        sink.send(Message::Text(payload))
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))
    }

    fn is_connected(&self) -> bool {
        self.inner.state.is_connected()
    }

    fn is_connecting(&self) -> bool {
        self.inner.state.is_connecting()
    }

    fn is_paused(&self) -> bool {
        self.inner.state.is_paused()
    }

    fn events(&self) -> &EventBus<ConnectionEvent> {
        &self.inner.events
    }
}
