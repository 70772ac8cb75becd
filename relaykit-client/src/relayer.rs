//! Relayer: connection lifecycle, recovery and message routing
//!
//! # Transport State Machine
//!
//! Three flags drive the transport:
//!
//! - **transport_explicitly_closed**: set by `transport_close`, cleared by
//!   `transport_open`; while set, disconnects do not trigger a restart
//! - **reconnecting**: single-flight guard claimed by `transport_open` and
//!   `restart_transport`; a second caller returns immediately
//! - **initialized**: set at the end of `init`; from then on every open also
//!   waits for the subscriber to finish resubscribing
//!
//! A connect that exceeds the connection timeout is a stall: it emits
//! [`RelayerEvent::TransportClosed`] and `transport_open` still returns
//! `Ok`. Every other connect failure propagates.
//!
//! # Inbound Pipeline
//!
//! Unsolicited frames from the provider are queued to a single task so that
//! the dedup check and the record step for one message never interleave with
//! another:
//!
//! 1. keep only requests whose method ends in `_subscription`
//! 2. acknowledge with `true`
//! 3. drop if the topic is not subscribed
//! 4. drop if `(topic, message)` was already recorded
//! 5. emit [`RelayerEvent::Message`], then record it

use crate::auth::{JwtSigner, RelayUrlBuilder, RelayUrlParams};
use crate::builder::RelayerOptions;
use crate::connection::ConnectionFactory;
use crate::connection_state::ConnectionState;
use crate::events::{EventBus, Subscription};
use crate::message_tracker::MessageTracker;
use crate::metrics::RelayerMetrics;
use crate::protocol::{
    MessageEvent, PublishOptions, SubscribeOptions, SubscriptionParams, UnsubscribeOptions, RELAY_PROTOCOL,
    RELAY_VERSION, SUBSCRIPTION_METHOD_SUFFIX,
};
use crate::provider::{call, Provider, ProviderEvent, RpcSender};
use crate::publisher::Publisher;
use crate::subscriber::{Subscriber, SubscriberEvent};
use async_trait::async_trait;
use relaykit_core::{codec, Error, JsonRpcMessage, Result, RpcMethod};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Upper bound on waiting for the provider to report a requested disconnect
const DISCONNECT_ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Events exposed by the relayer
#[derive(Debug, Clone)]
pub enum RelayerEvent {
    Connected,
    Disconnected,
    Error(Error),
    Message(MessageEvent),
    TransportClosed,
    ConnectionStalled,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Releases the reconnect flag when the transport operation ends
struct ReconnectGuard<'a>(&'a AtomicBool);

impl Drop for ReconnectGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Transport half of the relayer
///
/// Owns the provider and the flags. The subscriber and publisher reach the
/// relay through it as an [`RpcSender`], so every RPC first waits for an
/// established connection.
pub(crate) struct RelayerCore {
    self_ref: Weak<RelayerCore>,
    project_id: String,
    relay_url: RwLock<String>,
    connection_timeout: Option<Duration>,
    request_timeout: Duration,
    poll_interval: Duration,
    factory: Arc<dyn ConnectionFactory>,
    signer: Arc<dyn JwtSigner>,
    url_builder: Arc<dyn RelayUrlBuilder>,
    provider: RwLock<Option<Arc<Provider>>>,
    provider_listeners: Mutex<Vec<Subscription>>,
    events: EventBus<RelayerEvent>,
    subscriber_events: EventBus<SubscriberEvent>,
    inbound_tx: mpsc::UnboundedSender<String>,
    transport_explicitly_closed: AtomicBool,
    reconnecting: AtomicBool,
    initialized: AtomicBool,
    disposed: AtomicBool,
    cancel: CancellationToken,
    metrics: Option<Arc<RelayerMetrics>>,
}

impl RelayerCore {
    fn provider(&self) -> Option<Arc<Provider>> {
        self.provider
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn current_provider(&self) -> Result<Arc<Provider>> {
        self.provider()
            .ok_or_else(|| Error::NotInitialized("Provider".to_string()))
    }

    fn relay_url(&self) -> String {
        self.relay_url
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_relay_url(&self, url: Option<String>) {
        if let Some(url) = url {
            *self
                .relay_url
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = url;
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn is_connected(&self) -> bool {
        self.provider().map(|p| p.is_connected()).unwrap_or(false)
    }

    fn is_connecting(&self) -> bool {
        self.provider().map(|p| p.is_connecting()).unwrap_or(false)
    }

    fn is_paused(&self) -> bool {
        self.provider().map(|p| p.is_paused()).unwrap_or(false)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::NotInitialized("Relayer".to_string()))
        }
    }

    fn report_error(&self, err: Error) {
        if let Some(ref m) = self.metrics {
            m.record_error(err.kind());
        }
        self.events.emit(RelayerEvent::Error(err));
    }

    /// Sign, format the URL, create a connection and swap in a new provider
    async fn create_provider(&self) -> Result<()> {
        let relay_url = self.relay_url();
        let auth = self.signer.sign_jwt(&relay_url).await?;
        let url = self.url_builder.format_relay_rpc_url(RelayUrlParams {
            relay_url: &relay_url,
            protocol: RELAY_PROTOCOL,
            version: RELAY_VERSION,
            project_id: &self.project_id,
            auth: &auth,
        })?;

        let connection = self.factory.create_connection(&url).await?;
        let provider = Arc::new(Provider::with_metrics(
            connection,
            self.request_timeout,
            self.metrics.clone(),
        ));

        let listener = self.provider_listener(&provider);
        *lock(&self.provider_listeners) = vec![listener];
        *self
            .provider
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(provider);

        tracing::debug!(relay_url = %relay_url, "provider created");
        Ok(())
    }

    fn provider_listener(&self, provider: &Provider) -> Subscription {
        let weak = self.self_ref.clone();
        provider.events().subscribe(move |event| {
            let Some(core) = weak.upgrade() else {
                return;
            };
            if core.is_disposed() {
                return;
            }

            match event {
                ProviderEvent::Connected => {
                    if let Some(ref m) = core.metrics {
                        m.update_connection_state(ConnectionState::Connected);
                    }
                    core.events.emit(RelayerEvent::Connected);
                }
                ProviderEvent::Disconnected => {
                    if let Some(ref m) = core.metrics {
                        m.update_connection_state(ConnectionState::Disconnected);
                    }
                    core.events.emit(RelayerEvent::Disconnected);
                    if !core.transport_explicitly_closed.load(Ordering::SeqCst) {
                        core.spawn_restart("disconnected");
                    }
                }
                ProviderEvent::RawMessage(text) => {
                    if core.inbound_tx.send(text.clone()).is_err() {
                        tracing::debug!("inbound pipeline stopped, dropping frame");
                    }
                }
                ProviderEvent::Error(err) => core.events.emit(RelayerEvent::Error(err.clone())),
            }
        })
    }

    fn spawn_restart(&self, reason: &'static str) {
        let Some(core) = self.self_ref.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            tracing::info!(reason, "restarting transport");
            if let Err(e) = core.restart_transport(None).await {
                tracing::warn!(reason, error = %e, "transport restart failed");
                core.report_error(e);
            }
        });
    }

    #[tracing::instrument(skip(self))]
    pub(crate) async fn transport_close(&self) -> Result<()> {
        self.transport_explicitly_closed.store(true, Ordering::SeqCst);
        if self.is_connected() {
            self.current_provider()?.disconnect().await?;
            self.events.emit(RelayerEvent::TransportClosed);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) async fn transport_open(&self, relay_url: Option<String>) -> Result<()> {
        self.transport_explicitly_closed.store(false, Ordering::SeqCst);
        if self
            .reconnecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("transport open already in flight");
            return Ok(());
        }
        let _guard = ReconnectGuard(&self.reconnecting);

        self.set_relay_url(relay_url);
        self.open().await
    }

    /// Connect the current provider; the caller holds the reconnect flag
    async fn open(&self) -> Result<()> {
        self.transport_explicitly_closed.store(false, Ordering::SeqCst);
        let provider = self.current_provider()?;

        let resubscribed = if self.initialized.load(Ordering::SeqCst) {
            Some(
                self.subscriber_events
                    .once(|e| matches!(e, SubscriberEvent::Resubscribed)),
            )
        } else {
            None
        };
        let transport_closed = self
            .events
            .once(|e| matches!(e, RelayerEvent::TransportClosed));

        let wait_resubscribed = async {
            match resubscribed {
                Some(signal) => signal.wait().await.map(|_| ()),
                None => Ok(()),
            }
        };

        let connect = async {
            let connect = async {
                match self.connection_timeout {
                    Some(limit) => match tokio::time::timeout(limit, provider.connect()).await {
                        Ok(result) => result,
                        Err(_) => Err(Error::TransportStalled),
                    },
                    None => provider.connect().await,
                }
            };
            tokio::select! {
                result = connect => result,
                _ = transport_closed.wait() => Err(Error::TransportClosed),
            }
        };

        let opened = tokio::select! {
            result = async { tokio::try_join!(wait_resubscribed, connect) } => result,
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
        };

        match opened {
            Ok(_) => {
                tracing::info!("transport open");
                Ok(())
            }
            Err(Error::TransportStalled) => {
                tracing::warn!(timeout = ?self.connection_timeout, "socket stalled");
                if let Some(ref m) = self.metrics {
                    m.record_transport_stall();
                }
                self.events.emit(RelayerEvent::TransportClosed);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    #[tracing::instrument(skip(self))]
    pub(crate) async fn restart_transport(&self, relay_url: Option<String>) -> Result<()> {
        if self.is_disposed() || self.transport_explicitly_closed.load(Ordering::SeqCst) {
            return Ok(());
        }
        if self
            .reconnecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("restart already in flight");
            return Ok(());
        }
        let _guard = ReconnectGuard(&self.reconnecting);

        if let Some(ref m) = self.metrics {
            m.record_transport_restart();
        }
        self.set_relay_url(relay_url);

        if self.is_connected() {
            let provider = self.current_provider()?;
            let disconnected = provider
                .events()
                .once(|e| matches!(e, ProviderEvent::Disconnected));
            self.transport_close().await?;
            if tokio::time::timeout(DISCONNECT_ACK_TIMEOUT, disconnected.wait())
                .await
                .is_err()
            {
                tracing::debug!("no disconnect acknowledgment, continuing restart");
            }
        }

        self.create_provider().await?;
        self.open().await
    }

    async fn pause(&self, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            _ = tokio::time::sleep(self.poll_interval) => Ok(()),
            _ = cancel.cancelled() => Err(Error::Cancelled),
        }
    }

    /// Wait until a request can be sent
    ///
    /// A restart already in flight elsewhere counts as connecting.
    pub(crate) async fn to_establish_connection(&self, cancel: &CancellationToken) -> Result<()> {
        if self.is_connected() {
            while self.is_paused() && !self.is_disposed() {
                tracing::debug!("waiting for connection to unpause");
                self.pause(cancel).await?;
            }
            return Ok(());
        }

        if !self.is_connecting() {
            tokio::select! {
                result = self.restart_transport(None) => result?,
                _ = cancel.cancelled() => return Err(Error::Cancelled),
            }
        }

        while (self.is_connecting() || self.reconnecting.load(Ordering::SeqCst)) && !self.is_disposed() {
            tracing::debug!("waiting for connection to open");
            self.pause(cancel).await?;
        }

        if self.is_connected() {
            Ok(())
        } else {
            Err(Error::ConnectionLost)
        }
    }
}

#[async_trait]
impl RpcSender for RelayerCore {
    async fn send_request(&self, method: &'static str, params: serde_json::Value) -> Result<serde_json::Value> {
        self.to_establish_connection(&self.cancel).await?;
        self.current_provider()?.request_raw(method, params).await
    }
}

/// Sequential processing of unsolicited relay frames
struct InboundPipeline {
    core: Arc<RelayerCore>,
    subscriber: Arc<Subscriber>,
    messages: Arc<MessageTracker>,
}

impl InboundPipeline {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<String>, cancel: CancellationToken) {
        loop {
            let text = tokio::select! {
                _ = cancel.cancelled() => break,
                next = rx.recv() => match next {
                    Some(text) => text,
                    None => break,
                },
            };

            if let Err(e) = self.on_payload(&text).await {
                tracing::warn!(error = %e, "inbound message handling failed");
                self.core.report_error(e);
            }
        }
        tracing::debug!("inbound pipeline stopped");
    }

    async fn on_payload(&self, text: &str) -> Result<()> {
        let request = match codec::decode(text)? {
            JsonRpcMessage::Request(request) => request,
            _ => return Ok(()),
        };
        if !request.method.ends_with(SUBSCRIPTION_METHOD_SUFFIX) {
            tracing::debug!(method = %request.method, "ignoring unsolicited request");
            return Ok(());
        }

        let params: SubscriptionParams = request.params_as()?;

        if let Err(e) = self.acknowledge(&request.id).await {
            tracing::warn!(id = %request.id, error = %e, "failed to acknowledge subscription push");
        }

        self.on_message_event(MessageEvent::from(params.data)).await
    }

    async fn acknowledge(&self, id: &relaykit_core::Id) -> Result<()> {
        self.core
            .current_provider()?
            .respond(id.clone(), serde_json::Value::Bool(true))
            .await
    }

    async fn on_message_event(&self, event: MessageEvent) -> Result<()> {
        if self.core.is_disposed() {
            return Ok(());
        }
        if !self.subscriber.is_subscribed(&event.topic) {
            tracing::debug!(topic = %event.topic, "message for unsubscribed topic dropped");
            return Ok(());
        }
        if self.messages.has(&event.topic, &event.message).await? {
            tracing::debug!(topic = %event.topic, "duplicate message dropped");
            if let Some(ref m) = self.core.metrics {
                m.record_message(true);
            }
            return Ok(());
        }

        if let Some(ref m) = self.core.metrics {
            m.record_message(false);
        }
        let (topic, message) = (event.topic.clone(), event.message.clone());
        self.core.events.emit(RelayerEvent::Message(event));
        self.messages.set(&topic, &message).await?;
        Ok(())
    }
}

/// Resilient topic-addressed publish/subscribe over one relay connection
///
/// ```rust,no_run
/// use relaykit_client::{RelayerBuilder, RelayerEvent, StaticJwtSigner};
/// use std::sync::Arc;
///
/// # async fn example() -> relaykit_core::Result<()> {
/// let relayer = RelayerBuilder::new("my-project-id")
///     .signer(Arc::new(StaticJwtSigner::new("pre-issued-jwt")))
///     .init()
///     .await?;
///
/// let _listener = relayer.events().subscribe(|event| {
///     if let RelayerEvent::Message(message) = event {
///         println!("{}: {}", message.topic, message.message);
///     }
/// });
///
/// let id = relayer.subscribe("my-topic", None).await?;
/// relayer.publish("my-topic", "hello", None).await?;
/// # let _ = id;
/// # Ok(())
/// # }
/// ```
pub struct Relayer {
    core: Arc<RelayerCore>,
    subscriber: Arc<Subscriber>,
    publisher: Publisher,
    messages: Arc<MessageTracker>,
    listeners: Mutex<Vec<Subscription>>,
    inbound_rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    inbound_task: Mutex<Option<JoinHandle<()>>>,
}

impl Relayer {
    pub fn new(options: RelayerOptions) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let subscriber_events = EventBus::new();
        let metrics = options.metrics.clone();

        let core = Arc::new_cyclic(|self_ref| RelayerCore {
            self_ref: self_ref.clone(),
            project_id: options.project_id.clone(),
            relay_url: RwLock::new(options.relay_url.clone()),
            connection_timeout: options.connection_timeout,
            request_timeout: options.request_timeout,
            poll_interval: options.poll_interval,
            factory: Arc::clone(&options.connection_factory),
            signer: Arc::clone(&options.signer),
            url_builder: Arc::clone(&options.url_builder),
            provider: RwLock::new(None),
            provider_listeners: Mutex::new(Vec::new()),
            events: EventBus::new(),
            subscriber_events: subscriber_events.clone(),
            inbound_tx,
            transport_explicitly_closed: AtomicBool::new(false),
            reconnecting: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            metrics: metrics.clone(),
        });

        let rpc: Arc<dyn RpcSender> = core.clone();
        let subscriber = Arc::new(Subscriber::with_events(
            Arc::clone(&rpc),
            Arc::clone(&options.storage),
            &options.storage_prefix,
            options.resubscribe_batch_size,
            metrics.clone(),
            subscriber_events,
        ));
        let publisher = Publisher::new(rpc, Arc::clone(&options.publish_retry), metrics);
        let messages = Arc::new(MessageTracker::new(
            Arc::clone(&options.storage),
            &options.storage_prefix,
        ));

        Self {
            core,
            subscriber,
            publisher,
            messages,
            listeners: Mutex::new(Vec::new()),
            inbound_rx: Mutex::new(Some(inbound_rx)),
            inbound_task: Mutex::new(None),
        }
    }

    pub fn events(&self) -> &EventBus<RelayerEvent> {
        &self.core.events
    }

    pub fn subscriber(&self) -> &Arc<Subscriber> {
        &self.subscriber
    }

    pub fn messages(&self) -> &Arc<MessageTracker> {
        &self.messages
    }

    pub fn provider(&self) -> Option<Arc<Provider>> {
        self.core.provider()
    }

    pub fn relay_url(&self) -> String {
        self.core.relay_url()
    }

    pub fn is_initialized(&self) -> bool {
        self.core.initialized.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.core.is_connected()
    }

    pub fn is_connecting(&self) -> bool {
        self.core.is_connecting()
    }

    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }

    /// Create the provider, open the transport and bring up the sub-components
    #[tracing::instrument(skip(self), fields(relay_url = %self.core.relay_url()))]
    pub async fn init(&self) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }

        tracing::info!("creating provider");
        self.core.create_provider().await?;

        tracing::info!("opening transport");
        self.core.transport_open(None).await?;

        tokio::try_join!(self.messages.init(), self.subscriber.init())?;

        self.register_event_listeners();
        self.start_inbound_pipeline();
        self.core.initialized.store(true, Ordering::SeqCst);

        if self.subscriber.has_pending() {
            if let Err(e) = self.subscriber.resubscribe(&self.core.cancel).await {
                tracing::warn!(error = %e, "restoring persisted subscriptions failed");
            }
        }

        tracing::info!("relayer initialized");
        Ok(())
    }

    fn register_event_listeners(&self) {
        let subscriber = Arc::downgrade(&self.subscriber);
        let cancel = self.core.cancel.clone();
        let on_connected = self.core.events.subscribe(move |event| {
            if !matches!(event, RelayerEvent::Connected) {
                return;
            }
            let Some(subscriber) = subscriber.upgrade() else {
                return;
            };
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if let Err(e) = subscriber.resubscribe(&cancel).await {
                    tracing::warn!(error = %e, "resubscribe failed");
                }
            });
        });

        let core = Arc::downgrade(&self.core);
        let on_stalled = self.core.events.subscribe(move |event| {
            if !matches!(event, RelayerEvent::ConnectionStalled) {
                return;
            }
            let Some(core) = core.upgrade() else {
                return;
            };
            if core.is_disposed() || core.is_paused() {
                return;
            }
            core.spawn_restart("connection stalled");
        });

        lock(&self.listeners).extend([on_connected, on_stalled]);
    }

    fn start_inbound_pipeline(&self) {
        let Some(rx) = lock(&self.inbound_rx).take() else {
            return;
        };
        let pipeline = InboundPipeline {
            core: Arc::clone(&self.core),
            subscriber: Arc::clone(&self.subscriber),
            messages: Arc::clone(&self.messages),
        };
        let handle = tokio::spawn(pipeline.run(rx, self.core.cancel.clone()));
        *lock(&self.inbound_task) = Some(handle);
    }

    /// Publish `message` on `topic` and record it so a relay echo is dropped
    #[tracing::instrument(skip(self, message, opts))]
    pub async fn publish(&self, topic: &str, message: &str, opts: Option<PublishOptions>) -> Result<()> {
        self.core.ensure_initialized()?;
        self.publisher
            .publish(topic, message, opts.unwrap_or_default())
            .await?;
        self.messages.set(topic, message).await?;
        Ok(())
    }

    /// Subscribe to `topic`; an existing subscription id is returned as is
    ///
    /// For a new subscription the subscriber has emitted
    /// [`SubscriberEvent::Created`] before this returns.
    #[tracing::instrument(skip(self, opts))]
    pub async fn subscribe(&self, topic: &str, opts: Option<SubscribeOptions>) -> Result<String> {
        self.core.ensure_initialized()?;
        if let Some(id) = self.subscriber.canonical_id(topic) {
            return Ok(id);
        }
        self.subscriber.subscribe(topic, opts.unwrap_or_default()).await
    }

    #[tracing::instrument(skip(self, opts))]
    pub async fn unsubscribe(&self, topic: &str, opts: Option<UnsubscribeOptions>) -> Result<()> {
        self.core.ensure_initialized()?;
        self.subscriber.unsubscribe(topic, opts.unwrap_or_default()).await
    }

    /// Send a typed request once a connection is established
    pub async fn request<P, R>(&self, params: &P) -> Result<R>
    where
        P: RpcMethod + Serialize + Sync,
        R: DeserializeOwned,
    {
        self.core.ensure_initialized()?;
        call(self.core.as_ref(), params).await
    }

    /// Wait until a request can be sent, restarting the transport if needed
    pub async fn to_establish_connection(&self, cancel: &CancellationToken) -> Result<()> {
        self.core.to_establish_connection(cancel).await
    }

    pub async fn transport_close(&self) -> Result<()> {
        self.core.transport_close().await
    }

    pub async fn transport_open(&self, relay_url: Option<String>) -> Result<()> {
        self.core.transport_open(relay_url).await
    }

    pub async fn restart_transport(&self, relay_url: Option<String>) -> Result<()> {
        self.core.restart_transport(relay_url).await
    }

    /// Signal from an external watchdog that the socket looks dead
    pub fn trigger_connection_stalled(&self) {
        self.core.events.emit(RelayerEvent::ConnectionStalled);
    }

    /// Unregister listeners, stop the inbound pipeline and close the transport
    pub async fn dispose(&self) -> Result<()> {
        if self.core.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!("disposing relayer");

        lock(&self.listeners).clear();
        self.core.cancel.cancel();
        let task = lock(&self.inbound_task).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::debug!(error = %e, "inbound pipeline task ended abnormally");
            }
        }

        let result = self.core.transport_close().await;
        lock(&self.core.provider_listeners).clear();
        result
    }
}

impl Drop for Relayer {
    fn drop(&mut self) {
        self.core.disposed.store(true, Ordering::SeqCst);
        self.core.cancel.cancel();
        if let Some(task) = lock(&self.inbound_task).take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for Relayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relayer")
            .field("relay_url", &self.core.relay_url())
            .field("initialized", &self.is_initialized())
            .field("connected", &self.is_connected())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
