//! Topic subscription bookkeeping
//!
//! The [`TopicMap`] is the only place that answers "is this topic active".
//! Every confirmed subscription also lives in an id-keyed table so it can be
//! persisted under `<prefix>//subscription` and restored on the next start.
//!
//! # Resubscribe
//!
//! After a reconnect the relay has forgotten us. [`Subscriber::resubscribe`]
//! moves every known subscription back to pending, clears the topic map and
//! re-issues them through `irn_batchSubscribe` in fixed-size batches. A batch
//! that fails is logged and its topics stay pending for the next reconnect.
//! [`SubscriberEvent::Resubscribed`] is emitted exactly once per call, after
//! the last batch, whether the pass succeeded or not.

use crate::events::EventBus;
use crate::metrics::RelayerMetrics;
use crate::protocol::{
    ActiveSubscription, BatchSubscribeParams, SubscribeOptions, SubscribeParams, UnsubscribeOptions,
    UnsubscribeParams,
};
use crate::provider::{call, RpcSender};
use relaykit_core::{Error, KeyValueStorage, KeyValueStorageExt, Result};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// Default number of topics per `irn_batchSubscribe`
pub const DEFAULT_RESUBSCRIBE_BATCH_SIZE: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriberEvent {
    Created(ActiveSubscription),
    Deleted { topic: String, id: String },
    Resubscribed,
}

/// topic → subscription ids, first id canonical
#[derive(Debug, Clone, Default)]
pub struct TopicMap {
    map: BTreeMap<String, Vec<String>>,
}

impl TopicMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` under `topic`; a repeated id is ignored
    pub fn set(&mut self, topic: &str, id: &str) {
        let ids = self.map.entry(topic.to_string()).or_default();
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }

    pub fn get(&self, topic: &str) -> &[String] {
        self.map.get(topic).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn canonical(&self, topic: &str) -> Option<&str> {
        self.get(topic).first().map(String::as_str)
    }

    pub fn has(&self, topic: &str) -> bool {
        !self.get(topic).is_empty()
    }

    /// Remove one id, or every id when `id` is `None`
    pub fn delete(&mut self, topic: &str, id: Option<&str>) {
        match id {
            Some(id) => {
                if let Some(ids) = self.map.get_mut(topic) {
                    ids.retain(|existing| existing != id);
                    if ids.is_empty() {
                        self.map.remove(topic);
                    }
                }
            }
            None => {
                self.map.remove(topic);
            }
        }
    }

    pub fn topics(&self) -> Vec<String> {
        self.map.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

#[derive(Default)]
struct SubscriberState {
    topic_map: TopicMap,
    /// id → subscription
    active: BTreeMap<String, ActiveSubscription>,
    /// topic → last known subscription, awaiting resubscribe
    pending: BTreeMap<String, ActiveSubscription>,
}

impl SubscriberState {
    fn insert(&mut self, subscription: ActiveSubscription) {
        self.pending.remove(&subscription.topic);
        self.topic_map.set(&subscription.topic, &subscription.id);
        self.active.insert(subscription.id.clone(), subscription);
    }

    fn snapshot(&self) -> Vec<ActiveSubscription> {
        self.active
            .values()
            .chain(self.pending.values())
            .cloned()
            .collect()
    }
}

pub struct Subscriber {
    rpc: Arc<dyn RpcSender>,
    storage: Arc<dyn KeyValueStorage>,
    storage_key: String,
    state: Mutex<SubscriberState>,
    persist_lock: tokio::sync::Mutex<()>,
    /// topic → gate held by the subscribe call currently talking to the relay
    in_flight: Mutex<BTreeMap<String, Arc<tokio::sync::Mutex<()>>>>,
    events: EventBus<SubscriberEvent>,
    batch_size: usize,
    initialized: AtomicBool,
    metrics: Option<Arc<RelayerMetrics>>,
}

impl Subscriber {
    pub fn new(
        rpc: Arc<dyn RpcSender>,
        storage: Arc<dyn KeyValueStorage>,
        storage_prefix: &str,
        batch_size: usize,
        metrics: Option<Arc<RelayerMetrics>>,
    ) -> Self {
        Self::with_events(rpc, storage, storage_prefix, batch_size, metrics, EventBus::new())
    }

    /// Build on an existing event bus so listeners can attach before the subscriber exists
    pub fn with_events(
        rpc: Arc<dyn RpcSender>,
        storage: Arc<dyn KeyValueStorage>,
        storage_prefix: &str,
        batch_size: usize,
        metrics: Option<Arc<RelayerMetrics>>,
        events: EventBus<SubscriberEvent>,
    ) -> Self {
        Self {
            rpc,
            storage,
            storage_key: format!("{}//subscription", storage_prefix),
            state: Mutex::new(SubscriberState::default()),
            persist_lock: tokio::sync::Mutex::new(()),
            in_flight: Mutex::new(BTreeMap::new()),
            events,
            batch_size: batch_size.max(1),
            initialized: AtomicBool::new(false),
            metrics,
        }
    }

    fn state(&self) -> MutexGuard<'_, SubscriberState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::NotInitialized("Subscriber".to_string()))
        }
    }

    pub fn events(&self) -> &EventBus<SubscriberEvent> {
        &self.events
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Restore persisted subscriptions as pending
    pub async fn init(&self) -> Result<()> {
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }

        let persisted: Vec<ActiveSubscription> = self
            .storage
            .get_typed(&self.storage_key)
            .await?
            .unwrap_or_default();

        if !persisted.is_empty() {
            tracing::info!(count = persisted.len(), "restored persisted subscriptions");
            let mut state = self.state();
            for subscription in persisted {
                state.pending.insert(subscription.topic.clone(), subscription);
            }
        }

        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.state().topic_map.has(topic)
    }

    /// First subscription id recorded for `topic`
    pub fn canonical_id(&self, topic: &str) -> Option<String> {
        self.state().topic_map.canonical(topic).map(str::to_string)
    }

    pub fn ids(&self, topic: &str) -> Vec<String> {
        self.state().topic_map.get(topic).to_vec()
    }

    pub fn topics(&self) -> Vec<String> {
        self.state().topic_map.topics()
    }

    pub fn subscriptions(&self) -> Vec<ActiveSubscription> {
        self.state().active.values().cloned().collect()
    }

    pub fn pending_topics(&self) -> Vec<String> {
        self.state().pending.keys().cloned().collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.state().pending.is_empty()
    }

    /// Subscribe to `topic`, returning the canonical subscription id
    ///
    /// Concurrent calls for one topic share a single relay subscribe.
    #[tracing::instrument(skip(self, opts))]
    pub async fn subscribe(&self, topic: &str, opts: SubscribeOptions) -> Result<String> {
        self.ensure_initialized()?;
        if let Some(id) = self.canonical_id(topic) {
            return Ok(id);
        }

        let gate = self.topic_gate(topic);
        let result = {
            let _held = gate.lock().await;
            match self.canonical_id(topic) {
                Some(id) => Ok(id),
                None => self.subscribe_on_relay(topic, opts).await,
            }
        };
        self.release_gate(topic, gate);
        result
    }

    fn topic_gate(&self, topic: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(in_flight.entry(topic.to_string()).or_default())
    }

    fn release_gate(&self, topic: &str, gate: Arc<tokio::sync::Mutex<()>>) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        drop(gate);
        // only the map still holds it: nobody else is waiting
        if in_flight.get(topic).is_some_and(|g| Arc::strong_count(g) == 1) {
            in_flight.remove(topic);
        }
    }

    async fn subscribe_on_relay(&self, topic: &str, opts: SubscribeOptions) -> Result<String> {
        let id: String = call(
            &*self.rpc,
            &SubscribeParams {
                topic: topic.to_string(),
            },
        )
        .await?;

        let subscription = ActiveSubscription {
            id: id.clone(),
            topic: topic.to_string(),
            relay: opts.relay,
        };
        self.state().insert(subscription.clone());
        self.persist().await?;

        tracing::debug!(%id, "subscription created");
        self.events.emit(SubscriberEvent::Created(subscription));
        Ok(id)
    }

    /// Unsubscribe one id (when `opts.id` is set) or every id under `topic`
    ///
    /// Local state is cleared even when a relay call fails; the first such
    /// failure is returned afterwards.
    #[tracing::instrument(skip(self, opts))]
    pub async fn unsubscribe(&self, topic: &str, opts: UnsubscribeOptions) -> Result<()> {
        self.ensure_initialized()?;

        let whole_topic = opts.id.is_none();
        let ids = match opts.id {
            Some(id) => vec![id],
            None => self.ids(topic),
        };

        let mut first_error = None;
        for id in ids {
            let result: Result<bool> = call(
                &*self.rpc,
                &UnsubscribeParams {
                    topic: topic.to_string(),
                    id: id.clone(),
                },
            )
            .await;

            if let Err(e) = result {
                tracing::warn!(%id, error = %e, "relay unsubscribe failed, removing locally");
                first_error.get_or_insert(e);
            }

            {
                let mut state = self.state();
                state.topic_map.delete(topic, Some(&id));
                state.active.remove(&id);
                if !state.topic_map.has(topic) {
                    state.pending.remove(topic);
                }
            }
            self.events.emit(SubscriberEvent::Deleted {
                topic: topic.to_string(),
                id,
            });
        }

        if whole_topic {
            self.state().pending.remove(topic);
        }

        self.persist().await?;
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Re-issue every known subscription after a reconnect
    ///
    /// [`SubscriberEvent::Resubscribed`] goes out even when the pass fails,
    /// so a transport open waiting on it always resumes.
    #[tracing::instrument(skip_all)]
    pub async fn resubscribe(&self, cancel: &CancellationToken) -> Result<()> {
        let result = self.resubscribe_pending(cancel).await;
        if let Err(ref e) = result {
            tracing::warn!(error = %e, "resubscribe incomplete");
        }
        self.events.emit(SubscriberEvent::Resubscribed);
        result
    }

    async fn resubscribe_pending(&self, cancel: &CancellationToken) -> Result<()> {
        self.ensure_initialized()?;

        let pending: Vec<ActiveSubscription> = {
            let mut state = self.state();
            let active = std::mem::take(&mut state.active);
            for (_, subscription) in active {
                state.pending.insert(subscription.topic.clone(), subscription);
            }
            state.topic_map.clear();
            state.pending.values().cloned().collect()
        };

        tracing::info!(topics = pending.len(), batch_size = self.batch_size, "resubscribing");

        for batch in pending.chunks(self.batch_size) {
            if cancel.is_cancelled() {
                tracing::debug!("resubscribe cancelled");
                return Err(Error::Cancelled);
            }
            self.resubscribe_batch(batch).await;
        }

        self.persist().await
    }

    async fn resubscribe_batch(&self, batch: &[ActiveSubscription]) {
        let topics: Vec<String> = batch.iter().map(|s| s.topic.clone()).collect();
        let result: Result<Vec<String>> = call(&*self.rpc, &BatchSubscribeParams { topics }).await;

        let ids = match result {
            Ok(ids) if ids.len() == batch.len() => ids,
            Ok(ids) => {
                tracing::warn!(
                    expected = batch.len(),
                    received = ids.len(),
                    "batch subscribe returned wrong number of ids"
                );
                return;
            }
            Err(e) => {
                tracing::warn!(topics = batch.len(), error = %e, "batch subscribe failed, topics stay pending");
                if let Some(ref m) = self.metrics {
                    m.record_error(e.kind());
                }
                return;
            }
        };

        let mut state = self.state();
        for (subscription, id) in batch.iter().zip(ids) {
            state.insert(ActiveSubscription {
                id,
                topic: subscription.topic.clone(),
                relay: subscription.relay.clone(),
            });
        }
    }

    async fn persist(&self) -> Result<()> {
        let _guard = self.persist_lock.lock().await;
        let (snapshot, active_topics) = {
            let state = self.state();
            (state.snapshot(), state.topic_map.len())
        };

        if let Some(ref m) = self.metrics {
            m.update_active_subscriptions(active_topics);
        }
        self.storage.set_typed(&self.storage_key, &snapshot).await
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("storage_key", &self.storage_key)
            .field("topics", &self.topics())
            .finish()
    }
}
