//! Pairing, session and proposal stores
//!
//! [`KeyedStore`] is the contract the session checks read from. Two
//! implementations ship here: [`MemoryStore`] and [`PersistentStore`], which
//! writes the full record list through to a [`KeyValueStorage`] under
//! `<prefix>//<name>` on every change.

use crate::namespace::{Namespaces, RequiredNamespaces};
use async_trait::async_trait;
use relaykit_core::{Error, KeyValueStorage, KeyValueStorageExt, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A record that knows its own key and expiry
pub trait StoreRecord: Clone + Send + Sync + 'static {
    type Key: Ord + Clone + fmt::Display + Send + Sync + 'static;

    fn key(&self) -> Self::Key;

    /// Unix seconds; `None` never expires
    fn expiry(&self) -> Option<i64>;
}

/// Async keyed collection of records
#[async_trait]
pub trait KeyedStore<V: StoreRecord>: Send + Sync {
    async fn keys(&self) -> Result<Vec<V::Key>>;

    async fn get(&self, key: &V::Key) -> Result<Option<V>>;

    /// Insert or replace the record under its own key
    async fn set(&self, value: V) -> Result<()>;

    async fn delete(&self, key: &V::Key) -> Result<()>;

    async fn contains(&self, key: &V::Key) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn values(&self) -> Result<Vec<V>>;
}

/// Relay protocol options negotiated for a pairing or session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayProtocol {
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl Default for RelayProtocol {
    fn default() -> Self {
        Self {
            protocol: "irn".to_string(),
            data: None,
        }
    }
}

/// One side of a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairingStruct {
    pub topic: String,
    pub expiry: Option<i64>,
    #[serde(default)]
    pub relay: RelayProtocol,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStruct {
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pairing_topic: Option<String>,
    pub expiry: Option<i64>,
    #[serde(default)]
    pub relay: RelayProtocol,
    #[serde(default)]
    pub controller: String,
    #[serde(default)]
    pub acknowledged: bool,
    pub namespaces: Namespaces,
    #[serde(default)]
    pub required_namespaces: RequiredNamespaces,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalStruct {
    pub id: i64,
    pub expiry: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pairing_topic: Option<String>,
    #[serde(default)]
    pub relays: Vec<RelayProtocol>,
    #[serde(default)]
    pub proposer: Participant,
    pub required_namespaces: RequiredNamespaces,
}

impl StoreRecord for PairingStruct {
    type Key = String;

    fn key(&self) -> String {
        self.topic.clone()
    }

    fn expiry(&self) -> Option<i64> {
        self.expiry
    }
}

impl StoreRecord for SessionStruct {
    type Key = String;

    fn key(&self) -> String {
        self.topic.clone()
    }

    fn expiry(&self) -> Option<i64> {
        self.expiry
    }
}

impl StoreRecord for ProposalStruct {
    type Key = i64;

    fn key(&self) -> i64 {
        self.id
    }

    fn expiry(&self) -> Option<i64> {
        self.expiry
    }
}

/// In-memory store
pub struct MemoryStore<V: StoreRecord> {
    records: RwLock<BTreeMap<V::Key, V>>,
}

impl<V: StoreRecord> MemoryStore<V> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<V: StoreRecord> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V: StoreRecord> KeyedStore<V> for MemoryStore<V> {
    async fn keys(&self) -> Result<Vec<V::Key>> {
        Ok(self.records.read().await.keys().cloned().collect())
    }

    async fn get(&self, key: &V::Key) -> Result<Option<V>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn set(&self, value: V) -> Result<()> {
        self.records.write().await.insert(value.key(), value);
        Ok(())
    }

    async fn delete(&self, key: &V::Key) -> Result<()> {
        self.records.write().await.remove(key);
        Ok(())
    }

    async fn values(&self) -> Result<Vec<V>> {
        Ok(self.records.read().await.values().cloned().collect())
    }
}

/// Store that writes through to a [`KeyValueStorage`]
pub struct PersistentStore<V: StoreRecord> {
    storage: Arc<dyn KeyValueStorage>,
    storage_key: String,
    records: RwLock<BTreeMap<V::Key, V>>,
    initialized: AtomicBool,
}

impl<V> PersistentStore<V>
where
    V: StoreRecord + Serialize + DeserializeOwned,
{
    pub fn new(storage: Arc<dyn KeyValueStorage>, storage_prefix: &str, name: &str) -> Self {
        Self {
            storage,
            storage_key: format!("{}//{}", storage_prefix, name),
            records: RwLock::new(BTreeMap::new()),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Load persisted records; a second call is a no-op
    pub async fn init(&self) -> Result<()> {
        let mut records = self.records.write().await;
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(persisted) = self.storage.get_typed::<Vec<V>>(&self.storage_key).await? {
            tracing::debug!(key = %self.storage_key, count = persisted.len(), "restored store records");
            *records = persisted.into_iter().map(|v| (v.key(), v)).collect();
        }
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::NotInitialized(self.storage_key.clone()))
        }
    }

    async fn persist(&self, records: &BTreeMap<V::Key, V>) -> Result<()> {
        let snapshot: Vec<&V> = records.values().collect();
        self.storage.set_typed(&self.storage_key, &snapshot).await
    }
}

#[async_trait]
impl<V> KeyedStore<V> for PersistentStore<V>
where
    V: StoreRecord + Serialize + DeserializeOwned,
{
    async fn keys(&self) -> Result<Vec<V::Key>> {
        self.ensure_initialized()?;
        Ok(self.records.read().await.keys().cloned().collect())
    }

    async fn get(&self, key: &V::Key) -> Result<Option<V>> {
        self.ensure_initialized()?;
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn set(&self, value: V) -> Result<()> {
        self.ensure_initialized()?;
        let mut records = self.records.write().await;
        records.insert(value.key(), value);
        self.persist(&records).await
    }

    async fn delete(&self, key: &V::Key) -> Result<()> {
        self.ensure_initialized()?;
        let mut records = self.records.write().await;
        if records.remove(key).is_some() {
            tracing::debug!(key = %key, "deleted store record");
            self.persist(&records).await?;
        }
        Ok(())
    }

    async fn values(&self) -> Result<Vec<V>> {
        self.ensure_initialized()?;
        Ok(self.records.read().await.values().cloned().collect())
    }
}
