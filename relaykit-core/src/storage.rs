//! Key-value storage contract
//!
//! Durable storage is an external collaborator. Components only see the
//! [`KeyValueStorage`] trait; values travel as `serde_json::Value` so the
//! trait stays object-safe, and [`KeyValueStorageExt`] adds typed helpers.
//!
//! Two implementations ship with the crate:
//!
//! - [`MemoryStorage`]: process-local, the default for tests and short-lived clients
//! - [`SledStorage`]: an embedded sled database on disk
//!
//! # Examples
//!
//! ```rust
//! use relaykit_core::storage::{KeyValueStorageExt, MemoryStorage};
//!
//! # async fn example() -> relaykit_core::Result<()> {
//! let storage = MemoryStorage::new();
//! storage.set_typed("counter", &3u32).await?;
//! let value: Option<u32> = storage.get_typed("counter").await?;
//! assert_eq!(value, Some(3));
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

/// Persisted key-value store consumed by the relayer and the namespace engine
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    /// All keys currently stored
    async fn keys(&self) -> Result<Vec<String>>;

    async fn has_item(&self, key: &str) -> Result<bool>;

    async fn get_item(&self, key: &str) -> Result<Option<serde_json::Value>>;

    async fn set_item(&self, key: &str, value: serde_json::Value) -> Result<()>;

    async fn remove_item(&self, key: &str) -> Result<()>;
}

/// Typed helpers on top of any [`KeyValueStorage`]
#[async_trait]
pub trait KeyValueStorageExt: KeyValueStorage {
    async fn get_typed<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self.get_item(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn set_typed<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.set_item(key, value).await
    }
}

impl<S: KeyValueStorage + ?Sized> KeyValueStorageExt for S {}

/// In-memory storage
#[derive(Clone, Default)]
pub struct MemoryStorage {
    items: Arc<RwLock<HashMap<String, serde_json::Value>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStorage for MemoryStorage {
    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.items.read().await.keys().cloned().collect())
    }

    async fn has_item(&self, key: &str) -> Result<bool> {
        Ok(self.items.read().await.contains_key(key))
    }

    async fn get_item(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: serde_json::Value) -> Result<()> {
        self.items.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.items.write().await.remove(key);
        Ok(())
    }
}

/// On-disk record; the value is kept as a JSON string for bincode compatibility
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredItem {
    data: String,
    updated_at: u64,
}

/// Storage backed by an embedded sled database
#[derive(Clone)]
pub struct SledStorage {
    tree: sled::Tree,
}

impl SledStorage {
    /// Open (or create) a database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)
            .map_err(|e| Error::Storage(format!("Failed to open sled database: {}", e)))?;
        let tree = db
            .open_tree("kv")
            .map_err(|e| Error::Storage(format!("Failed to open kv tree: {}", e)))?;
        Ok(Self { tree })
    }

    fn decode(bytes: &[u8]) -> Result<serde_json::Value> {
        let item: StoredItem = bincode::deserialize(bytes)
            .map_err(|e| Error::Storage(format!("Failed to deserialize item: {}", e)))?;
        serde_json::from_str(&item.data)
            .map_err(|e| Error::Storage(format!("Failed to parse item data: {}", e)))
    }
}

#[async_trait]
impl KeyValueStorage for SledStorage {
    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in self.tree.iter() {
            let (key, _) =
                entry.map_err(|e| Error::Storage(format!("Failed to iterate keys: {}", e)))?;
            keys.push(String::from_utf8_lossy(&key).into_owned());
        }
        Ok(keys)
    }

    async fn has_item(&self, key: &str) -> Result<bool> {
        self.tree
            .contains_key(key.as_bytes())
            .map_err(|e| Error::Storage(format!("Failed to read {}: {}", key, e)))
    }

    async fn get_item(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let raw = self
            .tree
            .get(key.as_bytes())
            .map_err(|e| Error::Storage(format!("Failed to read {}: {}", key, e)))?;
        raw.map(|bytes| Self::decode(&bytes)).transpose()
    }

    async fn set_item(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let updated_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let item = StoredItem {
            data: value.to_string(),
            updated_at,
        };
        let bytes = bincode::serialize(&item)
            .map_err(|e| Error::Storage(format!("Failed to serialize {}: {}", key, e)))?;

        self.tree
            .insert(key.as_bytes(), bytes)
            .map_err(|e| Error::Storage(format!("Failed to store {}: {}", key, e)))?;
        self.tree
            .flush_async()
            .await
            .map_err(|e| Error::Storage(format!("Failed to flush {}: {}", key, e)))?;
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.tree
            .remove(key.as_bytes())
            .map_err(|e| Error::Storage(format!("Failed to remove {}: {}", key, e)))?;
        self.tree
            .flush_async()
            .await
            .map_err(|e| Error::Storage(format!("Failed to flush {}: {}", key, e)))?;
        Ok(())
    }
}
