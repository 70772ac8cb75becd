//! Per-topic record of seen message content
//!
//! The dedup key is `(topic, sha256(message))`. Records are kept in memory and
//! written through to storage under `<prefix>//messages` as
//! `topic → { hash → message }`. Nothing is ever removed here.

use relaykit_core::{Error, KeyValueStorage, KeyValueStorageExt, Result};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

type MessageRecords = BTreeMap<String, BTreeMap<String, String>>;

/// Hex-encoded sha256 of a message payload
pub fn hash_message(message: &str) -> String {
    hex::encode(Sha256::digest(message.as_bytes()))
}

pub struct MessageTracker {
    storage: Arc<dyn KeyValueStorage>,
    storage_key: String,
    records: Mutex<MessageRecords>,
    initialized: AtomicBool,
}

impl MessageTracker {
    pub fn new(storage: Arc<dyn KeyValueStorage>, storage_prefix: &str) -> Self {
        Self {
            storage,
            storage_key: format!("{}//messages", storage_prefix),
            records: Mutex::new(BTreeMap::new()),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Load persisted records; a second call is a no-op
    pub async fn init(&self) -> Result<()> {
        let mut records = self.records.lock().await;
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(persisted) = self.storage.get_typed::<MessageRecords>(&self.storage_key).await? {
            tracing::debug!(topics = persisted.len(), "restored message records");
            *records = persisted;
        }
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::NotInitialized("MessageTracker".to_string()))
        }
    }

    /// Record `message` under `topic`, returning its hash
    pub async fn set(&self, topic: &str, message: &str) -> Result<String> {
        self.ensure_initialized()?;
        let hash = hash_message(message);

        let mut records = self.records.lock().await;
        let topic_records = records.entry(topic.to_string()).or_default();
        if topic_records.contains_key(&hash) {
            return Ok(hash);
        }
        topic_records.insert(hash.clone(), message.to_string());

        self.storage.set_typed(&self.storage_key, &*records).await?;
        Ok(hash)
    }

    /// Whether this exact payload was already recorded for `topic`
    pub async fn has(&self, topic: &str, message: &str) -> Result<bool> {
        self.ensure_initialized()?;
        let hash = hash_message(message);
        Ok(self
            .records
            .lock()
            .await
            .get(topic)
            .map(|topic_records| topic_records.contains_key(&hash))
            .unwrap_or(false))
    }

    /// Every recorded `hash → message` for `topic`
    pub async fn get(&self, topic: &str) -> Result<BTreeMap<String, String>> {
        self.ensure_initialized()?;
        Ok(self.records.lock().await.get(topic).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaykit_core::MemoryStorage;

    async fn tracker(storage: Arc<dyn KeyValueStorage>) -> MessageTracker {
        let tracker = MessageTracker::new(storage, "test");
        tracker.init().await.unwrap();
        tracker
    }

    #[test]
    fn test_hash_is_sha256_hex() {
        assert_eq!(
            hash_message("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_requires_init() {
        let tracker = MessageTracker::new(Arc::new(MemoryStorage::new()), "test");
        assert!(matches!(
            tracker.has("t", "m").await,
            Err(Error::NotInitialized(ref name)) if name == "MessageTracker"
        ));
    }

    #[tokio::test]
    async fn test_set_then_has_is_per_topic() {
        let tracker = tracker(Arc::new(MemoryStorage::new())).await;

        assert!(!tracker.has("t1", "hello").await.unwrap());
        tracker.set("t1", "hello").await.unwrap();

        assert!(tracker.has("t1", "hello").await.unwrap());
        assert!(!tracker.has("t2", "hello").await.unwrap());
        assert!(!tracker.has("t1", "other").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_twice_keeps_one_record() {
        let tracker = tracker(Arc::new(MemoryStorage::new())).await;

        let first = tracker.set("t", "m").await.unwrap();
        let second = tracker.set("t", "m").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(tracker.get("t").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_records_survive_restart() {
        let storage: Arc<dyn KeyValueStorage> = Arc::new(MemoryStorage::new());
        {
            let tracker = tracker(Arc::clone(&storage)).await;
            tracker.set("t", "persisted").await.unwrap();
        }

        assert!(storage.has_item("test//messages").await.unwrap());

        let restored = tracker(storage).await;
        assert!(restored.has("t", "persisted").await.unwrap());
    }
}
