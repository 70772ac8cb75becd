//! Default session, namespace and chain tracking
//!
//! The first session to connect becomes the default. Its default namespace
//! and chain follow the session's required namespaces (or its settled
//! namespaces when it required none) across updates. State is persisted
//! under `<context>-default-session` after every change.

use crate::caip::AccountId;
use crate::error::Result;
use crate::store::SessionStruct;
use relaykit_core::{KeyValueStorage, KeyValueStorageExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Persisted defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultData {
    pub session: Option<SessionStruct>,
    pub namespace: Option<String>,
    pub chain_id: Option<String>,
}

impl DefaultData {
    fn has_session(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| !s.topic.trim().is_empty())
    }

    /// Keep the namespace while the session still lists it, and the chain
    /// while that namespace still covers it; otherwise fall back to the
    /// first namespace and its first chain.
    fn refresh(&mut self) {
        let Some(session) = self.session.as_ref().filter(|s| !s.topic.trim().is_empty()) else {
            self.namespace = None;
            self.chain_id = None;
            return;
        };

        let chains_of = |key: &str| -> Option<Vec<String>> {
            if session.required_namespaces.is_empty() {
                session.namespaces.get(key).map(|ns| ns.chains())
            } else {
                session.required_namespaces.get(key).map(|ns| ns.chains.clone())
            }
        };

        if let Some(chains) = self.namespace.as_deref().and_then(|ns| chains_of(ns)) {
            let still_covered = self.chain_id.as_ref().is_some_and(|c| chains.contains(c));
            if !still_covered {
                self.chain_id = chains.first().cloned();
            }
            return;
        }

        let first_key = if session.required_namespaces.is_empty() {
            session.namespaces.keys().next()
        } else {
            session.required_namespaces.keys().next()
        };
        self.namespace = first_key.cloned();
        self.chain_id = first_key
            .and_then(|key| chains_of(key.as_str()))
            .and_then(|chains| chains.first().cloned());
    }
}

pub struct AddressProvider {
    context: String,
    storage: Arc<dyn KeyValueStorage>,
    state: Mutex<DefaultData>,
}

impl AddressProvider {
    pub fn new(name: &str, storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            context: format!("{}-address-provider", name),
            storage,
            state: Mutex::new(DefaultData::default()),
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn storage_key(&self) -> String {
        format!("{}-default-session", self.context)
    }

    /// Load persisted defaults, or start empty
    pub async fn init(&self) -> Result<()> {
        let loaded = self
            .storage
            .get_typed::<DefaultData>(&self.storage_key())
            .await?
            .unwrap_or_default();
        tracing::debug!(
            context = %self.context,
            namespace = ?loaded.namespace,
            chain_id = ?loaded.chain_id,
            "loaded address defaults"
        );
        *self.state.lock().await = loaded;
        Ok(())
    }

    async fn save(&self, state: &DefaultData) -> Result<()> {
        self.storage.set_typed(&self.storage_key(), state).await?;
        Ok(())
    }

    pub async fn defaults(&self) -> DefaultData {
        self.state.lock().await.clone()
    }

    pub async fn has_default_session(&self) -> bool {
        self.state.lock().await.has_session()
    }

    /// Pin a namespace and chain; the next session event re-checks them
    pub async fn set_defaults(&self, namespace: &str, chain_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.namespace = Some(namespace.to_string());
        state.chain_id = Some(chain_id.to_string());
        self.save(&state).await
    }

    /// A connected or approved session becomes the default if there is none
    pub async fn on_session_connected(&self, session: &SessionStruct) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.has_session() {
            return Ok(());
        }
        tracing::info!(topic = %session.topic, "default session set");
        state.session = Some(session.clone());
        state.refresh();
        self.save(&state).await
    }

    pub async fn on_session_updated(&self, session: &SessionStruct) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.session.as_ref().map(|s| s.topic.as_str()) != Some(session.topic.as_str()) {
            return Ok(());
        }
        state.session = Some(session.clone());
        state.refresh();
        self.save(&state).await
    }

    pub async fn on_session_deleted(&self, topic: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.session.as_ref().map(|s| s.topic.as_str()) != Some(topic) {
            return Ok(());
        }
        tracing::info!(topic, "default session cleared");
        state.session = None;
        state.refresh();
        self.save(&state).await
    }

    /// Account for `namespace` (default namespace when `None`) in the
    /// default session, preferring one on the default chain
    pub async fn current_address(&self, namespace: Option<&str>) -> Result<Option<AccountId>> {
        let state = self.state.lock().await;
        let Some((accounts, key)) = Self::accounts(&state, namespace) else {
            return Ok(None);
        };

        let on_default_chain = match (&state.chain_id, state.namespace.as_deref()) {
            (Some(chain), Some(default_ns)) if default_ns == key => accounts
                .iter()
                .find(|a| a.starts_with(&format!("{}:", chain))),
            _ => None,
        };
        on_default_chain
            .or_else(|| accounts.first())
            .map(|a| a.parse())
            .transpose()
    }

    /// Every account for `namespace` (default namespace when `None`) in the
    /// default session
    pub async fn all_addresses(&self, namespace: Option<&str>) -> Result<Vec<AccountId>> {
        let state = self.state.lock().await;
        match Self::accounts(&state, namespace) {
            Some((accounts, _)) => accounts.iter().map(|a| a.parse()).collect(),
            None => Ok(Vec::new()),
        }
    }

    fn accounts<'a>(state: &'a DefaultData, namespace: Option<&'a str>) -> Option<(&'a [String], &'a str)> {
        let key = namespace.or(state.namespace.as_deref())?;
        let session = state.session.as_ref()?;
        session
            .namespaces
            .get(key)
            .map(|ns| (ns.accounts.as_slice(), key))
    }
}

impl std::fmt::Debug for AddressProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressProvider")
            .field("context", &self.context)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::{Namespace, Namespaces, RequiredNamespace, RequiredNamespaces};
    use crate::store::RelayProtocol;
    use relaykit_core::MemoryStorage;

    fn session(topic: &str, required_chains: &[&str]) -> SessionStruct {
        let mut namespaces = Namespaces::new();
        namespaces.insert(
            "eip155".to_string(),
            Namespace::new()
                .with_account("eip155:1:0xaaa")
                .with_account("eip155:10:0xbbb"),
        );
        let mut required = RequiredNamespaces::new();
        let mut requirement = RequiredNamespace::new();
        for chain in required_chains {
            requirement = requirement.with_chain(*chain);
        }
        required.insert("eip155".to_string(), requirement);

        SessionStruct {
            topic: topic.to_string(),
            pairing_topic: None,
            expiry: None,
            relay: RelayProtocol::default(),
            controller: "key".to_string(),
            acknowledged: true,
            namespaces,
            required_namespaces: required,
        }
    }

    async fn provider(storage: Arc<dyn KeyValueStorage>) -> AddressProvider {
        let provider = AddressProvider::new("wallet", storage);
        provider.init().await.unwrap();
        provider
    }

    #[tokio::test]
    async fn test_first_session_becomes_default() {
        let provider = provider(Arc::new(MemoryStorage::new())).await;
        assert!(!provider.has_default_session().await);

        provider.on_session_connected(&session("a", &["eip155:10", "eip155:1"])).await.unwrap();
        provider.on_session_connected(&session("b", &["eip155:1"])).await.unwrap();

        let defaults = provider.defaults().await;
        assert_eq!(defaults.session.unwrap().topic, "a");
        assert_eq!(defaults.namespace.as_deref(), Some("eip155"));
        assert_eq!(defaults.chain_id.as_deref(), Some("eip155:10"));

        let current = provider.current_address(None).await.unwrap().unwrap();
        assert_eq!(current.to_string(), "eip155:10:0xbbb");
        assert_eq!(provider.all_addresses(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_keeps_valid_chain_and_replaces_stale_one() {
        let provider = provider(Arc::new(MemoryStorage::new())).await;
        provider.on_session_connected(&session("a", &["eip155:1", "eip155:10"])).await.unwrap();
        provider.set_defaults("eip155", "eip155:10").await.unwrap();

        provider.on_session_updated(&session("a", &["eip155:1", "eip155:10"])).await.unwrap();
        assert_eq!(provider.defaults().await.chain_id.as_deref(), Some("eip155:10"));

        provider.on_session_updated(&session("a", &["eip155:1"])).await.unwrap();
        assert_eq!(provider.defaults().await.chain_id.as_deref(), Some("eip155:1"));

        provider.on_session_updated(&session("other", &["eip155:10"])).await.unwrap();
        assert_eq!(provider.defaults().await.chain_id.as_deref(), Some("eip155:1"));
    }

    #[tokio::test]
    async fn test_delete_clears_only_matching_session() {
        let provider = provider(Arc::new(MemoryStorage::new())).await;
        provider.on_session_connected(&session("a", &["eip155:1"])).await.unwrap();

        provider.on_session_deleted("other").await.unwrap();
        assert!(provider.has_default_session().await);

        provider.on_session_deleted("a").await.unwrap();
        let defaults = provider.defaults().await;
        assert!(defaults.session.is_none());
        assert!(defaults.namespace.is_none());
        assert!(provider.current_address(None).await.unwrap().is_none());
        assert!(provider.all_addresses(Some("eip155")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_defaults_survive_restart() {
        let storage: Arc<dyn KeyValueStorage> = Arc::new(MemoryStorage::new());
        {
            let provider = provider(Arc::clone(&storage)).await;
            provider.on_session_connected(&session("a", &["eip155:1"])).await.unwrap();
        }

        let provider = provider(Arc::clone(&storage)).await;
        assert_eq!(provider.storage_key(), "wallet-address-provider-default-session");
        assert!(storage.has_item(&provider.storage_key()).await.unwrap());
        assert_eq!(provider.defaults().await.chain_id.as_deref(), Some("eip155:1"));
    }

    #[tokio::test]
    async fn test_session_without_requirements_uses_settled_namespaces() {
        let provider = provider(Arc::new(MemoryStorage::new())).await;
        let mut optional_only = session("a", &[]);
        optional_only.required_namespaces.clear();

        provider.on_session_connected(&optional_only).await.unwrap();

        let defaults = provider.defaults().await;
        assert_eq!(defaults.namespace.as_deref(), Some("eip155"));
        assert_eq!(defaults.chain_id.as_deref(), Some("eip155:1"));
    }
}
