//! Relay wire protocol types
//!
//! Every params type is bound to its method name at compile time through
//! `#[derive(RpcMethod)]`, so sending a request never looks the name up at
//! runtime.
//!
//! | Params | Method | Result |
//! |---|---|---|
//! | [`SubscribeParams`] | `irn_subscribe` | subscription id |
//! | [`BatchSubscribeParams`] | `irn_batchSubscribe` | subscription ids, in topic order |
//! | [`UnsubscribeParams`] | `irn_unsubscribe` | `true` |
//! | [`PublishParams`] | `irn_publish` | `true` |
//! | [`SubscriptionParams`] | `irn_subscription` (inbound push) | acknowledged with `true` |

use relaykit_macros::RpcMethod;
use serde::{Deserialize, Serialize};

/// Relay protocol identifier used in the relay URL
pub const RELAY_PROTOCOL: &str = "irn";

/// Relay protocol version used in the relay URL
pub const RELAY_VERSION: u32 = 2;

/// Suffix identifying inbound subscription pushes
pub const SUBSCRIPTION_METHOD_SUFFIX: &str = "_subscription";

/// Default publish time-to-live in seconds (six hours)
pub const DEFAULT_PUBLISH_TTL: u64 = 21_600;

/// Relay protocol selection attached to subscriptions and publishes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolOptions {
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl Default for ProtocolOptions {
    fn default() -> Self {
        Self {
            protocol: RELAY_PROTOCOL.to_string(),
            data: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, RpcMethod)]
#[rpc(method = "irn_subscribe")]
pub struct SubscribeParams {
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, RpcMethod)]
#[rpc(method = "irn_batchSubscribe")]
pub struct BatchSubscribeParams {
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, RpcMethod)]
#[rpc(method = "irn_unsubscribe")]
pub struct UnsubscribeParams {
    pub topic: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, RpcMethod)]
#[rpc(method = "irn_publish")]
pub struct PublishParams {
    pub topic: String,
    pub message: String,
    pub ttl: u64,
    pub tag: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<bool>,
}

/// Inbound push delivered by the relay for an active subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, RpcMethod)]
#[rpc(method = "irn_subscription")]
pub struct SubscriptionParams {
    /// Subscription id the push was routed through
    pub id: String,
    pub data: SubscriptionData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionData {
    pub topic: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<u32>,
}

/// Options for [`crate::Relayer::publish`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOptions {
    pub ttl: u64,
    pub tag: u32,
    pub prompt: Option<bool>,
    pub relay: ProtocolOptions,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_PUBLISH_TTL,
            tag: 0,
            prompt: None,
            relay: ProtocolOptions::default(),
        }
    }
}

impl PublishOptions {
    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_tag(mut self, tag: u32) -> Self {
        self.tag = tag;
        self
    }

    pub fn with_prompt(mut self, prompt: bool) -> Self {
        self.prompt = Some(prompt);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    pub relay: ProtocolOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnsubscribeOptions {
    /// Remove only this subscription id instead of every id under the topic
    pub id: Option<String>,
    pub relay: ProtocolOptions,
}

impl UnsubscribeOptions {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            relay: ProtocolOptions::default(),
        }
    }
}

/// A subscription the relay has confirmed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSubscription {
    pub id: String,
    pub topic: String,
    pub relay: ProtocolOptions,
}

/// A message received on, or published to, a topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    pub topic: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<i64>,
}

impl From<SubscriptionData> for MessageEvent {
    fn from(data: SubscriptionData) -> Self {
        Self {
            topic: data.topic,
            message: data.message,
            published_at: data.published_at,
        }
    }
}
