//! Store-backed session checks
//!
//! [`SessionValidator`] runs the pre-flight checks for every session
//! operation: the referenced pairing, session or proposal must exist and be
//! unexpired, and the payload must be well-formed and authorized by the
//! session namespaces.
//!
//! An expired proposal is deleted from its store before the check fails.

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, ValidationError};
use crate::namespace::{Namespaces, RequiredNamespaces};
use crate::store::{KeyedStore, PairingStruct, Participant, ProposalStruct, RelayProtocol, SessionStruct};
use crate::validation::{
    events_for_chain, methods_for_chain, validate_conforming_namespaces, validate_namespaces,
    validate_namespaces_chain_id,
};
use relaykit_core::{JsonRpcRequest, JsonRpcResponse};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pairing_topic: Option<String>,
    #[serde(default)]
    pub required_namespaces: RequiredNamespaces,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveParams {
    pub id: i64,
    pub namespaces: Namespaces,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_properties: Option<BTreeMap<String, String>>,
}

/// Reason attached to a rejection or disconnect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReason {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectParams {
    pub id: i64,
    pub reason: Option<ErrorReason>,
}

/// An event emitted into a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    pub name: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Settlement sent by the responder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay: Option<RelayProtocol>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<Participant>,
    pub namespaces: Namespaces,
    pub expiry: i64,
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

pub struct SessionValidator {
    pairings: Arc<dyn KeyedStore<PairingStruct>>,
    sessions: Arc<dyn KeyedStore<SessionStruct>>,
    proposals: Arc<dyn KeyedStore<ProposalStruct>>,
    clock: Arc<dyn Clock>,
}

impl SessionValidator {
    pub fn new(
        pairings: Arc<dyn KeyedStore<PairingStruct>>,
        sessions: Arc<dyn KeyedStore<SessionStruct>>,
        proposals: Arc<dyn KeyedStore<ProposalStruct>>,
    ) -> Self {
        Self {
            pairings,
            sessions,
            proposals,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn expired(&self, expiry: Option<i64>) -> bool {
        expiry.is_some_and(|e| self.clock.is_expired(e))
    }

    /// The pairing must exist and be unexpired
    pub async fn is_valid_pairing_topic(&self, topic: &str) -> Result<PairingStruct> {
        if blank(topic) {
            return Err(ValidationError::InvalidArgument(
                "Pairing topic should be a valid string.".to_string(),
            ));
        }
        let pairing = self.pairings.get(&topic.to_string()).await?.ok_or_else(|| {
            ValidationError::NotFound(format!(
                "Paring topic {} doesn't exist in the pairing store.",
                topic
            ))
        })?;
        if self.expired(pairing.expiry) {
            return Err(ValidationError::Expired(format!(
                "Pairing topic {} has expired.",
                topic
            )));
        }
        Ok(pairing)
    }

    /// The session must exist and be unexpired
    pub async fn is_valid_session_topic(&self, topic: &str) -> Result<SessionStruct> {
        if blank(topic) {
            return Err(ValidationError::InvalidArgument(
                "Session topic should be a valid string.".to_string(),
            ));
        }
        let session = self.sessions.get(&topic.to_string()).await?.ok_or_else(|| {
            ValidationError::NotFound(format!(
                "Session topic {} doesn't exist in the session store.",
                topic
            ))
        })?;
        if self.expired(session.expiry) {
            return Err(ValidationError::Expired(format!(
                "Session topic {} has expired.",
                topic
            )));
        }
        Ok(session)
    }

    /// The proposal must exist and be unexpired; an expired one is deleted
    pub async fn is_valid_proposal_id(&self, id: i64) -> Result<ProposalStruct> {
        let proposal = self.proposals.get(&id).await?.ok_or_else(|| {
            ValidationError::NotFound(format!(
                "Proposal id {} doesn't exist in the proposal store.",
                id
            ))
        })?;
        if self.expired(proposal.expiry) {
            tracing::debug!(id, "deleting expired proposal");
            self.proposals.delete(&id).await?;
            return Err(ValidationError::Expired(format!(
                "Proposal with id {} has expired.",
                id
            )));
        }
        Ok(proposal)
    }

    /// Session topics take precedence over pairing topics
    pub async fn validate_session_or_pairing_topic(&self, topic: &str) -> Result<()> {
        if blank(topic) {
            return Err(ValidationError::InvalidArgument(
                "Session or pairing topic should be a valid string.".to_string(),
            ));
        }
        let topic_key = topic.to_string();
        if self.sessions.contains(&topic_key).await? {
            self.is_valid_session_topic(topic).await.map(|_| ())
        } else if self.pairings.contains(&topic_key).await? {
            self.is_valid_pairing_topic(topic).await.map(|_| ())
        } else {
            Err(ValidationError::NotFound(format!(
                "Session or pairing topic doesn't exist. Topic value: {}.",
                topic
            )))
        }
    }

    pub async fn is_valid_connect(&self, params: &ConnectParams) -> Result<()> {
        match &params.pairing_topic {
            Some(topic) => self.is_valid_pairing_topic(topic).await.map(|_| ()),
            None => Ok(()),
        }
    }

    pub async fn is_valid_approve(&self, params: &ApproveParams) -> Result<()> {
        let proposal = self.is_valid_proposal_id(params.id).await?;

        validate_namespaces(&params.namespaces, "approve()")?;
        validate_conforming_namespaces(&proposal.required_namespaces, &params.namespaces, "approve()")?;

        if params.relay_protocol.as_deref().is_some_and(blank) {
            return Err(ValidationError::InvalidArgument(
                "RelayProtocol should be a non-empty string.".to_string(),
            ));
        }

        if let Some(properties) = &params.session_properties {
            if properties.values().any(|v| blank(v)) {
                return Err(ValidationError::InvalidArgument(format!(
                    "SessionProperties must be a string map with no empty or whitespace values. Received: {}",
                    serde_json::to_string(properties).unwrap_or_default()
                )));
            }
        }
        Ok(())
    }

    pub async fn is_valid_reject(&self, params: &RejectParams) -> Result<()> {
        self.is_valid_proposal_id(params.id).await?;
        match &params.reason {
            Some(reason) if !blank(&reason.message) => Ok(()),
            _ => Err(ValidationError::InvalidArgument(
                "Reject reason should be a non-empty string.".to_string(),
            )),
        }
    }

    pub async fn is_valid_update(&self, topic: &str, namespaces: &Namespaces) -> Result<()> {
        let session = self.is_valid_session_topic(topic).await?;
        validate_namespaces(namespaces, "update()")?;
        validate_conforming_namespaces(&session.required_namespaces, namespaces, "update()")
    }

    pub async fn is_valid_extend(&self, topic: &str) -> Result<()> {
        self.is_valid_session_topic(topic).await.map(|_| ())
    }

    /// The method must be authorized for `chain_id` by the session namespaces
    pub async fn is_valid_request(&self, topic: &str, request: &JsonRpcRequest, chain_id: &str) -> Result<()> {
        let session = self.is_valid_session_topic(topic).await?;
        if blank(&request.method) {
            return Err(ValidationError::InvalidArgument(
                "Request method should be a non-empty string.".to_string(),
            ));
        }

        validate_namespaces_chain_id(&session.namespaces, chain_id)?;
        if !methods_for_chain(&session.namespaces, chain_id).contains(&request.method) {
            return Err(ValidationError::Unauthorized(format!(
                "Method {} not found in namespaces for chainId {}.",
                request.method, chain_id
            )));
        }
        Ok(())
    }

    pub async fn is_valid_respond(&self, topic: &str, response: &JsonRpcResponse) -> Result<()> {
        self.is_valid_session_topic(topic).await?;
        let has_result = response.result.as_ref().is_some_and(|r| !r.is_null());
        if !has_result && response.error.is_none() {
            return Err(ValidationError::InvalidArgument(
                "Response result and error cannot both be null.".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn is_valid_ping(&self, topic: &str) -> Result<()> {
        self.validate_session_or_pairing_topic(topic).await
    }

    /// The event must be authorized for `chain_id` by the session namespaces
    pub async fn is_valid_emit(&self, topic: &str, event: &EventData, chain_id: &str) -> Result<()> {
        let session = self.is_valid_session_topic(topic).await?;
        if blank(&event.name) {
            return Err(ValidationError::InvalidArgument(
                "Event name should be a non-empty string.".to_string(),
            ));
        }

        validate_namespaces_chain_id(&session.namespaces, chain_id)?;
        if !events_for_chain(&session.namespaces, chain_id).contains(&event.name) {
            return Err(ValidationError::Unauthorized(format!(
                "Event {} not found in namespaces for chainId {}.",
                event.name, chain_id
            )));
        }
        Ok(())
    }

    pub async fn is_valid_disconnect(&self, topic: &str, _reason: &ErrorReason) -> Result<()> {
        self.validate_session_or_pairing_topic(topic).await
    }

    pub fn is_valid_session_settle_request(&self, settle: &SessionSettle) -> Result<()> {
        if settle.relay.as_ref().is_some_and(|r| blank(&r.protocol)) {
            return Err(ValidationError::InvalidArgument(
                "Relay protocol should be a non-empty string.".to_string(),
            ));
        }
        if settle.controller.as_ref().map_or(true, |c| blank(&c.public_key)) {
            return Err(ValidationError::InvalidArgument(
                "Controller public key should be a non-empty string.".to_string(),
            ));
        }
        validate_namespaces(&settle.namespaces, "OnSessionSettleRequest()")?;
        if self.clock.is_expired(settle.expiry) {
            return Err(ValidationError::Expired(
                "SessionSettleRequest has expired.".to_string(),
            ));
        }
        Ok(())
    }
}
