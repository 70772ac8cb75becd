//! JSON-RPC 2.0 envelope types
//!
//! The relay speaks plain JSON-RPC 2.0 over a single socket. Both sides send
//! requests: the client sends subscribe/publish calls, the relay pushes
//! `*_subscription` requests that the client acknowledges. Responses are
//! correlated purely by `id`.
//!
//! # Message Types
//!
//! 1. **Request**: a call that expects a response with the same `id`
//! 2. **Notification**: a call without an `id`
//! 3. **Response**: a result or an error for an earlier request

use crate::error::{Error, JsonRpcErrorData, Result};
use crate::method::RpcMethod;
use serde::{Deserialize, Serialize};
use std::fmt;

/// JSON-RPC 2.0 request ID
///
/// The relay assigns numeric ids, but string ids are accepted on inbound
/// frames so an unexpected peer cannot make envelope parsing fail.
///
/// ```rust
/// use relaykit_core::Id;
///
/// let id: Id = 42i64.into();
/// assert_eq!(id.to_string(), "42");
/// assert_eq!(Id::from("abc").to_string(), "\"abc\"");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    /// Numeric identifier
    Number(i64),
    /// String identifier
    String(String),
    /// Null identifier (only seen on error responses to unparseable input)
    Null,
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::String(s) => write!(f, "\"{}\"", s),
            Id::Number(n) => write!(f, "{}", n),
            Id::Null => write!(f, "null"),
        }
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::String(s)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::String(s.to_string())
    }
}

impl From<i64> for Id {
    fn from(n: i64) -> Self {
        Id::Number(n)
    }
}

/// JSON-RPC 2.0 request message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Wire method name
    pub method: String,
    /// Method parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// Correlation id echoed by the response
    pub id: Id,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC 2.0 request
    ///
    /// ```rust
    /// use relaykit_core::{JsonRpcRequest, Id};
    ///
    /// let request = JsonRpcRequest::new("irn_subscribe", None, Id::Number(1));
    /// assert_eq!(request.jsonrpc, "2.0");
    /// ```
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>, id: Id) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
            id,
        }
    }

    /// Build a request whose method name comes from the params type
    pub fn from_params<P>(params: &P, id: Id) -> Result<Self>
    where
        P: RpcMethod + Serialize,
    {
        let value = serde_json::to_value(params)?;
        Ok(Self::new(P::METHOD, Some(value), id))
    }

    /// Decode `params` into a typed value
    pub fn params_as<P: serde::de::DeserializeOwned>(&self) -> Result<P> {
        let params = self
            .params
            .clone()
            .ok_or_else(|| Error::InvalidRequest(format!("{} request has no params", self.method)))?;
        Ok(serde_json::from_value(params)?)
    }
}

/// JSON-RPC 2.0 notification message (no `id`, no response expected)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 response message
///
/// Exactly one of `result` or `error` is set; the constructors enforce it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcErrorData>,
    pub id: Id,
}

impl JsonRpcResponse {
    pub fn success(result: serde_json::Value, id: Id) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(error: JsonRpcErrorData, id: Id) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Turn the response into the caller-facing result
    ///
    /// An absent `result` on a non-error response reads as JSON `null`.
    pub fn into_result(self) -> Result<serde_json::Value> {
        match self.error {
            Some(error) => Err(Error::JsonRpc(error)),
            None => Ok(self.result.unwrap_or(serde_json::Value::Null)),
        }
    }
}

/// Any single JSON-RPC 2.0 message
///
/// Variant order matters for the untagged decode: a frame with `method` and
/// `id` is a request, `method` alone is a notification, anything else with an
/// `id` is a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    Response(JsonRpcResponse),
}

impl JsonRpcMessage {
    pub fn is_request(&self) -> bool {
        matches!(self, JsonRpcMessage::Request(_))
    }

    pub fn is_notification(&self) -> bool {
        matches!(self, JsonRpcMessage::Notification(_))
    }

    pub fn is_response(&self) -> bool {
        matches!(self, JsonRpcMessage::Response(_))
    }

    /// Method name for requests and notifications
    pub fn method(&self) -> Option<&str> {
        match self {
            JsonRpcMessage::Request(r) => Some(&r.method),
            JsonRpcMessage::Notification(n) => Some(&n.method),
            JsonRpcMessage::Response(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize)]
    struct Ping {
        topic: String,
    }

    impl RpcMethod for Ping {
        const METHOD: &'static str = "irn_ping";
    }

    #[test]
    fn test_id_display() {
        assert_eq!(Id::String("test".to_string()).to_string(), "\"test\"");
        assert_eq!(Id::Number(42).to_string(), "42");
        assert_eq!(Id::Null.to_string(), "null");
    }

    #[test]
    fn test_request_from_params_uses_static_method() {
        let req = JsonRpcRequest::from_params(&Ping { topic: "t".into() }, Id::Number(7)).unwrap();
        assert_eq!(req.method, "irn_ping");
        assert_eq!(req.params, Some(serde_json::json!({"topic": "t"})));

        let back: Ping = req.params_as().unwrap();
        assert_eq!(back.topic, "t");
    }

    #[test]
    fn test_params_as_without_params_fails() {
        let req = JsonRpcRequest::new("irn_ping", None, Id::Number(1));
        let result: Result<Ping> = req.params_as();
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_response_into_result() {
        let ok = JsonRpcResponse::success(serde_json::json!(true), Id::Number(1));
        assert_eq!(ok.into_result().unwrap(), serde_json::json!(true));

        let err = JsonRpcResponse::error(JsonRpcErrorData::internal_error("boom"), Id::Number(2));
        assert!(matches!(err.into_result(), Err(Error::JsonRpc(_))));
    }

    #[test]
    fn test_untagged_message_variants() {
        let request: JsonRpcMessage = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":5,"method":"irn_subscription","params":{}}"#,
        )
        .unwrap();
        assert!(request.is_request());
        assert_eq!(request.method(), Some("irn_subscription"));

        let response: JsonRpcMessage =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":5,"result":"abc"}"#).unwrap();
        assert!(response.is_response());
        assert_eq!(response.method(), None);

        let notification: JsonRpcMessage =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"ping"}"#).unwrap();
        assert!(notification.is_notification());
    }
}
