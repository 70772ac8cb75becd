//! Error types for relaykit
//!
//! Two error shapes live here:
//!
//! - **Error**: the application-level error returned by every fallible
//!   operation in the workspace (uses thiserror)
//! - **JsonRpcErrorData**: the wire-format error object carried inside a
//!   JSON-RPC 2.0 response
//!
//! # Error Categories
//!
//! - **Wire errors**: JsonRpc, Serialization, InvalidRequest
//! - **Transport errors**: WebSocket, Io, ConnectionClosed, ConnectionLost,
//!   TransportStalled, TransportClosed
//! - **Lifecycle errors**: NotInitialized, Cancelled, Timeout
//! - **Collaborator errors**: Storage, Internal
//!
//! `Error` is `Clone` so one failure can be fanned out to every pending
//! request and every event listener that observes it.
//!
//! # Examples
//!
//! ```rust
//! use relaykit_core::{Error, JsonRpcErrorData};
//!
//! let error = Error::NotInitialized("Relayer".into());
//! assert_eq!(error.to_string(), "Relayer module not initialized.");
//!
//! let wire = JsonRpcErrorData::method_not_found("irn_unknown");
//! assert_eq!(wire.code, -32601);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for relaykit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Application-level error type for relaykit operations
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Error object returned by the relay for one of our requests
    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] JsonRpcErrorData),

    /// Serialization or deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// WebSocket transport layer error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Input/output error
    #[error("IO error: {0}")]
    Io(String),

    /// A request or inbound payload is not well-formed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// The key-value storage collaborator failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// A request did not receive a response in time
    #[error("JSON-RPC request timeout after {timeout_ms}ms: {method}")]
    Timeout {
        /// Wire method of the request that timed out
        method: String,
        /// Configured timeout in milliseconds
        timeout_ms: u64,
    },

    /// The connection closed while the operation was in flight
    #[error("Connection closed")]
    ConnectionClosed,

    /// An operation ran before the owning component finished `init`
    #[error("{0} module not initialized.")]
    NotInitialized(String),

    /// Neither connected nor connecting after the establish-wait finished
    #[error("Could not establish connection")]
    ConnectionLost,

    /// The connect operation exceeded the configured connection timeout
    #[error("socket stalled")]
    TransportStalled,

    /// The transport was closed while a connect was still in flight
    #[error("The transport was closed before the connection was established.")]
    TransportClosed,

    /// The caller's cancellation token fired
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Short, stable label used for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Error::JsonRpc(_) => "json_rpc",
            Error::Serialization(_) => "serialization",
            Error::WebSocket(_) => "websocket",
            Error::Io(_) => "io",
            Error::InvalidRequest(_) => "invalid_request",
            Error::Internal(_) => "internal",
            Error::Storage(_) => "storage",
            Error::Timeout { .. } => "timeout",
            Error::ConnectionClosed => "connection_closed",
            Error::NotInitialized(_) => "not_initialized",
            Error::ConnectionLost => "connection_lost",
            Error::TransportStalled => "transport_stalled",
            Error::TransportClosed => "transport_closed",
            Error::Cancelled => "cancelled",
        }
    }

    /// Whether retrying the same operation later may succeed
    ///
    /// Relay-side rejections and malformed payloads are permanent; anything
    /// that looks like a flaky socket is not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::WebSocket(_)
                | Error::Io(_)
                | Error::Timeout { .. }
                | Error::ConnectionClosed
                | Error::ConnectionLost
                | Error::TransportStalled
                | Error::TransportClosed
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// JSON-RPC 2.0 error object
///
/// Standard codes:
/// - `-32700`: Parse error
/// - `-32600`: Invalid request
/// - `-32601`: Method not found
/// - `-32602`: Invalid params
/// - `-32603`: Internal error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorData {
    /// Numeric error code
    pub code: i32,

    /// Short human-readable description
    pub message: String,

    /// Optional structured detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcErrorData {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(code: i32, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn parse_error() -> Self {
        Self::new(-32700, "Parse error")
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::new(-32600, msg)
    }

    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::new(-32601, format!("Method not found: {}", method.into()))
    }

    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::new(-32602, msg)
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::new(-32603, msg)
    }
}

impl std::fmt::Display for JsonRpcErrorData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcErrorData {}
