//! Shared foundation for the relaykit crates
//!
//! - **Types**: JSON-RPC 2.0 envelopes exchanged with the relay
//! - **Codec**: frame encoding and decoding
//! - **Method**: the static params-type to method-name registry
//! - **Storage**: the key-value storage contract and its implementations
//! - **Error handling**: the workspace-wide `Error` and `Result`
//! - **Observability**: tracing subscriber and OpenTelemetry bootstrap
//!
//! # Example
//!
//! ```rust
//! use relaykit_core::{codec, Id, JsonRpcRequest};
//!
//! let request = JsonRpcRequest::new(
//!     "irn_subscribe",
//!     Some(serde_json::json!({"topic": "abc"})),
//!     Id::Number(1),
//! );
//! let json = codec::encode_request(&request).unwrap();
//! let decoded = codec::decode_request(&json).unwrap();
//! assert_eq!(decoded.method, "irn_subscribe");
//! ```

pub mod codec;
pub mod error;
pub mod method;
pub mod observability;
pub mod storage;
pub mod types;

pub use error::{Error, JsonRpcErrorData, Result};
pub use method::RpcMethod;
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use storage::{KeyValueStorage, KeyValueStorageExt, MemoryStorage, SledStorage};
pub use types::{Id, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
