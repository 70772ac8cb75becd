//! Codec for JSON-RPC frames
//!
//! Frames are decoded in two steps: first into a generic `serde_json::Value`
//! so malformed JSON maps to a parse error, then into the untagged
//! [`JsonRpcMessage`]. Arrays are rejected: the relay never sends batches.
//!
//! ```rust
//! use relaykit_core::{codec, JsonRpcRequest, Id};
//!
//! let request = JsonRpcRequest::new("irn_publish", None, Id::Number(1));
//! let json = codec::encode(&request).unwrap();
//! assert!(codec::decode(&json).unwrap().is_request());
//! ```

use crate::error::{Error, JsonRpcErrorData, Result};
use crate::types::{JsonRpcMessage, JsonRpcRequest, JsonRpcResponse};
use serde::{de::DeserializeOwned, Serialize};

/// Encode any serializable message
pub fn encode<T: Serialize>(msg: &T) -> Result<String> {
    serde_json::to_string(msg).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode a single frame into a [`JsonRpcMessage`]
pub fn decode(data: &str) -> Result<JsonRpcMessage> {
    let value: serde_json::Value =
        serde_json::from_str(data).map_err(|_e| Error::JsonRpc(JsonRpcErrorData::parse_error()))?;

    if value.is_array() {
        return Err(Error::JsonRpc(JsonRpcErrorData::invalid_request(
            "Batch frames are not supported",
        )));
    }

    serde_json::from_value(value)
        .map_err(|_e| Error::JsonRpc(JsonRpcErrorData::invalid_request("Not a JSON-RPC 2.0 message")))
}

/// Decode a frame directly into a concrete type
pub fn decode_as<T: DeserializeOwned>(data: &str) -> Result<T> {
    serde_json::from_str(data).map_err(|e| Error::Serialization(e.to_string()))
}

pub fn encode_request(req: &JsonRpcRequest) -> Result<String> {
    encode(req)
}

pub fn encode_response(resp: &JsonRpcResponse) -> Result<String> {
    encode(resp)
}

pub fn decode_request(data: &str) -> Result<JsonRpcRequest> {
    decode_as(data)
}

pub fn decode_response(data: &str) -> Result<JsonRpcResponse> {
    decode_as(data)
}
