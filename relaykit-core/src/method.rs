//! Static mapping from request parameter shapes to wire method names
//!
//! Every params type sent over the relay implements [`RpcMethod`], usually
//! through `#[derive(RpcMethod)]` from `relaykit-macros`:
//!
//! ```rust,ignore
//! #[derive(Serialize, Deserialize, RpcMethod)]
//! #[rpc(method = "irn_subscribe")]
//! pub struct SubscribeParams {
//!     pub topic: String,
//! }
//!
//! assert_eq!(SubscribeParams::METHOD, "irn_subscribe");
//! ```
//!
//! The method name is a compile-time constant, so building a request never
//! needs to inspect types at runtime.

/// A params type bound to exactly one JSON-RPC method
pub trait RpcMethod {
    /// Wire method name, e.g. `irn_publish`
    const METHOD: &'static str;
}

/// Method name of a params value, for call sites holding an instance
pub fn method_of<P: RpcMethod>(_params: &P) -> &'static str {
    P::METHOD
}
