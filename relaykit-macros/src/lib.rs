//! Procedural macros for relaykit
//!
//! ## `#[derive(RpcMethod)]`
//!
//! Binds a request params type to its JSON-RPC method name at compile time
//! by implementing `relaykit_core::RpcMethod`:
//!
//! ```ignore
//! use relaykit_macros::RpcMethod;
//! use serde::Serialize;
//!
//! #[derive(Serialize, RpcMethod)]
//! #[rpc(method = "irn_publish")]
//! pub struct PublishParams {
//!     pub topic: String,
//!     pub message: String,
//! }
//! ```
//!
//! expands to
//!
//! ```ignore
//! impl ::relaykit_core::RpcMethod for PublishParams {
//!     const METHOD: &'static str = "irn_publish";
//! }
//! ```
//!
//! The expansion names `::relaykit_core` by absolute path, so the deriving
//! crate must depend on `relaykit-core` directly.

mod rpc_method;

use proc_macro::TokenStream;

/// Derive `relaykit_core::RpcMethod` from a `#[rpc(method = "...")]` attribute
///
/// The attribute is required and must appear exactly once. Generic types are
/// supported; the method name is shared by every instantiation.
#[proc_macro_derive(RpcMethod, attributes(rpc))]
pub fn derive_rpc_method(item: TokenStream) -> TokenStream {
    rpc_method::derive_impl(item)
}
