//! relaykit - relay transport and namespace conformance
//!
//! This is the convenience crate that re-exports every relaykit sub-crate.
//! Use it when you want a single dependency for both the relay transport and
//! the session namespace checks.
//!
//! # Architecture
//!
//! relaykit is organized into modular crates:
//!
//! - **relaykit-core**: JSON-RPC types, codec, error handling, storage, observability
//! - **relaykit-client**: Provider, Relayer, Subscriber, Publisher and MessageTracker
//! - **relaykit-macros**: `#[derive(RpcMethod)]` for wire method names
//! - **relaykit-namespaces**: CAIP grammar, conformance checks and session validation
//!
//! # Quick Start - Relayer
//!
//! ```rust,no_run
//! use relaykit::{RelayerBuilder, StaticJwtSigner};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let relayer = RelayerBuilder::new("my-project-id")
//!         .relay_url("wss://relay.walletconnect.org")
//!         .signer(Arc::new(StaticJwtSigner::new("pre-issued-jwt")))
//!         .init()
//!         .await?;
//!
//!     relayer.subscribe("topic", None).await?;
//!     relayer.publish("topic", "hello", None).await?;
//!     relayer.dispose().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Quick Start - Namespaces
//!
//! ```rust
//! use relaykit::namespaces::{methods_for_chain, Namespace, Namespaces};
//!
//! let mut settled = Namespaces::new();
//! settled.insert(
//!     "eip155".into(),
//!     Namespace::new()
//!         .with_account("eip155:1:0xab16a96d359ec26a11e2c2b3d8f8b8942d5bfcdb")
//!         .with_method("personal_sign"),
//! );
//!
//! assert!(methods_for_chain(&settled, "eip155:1").contains("personal_sign"));
//! assert!(methods_for_chain(&settled, "eip155:5").is_empty());
//! ```

// Re-export all public APIs from sub-crates
pub use relaykit_client as client;
pub use relaykit_core as core;
pub use relaykit_macros as macros;
pub use relaykit_namespaces as namespaces;

// Convenience re-exports of the most commonly used types
pub use relaykit_client::{Relayer, RelayerBuilder, RelayerEvent, StaticJwtSigner};
pub use relaykit_namespaces::{SessionValidator, ValidationError};
