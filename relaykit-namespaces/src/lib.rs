//! # relaykit-namespaces
//!
//! Namespace conformance engine for relaykit sessions.
//!
//! - [`caip`]: CAIP-2 chain id and CAIP-10 account grammar
//! - [`namespace`]: the `Namespace`/`RequiredNamespace` model
//! - [`validation`]: pure conformance checks and per-chain authorization
//! - [`checks`]: store-backed existence, expiry and payload checks
//! - [`address_provider`]: default session, namespace and chain tracking
//!
//! ## Quick Start
//!
//! ```rust
//! use relaykit_namespaces::{
//!     validate_conforming_namespaces, Namespace, Namespaces, RequiredNamespace,
//!     RequiredNamespaces,
//! };
//!
//! let mut required = RequiredNamespaces::new();
//! required.insert(
//!     "eip155".into(),
//!     RequiredNamespace::new().with_chain("eip155:1").with_method("eth_sign"),
//! );
//!
//! let mut settled = Namespaces::new();
//! settled.insert(
//!     "eip155".into(),
//!     Namespace::new()
//!         .with_account("eip155:1:0xab16a96d359ec26a11e2c2b3d8f8b8942d5bfcdb")
//!         .with_method("eth_sign")
//!         .with_method("personal_sign"),
//! );
//!
//! assert!(validate_conforming_namespaces(&required, &settled, "approve()").is_ok());
//! ```

pub mod address_provider;
pub mod caip;
pub mod checks;
pub mod clock;
pub mod error;
pub mod namespace;
pub mod store;
pub mod validation;

pub use address_provider::{AddressProvider, DefaultData};
pub use caip::{account_chain, account_chains, is_valid_account_id, is_valid_chain_id, AccountId, ChainId};
pub use checks::{
    ApproveParams, ConnectParams, ErrorReason, EventData, RejectParams, SessionSettle, SessionValidator,
};
pub use clock::{calc_expiry, is_expired, Clock, FixedClock, SystemClock};
pub use error::{MismatchAxis, Result, ValidationError};
pub use namespace::{Namespace, Namespaces, RequiredNamespace, RequiredNamespaces};
pub use store::{
    KeyedStore, MemoryStore, PairingStruct, Participant, PersistentStore, ProposalStruct, RelayProtocol,
    SessionStruct, StoreRecord,
};
pub use validation::{
    events_for_chain, has_overlap, is_session_compatible, is_valid_request_expiry, methods_for_chain,
    namespaces_chains, validate_accounts, validate_conforming_namespaces, validate_namespaces,
    validate_namespaces_chain_id,
};
