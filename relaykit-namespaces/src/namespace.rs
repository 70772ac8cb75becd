//! Namespace model
//!
//! A [`Namespace`] is what a peer settles on: the accounts it exposes and the
//! methods and events it allows. A [`RequiredNamespace`] is what a proposal
//! asks for. Both are keyed by namespace name (`eip155`, `cosmos`, ...) in
//! ordered maps.

use crate::caip::account_chains;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Settled or proposed namespaces keyed by namespace name
pub type Namespaces = BTreeMap<String, Namespace>;

/// Namespaces a proposal requires, keyed by namespace name
pub type RequiredNamespaces = BTreeMap<String, RequiredNamespace>;

/// A named bundle of accounts, methods and events
///
/// Equality ignores element order and the explicit `chains` list.
///
/// ```rust
/// use relaykit_namespaces::Namespace;
///
/// let a = Namespace::new()
///     .with_account("eip155:1:0xab")
///     .with_method("eth_sign")
///     .with_method("personal_sign");
/// let b = Namespace::new()
///     .with_account("eip155:1:0xab")
///     .with_method("personal_sign")
///     .with_method("eth_sign");
/// assert_eq!(a, b);
/// assert_eq!(a.chains(), vec!["eip155:1".to_string()]);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Namespace {
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chains: Vec<String>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.accounts.push(account.into());
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.methods.push(method.into());
        self
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.events.push(event.into());
        self
    }

    pub fn with_chain(mut self, chain: impl Into<String>) -> Self {
        self.chains.push(chain.into());
        self
    }

    /// Chains this namespace covers
    ///
    /// Derived from the accounts (distinct, first-seen order). A namespace
    /// without accounts falls back to its explicit `chains`.
    pub fn chains(&self) -> Vec<String> {
        if self.accounts.is_empty() {
            return self.chains.clone();
        }
        account_chains(&self.accounts)
    }
}

fn same_elements(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && {
        let left: HashSet<&String> = a.iter().collect();
        let right: HashSet<&String> = b.iter().collect();
        left == right
    }
}

impl PartialEq for Namespace {
    fn eq(&self, other: &Self) -> bool {
        same_elements(&self.accounts, &other.accounts)
            && same_elements(&self.methods, &other.methods)
            && same_elements(&self.events, &other.events)
    }
}

impl Eq for Namespace {}

/// What a proposal requires of one namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredNamespace {
    #[serde(default)]
    pub chains: Vec<String>,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub events: Vec<String>,
}

impl RequiredNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chain(mut self, chain: impl Into<String>) -> Self {
        self.chains.push(chain.into());
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.methods.push(method.into());
        self
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.events.push(event.into());
        self
    }
}

impl From<RequiredNamespace> for Namespace {
    fn from(required: RequiredNamespace) -> Self {
        Namespace {
            accounts: Vec::new(),
            methods: required.methods,
            events: required.events,
            chains: required.chains,
        }
    }
}
