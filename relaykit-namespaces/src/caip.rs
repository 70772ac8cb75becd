//! CAIP-2 chain ids and CAIP-10 account ids
//!
//! A chain id is `namespace:reference` and must match
//! `^[-a-z0-9]{3,8}:[-_a-zA-Z0-9]{1,32}$`. An account id is
//! `namespace:reference:address` with three non-empty segments.
//!
//! # Examples
//!
//! ```rust
//! use relaykit_namespaces::{AccountId, ChainId};
//!
//! let account: AccountId = "eip155:1:0xab16a96d359ec26a11e2c2b3d8f8b8942d5bfcdb".parse().unwrap();
//! assert_eq!(account.chain_id, "eip155:1".parse::<ChainId>().unwrap());
//! assert!("eip155".parse::<ChainId>().is_err());
//! ```

use crate::error::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static CHAIN_ID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[-a-z0-9]{3,8}:[-_a-zA-Z0-9]{1,32}$").expect("chain id pattern is valid")
});

/// True if `chain_id` is a well-formed CAIP-2 chain id
pub fn is_valid_chain_id(chain_id: &str) -> bool {
    CHAIN_ID_REGEX.is_match(chain_id)
}

/// True if `account` has exactly three non-empty colon-separated segments
pub fn is_valid_account_id(account: &str) -> bool {
    let segments: Vec<&str> = account.split(':').collect();
    segments.len() == 3 && segments.iter().all(|s| !s.is_empty())
}

/// The `namespace:reference` prefix of an account string, if it has one
pub fn account_chain(account: &str) -> Option<String> {
    let mut segments = account.split(':');
    match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(ns), Some(reference), Some(_), None) => Some(format!("{}:{}", ns, reference)),
        _ => None,
    }
}

/// Distinct chains of `accounts`, in first-seen order
pub fn account_chains<'a, I>(accounts: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut chains: Vec<String> = Vec::new();
    for chain in accounts.into_iter().filter_map(|a| account_chain(a)) {
        if !chains.contains(&chain) {
            chains.push(chain);
        }
    }
    chains
}

/// A CAIP-2 chain id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChainId {
    pub namespace: String,
    pub reference: String,
}

impl ChainId {
    pub fn new(namespace: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            reference: reference.into(),
        }
    }
}

impl FromStr for ChainId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !is_valid_chain_id(s) {
            return Err(ValidationError::Format(format!(
                "ChainId {} should be a string and conform to CAIP-2.",
                s
            )));
        }
        // the regex guarantees exactly one separator
        let (namespace, reference) = s.split_once(':').unwrap_or((s, ""));
        Ok(ChainId::new(namespace, reference))
    }
}

impl TryFrom<String> for ChainId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChainId> for String {
    fn from(chain: ChainId) -> Self {
        chain.to_string()
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.reference)
    }
}

/// A CAIP-10 account id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId {
    pub chain_id: ChainId,
    pub address: String,
}

impl FromStr for AccountId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            ValidationError::Format(format!(
                "Account {} should conform to 'namespace:chainId:address' format.",
                s
            ))
        };
        if !is_valid_account_id(s) {
            return Err(invalid());
        }
        let (chain, address) = s.rsplit_once(':').ok_or_else(invalid)?;
        let chain_id = chain.parse().map_err(|_| invalid())?;
        Ok(AccountId {
            chain_id,
            address: address.to_string(),
        })
    }
}

impl TryFrom<String> for AccountId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AccountId> for String {
    fn from(account: AccountId) -> Self {
        account.to_string()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain_id, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_id_grammar() {
        assert!(is_valid_chain_id("eip155:1"));
        assert!(is_valid_chain_id("cosmos:cosmoshub-4"));
        assert!(is_valid_chain_id("solana:4sGjMW1sUnHzSxGspuhpqLDx6wiyjNtZ"));

        assert!(!is_valid_chain_id("eip155"));
        assert!(!is_valid_chain_id("ab:1"));
        assert!(!is_valid_chain_id("toolongns:1"));
        assert!(!is_valid_chain_id("EIP155:1"));
        assert!(!is_valid_chain_id("eip155:"));
        assert!(!is_valid_chain_id("eip155:1:0xabc"));
        assert!(!is_valid_chain_id(&format!("eip155:{}", "a".repeat(33))));
        assert!(!is_valid_chain_id(&format!("{}:1", "a".repeat(40))));
    }

    #[test]
    fn test_account_id_grammar() {
        assert!(is_valid_account_id("eip155:1:0xabc"));
        assert!(!is_valid_account_id("eip155:1"));
        assert!(!is_valid_account_id("eip155:1:0xabc:extra"));
        assert!(!is_valid_account_id("eip155::0xabc"));
        assert!(!is_valid_account_id(""));
    }

    #[test]
    fn test_account_chains_are_distinct_in_order() {
        let accounts = vec![
            "eip155:10:0xa".to_string(),
            "eip155:1:0xa".to_string(),
            "eip155:10:0xb".to_string(),
            "broken".to_string(),
        ];
        assert_eq!(account_chains(&accounts), vec!["eip155:10", "eip155:1"]);
    }

    #[test]
    fn test_parse_and_display() {
        let chain: ChainId = "eip155:137".parse().unwrap();
        assert_eq!(chain.namespace, "eip155");
        assert_eq!(chain.reference, "137");
        assert_eq!(chain.to_string(), "eip155:137");

        let account: AccountId = "eip155:137:0xdead".parse().unwrap();
        assert_eq!(account.chain_id, chain);
        assert_eq!(account.address, "0xdead");
        assert_eq!(account.to_string(), "eip155:137:0xdead");

        let err = "nope".parse::<ChainId>().unwrap_err();
        assert_eq!(err.to_string(), "ChainId nope should be a string and conform to CAIP-2.");
    }

    #[test]
    fn test_serde_as_string() {
        let account: AccountId = serde_json::from_str("\"eip155:1:0xabc\"").unwrap();
        assert_eq!(serde_json::to_string(&account).unwrap(), "\"eip155:1:0xabc\"");
        assert!(serde_json::from_str::<ChainId>("\"bad\"").is_err());
    }
}
