//! Pure namespace validation
//!
//! Grammar checks, conformance of settled namespaces against required ones,
//! and per-chain authorization lookups. Nothing here touches a store.
//!
//! Overlap is directional throughout: `has_overlap(required, settled)` holds
//! when every required element is present in the settled set.

use crate::caip::{account_chains, is_valid_account_id, is_valid_chain_id};
use crate::error::{MismatchAxis, Result, ValidationError};
use crate::namespace::{Namespaces, RequiredNamespaces};
use std::collections::BTreeSet;

/// True if every element of `required` is in `available`
pub fn has_overlap<A, B>(required: &[A], available: &[B]) -> bool
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    required
        .iter()
        .all(|r| available.iter().any(|a| a.as_ref() == r.as_ref()))
}

/// Every account must be `namespace:reference:address`
pub fn validate_accounts(accounts: &[String], context: &str) -> Result<()> {
    match accounts.iter().find(|a| !is_valid_account_id(a)) {
        Some(account) => Err(ValidationError::Format(format!(
            "{}, account {} should be a string and conform to 'namespace:chainId:address' format.",
            context, account
        ))),
        None => Ok(()),
    }
}

/// Every account of every namespace entry must pass the account grammar
pub fn validate_namespaces(namespaces: &Namespaces, method: &str) -> Result<()> {
    let context = format!("{} namespace", method);
    for namespace in namespaces.values() {
        validate_accounts(&namespace.accounts, &context)?;
    }
    Ok(())
}

/// Settled namespaces must cover the required ones on every axis
///
/// Keys are checked first; then, per required key, chains derived from the
/// settled accounts, then methods, then events.
pub fn validate_conforming_namespaces(
    required: &RequiredNamespaces,
    namespaces: &Namespaces,
    context: &str,
) -> Result<()> {
    if let Some(missing) = required.keys().find(|key| !namespaces.contains_key(*key)) {
        return Err(ValidationError::mismatch(MismatchAxis::Keys, Some(missing), context));
    }

    for (key, requirement) in required {
        let Some(settled) = namespaces.get(key) else {
            return Err(ValidationError::mismatch(MismatchAxis::Keys, Some(key), context));
        };

        let settled_chains = account_chains(&settled.accounts);
        let axes = [
            (MismatchAxis::Chains, has_overlap(&requirement.chains, &settled_chains)),
            (MismatchAxis::Methods, has_overlap(&requirement.methods, &settled.methods)),
            (MismatchAxis::Events, has_overlap(&requirement.events, &settled.events)),
        ];
        if let Some((axis, _)) = axes.iter().find(|(_, ok)| !ok) {
            return Err(ValidationError::mismatch(*axis, Some(key), context));
        }
    }
    Ok(())
}

/// Methods authorized for `chain_id`, unioned over every entry whose
/// accounts cover that chain
///
/// An unknown chain yields an empty set.
pub fn methods_for_chain(namespaces: &Namespaces, chain_id: &str) -> BTreeSet<String> {
    namespaces
        .values()
        .filter(|ns| account_chains(&ns.accounts).iter().any(|c| c == chain_id))
        .flat_map(|ns| ns.methods.iter().cloned())
        .collect()
}

/// Events authorized for `chain_id`; see [`methods_for_chain`]
pub fn events_for_chain(namespaces: &Namespaces, chain_id: &str) -> BTreeSet<String> {
    namespaces
        .values()
        .filter(|ns| account_chains(&ns.accounts).iter().any(|c| c == chain_id))
        .flat_map(|ns| ns.events.iter().cloned())
        .collect()
}

/// Every chain covered by the accounts of `namespaces`
pub fn namespaces_chains(namespaces: &Namespaces) -> BTreeSet<String> {
    namespaces
        .values()
        .flat_map(|ns| account_chains(&ns.accounts))
        .collect()
}

/// `chain_id` must be CAIP-2 and covered by some account in `namespaces`
pub fn validate_namespaces_chain_id(namespaces: &Namespaces, chain_id: &str) -> Result<()> {
    if !is_valid_chain_id(chain_id) {
        return Err(ValidationError::Format(format!(
            "ChainId {} should be a string and conform to CAIP-2.",
            chain_id
        )));
    }
    if !namespaces_chains(namespaces).contains(chain_id) {
        return Err(ValidationError::Unauthorized(format!(
            "ChainId {} is invalid or not found in namespaces.",
            chain_id
        )));
    }
    Ok(())
}

/// Whether a settled session can be reused for a new set of requirements
///
/// Every required key must be settled, and every settled key must have a
/// requirement that its chains, methods and events satisfy. Any lookup miss
/// makes the session incompatible.
pub fn is_session_compatible(session: &Namespaces, required: &RequiredNamespaces) -> bool {
    let required_keys: Vec<&String> = required.keys().collect();
    let session_keys: Vec<&String> = session.keys().collect();
    if !has_overlap(&required_keys, &session_keys) {
        return false;
    }

    session.iter().all(|(key, settled)| match required.get(key) {
        Some(requirement) => {
            let chains = account_chains(&settled.accounts);
            has_overlap(&requirement.chains, &chains)
                && has_overlap(&requirement.methods, &settled.methods)
                && has_overlap(&requirement.events, &settled.events)
        }
        None => false,
    })
}

/// True if `min <= expiry <= max`
pub fn is_valid_request_expiry(expiry: i64, min: i64, max: i64) -> bool {
    (min..=max).contains(&expiry)
}
