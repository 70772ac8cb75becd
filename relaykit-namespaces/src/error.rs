//! Validation error taxonomy
//!
//! Every check in this crate fails with a [`ValidationError`]. The display
//! string of each variant is the message a peer would see, so callers can
//! forward it as the reason of a rejected request.

use std::fmt;
use thiserror::Error;

/// Result type for namespace validation
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Axis along which a settled namespace set failed to satisfy a required one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MismatchAxis {
    Keys,
    Chains,
    Methods,
    Events,
}

impl MismatchAxis {
    pub fn as_str(&self) -> &'static str {
        match self {
            MismatchAxis::Keys => "keys",
            MismatchAxis::Chains => "chains",
            MismatchAxis::Methods => "methods",
            MismatchAxis::Events => "events",
        }
    }
}

impl fmt::Display for MismatchAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised by a namespace, topic or request check
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    /// A topic or id is absent from its store
    #[error("{0}")]
    NotFound(String),

    /// A stored record has passed its expiry
    #[error("{0}")]
    Expired(String),

    /// An account or chain id string does not match its grammar
    #[error("{0}")]
    Format(String),

    /// A parameter is missing or blank
    #[error("{0}")]
    InvalidArgument(String),

    /// Settled namespaces do not cover the required ones
    #[error("{}", mismatch_message(*.axis, .key.as_deref(), .context))]
    NamespaceMismatch {
        axis: MismatchAxis,
        key: Option<String>,
        context: String,
    },

    /// A method, event or chain is not authorized by the session namespaces
    #[error("{0}")]
    Unauthorized(String),

    /// The backing store failed
    #[error(transparent)]
    Storage(#[from] relaykit_core::Error),
}

fn mismatch_message(axis: MismatchAxis, key: Option<&str>, context: &str) -> String {
    match (axis, key) {
        (MismatchAxis::Keys, _) | (_, None) => {
            format!("Namespaces {} don't satisfy requiredNamespaces, {}.", axis, context)
        }
        (axis, Some(key)) => format!(
            "Namespaces {} don't satisfy requiredNamespaces {} for {}, {}.",
            axis, axis, key, context
        ),
    }
}

impl ValidationError {
    pub(crate) fn mismatch(axis: MismatchAxis, key: Option<&str>, context: &str) -> Self {
        ValidationError::NamespaceMismatch {
            axis,
            key: key.map(str::to_string),
            context: context.to_string(),
        }
    }

    /// True for `NotFound` and `Expired`, the failures a caller can recover
    /// from by re-pairing or re-proposing
    pub fn is_stale_reference(&self) -> bool {
        matches!(self, ValidationError::NotFound(_) | ValidationError::Expired(_))
    }
}
