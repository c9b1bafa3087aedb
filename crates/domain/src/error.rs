//! Domain error types.

use thiserror::Error;

use crate::policy::PolicyStatus;

/// Errors raised by domain invariant checks.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The requested status transition is not a legal edge.
    #[error("Invalid policy transition: {from} -> {to}")]
    InvalidTransition {
        from: PolicyStatus,
        to: PolicyStatus,
    },

    /// The chain transaction hash is set at most once per record.
    #[error("Chain transaction hash already recorded")]
    TxHashAlreadySet,

    /// The premium ID does not exist in the catalog.
    #[error("Unknown premium: {0}")]
    UnknownPremium(String),

    /// The duration is not one of the enumerated coverage periods.
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    /// A persisted status string could not be decoded.
    #[error("Unknown policy status: {0}")]
    UnknownStatus(String),

    /// A persisted rail status string could not be decoded.
    #[error("Unknown rail status: {0}")]
    UnknownRailStatus(String),
}
