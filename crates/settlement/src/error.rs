//! Settlement saga error types.
//!
//! The taxonomy follows how the saga reacts to each failure: validation and
//! precondition errors are rejected synchronously with no side effects,
//! transient provider errors are retried within bounded policy, terminal
//! provider errors and confirmation timeouts end the saga in `Failed`.

use domain::{DomainError, PolicyStoreError};
use thiserror::Error;

/// Errors that can occur during settlement operations.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// Malformed input (unknown duration, non-positive amount).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The premium ID does not exist in the catalog.
    #[error("Invalid premium: {0}")]
    UnknownPremium(String),

    /// A synchronous precondition failed (missing wallet, policy not
    /// claimable, wrong owner).
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// No policy record exists for the given key.
    #[error("Policy not found: {0}")]
    PolicyNotFound(String),

    /// The conversion provider could not produce a quote.
    #[error("Quote unavailable: {0}")]
    QuoteUnavailable(String),

    /// The fiat rail rejected the push-payment initiation.
    #[error("Payment initiation rejected: {0}")]
    RailRejected(String),

    /// The rail reported a definitive payment failure.
    #[error("Payment failed: {0}")]
    RailFailed(String),

    /// Fiat confirmation polling exhausted its attempt budget.
    #[error("Payment not confirmed within {attempts} status checks")]
    ConfirmationTimeout { attempts: u32 },

    /// The on-ramp settlement call failed.
    #[error("On-ramp settlement failed: {reason}")]
    OnRampFailed { reason: String },

    /// An escrow transaction reverted on chain.
    #[error("Escrow transaction reverted: {0}")]
    ChainReverted(String),

    /// The signer cannot pay for gas.
    #[error("Insufficient gas: {0}")]
    InsufficientGas(String),

    /// The off-ramp provider rejected the payout order.
    #[error("Off-ramp rejected: {0}")]
    OffRampRejected(String),

    /// The key-custody collaborator could not produce a signer.
    #[error("Key custody error: {0}")]
    Custody(String),

    /// The ticket desk could not accept a manual-intervention ticket.
    /// Always swallowed by callers; filing is best effort.
    #[error("Ticket filing failed: {0}")]
    Ticketing(String),

    /// A provider call exceeded the request-level timeout.
    #[error("Provider call timed out during {0}")]
    ProviderTimeout(String),

    /// A settlement task already holds the lease for this order.
    #[error("Settlement already in flight for order {0}")]
    SagaInFlight(String),

    /// Policy store error.
    #[error("Policy store error: {0}")]
    Store(#[from] PolicyStoreError),

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl SettlementError {
    /// Returns true for on-ramp failures caused by exchange-rate movement,
    /// the only settlement failure worth retrying.
    pub fn is_exchange_rate_transient(&self) -> bool {
        matches!(
            self,
            SettlementError::OnRampFailed { reason }
                if reason.to_ascii_lowercase().contains("exchange rate")
        )
    }
}

/// Convenience type alias for settlement results.
pub type Result<T> = std::result::Result<T, SettlementError>;
