//! Settlement sagas for fiat-to-stablecoin insurance policies.
//!
//! The purchase saga converts a mobile-money premium payment into an
//! on-chain escrow deposit; the claim saga releases the escrowed cover back
//! out as a mobile-money payout. Provider integrations sit behind the
//! traits in [`clients`], so the saga logic is exercised end to end against
//! scripted in-memory doubles.

pub mod clients;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod lease;
pub mod poll;
pub mod retry;

pub use config::{ChainConfig, SettlementConfig};
pub use coordinator::{
    ClaimReceipt, ClaimRequest, PolicyStatusView, PurchaseAccepted, PurchaseRequest,
    SettlementSaga,
};
pub use error::SettlementError;
pub use lease::{OrderLease, OrderLeases};
pub use poll::{poll_until, PollOutcome, PollResult};
pub use retry::{Backoff, RetryPolicy};
