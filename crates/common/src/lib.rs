//! Shared value types used across the settlement system.

mod types;

pub use types::{
    AmountParseError, FiatAmount, Msisdn, OrderId, PolicyId, TokenAmount, TxHash, WalletAddress,
};
