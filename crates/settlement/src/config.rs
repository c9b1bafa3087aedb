//! Settlement timing and chain configuration.
//!
//! Network id, token decimals, and explorer URL vary per deployment, so all
//! of them are configuration values rather than code branches.

use std::time::Duration;

use common::TxHash;

/// Target chain parameters.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Network identifier understood by the ramp providers (e.g. `"celo"`).
    pub network: String,
    /// Stablecoin symbol used on tickets.
    pub token_symbol: String,
    /// Stablecoin contract address.
    pub token_address: String,
    /// Stablecoin decimals.
    pub token_decimals: u8,
    /// Escrow contract address.
    pub escrow_address: String,
    /// Block explorer base URL for transaction links.
    pub explorer_base_url: String,
}

impl ChainConfig {
    /// Derives the explorer link for a mined transaction.
    pub fn explorer_link(&self, tx_hash: &TxHash) -> String {
        format!(
            "{}/tx/{}",
            self.explorer_base_url.trim_end_matches('/'),
            tx_hash
        )
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            network: "celo".to_string(),
            token_symbol: "USDT".to_string(),
            token_address: "0x3a0d9d7764FAE860A659eb96A500F1323b411e68".to_string(),
            token_decimals: 6,
            escrow_address: "0x0000000000000000000000000000000000000000".to_string(),
            explorer_base_url: "https://alfajores-blockscout.celo-testnet.org".to_string(),
        }
    }
}

/// Settlement saga configuration.
#[derive(Debug, Clone)]
pub struct SettlementConfig {
    /// Interval between fiat-confirmation status checks.
    pub poll_interval: Duration,
    /// Maximum number of status checks before giving up.
    pub poll_max_attempts: u32,
    /// Attempt budget for the on-ramp settlement call.
    pub settle_retry_attempts: u32,
    /// Linear backoff step for on-ramp settlement retries (attempt x step).
    pub settle_backoff_step: Duration,
    /// Attempt budget for push-payment initiation.
    pub rail_retry_attempts: u32,
    /// Fixed delay between push-payment initiation retries.
    pub rail_retry_delay: Duration,
    /// Per-call timeout applied to every provider request.
    pub request_timeout: Duration,
    /// Fiat currency code quoted to the conversion provider.
    pub fiat_currency: String,
    /// Target chain parameters.
    pub chain: ChainConfig,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            poll_max_attempts: 12,
            settle_retry_attempts: 3,
            settle_backoff_step: Duration::from_secs(2),
            rail_retry_attempts: 3,
            rail_retry_delay: Duration::from_secs(2),
            request_timeout: Duration::from_secs(30),
            fiat_currency: "KES".to_string(),
            chain: ChainConfig::default(),
        }
    }
}

impl SettlementConfig {
    /// A configuration with millisecond waits so polling and backoff paths
    /// run quickly under test.
    pub fn fast() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
            settle_backoff_step: Duration::from_millis(1),
            rail_retry_delay: Duration::from_millis(1),
            request_timeout: Duration::from_secs(5),
            ..Self::default()
        }
    }
}
