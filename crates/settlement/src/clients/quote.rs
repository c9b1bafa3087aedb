//! Conversion quote client trait and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{FiatAmount, TokenAmount};

use crate::error::SettlementError;

/// Direction of a conversion quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteDirection {
    /// Fiat in, stablecoin out.
    OnRamp,
    /// Stablecoin in, fiat out.
    OffRamp,
}

impl QuoteDirection {
    /// Returns the direction name as the providers spell it.
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteDirection::OnRamp => "onramp",
            QuoteDirection::OffRamp => "offramp",
        }
    }
}

/// The amount being quoted, denominated per direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteAmount {
    Fiat(FiatAmount),
    Crypto(TokenAmount),
}

/// A conversion quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    /// The stablecoin amount the conversion produces (on-ramp) or consumes
    /// (off-ramp).
    pub crypto_amount: TokenAmount,
}

/// Trait for requesting fiat/crypto conversion quotes.
///
/// Currency pair and network are fixed at client construction from
/// configuration.
#[async_trait]
pub trait QuoteClient: Send + Sync {
    /// Requests a quote; fails with [`SettlementError::QuoteUnavailable`].
    async fn quote(
        &self,
        direction: QuoteDirection,
        amount: QuoteAmount,
    ) -> Result<Quote, SettlementError>;
}

#[derive(Debug)]
struct InMemoryQuoteState {
    /// Token base units produced per fiat cent.
    units_per_cent: u128,
    fail_on_quote: bool,
    quote_count: usize,
}

impl Default for InMemoryQuoteState {
    fn default() -> Self {
        Self {
            // 100.00 fiat -> 0.76 tokens at 6 decimals.
            units_per_cent: 76,
            fail_on_quote: false,
            quote_count: 0,
        }
    }
}

/// In-memory quote client with a fixed conversion rate.
#[derive(Debug, Clone, Default)]
pub struct InMemoryQuoteClient {
    state: Arc<RwLock<InMemoryQuoteState>>,
}

impl InMemoryQuoteClient {
    /// Creates a new in-memory quote client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the client to fail quote calls.
    pub fn set_fail_on_quote(&self, fail: bool) {
        self.state.write().unwrap().fail_on_quote = fail;
    }

    /// Overrides the conversion rate (token base units per fiat cent).
    pub fn set_units_per_cent(&self, units: u128) {
        self.state.write().unwrap().units_per_cent = units;
    }

    /// Returns the number of quotes served.
    pub fn quote_count(&self) -> usize {
        self.state.read().unwrap().quote_count
    }
}

#[async_trait]
impl QuoteClient for InMemoryQuoteClient {
    async fn quote(
        &self,
        _direction: QuoteDirection,
        amount: QuoteAmount,
    ) -> Result<Quote, SettlementError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_quote {
            return Err(SettlementError::QuoteUnavailable(
                "rate feed unavailable".to_string(),
            ));
        }

        state.quote_count += 1;
        let crypto_amount = match amount {
            QuoteAmount::Fiat(fiat) => {
                TokenAmount::from_units(fiat.cents().max(0) as u128 * state.units_per_cent)
            }
            QuoteAmount::Crypto(tokens) => tokens,
        };

        Ok(Quote { crypto_amount })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn onramp_quote_converts_fiat_to_units() {
        let client = InMemoryQuoteClient::new();
        let quote = client
            .quote(
                QuoteDirection::OnRamp,
                QuoteAmount::Fiat(FiatAmount::from_whole(200)),
            )
            .await
            .unwrap();

        // 20000 cents * 76 units/cent = 1.52 tokens at 6 decimals.
        assert_eq!(quote.crypto_amount, TokenAmount::from_units(1_520_000));
        assert_eq!(client.quote_count(), 1);
    }

    #[tokio::test]
    async fn offramp_quote_echoes_crypto_amount() {
        let client = InMemoryQuoteClient::new();
        let quote = client
            .quote(
                QuoteDirection::OffRamp,
                QuoteAmount::Crypto(TokenAmount::from_units(1_520_000)),
            )
            .await
            .unwrap();

        assert_eq!(quote.crypto_amount, TokenAmount::from_units(1_520_000));
    }

    #[tokio::test]
    async fn fail_knob_surfaces_quote_unavailable() {
        let client = InMemoryQuoteClient::new();
        client.set_fail_on_quote(true);

        let result = client
            .quote(
                QuoteDirection::OnRamp,
                QuoteAmount::Fiat(FiatAmount::from_whole(200)),
            )
            .await;
        assert!(matches!(
            result,
            Err(SettlementError::QuoteUnavailable(_))
        ));
        assert_eq!(client.quote_count(), 0);
    }
}
