//! Mobile-money push-payment client trait and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{FiatAmount, Msisdn, OrderId, WalletAddress};

use crate::error::SettlementError;

/// Result of a successful push-payment initiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RailInitiation {
    /// Correlation key minted by the provider for this payment.
    pub order_id: OrderId,
}

/// Trait for initiating mobile-money push payments.
///
/// Initiation only starts the payment; confirmation is observed by polling
/// the on-ramp order status.
#[async_trait]
pub trait FiatRailClient: Send + Sync {
    /// Initiates a push payment to the payer's handset; fails with
    /// [`SettlementError::RailRejected`].
    async fn initiate(
        &self,
        payer: &Msisdn,
        amount: FiatAmount,
        wallet: &WalletAddress,
    ) -> Result<RailInitiation, SettlementError>;
}

#[derive(Debug, Default)]
struct InMemoryRailState {
    next_order_id: Option<String>,
    fail_next_initiations: u32,
    initiation_count: usize,
    sequence: u32,
}

/// In-memory fiat rail for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFiatRailClient {
    state: Arc<RwLock<InMemoryRailState>>,
}

impl InMemoryFiatRailClient {
    /// Creates a new in-memory rail client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the order ID returned by the next successful initiation.
    pub fn set_next_order_id(&self, order_id: impl Into<String>) {
        self.state.write().unwrap().next_order_id = Some(order_id.into());
    }

    /// Configures the next `count` initiations to be rejected.
    pub fn fail_next_initiations(&self, count: u32) {
        self.state.write().unwrap().fail_next_initiations = count;
    }

    /// Returns the number of initiation calls made (including rejected).
    pub fn initiation_count(&self) -> usize {
        self.state.read().unwrap().initiation_count
    }
}

#[async_trait]
impl FiatRailClient for InMemoryFiatRailClient {
    async fn initiate(
        &self,
        _payer: &Msisdn,
        _amount: FiatAmount,
        _wallet: &WalletAddress,
    ) -> Result<RailInitiation, SettlementError> {
        let mut state = self.state.write().unwrap();
        state.initiation_count += 1;

        if state.fail_next_initiations > 0 {
            state.fail_next_initiations -= 1;
            return Err(SettlementError::RailRejected(
                "provider temporarily unavailable".to_string(),
            ));
        }

        let order_id = match state.next_order_id.take() {
            Some(id) => OrderId::new(id),
            None => {
                state.sequence += 1;
                OrderId::new(format!("ORD-{:04}", state.sequence))
            }
        };

        Ok(RailInitiation { order_id })
    }
}
