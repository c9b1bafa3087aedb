//! Off-ramp payout client trait and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{Msisdn, OrderId, TxHash};

use crate::error::SettlementError;

/// A payout order accepted by the off-ramp provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutOrder {
    pub order_id: OrderId,
}

/// Trait for converting a released escrow withdrawal into a mobile-money
/// payout.
#[async_trait]
pub trait OffRampClient: Send + Sync {
    /// Submits a payout order referencing the withdrawal transaction; fails
    /// with [`SettlementError::OffRampRejected`].
    async fn submit_payout(
        &self,
        chain: &str,
        tx_hash: &TxHash,
        payee: &Msisdn,
        token: &str,
    ) -> Result<PayoutOrder, SettlementError>;
}

#[derive(Debug, Default)]
struct InMemoryOffRampState {
    fail_on_payout: bool,
    payout_count: usize,
    last_tx_hash: Option<TxHash>,
    sequence: u32,
}

/// In-memory off-ramp provider for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOffRampClient {
    state: Arc<RwLock<InMemoryOffRampState>>,
}

impl InMemoryOffRampClient {
    /// Creates a new in-memory off-ramp client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures payout submissions to be rejected.
    pub fn set_fail_on_payout(&self, fail: bool) {
        self.state.write().unwrap().fail_on_payout = fail;
    }

    /// Returns the number of payout submissions made.
    pub fn payout_count(&self) -> usize {
        self.state.read().unwrap().payout_count
    }

    /// Returns the withdrawal hash referenced by the last payout.
    pub fn last_tx_hash(&self) -> Option<TxHash> {
        self.state.read().unwrap().last_tx_hash.clone()
    }
}

#[async_trait]
impl OffRampClient for InMemoryOffRampClient {
    async fn submit_payout(
        &self,
        _chain: &str,
        tx_hash: &TxHash,
        _payee: &Msisdn,
        _token: &str,
    ) -> Result<PayoutOrder, SettlementError> {
        let mut state = self.state.write().unwrap();
        state.payout_count += 1;

        if state.fail_on_payout {
            return Err(SettlementError::OffRampRejected(
                "payout rejected".to_string(),
            ));
        }

        state.last_tx_hash = Some(tx_hash.clone());
        state.sequence += 1;
        Ok(PayoutOrder {
            order_id: OrderId::new(format!("PAY-{:04}", state.sequence)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn payout_references_withdrawal_hash() {
        let client = InMemoryOffRampClient::new();
        let hash = TxHash::new("0xwithdraw0001");

        let order = client
            .submit_payout("celo", &hash, &Msisdn::new("254712345678"), "0xtoken")
            .await
            .unwrap();

        assert_eq!(order.order_id.as_str(), "PAY-0001");
        assert_eq!(client.last_tx_hash(), Some(hash));
        assert_eq!(client.payout_count(), 1);
    }

    #[tokio::test]
    async fn fail_knob_rejects_payout() {
        let client = InMemoryOffRampClient::new();
        client.set_fail_on_payout(true);

        let result = client
            .submit_payout(
                "celo",
                &TxHash::new("0xdead"),
                &Msisdn::new("254712345678"),
                "0xtoken",
            )
            .await;
        assert!(matches!(result, Err(SettlementError::OffRampRejected(_))));
    }
}
