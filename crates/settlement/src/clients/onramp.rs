//! On-ramp provider client trait and in-memory implementation.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{OrderId, TxHash, WalletAddress};

use crate::error::SettlementError;

/// Provider-reported state of an on-ramp order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    /// The push payment is still being processed.
    Pending,
    /// The payment was confirmed.
    Success,
    /// The payment failed definitively.
    Failed,
}

/// One order-status observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub status: OrderStatus,
    /// Provider result description, when present.
    pub detail: Option<String>,
}

impl StatusReport {
    pub fn pending() -> Self {
        Self {
            status: OrderStatus::Pending,
            detail: None,
        }
    }

    pub fn success(detail: impl Into<String>) -> Self {
        Self {
            status: OrderStatus::Success,
            detail: Some(detail.into()),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            status: OrderStatus::Failed,
            detail: Some(detail.into()),
        }
    }
}

/// Receipt for a completed on-ramp settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnRampReceipt {
    /// Hash of the provider's stablecoin transfer to the user wallet.
    pub tx_hash: TxHash,
}

/// Trait for the on-ramp provider: order status and fiat-to-stablecoin
/// settlement.
#[async_trait]
pub trait OnRampClient: Send + Sync {
    /// Fetches the current state of an on-ramp order.
    async fn order_status(&self, order_id: &OrderId) -> Result<StatusReport, SettlementError>;

    /// Converts the confirmed fiat payment into a stablecoin deposit at the
    /// user's wallet; fails with [`SettlementError::OnRampFailed`]. The
    /// failure reason may indicate exchange-rate transience.
    async fn settle(
        &self,
        wallet: &WalletAddress,
        order_id: &OrderId,
    ) -> Result<OnRampReceipt, SettlementError>;
}

#[derive(Debug, Default)]
struct InMemoryOnRampState {
    /// Scripted status observations, consumed one per poll. When empty the
    /// order reports Success.
    status_script: VecDeque<StatusReport>,
    /// Scripted settle failure reasons, consumed one per attempt.
    settle_failures: VecDeque<String>,
    status_count: usize,
    settle_count: usize,
    next_tx: u32,
}

/// In-memory on-ramp provider for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOnRampClient {
    state: Arc<RwLock<InMemoryOnRampState>>,
}

impl InMemoryOnRampClient {
    /// Creates a new in-memory on-ramp client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends scripted status observations consumed one per poll.
    pub fn script_statuses(&self, reports: impl IntoIterator<Item = StatusReport>) {
        self.state
            .write()
            .unwrap()
            .status_script
            .extend(reports);
    }

    /// Appends scripted settle failures consumed one per attempt.
    pub fn script_settle_failures(&self, reasons: impl IntoIterator<Item = String>) {
        self.state
            .write()
            .unwrap()
            .settle_failures
            .extend(reasons);
    }

    /// Returns the number of status polls observed.
    pub fn status_count(&self) -> usize {
        self.state.read().unwrap().status_count
    }

    /// Returns the number of settle attempts observed.
    pub fn settle_count(&self) -> usize {
        self.state.read().unwrap().settle_count
    }
}

#[async_trait]
impl OnRampClient for InMemoryOnRampClient {
    async fn order_status(&self, _order_id: &OrderId) -> Result<StatusReport, SettlementError> {
        let mut state = self.state.write().unwrap();
        state.status_count += 1;

        Ok(state.status_script.pop_front().unwrap_or_else(|| {
            StatusReport::success("The service request is processed successfully.")
        }))
    }

    async fn settle(
        &self,
        _wallet: &WalletAddress,
        _order_id: &OrderId,
    ) -> Result<OnRampReceipt, SettlementError> {
        let mut state = self.state.write().unwrap();
        state.settle_count += 1;

        if let Some(reason) = state.settle_failures.pop_front() {
            return Err(SettlementError::OnRampFailed { reason });
        }

        state.next_tx += 1;
        Ok(OnRampReceipt {
            tx_hash: TxHash::new(format!("0xonramp{:04}", state.next_tx)),
        })
    }
}
