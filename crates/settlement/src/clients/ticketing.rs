//! Manual-intervention ticket client trait and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{Msisdn, WalletAddress};

use crate::error::SettlementError;

/// Which leg of the flow the ticket escalates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketSide {
    OnRamp,
    OffRamp,
}

impl TicketSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketSide::OnRamp => "on-ramp",
            TicketSide::OffRamp => "off-ramp",
        }
    }
}

/// A manual-intervention ticket describing a failed settlement leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub phone: Msisdn,
    /// Fiat or token amount formatted for the operator.
    pub amount: String,
    pub description: String,
    pub side: TicketSide,
    pub wallet_address: WalletAddress,
    pub token_symbol: String,
    pub token_address: String,
    pub chain: String,
}

/// Trait for filing operator tickets.
///
/// Filing is best effort: callers swallow errors so an unreachable ticket
/// desk never changes a saga outcome.
#[async_trait]
pub trait TicketingClient: Send + Sync {
    async fn file(&self, ticket: Ticket) -> Result<(), SettlementError>;
}

#[derive(Debug, Default)]
struct InMemoryTicketingState {
    fail_on_file: bool,
    tickets: Vec<Ticket>,
}

/// In-memory ticket desk for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTicketingClient {
    state: Arc<RwLock<InMemoryTicketingState>>,
}

impl InMemoryTicketingClient {
    /// Creates a new in-memory ticketing client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures ticket filing to fail.
    pub fn set_fail_on_file(&self, fail: bool) {
        self.state.write().unwrap().fail_on_file = fail;
    }

    /// Returns the number of tickets filed.
    pub fn ticket_count(&self) -> usize {
        self.state.read().unwrap().tickets.len()
    }

    /// Returns the most recently filed ticket.
    pub fn last_ticket(&self) -> Option<Ticket> {
        self.state.read().unwrap().tickets.last().cloned()
    }
}

#[async_trait]
impl TicketingClient for InMemoryTicketingClient {
    async fn file(&self, ticket: Ticket) -> Result<(), SettlementError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_file {
            return Err(SettlementError::Ticketing(
                "ticket desk unreachable".to_string(),
            ));
        }
        state.tickets.push(ticket);
        Ok(())
    }
}
