//! External provider contracts consumed by the settlement saga.
//!
//! One module per collaborator, each with an in-memory implementation used
//! as the scripted test double and as the default local wiring.

pub mod custody;
pub mod escrow;
pub mod offramp;
pub mod onramp;
pub mod quote;
pub mod rail;
pub mod ticketing;

pub use custody::{InMemoryKeyCustody, KeyCustody, Signer};
pub use escrow::{ChainReceipt, EscrowLedgerClient, InMemoryEscrowLedger};
pub use offramp::{InMemoryOffRampClient, OffRampClient, PayoutOrder};
pub use onramp::{InMemoryOnRampClient, OnRampClient, OnRampReceipt, OrderStatus, StatusReport};
pub use quote::{InMemoryQuoteClient, Quote, QuoteAmount, QuoteClient, QuoteDirection};
pub use rail::{FiatRailClient, InMemoryFiatRailClient, RailInitiation};
pub use ticketing::{InMemoryTicketingClient, Ticket, TicketSide, TicketingClient};
