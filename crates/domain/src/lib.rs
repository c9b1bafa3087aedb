//! Policy domain model for the insurance settlement system.
//!
//! The central artifact is the [`PolicyRecord`]: the durable, externally
//! observable record of one purchase saga (reused by the claim saga). It is
//! created in `Pending`, mutated exclusively through [`PolicyTransition`]
//! values that enforce forward-only status movement, and never deleted.

pub mod error;
pub mod policy;
pub mod premium;
pub mod store;

pub use error::DomainError;
pub use policy::{PolicyRecord, PolicyStatus, PolicyTransition, RailStatus};
pub use premium::{Coverage, Duration, Premium, PremiumCatalog};
pub use store::{InMemoryPolicyStore, PolicyStore, PolicyStoreError, PostgresPolicyStore};
