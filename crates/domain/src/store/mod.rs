//! Durable policy store contract and implementations.

mod memory;
mod postgres;

use async_trait::async_trait;
use common::{Msisdn, OrderId, PolicyId};
use thiserror::Error;

use crate::error::DomainError;
use crate::policy::{PolicyRecord, PolicyTransition};

pub use memory::InMemoryPolicyStore;
pub use postgres::PostgresPolicyStore;

/// Errors raised by policy store operations.
#[derive(Debug, Error)]
pub enum PolicyStoreError {
    /// An open record already exists for the natural key, or the order ID
    /// is already taken.
    #[error("Policy conflict: {0}")]
    Conflict(String),

    /// No record exists for the given key.
    #[error("Policy not found: {0}")]
    NotFound(String),

    /// A domain invariant rejected the operation.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A persisted row could not be decoded into a record.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, PolicyStoreError>;

/// Durable record of each purchase/claim saga's state.
///
/// Records are keyed by the provider-assigned order ID, created in Pending
/// by the purchase path, mutated exclusively through [`PolicyTransition`]s,
/// and never deleted — `Failed` is a terminal, inspectable state, not a
/// tombstone.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Persists a new Pending record.
    ///
    /// Fails with [`PolicyStoreError::Conflict`] when an open (non-terminal)
    /// record already exists for the same (owner, premium) pair, or when the
    /// order ID is already taken.
    async fn create(&self, record: PolicyRecord) -> Result<()>;

    /// Loads a record by its order correlation ID.
    async fn find_by_order_id(&self, order_id: &OrderId) -> Result<Option<PolicyRecord>>;

    /// Loads a record by its policy ID.
    async fn find_by_id(&self, id: &PolicyId) -> Result<Option<PolicyRecord>>;

    /// Loads all records owned by the given subscriber.
    async fn find_by_owner(&self, phone: &Msisdn) -> Result<Vec<PolicyRecord>>;

    /// Applies a status transition and persists the result.
    ///
    /// Backward or otherwise illegal transitions are rejected by the record
    /// invariants and leave the stored record untouched.
    async fn update_status(
        &self,
        order_id: &OrderId,
        transition: PolicyTransition,
    ) -> Result<PolicyRecord>;
}
