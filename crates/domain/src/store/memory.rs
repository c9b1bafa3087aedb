//! In-memory policy store for tests and local runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{Msisdn, OrderId, PolicyId};
use tokio::sync::RwLock;

use crate::policy::{PolicyRecord, PolicyTransition};
use crate::store::{PolicyStore, PolicyStoreError, Result};

/// In-memory policy store implementation.
///
/// Provides the same interface and invariants as the PostgreSQL
/// implementation.
#[derive(Clone, Default)]
pub struct InMemoryPolicyStore {
    records: Arc<RwLock<HashMap<OrderId, PolicyRecord>>>,
}

impl InMemoryPolicyStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of records stored.
    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn create(&self, record: PolicyRecord) -> Result<()> {
        let mut records = self.records.write().await;

        if records.contains_key(record.order_id()) {
            return Err(PolicyStoreError::Conflict(format!(
                "order {} already exists",
                record.order_id()
            )));
        }

        let open_duplicate = records.values().any(|existing| {
            existing.phone() == record.phone()
                && existing.premium_id() == record.premium_id()
                && existing.status().is_open()
        });
        if open_duplicate {
            return Err(PolicyStoreError::Conflict(format!(
                "open policy already exists for {} / {}",
                record.phone(),
                record.premium_id()
            )));
        }

        records.insert(record.order_id().clone(), record);
        Ok(())
    }

    async fn find_by_order_id(&self, order_id: &OrderId) -> Result<Option<PolicyRecord>> {
        Ok(self.records.read().await.get(order_id).cloned())
    }

    async fn find_by_id(&self, id: &PolicyId) -> Result<Option<PolicyRecord>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|r| r.id() == *id)
            .cloned())
    }

    async fn find_by_owner(&self, phone: &Msisdn) -> Result<Vec<PolicyRecord>> {
        let records = self.records.read().await;
        let mut owned: Vec<PolicyRecord> = records
            .values()
            .filter(|r| r.phone() == phone)
            .cloned()
            .collect();
        owned.sort_by_key(|r| r.created_at());
        Ok(owned)
    }

    async fn update_status(
        &self,
        order_id: &OrderId,
        transition: PolicyTransition,
    ) -> Result<PolicyRecord> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(order_id)
            .ok_or_else(|| PolicyStoreError::NotFound(order_id.to_string()))?;

        record.apply(transition)?;
        tracing::debug!(order_id = %order_id, status = %record.status(), "policy status updated");
        Ok(record.clone())
    }
}
