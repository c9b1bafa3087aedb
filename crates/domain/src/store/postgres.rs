//! PostgreSQL-backed policy store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{FiatAmount, Msisdn, OrderId, PolicyId, TokenAmount, TxHash, WalletAddress};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::policy::{PolicyRecord, PolicyStatus, PolicyTransition, RailStatus};
use crate::premium::Duration;
use crate::store::{PolicyStore, PolicyStoreError, Result};

/// PostgreSQL policy store implementation.
#[derive(Clone)]
pub struct PostgresPolicyStore {
    pool: PgPool,
}

const SELECT_COLUMNS: &str = "id, order_id, phone, wallet_address, premium_id, premium_name, \
     fiat_amount_cents, crypto_amount_units, duration, coverage, status, \
     rail_status, rail_detail, chain_tx_hash, created_at, updated_at";

impl PostgresPolicyStore {
    /// Creates a new PostgreSQL policy store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_record(row: PgRow) -> Result<PolicyRecord> {
        let coverage_json: serde_json::Value = row.try_get("coverage")?;
        let coverage: BTreeMap<String, bool> = serde_json::from_value(coverage_json)?;

        let status: PolicyStatus = row
            .try_get::<String, _>("status")?
            .parse()
            .map_err(|e: crate::DomainError| PolicyStoreError::Corrupt(e.to_string()))?;
        let rail_status: RailStatus = row
            .try_get::<String, _>("rail_status")?
            .parse()
            .map_err(|e: crate::DomainError| PolicyStoreError::Corrupt(e.to_string()))?;
        let duration: Duration = row
            .try_get::<String, _>("duration")?
            .parse()
            .map_err(|e: crate::DomainError| PolicyStoreError::Corrupt(e.to_string()))?;

        let crypto_units: u128 = row
            .try_get::<String, _>("crypto_amount_units")?
            .parse()
            .map_err(|_| PolicyStoreError::Corrupt("bad crypto_amount_units".to_string()))?;

        Ok(PolicyRecord::from_parts(
            PolicyId::from_uuid(row.try_get::<Uuid, _>("id")?),
            OrderId::new(row.try_get::<String, _>("order_id")?),
            Msisdn::new(row.try_get::<String, _>("phone")?),
            WalletAddress::new(row.try_get::<String, _>("wallet_address")?),
            row.try_get("premium_id")?,
            row.try_get("premium_name")?,
            FiatAmount::from_cents(row.try_get("fiat_amount_cents")?),
            TokenAmount::from_units(crypto_units),
            duration,
            coverage,
            status,
            rail_status,
            row.try_get("rail_detail")?,
            row.try_get::<Option<String>, _>("chain_tx_hash")?
                .map(TxHash::new),
            row.try_get::<DateTime<Utc>, _>("created_at")?,
            row.try_get::<DateTime<Utc>, _>("updated_at")?,
        ))
    }
}

#[async_trait]
impl PolicyStore for PostgresPolicyStore {
    #[tracing::instrument(skip(self, record), fields(order_id = %record.order_id()))]
    async fn create(&self, record: PolicyRecord) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let open_duplicate: Option<i32> = sqlx::query_scalar(
            "SELECT 1 FROM policies
             WHERE phone = $1 AND premium_id = $2
               AND status IN ('Pending', 'Active', 'Claiming')
             LIMIT 1",
        )
        .bind(record.phone().as_str())
        .bind(record.premium_id())
        .fetch_optional(&mut *tx)
        .await?;

        if open_duplicate.is_some() {
            return Err(PolicyStoreError::Conflict(format!(
                "open policy already exists for {} / {}",
                record.phone(),
                record.premium_id()
            )));
        }

        let coverage_json = serde_json::to_value(record.coverage())?;

        sqlx::query(
            r#"
            INSERT INTO policies (id, order_id, phone, wallet_address, premium_id, premium_name,
                                  fiat_amount_cents, crypto_amount_units, duration, coverage,
                                  status, rail_status, rail_detail, chain_tx_hash,
                                  created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(record.id().as_uuid())
        .bind(record.order_id().as_str())
        .bind(record.phone().as_str())
        .bind(record.wallet_address().as_str())
        .bind(record.premium_id())
        .bind(record.premium_name())
        .bind(record.fiat_amount().cents())
        .bind(record.crypto_amount().units().to_string())
        .bind(record.duration().as_str())
        .bind(coverage_json)
        .bind(record.status().as_str())
        .bind(record.rail_status().as_str())
        .bind(record.rail_detail())
        .bind(record.chain_tx_hash().map(|h| h.as_str()))
        .bind(record.created_at())
        .bind(record.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("policies_order_id_key")
            {
                return PolicyStoreError::Conflict(format!(
                    "order {} already exists",
                    record.order_id()
                ));
            }
            PolicyStoreError::Database(e)
        })?;

        tx.commit().await?;
        tracing::debug!(order_id = %record.order_id(), "policy record created");
        Ok(())
    }

    async fn find_by_order_id(&self, order_id: &OrderId) -> Result<Option<PolicyRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM policies WHERE order_id = $1"
        ))
        .bind(order_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn find_by_id(&self, id: &PolicyId) -> Result<Option<PolicyRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM policies WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn find_by_owner(&self, phone: &Msisdn) -> Result<Vec<PolicyRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM policies WHERE phone = $1 ORDER BY created_at"
        ))
        .bind(phone.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    #[tracing::instrument(skip(self, transition), fields(order_id = %order_id))]
    async fn update_status(
        &self,
        order_id: &OrderId,
        transition: PolicyTransition,
    ) -> Result<PolicyRecord> {
        let mut tx = self.pool.begin().await?;

        // Row lock so concurrent transitions serialize per order.
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM policies WHERE order_id = $1 FOR UPDATE"
        ))
        .bind(order_id.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| PolicyStoreError::NotFound(order_id.to_string()))?;

        let mut record = Self::row_to_record(row)?;
        record.apply(transition)?;

        sqlx::query(
            "UPDATE policies
             SET status = $2, rail_status = $3, rail_detail = $4,
                 chain_tx_hash = $5, updated_at = $6
             WHERE order_id = $1",
        )
        .bind(order_id.as_str())
        .bind(record.status().as_str())
        .bind(record.rail_status().as_str())
        .bind(record.rail_detail())
        .bind(record.chain_tx_hash().map(|h| h.as_str()))
        .bind(record.updated_at())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::debug!(order_id = %order_id, status = %record.status(), "policy status updated");
        Ok(record)
    }
}
