use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CorrelationId, Money, OrderId, SagaId, Version};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::event_log::EventLogEntry;
use crate::saga::{ProcessingStep, SagaRow, SagaStatus};
use crate::store::SagaStore;
use crate::{Result, SagaStoreError};

const SAGA_COLUMNS: &str = "id, order_id, customer_id, order_number, total_amount_cents, currency, \
     status, current_step, payment_id, inventory_reservation_id, shipping_id, \
     order_items, shipping_address, billing_address, retry_count, error_message, \
     correlation_id, created_at, updated_at, completed_at, version";

/// PostgreSQL-backed saga store.
///
/// A database trigger refreshes `updated_at` and bumps `version` on every
/// update; `save` relies on it and filters on the expected version for
/// optimistic concurrency.
#[derive(Clone)]
pub struct PostgresSagaStore {
    pool: PgPool,
}

impl PostgresSagaStore {
    /// Creates a store over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a bounded pool and wraps it in a store.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_saga(row: PgRow) -> Result<SagaRow> {
        let status_raw: String = row.try_get("status")?;
        let status = SagaStatus::parse(&status_raw).ok_or(SagaStoreError::CorruptColumn {
            column: "status",
            value: status_raw,
        })?;

        let step_raw: String = row.try_get("current_step")?;
        let current_step =
            ProcessingStep::parse(&step_raw).ok_or(SagaStoreError::CorruptColumn {
                column: "current_step",
                value: step_raw,
            })?;

        Ok(SagaRow {
            id: SagaId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            customer_id: row.try_get("customer_id")?,
            order_number: row.try_get("order_number")?,
            total_amount: Money::from_cents(row.try_get("total_amount_cents")?),
            currency: row.try_get("currency")?,
            status,
            current_step,
            payment_id: row.try_get("payment_id")?,
            inventory_reservation_id: row.try_get("inventory_reservation_id")?,
            shipping_id: row.try_get("shipping_id")?,
            order_items: row.try_get("order_items")?,
            shipping_address: row.try_get("shipping_address")?,
            billing_address: row.try_get("billing_address")?,
            retry_count: row.try_get("retry_count")?,
            error_message: row.try_get("error_message")?,
            correlation_id: CorrelationId::new(row.try_get::<String, _>("correlation_id")?),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            completed_at: row.try_get("completed_at")?,
            version: Version::new(row.try_get("version")?),
        })
    }

    fn status_names(statuses: &[SagaStatus]) -> Vec<String> {
        statuses.iter().map(|s| s.as_str().to_string()).collect()
    }
}

#[async_trait]
impl SagaStore for PostgresSagaStore {
    async fn create(&self, row: &SagaRow) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO order_processing_saga
                (id, order_id, customer_id, order_number, total_amount_cents, currency,
                 status, current_step, payment_id, inventory_reservation_id, shipping_id,
                 order_items, shipping_address, billing_address, retry_count, error_message,
                 correlation_id, created_at, updated_at, completed_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21)
            "#,
        )
        .bind(row.id.as_uuid())
        .bind(row.order_id.as_uuid())
        .bind(&row.customer_id)
        .bind(&row.order_number)
        .bind(row.total_amount.as_cents())
        .bind(&row.currency)
        .bind(row.status.as_str())
        .bind(row.current_step.as_str())
        .bind(&row.payment_id)
        .bind(&row.inventory_reservation_id)
        .bind(&row.shipping_id)
        .bind(&row.order_items)
        .bind(&row.shipping_address)
        .bind(&row.billing_address)
        .bind(row.retry_count)
        .bind(&row.error_message)
        .bind(row.correlation_id.as_str())
        .bind(row.created_at)
        .bind(row.updated_at)
        .bind(row.completed_at)
        .bind(row.version.as_i64())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            // The unique index on order_id is the duplicate-event guard.
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("order_processing_saga_order_id_key")
            {
                return SagaStoreError::AlreadyExists(row.order_id);
            }
            SagaStoreError::Database(e)
        })?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_order_id(&self, order_id: OrderId) -> Result<Option<SagaRow>> {
        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {SAGA_COLUMNS} FROM order_processing_saga WHERE order_id = $1"
        ))
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_saga).transpose()
    }

    async fn save(&self, row: &SagaRow) -> Result<SagaRow> {
        let mut tx = self.pool.begin().await?;

        // The trigger bumps version and refreshes updated_at; the WHERE
        // clause on the expected version is the optimistic check.
        let updated: Option<PgRow> = sqlx::query(
            r#"
            UPDATE order_processing_saga SET
                status = $3,
                current_step = $4,
                payment_id = $5,
                inventory_reservation_id = $6,
                shipping_id = $7,
                order_items = $8,
                shipping_address = $9,
                billing_address = $10,
                retry_count = $11,
                error_message = $12,
                completed_at = $13
            WHERE id = $1 AND version = $2
            RETURNING version, updated_at
            "#,
        )
        .bind(row.id.as_uuid())
        .bind(row.version.as_i64())
        .bind(row.status.as_str())
        .bind(row.current_step.as_str())
        .bind(&row.payment_id)
        .bind(&row.inventory_reservation_id)
        .bind(&row.shipping_id)
        .bind(&row.order_items)
        .bind(&row.shipping_address)
        .bind(&row.billing_address)
        .bind(row.retry_count)
        .bind(&row.error_message)
        .bind(row.completed_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(returned) = updated else {
            return Err(SagaStoreError::Conflict {
                saga_id: row.id,
                expected: row.version,
            });
        };

        tx.commit().await?;

        let mut saved = row.clone();
        saved.version = Version::new(returned.try_get("version")?);
        saved.updated_at = returned.try_get("updated_at")?;
        Ok(saved)
    }

    async fn delete(&self, saga_id: SagaId) -> Result<()> {
        sqlx::query("DELETE FROM order_processing_saga WHERE id = $1")
            .bind(saga_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_stuck(
        &self,
        statuses: &[SagaStatus],
        older_than: DateTime<Utc>,
    ) -> Result<Vec<SagaRow>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SAGA_COLUMNS} FROM order_processing_saga
            WHERE status = ANY($1) AND updated_at < $2
            ORDER BY updated_at ASC
            "#
        ))
        .bind(Self::status_names(statuses))
        .bind(older_than)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_saga).collect()
    }

    async fn count_by_status(&self, status: SagaStatus) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM order_processing_saga WHERE status = $1")
                .bind(status.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn count_by_status_in(&self, statuses: &[SagaStatus]) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM order_processing_saga WHERE status = ANY($1)",
        )
        .bind(Self::status_names(statuses))
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn count_stuck(
        &self,
        statuses: &[SagaStatus],
        older_than: DateTime<Utc>,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM order_processing_saga WHERE status = ANY($1) AND updated_at < $2",
        )
        .bind(Self::status_names(statuses))
        .bind(older_than)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn log_event(&self, entry: &EventLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO saga_event_log
                (id, saga_id, order_id, event_type, payload, correlation_id,
                 processing_status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.saga_id.map(|id| id.as_uuid()))
        .bind(entry.order_id.map(|id| id.as_uuid()))
        .bind(&entry.event_type)
        .bind(&entry.payload)
        .bind(entry.correlation_id.as_str())
        .bind(entry.status.as_str())
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}
