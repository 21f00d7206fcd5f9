use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, SagaId};

use crate::event_log::EventLogEntry;
use crate::saga::{SagaRow, SagaStatus};
use crate::Result;

/// Core trait for saga store implementations.
///
/// Every mutation runs inside one transaction. Implementations must be
/// thread-safe (`Send + Sync`); the coordinator shares one store across all
/// ingress workers.
#[async_trait]
pub trait SagaStore: Send + Sync {
    /// Inserts a new saga row.
    ///
    /// Fails with [`SagaStoreError::AlreadyExists`] when a row for the same
    /// `order_id` exists.
    async fn create(&self, row: &SagaRow) -> Result<()>;

    /// Looks up the saga for an order.
    async fn find_by_order_id(&self, order_id: OrderId) -> Result<Option<SagaRow>>;

    /// Updates a saga row with an optimistic check on `version`.
    ///
    /// Fails with [`SagaStoreError::Conflict`] if the stored version differs
    /// from `row.version`. On success returns the row with the bumped
    /// version and refreshed `updated_at`.
    async fn save(&self, row: &SagaRow) -> Result<SagaRow>;

    /// Removes a saga row.
    async fn delete(&self, saga_id: SagaId) -> Result<()>;

    /// Returns rows whose status is in `statuses` and whose `updated_at` is
    /// strictly older than `older_than`.
    async fn find_stuck(
        &self,
        statuses: &[SagaStatus],
        older_than: DateTime<Utc>,
    ) -> Result<Vec<SagaRow>>;

    /// Counts rows in one status.
    async fn count_by_status(&self, status: SagaStatus) -> Result<i64>;

    /// Counts rows across a set of statuses.
    async fn count_by_status_in(&self, statuses: &[SagaStatus]) -> Result<i64>;

    /// Counts rows matching the stuck-sweep criteria without loading them.
    async fn count_stuck(
        &self,
        statuses: &[SagaStatus],
        older_than: DateTime<Utc>,
    ) -> Result<i64>;

    /// Appends one audit entry to `saga_event_log`.
    async fn log_event(&self, entry: &EventLogEntry) -> Result<()>;

    /// Cheap connectivity probe for the health endpoint.
    async fn ping(&self) -> Result<()>;
}
