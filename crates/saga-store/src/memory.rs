use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, SagaId};
use tokio::sync::RwLock;

use crate::event_log::{EventLogEntry, ProcessingStatus};
use crate::saga::{SagaRow, SagaStatus};
use crate::store::SagaStore;
use crate::{Result, SagaStoreError};

/// In-memory saga store for testing and local runs.
///
/// Mirrors the PostgreSQL semantics: the order-id uniqueness check, the
/// optimistic version bump on save, and the strict `updated_at < cutoff`
/// stuck query.
#[derive(Clone, Default)]
pub struct InMemorySagaStore {
    rows: Arc<RwLock<HashMap<SagaId, SagaRow>>>,
    log: Arc<RwLock<Vec<EventLogEntry>>>,
}

impl InMemorySagaStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of saga rows.
    pub async fn row_count(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Returns a copy of a row by saga id.
    pub async fn get(&self, saga_id: SagaId) -> Option<SagaRow> {
        self.rows.read().await.get(&saga_id).cloned()
    }

    /// Returns a copy of all audit-log entries.
    pub async fn log_entries(&self) -> Vec<EventLogEntry> {
        self.log.read().await.clone()
    }

    /// Returns audit entries recorded with the given status.
    pub async fn log_entries_with_status(&self, status: ProcessingStatus) -> Vec<EventLogEntry> {
        self.log
            .read()
            .await
            .iter()
            .filter(|e| e.status == status)
            .cloned()
            .collect()
    }

    /// Rewrites a row's `updated_at`, bypassing the version bump. Test
    /// helper for aging rows into the stuck window.
    pub async fn backdate(&self, saga_id: SagaId, updated_at: DateTime<Utc>) {
        if let Some(row) = self.rows.write().await.get_mut(&saga_id) {
            row.updated_at = updated_at;
        }
    }
}

#[async_trait]
impl SagaStore for InMemorySagaStore {
    async fn create(&self, row: &SagaRow) -> Result<()> {
        let mut rows = self.rows.write().await;

        if rows.values().any(|r| r.order_id == row.order_id) {
            return Err(SagaStoreError::AlreadyExists(row.order_id));
        }

        rows.insert(row.id, row.clone());
        Ok(())
    }

    async fn find_by_order_id(&self, order_id: OrderId) -> Result<Option<SagaRow>> {
        let rows = self.rows.read().await;
        Ok(rows.values().find(|r| r.order_id == order_id).cloned())
    }

    async fn save(&self, row: &SagaRow) -> Result<SagaRow> {
        let mut rows = self.rows.write().await;

        let stored = rows
            .get_mut(&row.id)
            .ok_or(SagaStoreError::NotFound(row.id))?;

        if stored.version != row.version {
            return Err(SagaStoreError::Conflict {
                saga_id: row.id,
                expected: row.version,
            });
        }

        let mut saved = row.clone();
        saved.version = row.version.next();
        saved.updated_at = Utc::now();
        *stored = saved.clone();
        Ok(saved)
    }

    async fn delete(&self, saga_id: SagaId) -> Result<()> {
        self.rows.write().await.remove(&saga_id);
        Ok(())
    }

    async fn find_stuck(
        &self,
        statuses: &[SagaStatus],
        older_than: DateTime<Utc>,
    ) -> Result<Vec<SagaRow>> {
        let rows = self.rows.read().await;
        let mut stuck: Vec<SagaRow> = rows
            .values()
            .filter(|r| statuses.contains(&r.status) && r.updated_at < older_than)
            .cloned()
            .collect();
        stuck.sort_by_key(|r| r.updated_at);
        Ok(stuck)
    }

    async fn count_by_status(&self, status: SagaStatus) -> Result<i64> {
        let rows = self.rows.read().await;
        Ok(rows.values().filter(|r| r.status == status).count() as i64)
    }

    async fn count_by_status_in(&self, statuses: &[SagaStatus]) -> Result<i64> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|r| statuses.contains(&r.status))
            .count() as i64)
    }

    async fn count_stuck(
        &self,
        statuses: &[SagaStatus],
        older_than: DateTime<Utc>,
    ) -> Result<i64> {
        Ok(self.find_stuck(statuses, older_than).await?.len() as i64)
    }

    async fn log_event(&self, entry: &EventLogEntry) -> Result<()> {
        self.log.write().await.push(entry.clone());
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{CorrelationId, Money, Version};

    fn sample_row() -> SagaRow {
        SagaRow::for_order(
            OrderId::new(),
            "cust-1",
            "ORD-1001",
            Money::from_cents(9999),
            "USD",
            CorrelationId::new("corr-1"),
        )
    }

    #[tokio::test]
    async fn create_and_find() {
        let store = InMemorySagaStore::new();
        let row = sample_row();

        store.create(&row).await.unwrap();

        let found = store.find_by_order_id(row.order_id).await.unwrap().unwrap();
        assert_eq!(found.id, row.id);
        assert_eq!(found.version, Version::initial());
    }

    #[tokio::test]
    async fn duplicate_order_id_rejected() {
        let store = InMemorySagaStore::new();
        let row = sample_row();
        store.create(&row).await.unwrap();

        let mut dup = sample_row();
        dup.order_id = row.order_id;

        let result = store.create(&dup).await;
        assert!(matches!(result, Err(SagaStoreError::AlreadyExists(id)) if id == row.order_id));
        assert_eq!(store.row_count().await, 1);
    }

    #[tokio::test]
    async fn save_bumps_version() {
        let store = InMemorySagaStore::new();
        let row = sample_row();
        store.create(&row).await.unwrap();

        let mut updated = row.clone();
        updated.payment_id = Some("PAY-1".to_string());
        let saved = store.save(&updated).await.unwrap();

        assert_eq!(saved.version, Version::new(1));
        assert!(saved.updated_at >= row.updated_at);
    }

    #[tokio::test]
    async fn stale_save_conflicts() {
        let store = InMemorySagaStore::new();
        let row = sample_row();
        store.create(&row).await.unwrap();

        // First writer wins.
        store.save(&row).await.unwrap();

        // Second writer still holds version 0.
        let result = store.save(&row).await;
        assert!(matches!(result, Err(SagaStoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn find_stuck_is_strictly_older() {
        let store = InMemorySagaStore::new();
        let row = sample_row();
        store.create(&row).await.unwrap();

        let cutoff = Utc::now();
        store.backdate(row.id, cutoff).await;

        // Exactly at the cutoff: not selected.
        let stuck = store.find_stuck(SagaStatus::PROCESSING, cutoff).await.unwrap();
        assert!(stuck.is_empty());

        // One microsecond older: selected.
        store
            .backdate(row.id, cutoff - chrono::Duration::microseconds(1))
            .await;
        let stuck = store.find_stuck(SagaStatus::PROCESSING, cutoff).await.unwrap();
        assert_eq!(stuck.len(), 1);
        assert_eq!(store.count_stuck(SagaStatus::PROCESSING, cutoff).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn find_stuck_filters_statuses() {
        let store = InMemorySagaStore::new();
        let mut row = sample_row();
        row.status = SagaStatus::Compensated;
        store.create(&row).await.unwrap();
        store
            .backdate(row.id, Utc::now() - chrono::Duration::hours(1))
            .await;

        let stuck = store
            .find_stuck(SagaStatus::PROCESSING, Utc::now())
            .await
            .unwrap();
        assert!(stuck.is_empty());
    }

    #[tokio::test]
    async fn counts_by_status() {
        let store = InMemorySagaStore::new();
        let a = sample_row();
        let mut b = sample_row();
        b.status = SagaStatus::Completed;
        store.create(&a).await.unwrap();
        store.create(&b).await.unwrap();

        assert_eq!(
            store
                .count_by_status(SagaStatus::PaymentProcessing)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            store
                .count_by_status_in(&[SagaStatus::PaymentProcessing, SagaStatus::Completed])
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn delete_removes_row() {
        let store = InMemorySagaStore::new();
        let row = sample_row();
        store.create(&row).await.unwrap();

        store.delete(row.id).await.unwrap();
        assert_eq!(store.row_count().await, 0);
        assert!(store.find_by_order_id(row.order_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn audit_log_appends() {
        let store = InMemorySagaStore::new();
        let entry = EventLogEntry::new(
            None,
            Some(OrderId::new()),
            "payment.processed",
            serde_json::json!({"paymentId": "PAY-1"}),
            CorrelationId::new("corr-1"),
            ProcessingStatus::Ignored,
        );

        store.log_event(&entry).await.unwrap();

        let ignored = store
            .log_entries_with_status(ProcessingStatus::Ignored)
            .await;
        assert_eq!(ignored.len(), 1);
        assert_eq!(ignored[0].event_type, "payment.processed");
    }
}
