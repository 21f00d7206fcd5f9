//! The saga row entity and its status enums.

use chrono::{DateTime, Utc};
use common::{CorrelationId, Money, OrderId, SagaId, Version};
use serde::{Deserialize, Serialize};

/// The status of a saga in its lifecycle.
///
/// State transitions:
/// ```text
/// Created ──► PaymentProcessing ──► InventoryProcessing ──► ShippingProcessing ──► Completed
///                   │                       │                       │
///                   └───────────────────────┴───────────────────────┴──► Compensating ──► Compensated
///                                                                              └──► Failed
/// ```
///
/// `Created` is transient and fused with `PaymentProcessing` on the creation
/// step. `PaymentCompleted` and `InventoryCompleted` are intermediate values
/// that historical rows may carry; the automatic pathway skips them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaStatus {
    #[default]
    Created,
    PaymentProcessing,
    PaymentCompleted,
    InventoryProcessing,
    InventoryCompleted,
    ShippingProcessing,
    Completed,
    Failed,
    Compensating,
    Compensated,
}

impl SagaStatus {
    /// The three statuses the stuck-sweep scans for.
    pub const PROCESSING: &'static [SagaStatus] = &[
        SagaStatus::PaymentProcessing,
        SagaStatus::InventoryProcessing,
        SagaStatus::ShippingProcessing,
    ];

    /// Returns true for terminal statuses; terminal sagas ignore all
    /// further events.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaStatus::Completed | SagaStatus::Failed | SagaStatus::Compensated
        )
    }

    /// Returns true while a forward step is in flight.
    pub fn is_processing(&self) -> bool {
        matches!(
            self,
            SagaStatus::PaymentProcessing
                | SagaStatus::InventoryProcessing
                | SagaStatus::ShippingProcessing
        )
    }

    /// Returns true once compensation has started or finished.
    pub fn is_compensating(&self) -> bool {
        matches!(self, SagaStatus::Compensating | SagaStatus::Compensated)
    }

    /// Returns the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::Created => "CREATED",
            SagaStatus::PaymentProcessing => "PAYMENT_PROCESSING",
            SagaStatus::PaymentCompleted => "PAYMENT_COMPLETED",
            SagaStatus::InventoryProcessing => "INVENTORY_PROCESSING",
            SagaStatus::InventoryCompleted => "INVENTORY_COMPLETED",
            SagaStatus::ShippingProcessing => "SHIPPING_PROCESSING",
            SagaStatus::Completed => "COMPLETED",
            SagaStatus::Failed => "FAILED",
            SagaStatus::Compensating => "COMPENSATING",
            SagaStatus::Compensated => "COMPENSATED",
        }
    }

    /// Parses a stored status name.
    pub fn parse(value: &str) -> Option<Self> {
        let status = match value {
            "CREATED" => SagaStatus::Created,
            "PAYMENT_PROCESSING" => SagaStatus::PaymentProcessing,
            "PAYMENT_COMPLETED" => SagaStatus::PaymentCompleted,
            "INVENTORY_PROCESSING" => SagaStatus::InventoryProcessing,
            "INVENTORY_COMPLETED" => SagaStatus::InventoryCompleted,
            "SHIPPING_PROCESSING" => SagaStatus::ShippingProcessing,
            "COMPLETED" => SagaStatus::Completed,
            "FAILED" => SagaStatus::Failed,
            "COMPENSATING" => SagaStatus::Compensating,
            "COMPENSATED" => SagaStatus::Compensated,
            _ => return None,
        };
        Some(status)
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The step a saga is currently working through.
///
/// Advances only forward (payment → inventory → shipping → completed);
/// compensation does not rewind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProcessingStep {
    Payment,
    Inventory,
    Shipping,
    Completed,
}

impl ProcessingStep {
    /// Returns the step name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStep::Payment => "PAYMENT",
            ProcessingStep::Inventory => "INVENTORY",
            ProcessingStep::Shipping => "SHIPPING",
            ProcessingStep::Completed => "COMPLETED",
        }
    }

    /// Parses a stored step name.
    pub fn parse(value: &str) -> Option<Self> {
        let step = match value {
            "PAYMENT" => ProcessingStep::Payment,
            "INVENTORY" => ProcessingStep::Inventory,
            "SHIPPING" => ProcessingStep::Shipping,
            "COMPLETED" => ProcessingStep::Completed,
            _ => return None,
        };
        Some(step)
    }
}

impl std::fmt::Display for ProcessingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of `order_processing_saga`, the only persistent entity.
///
/// Mutated exclusively by coordinator handlers; `version` is bumped by the
/// store on every successful save and guards against concurrent updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaRow {
    pub id: SagaId,
    pub order_id: OrderId,
    pub customer_id: String,
    pub order_number: String,
    pub total_amount: Money,
    pub currency: String,
    pub status: SagaStatus,
    pub current_step: ProcessingStep,
    pub payment_id: Option<String>,
    pub inventory_reservation_id: Option<String>,
    pub shipping_id: Option<String>,
    pub order_items: Option<serde_json::Value>,
    pub shipping_address: Option<serde_json::Value>,
    pub billing_address: Option<serde_json::Value>,
    pub retry_count: i32,
    pub error_message: Option<String>,
    pub correlation_id: CorrelationId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub version: Version,
}

impl SagaRow {
    /// Creates a fresh saga row for a newly created order, already in the
    /// payment step.
    #[allow(clippy::too_many_arguments)]
    pub fn for_order(
        order_id: OrderId,
        customer_id: impl Into<String>,
        order_number: impl Into<String>,
        total_amount: Money,
        currency: impl Into<String>,
        correlation_id: CorrelationId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: SagaId::new(),
            order_id,
            customer_id: customer_id.into(),
            order_number: order_number.into(),
            total_amount,
            currency: currency.into(),
            status: SagaStatus::PaymentProcessing,
            current_step: ProcessingStep::Payment,
            payment_id: None,
            inventory_reservation_id: None,
            shipping_id: None,
            order_items: None,
            shipping_address: None,
            billing_address: None,
            retry_count: 0,
            error_message: None,
            correlation_id,
            created_at: now,
            updated_at: now,
            completed_at: None,
            version: Version::initial(),
        }
    }

    /// Returns true while the retry budget allows another attempt of the
    /// current step.
    pub fn can_retry(&self, max_retries: i32) -> bool {
        self.retry_count < max_retries && self.status.is_processing()
    }

    /// Consumes one retry attempt.
    pub fn increment_retry(&mut self) {
        self.retry_count += 1;
    }

    /// Advances to the given processing step.
    pub fn advance_to(&mut self, status: SagaStatus, step: ProcessingStep) {
        self.status = status;
        self.current_step = step;
    }

    /// Marks the saga completed, stamping `completed_at`.
    pub fn mark_completed(&mut self) {
        self.status = SagaStatus::Completed;
        self.current_step = ProcessingStep::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Records a failure message and enters compensation.
    pub fn mark_compensating(&mut self, error_message: impl Into<String>) {
        self.status = SagaStatus::Compensating;
        self.error_message = Some(error_message.into());
    }

    /// Returns the name of the first step without an acquired resource,
    /// i.e. the step that failed, reported in `order.failed`.
    pub fn failure_step(&self) -> &'static str {
        if self.payment_id.is_none() {
            "payment"
        } else if self.inventory_reservation_id.is_none() {
            "inventory"
        } else if self.shipping_id.is_none() {
            "shipping"
        } else {
            "unknown"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn new_row_starts_in_payment_processing() {
        let row = sample_row();
        assert_eq!(row.status, SagaStatus::PaymentProcessing);
        assert_eq!(row.current_step, ProcessingStep::Payment);
        assert_eq!(row.retry_count, 0);
        assert_eq!(row.version, Version::initial());
        assert!(row.completed_at.is_none());
    }

    #[test]
    fn terminal_statuses() {
        assert!(SagaStatus::Completed.is_terminal());
        assert!(SagaStatus::Failed.is_terminal());
        assert!(SagaStatus::Compensated.is_terminal());
        assert!(!SagaStatus::Compensating.is_terminal());
        assert!(!SagaStatus::PaymentProcessing.is_terminal());
        assert!(!SagaStatus::Created.is_terminal());
    }

    #[test]
    fn status_roundtrips_through_storage_names() {
        for status in [
            SagaStatus::Created,
            SagaStatus::PaymentProcessing,
            SagaStatus::PaymentCompleted,
            SagaStatus::InventoryProcessing,
            SagaStatus::InventoryCompleted,
            SagaStatus::ShippingProcessing,
            SagaStatus::Completed,
            SagaStatus::Failed,
            SagaStatus::Compensating,
            SagaStatus::Compensated,
        ] {
            assert_eq!(SagaStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SagaStatus::parse("BOGUS"), None);
    }

    #[test]
    fn step_roundtrips_through_storage_names() {
        for step in [
            ProcessingStep::Payment,
            ProcessingStep::Inventory,
            ProcessingStep::Shipping,
            ProcessingStep::Completed,
        ] {
            assert_eq!(ProcessingStep::parse(step.as_str()), Some(step));
        }
    }

    #[test]
    fn steps_order_monotonically() {
        assert!(ProcessingStep::Payment < ProcessingStep::Inventory);
        assert!(ProcessingStep::Inventory < ProcessingStep::Shipping);
        assert!(ProcessingStep::Shipping < ProcessingStep::Completed);
    }

    #[test]
    fn retry_budget() {
        let mut row = sample_row();
        assert!(row.can_retry(3));

        row.increment_retry();
        row.increment_retry();
        row.increment_retry();
        assert_eq!(row.retry_count, 3);
        assert!(!row.can_retry(3));
    }

    #[test]
    fn retry_denied_outside_processing_states() {
        let mut row = sample_row();
        row.status = SagaStatus::Compensating;
        assert!(!row.can_retry(3));

        row.status = SagaStatus::Completed;
        assert!(!row.can_retry(3));
    }

    #[test]
    fn mark_completed_stamps_completed_at() {
        let mut row = sample_row();
        row.mark_completed();
        assert_eq!(row.status, SagaStatus::Completed);
        assert_eq!(row.current_step, ProcessingStep::Completed);
        assert!(row.completed_at.is_some());
    }

    #[test]
    fn failure_step_is_first_missing_resource() {
        let mut row = sample_row();
        assert_eq!(row.failure_step(), "payment");

        row.payment_id = Some("PAY-1".to_string());
        assert_eq!(row.failure_step(), "inventory");

        row.inventory_reservation_id = Some("RES-1".to_string());
        assert_eq!(row.failure_step(), "shipping");

        row.shipping_id = Some("SHIP-1".to_string());
        assert_eq!(row.failure_step(), "unknown");
    }
}
