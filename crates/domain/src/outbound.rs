//! Outbound command and notification events.
//!
//! Each struct maps to one produced topic and carries an ISO-8601 timestamp
//! stamped at construction. Convenience constructors fill the fields the
//! coordinator does not vary.

use chrono::{DateTime, Utc};
use common::{Money, OrderId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::topics;

/// Reason attached to every compensating command.
pub const COMPENSATION_REASON: &str = "Saga compensation";

/// Command on `payment.processing`: charge the customer for an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentProcessing {
    pub order_id: OrderId,
    pub customer_id: String,
    pub total_amount: Money,
    pub currency: String,
    pub payment_method: String,
    pub requested_at: DateTime<Utc>,
}

impl PaymentProcessing {
    pub const TOPIC: &'static str = topics::PAYMENT_PROCESSING;

    pub fn new(
        order_id: OrderId,
        customer_id: impl Into<String>,
        total_amount: Money,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            order_id,
            customer_id: customer_id.into(),
            total_amount,
            currency: currency.into(),
            payment_method: "default".to_string(),
            requested_at: Utc::now(),
        }
    }
}

/// Command on `inventory.reservation`: reserve the order's items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryReservation {
    pub order_id: OrderId,
    pub items: serde_json::Value,
    pub requested_at: DateTime<Utc>,
}

impl InventoryReservation {
    pub const TOPIC: &'static str = topics::INVENTORY_RESERVATION;

    pub fn new(order_id: OrderId, items: serde_json::Value) -> Self {
        Self {
            order_id,
            items,
            requested_at: Utc::now(),
        }
    }
}

/// Command on `shipping.preparation`: prepare the order for shipment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingPreparation {
    pub order_id: OrderId,
    pub customer_id: String,
    pub shipping_address: Option<serde_json::Value>,
    pub requested_at: DateTime<Utc>,
}

impl ShippingPreparation {
    pub const TOPIC: &'static str = topics::SHIPPING_PREPARATION;

    pub fn new(
        order_id: OrderId,
        customer_id: impl Into<String>,
        shipping_address: Option<serde_json::Value>,
    ) -> Self {
        Self {
            order_id,
            customer_id: customer_id.into(),
            shipping_address,
            requested_at: Utc::now(),
        }
    }
}

/// Compensating command on `payment.refund`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRefund {
    pub order_id: OrderId,
    pub payment_id: String,
    pub refund_id: String,
    pub reason: String,
    pub requested_at: DateTime<Utc>,
}

impl PaymentRefund {
    pub const TOPIC: &'static str = topics::PAYMENT_REFUND;

    pub fn new(order_id: OrderId, payment_id: impl Into<String>) -> Self {
        Self {
            order_id,
            payment_id: payment_id.into(),
            refund_id: Uuid::new_v4().to_string(),
            reason: COMPENSATION_REASON.to_string(),
            requested_at: Utc::now(),
        }
    }
}

/// Compensating command on `inventory.release`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRelease {
    pub order_id: OrderId,
    pub reservation_id: String,
    pub reason: String,
    pub requested_at: DateTime<Utc>,
}

impl InventoryRelease {
    pub const TOPIC: &'static str = topics::INVENTORY_RELEASE;

    pub fn new(order_id: OrderId, reservation_id: impl Into<String>) -> Self {
        Self {
            order_id,
            reservation_id: reservation_id.into(),
            reason: COMPENSATION_REASON.to_string(),
            requested_at: Utc::now(),
        }
    }
}

/// Compensating command on `shipping.cancellation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingCancellation {
    pub order_id: OrderId,
    pub shipping_id: String,
    pub reason: String,
    pub requested_at: DateTime<Utc>,
}

impl ShippingCancellation {
    pub const TOPIC: &'static str = topics::SHIPPING_CANCELLATION;

    pub fn new(order_id: OrderId, shipping_id: impl Into<String>) -> Self {
        Self {
            order_id,
            shipping_id: shipping_id.into(),
            reason: COMPENSATION_REASON.to_string(),
            requested_at: Utc::now(),
        }
    }
}

/// Notification on `order.completed`: the saga finished successfully.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCompleted {
    pub order_id: OrderId,
    pub completed_at: DateTime<Utc>,
}

impl OrderCompleted {
    pub const TOPIC: &'static str = topics::ORDER_COMPLETED;

    pub fn new(order_id: OrderId) -> Self {
        Self {
            order_id,
            completed_at: Utc::now(),
        }
    }
}

/// Notification on `order.failed`: the saga failed and was compensated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFailed {
    pub order_id: OrderId,
    pub reason: String,
    pub failure_step: String,
    pub failure_code: String,
    pub failed_at: DateTime<Utc>,
}

impl OrderFailed {
    pub const TOPIC: &'static str = topics::ORDER_FAILED;

    pub fn new(
        order_id: OrderId,
        reason: impl Into<String>,
        failure_step: impl Into<String>,
    ) -> Self {
        Self {
            order_id,
            reason: reason.into(),
            failure_step: failure_step.into(),
            failure_code: "SAGA_FAILURE".to_string(),
            failed_at: Utc::now(),
        }
    }
}

/// Notification on `order.status.changed`: a saga step completed and the
/// originating order service can reflect the progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangedNotification {
    pub order_id: OrderId,
    pub previous_status: String,
    pub new_status: String,
    pub changed_at: DateTime<Utc>,
}

impl StatusChangedNotification {
    pub const TOPIC: &'static str = topics::ORDER_STATUS_CHANGED;

    pub fn new(
        order_id: OrderId,
        previous_status: impl Into<String>,
        new_status: impl Into<String>,
    ) -> Self {
        Self {
            order_id,
            previous_status: previous_status.into(),
            new_status: new_status.into(),
            changed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_processing_serializes_camel_case() {
        let order_id = OrderId::new();
        let event = PaymentProcessing::new(order_id, "cust-1", Money::from_cents(9999), "USD");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["orderId"], serde_json::to_value(order_id).unwrap());
        assert_eq!(json["totalAmount"], 99.99);
        assert_eq!(json["paymentMethod"], "default");
        assert!(json["requestedAt"].is_string());
    }

    #[test]
    fn refund_carries_fresh_refund_id_and_reason() {
        let a = PaymentRefund::new(OrderId::new(), "PAY-1");
        let b = PaymentRefund::new(OrderId::new(), "PAY-2");
        assert_ne!(a.refund_id, b.refund_id);
        assert_eq!(a.reason, COMPENSATION_REASON);
    }

    #[test]
    fn order_failed_carries_step_and_code() {
        let event = OrderFailed::new(OrderId::new(), "Payment failed: declined", "payment");
        assert_eq!(event.failure_step, "payment");
        assert_eq!(event.failure_code, "SAGA_FAILURE");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["failureStep"], "payment");
    }

    #[test]
    fn topics_match_produced_set() {
        assert_eq!(PaymentProcessing::TOPIC, "payment.processing");
        assert_eq!(InventoryReservation::TOPIC, "inventory.reservation");
        assert_eq!(ShippingPreparation::TOPIC, "shipping.preparation");
        assert_eq!(PaymentRefund::TOPIC, "payment.refund");
        assert_eq!(InventoryRelease::TOPIC, "inventory.release");
        assert_eq!(ShippingCancellation::TOPIC, "shipping.cancellation");
        assert_eq!(OrderCompleted::TOPIC, "order.completed");
        assert_eq!(OrderFailed::TOPIC, "order.failed");
        assert_eq!(StatusChangedNotification::TOPIC, "order.status.changed");
    }
}
