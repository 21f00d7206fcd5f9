//! Inbound domain events consumed from the broker.

use chrono::{DateTime, Utc};
use common::{Money, OrderId};
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::topics;

/// Body of `order.created`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreated {
    pub order_id: OrderId,
    #[serde(default)]
    pub correlation_id: Option<String>,
    pub customer_id: String,
    pub order_number: String,
    pub total_amount: Money,
    pub currency: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub items: Option<serde_json::Value>,
    #[serde(default)]
    pub shipping_address: Option<serde_json::Value>,
    #[serde(default)]
    pub billing_address: Option<serde_json::Value>,
}

/// Body of `payment.processed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentProcessed {
    pub order_id: OrderId,
    pub payment_id: String,
    #[serde(default)]
    pub amount: Option<Money>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
}

/// Body of `payment.failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentFailed {
    pub order_id: OrderId,
    pub reason: String,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub failed_at: Option<DateTime<Utc>>,
}

/// Body of `inventory.reserved`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryReserved {
    pub order_id: OrderId,
    pub reservation_id: String,
    #[serde(default)]
    pub reserved_at: Option<DateTime<Utc>>,
}

/// Body of `inventory.failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryFailed {
    pub order_id: OrderId,
    pub reason: String,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub failed_at: Option<DateTime<Utc>>,
}

/// Body of `shipping.prepared`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingPrepared {
    pub order_id: OrderId,
    pub shipping_id: String,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub prepared_at: Option<DateTime<Utc>>,
}

/// Body of `shipping.failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingFailed {
    pub order_id: OrderId,
    pub reason: String,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub failed_at: Option<DateTime<Utc>>,
}

/// Body of `order.cancelled`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCancelled {
    pub order_id: OrderId,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Body of `order.shipped`, `order.delivered`, `order.status.changed` and
/// its `order.updated` alias.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusChanged {
    pub order_id: OrderId,
    pub new_status: String,
    #[serde(default)]
    pub previous_status: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub updated_by: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

/// Body of `order.deleted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDeleted {
    pub order_id: OrderId,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// An inbound event, discriminated by its logical topic.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    OrderCreated(OrderCreated),
    PaymentProcessed(PaymentProcessed),
    PaymentFailed(PaymentFailed),
    InventoryReserved(InventoryReserved),
    InventoryFailed(InventoryFailed),
    ShippingPrepared(ShippingPrepared),
    ShippingFailed(ShippingFailed),
    OrderCancelled(OrderCancelled),
    OrderShipped(OrderStatusChanged),
    OrderDelivered(OrderStatusChanged),
    OrderStatusChanged(OrderStatusChanged),
    OrderDeleted(OrderDeleted),
}

impl InboundEvent {
    /// Decodes the event body for the given logical topic.
    ///
    /// Envelope unwrapping for `order.created` happens before this call;
    /// `body` is always the bare event body.
    pub fn decode(topic: &str, body: serde_json::Value) -> Result<Self, DecodeError> {
        let event = match topic {
            topics::ORDER_CREATED => Self::OrderCreated(serde_json::from_value(body)?),
            topics::PAYMENT_PROCESSED => Self::PaymentProcessed(serde_json::from_value(body)?),
            topics::PAYMENT_FAILED => Self::PaymentFailed(serde_json::from_value(body)?),
            topics::INVENTORY_RESERVED => Self::InventoryReserved(serde_json::from_value(body)?),
            topics::INVENTORY_FAILED => Self::InventoryFailed(serde_json::from_value(body)?),
            topics::SHIPPING_PREPARED => Self::ShippingPrepared(serde_json::from_value(body)?),
            topics::SHIPPING_FAILED => Self::ShippingFailed(serde_json::from_value(body)?),
            topics::ORDER_CANCELLED => Self::OrderCancelled(serde_json::from_value(body)?),
            topics::ORDER_SHIPPED => Self::OrderShipped(serde_json::from_value(body)?),
            topics::ORDER_DELIVERED => Self::OrderDelivered(serde_json::from_value(body)?),
            topics::ORDER_STATUS_CHANGED | topics::ORDER_UPDATED => {
                Self::OrderStatusChanged(serde_json::from_value(body)?)
            }
            topics::ORDER_DELETED => Self::OrderDeleted(serde_json::from_value(body)?),
            other => return Err(DecodeError::UnknownTopic(other.to_string())),
        };
        Ok(event)
    }

    /// Returns the logical topic name of this event.
    pub fn topic(&self) -> &'static str {
        match self {
            Self::OrderCreated(_) => topics::ORDER_CREATED,
            Self::PaymentProcessed(_) => topics::PAYMENT_PROCESSED,
            Self::PaymentFailed(_) => topics::PAYMENT_FAILED,
            Self::InventoryReserved(_) => topics::INVENTORY_RESERVED,
            Self::InventoryFailed(_) => topics::INVENTORY_FAILED,
            Self::ShippingPrepared(_) => topics::SHIPPING_PREPARED,
            Self::ShippingFailed(_) => topics::SHIPPING_FAILED,
            Self::OrderCancelled(_) => topics::ORDER_CANCELLED,
            Self::OrderShipped(_) => topics::ORDER_SHIPPED,
            Self::OrderDelivered(_) => topics::ORDER_DELIVERED,
            Self::OrderStatusChanged(_) => topics::ORDER_STATUS_CHANGED,
            Self::OrderDeleted(_) => topics::ORDER_DELETED,
        }
    }

    /// Returns the order this event refers to.
    pub fn order_id(&self) -> OrderId {
        match self {
            Self::OrderCreated(e) => e.order_id,
            Self::PaymentProcessed(e) => e.order_id,
            Self::PaymentFailed(e) => e.order_id,
            Self::InventoryReserved(e) => e.order_id,
            Self::InventoryFailed(e) => e.order_id,
            Self::ShippingPrepared(e) => e.order_id,
            Self::ShippingFailed(e) => e.order_id,
            Self::OrderCancelled(e) => e.order_id,
            Self::OrderShipped(e) | Self::OrderDelivered(e) | Self::OrderStatusChanged(e) => {
                e.order_id
            }
            Self::OrderDeleted(e) => e.order_id,
        }
    }

    /// Returns the correlation id carried in the event body, if any.
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            Self::OrderCreated(e) => e.correlation_id.as_deref(),
            Self::OrderCancelled(e) => e.correlation_id.as_deref(),
            Self::OrderShipped(e) | Self::OrderDelivered(e) | Self::OrderStatusChanged(e) => {
                e.correlation_id.as_deref()
            }
            Self::OrderDeleted(e) => e.correlation_id.as_deref(),
            _ => None,
        }
    }

    /// Returns true for order-lifecycle events (delivered, deleted, ...)
    /// where a missing saga is expected and logged quietly.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::OrderCancelled(_)
                | Self::OrderShipped(_)
                | Self::OrderDelivered(_)
                | Self::OrderStatusChanged(_)
                | Self::OrderDeleted(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn order_id_json() -> (OrderId, String) {
        let uuid = Uuid::new_v4();
        (OrderId::from_uuid(uuid), uuid.to_string())
    }

    #[test]
    fn decodes_order_created() {
        let (order_id, raw) = order_id_json();
        let body = json!({
            "orderId": raw,
            "correlationId": "corr-1",
            "customerId": "cust-9",
            "orderNumber": "ORD-1001",
            "totalAmount": 99.99,
            "currency": "USD",
            "createdAt": "2024-05-01T12:00:00Z",
            "items": [{"productId": "A", "quantity": 2}],
            "shippingAddress": {"line1": "1 Main St"},
            "billingAddress": {"line1": "1 Main St"}
        });

        let event = InboundEvent::decode(topics::ORDER_CREATED, body).unwrap();
        let InboundEvent::OrderCreated(created) = &event else {
            panic!("expected OrderCreated");
        };
        assert_eq!(created.order_id, order_id);
        assert_eq!(created.total_amount.as_cents(), 9999);
        assert_eq!(created.currency, "USD");
        assert_eq!(event.correlation_id(), Some("corr-1"));
        assert_eq!(event.order_id(), order_id);
    }

    #[test]
    fn decodes_step_events() {
        let (_, raw) = order_id_json();

        let event = InboundEvent::decode(
            topics::PAYMENT_PROCESSED,
            json!({"orderId": raw, "paymentId": "PAY-1", "amount": 99.99}),
        )
        .unwrap();
        assert!(matches!(event, InboundEvent::PaymentProcessed(_)));
        assert!(event.correlation_id().is_none());

        let event = InboundEvent::decode(
            topics::INVENTORY_FAILED,
            json!({"orderId": raw, "reason": "out of stock", "errorCode": "OOS"}),
        )
        .unwrap();
        let InboundEvent::InventoryFailed(failed) = event else {
            panic!("expected InventoryFailed");
        };
        assert_eq!(failed.reason, "out of stock");

        let event = InboundEvent::decode(
            topics::SHIPPING_PREPARED,
            json!({"orderId": raw, "shippingId": "SHIP-1", "trackingNumber": "TRK-1"}),
        )
        .unwrap();
        assert!(matches!(event, InboundEvent::ShippingPrepared(_)));
    }

    #[test]
    fn order_updated_aliases_status_changed() {
        let (_, raw) = order_id_json();
        let body = json!({"orderId": raw, "newStatus": "cancelled"});

        let event = InboundEvent::decode(topics::ORDER_UPDATED, body).unwrap();
        assert!(matches!(event, InboundEvent::OrderStatusChanged(_)));
        assert_eq!(event.topic(), topics::ORDER_STATUS_CHANGED);
    }

    #[test]
    fn rejects_unknown_topic() {
        let result = InboundEvent::decode("order.exploded", json!({}));
        assert!(matches!(result, Err(DecodeError::UnknownTopic(_))));
    }

    #[test]
    fn rejects_malformed_body() {
        let result = InboundEvent::decode(topics::PAYMENT_PROCESSED, json!({"orderId": 42}));
        assert!(matches!(result, Err(DecodeError::Json(_))));
    }

    #[test]
    fn lifecycle_classification() {
        let (_, raw) = order_id_json();
        let deleted =
            InboundEvent::decode(topics::ORDER_DELETED, json!({"orderId": raw})).unwrap();
        assert!(deleted.is_lifecycle());

        let failed = InboundEvent::decode(
            topics::PAYMENT_FAILED,
            json!({"orderId": raw, "reason": "declined"}),
        )
        .unwrap();
        assert!(!failed.is_lifecycle());
    }
}
