//! Logical topic names (broker routing keys).

// Consumed topics.
pub const ORDER_CREATED: &str = "order.created";
pub const PAYMENT_PROCESSED: &str = "payment.processed";
pub const PAYMENT_FAILED: &str = "payment.failed";
pub const INVENTORY_RESERVED: &str = "inventory.reserved";
pub const INVENTORY_FAILED: &str = "inventory.failed";
pub const SHIPPING_PREPARED: &str = "shipping.prepared";
pub const SHIPPING_FAILED: &str = "shipping.failed";
pub const ORDER_CANCELLED: &str = "order.cancelled";
pub const ORDER_SHIPPED: &str = "order.shipped";
pub const ORDER_DELIVERED: &str = "order.delivered";
pub const ORDER_DELETED: &str = "order.deleted";
/// Alias routing key some upstream versions use for status changes.
pub const ORDER_UPDATED: &str = "order.updated";
pub const ORDER_STATUS_CHANGED: &str = "order.status.changed";

// Produced topics.
pub const PAYMENT_PROCESSING: &str = "payment.processing";
pub const INVENTORY_RESERVATION: &str = "inventory.reservation";
pub const SHIPPING_PREPARATION: &str = "shipping.preparation";
pub const PAYMENT_REFUND: &str = "payment.refund";
pub const INVENTORY_RELEASE: &str = "inventory.release";
pub const SHIPPING_CANCELLATION: &str = "shipping.cancellation";
pub const ORDER_COMPLETED: &str = "order.completed";
pub const ORDER_FAILED: &str = "order.failed";

/// All routing keys the ingress binds the consume queue to.
pub const CONSUMED: &[&str] = &[
    ORDER_CREATED,
    PAYMENT_PROCESSED,
    PAYMENT_FAILED,
    INVENTORY_RESERVED,
    INVENTORY_FAILED,
    SHIPPING_PREPARED,
    SHIPPING_FAILED,
    ORDER_CANCELLED,
    ORDER_SHIPPED,
    ORDER_DELIVERED,
    ORDER_DELETED,
    ORDER_UPDATED,
    ORDER_STATUS_CHANGED,
];
