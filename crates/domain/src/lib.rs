//! Domain events exchanged with the rest of the e-commerce platform.
//!
//! Inbound events arrive from the broker and drive the saga state machine;
//! outbound events are the commands and notifications the coordinator
//! publishes downstream. Both sides are plain data with the logical topic
//! name as discriminator.

pub mod envelope;
mod error;
pub mod inbound;
pub mod outbound;
pub mod topics;

pub use envelope::MessageEnvelope;
pub use error::DecodeError;
pub use inbound::{
    InboundEvent, InventoryFailed, InventoryReserved, OrderCancelled, OrderCreated, OrderDeleted,
    OrderStatusChanged, PaymentFailed, PaymentProcessed, ShippingFailed, ShippingPrepared,
};
pub use outbound::{
    InventoryRelease, InventoryReservation, OrderCompleted, OrderFailed, PaymentProcessing,
    PaymentRefund, ShippingCancellation, ShippingPreparation, StatusChangedNotification,
};
