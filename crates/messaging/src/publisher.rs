//! Typed outbound publisher, one method per produced topic.

use std::sync::Arc;

use domain::{
    InventoryRelease, InventoryReservation, OrderCompleted, OrderFailed, PaymentProcessing,
    PaymentRefund, ShippingCancellation, ShippingPreparation, StatusChangedNotification,
};
use serde::Serialize;

use crate::adapter::{BrokerAdapter, MessageHeaders};
use crate::context::EventContext;
use crate::error::Result;

/// Publishes command and notification events to the broker.
///
/// Every publish serializes the body as JSON and attaches the correlation id
/// header from the explicit event context.
#[derive(Clone)]
pub struct EventPublisher {
    adapter: Arc<dyn BrokerAdapter>,
    exchange: String,
}

impl EventPublisher {
    /// Creates a publisher targeting the given exchange.
    pub fn new(adapter: Arc<dyn BrokerAdapter>, exchange: impl Into<String>) -> Self {
        Self {
            adapter,
            exchange: exchange.into(),
        }
    }

    /// Returns the adapter behind this publisher.
    pub fn adapter(&self) -> &Arc<dyn BrokerAdapter> {
        &self.adapter
    }

    async fn publish<T: Serialize>(
        &self,
        routing_key: &'static str,
        event: &T,
        ctx: &EventContext,
    ) -> Result<()> {
        let body = serde_json::to_value(event)?;
        let headers = MessageHeaders::for_correlation(ctx.correlation_id.as_str());

        self.adapter
            .publish(&self.exchange, routing_key, &body, &headers)
            .await?;

        metrics::counter!("events_published_total", "topic" => routing_key).increment(1);
        tracing::info!(topic = routing_key, "published event");
        Ok(())
    }

    /// Emits the `payment.processing` command.
    pub async fn payment_processing(
        &self,
        event: &PaymentProcessing,
        ctx: &EventContext,
    ) -> Result<()> {
        self.publish(PaymentProcessing::TOPIC, event, ctx).await
    }

    /// Emits the `inventory.reservation` command.
    pub async fn inventory_reservation(
        &self,
        event: &InventoryReservation,
        ctx: &EventContext,
    ) -> Result<()> {
        self.publish(InventoryReservation::TOPIC, event, ctx).await
    }

    /// Emits the `shipping.preparation` command.
    pub async fn shipping_preparation(
        &self,
        event: &ShippingPreparation,
        ctx: &EventContext,
    ) -> Result<()> {
        self.publish(ShippingPreparation::TOPIC, event, ctx).await
    }

    /// Emits the `payment.refund` compensating command.
    pub async fn payment_refund(&self, event: &PaymentRefund, ctx: &EventContext) -> Result<()> {
        self.publish(PaymentRefund::TOPIC, event, ctx).await
    }

    /// Emits the `inventory.release` compensating command.
    pub async fn inventory_release(
        &self,
        event: &InventoryRelease,
        ctx: &EventContext,
    ) -> Result<()> {
        self.publish(InventoryRelease::TOPIC, event, ctx).await
    }

    /// Emits the `shipping.cancellation` compensating command.
    pub async fn shipping_cancellation(
        &self,
        event: &ShippingCancellation,
        ctx: &EventContext,
    ) -> Result<()> {
        self.publish(ShippingCancellation::TOPIC, event, ctx).await
    }

    /// Emits the `order.completed` notification.
    pub async fn order_completed(&self, event: &OrderCompleted, ctx: &EventContext) -> Result<()> {
        self.publish(OrderCompleted::TOPIC, event, ctx).await
    }

    /// Emits the `order.failed` notification.
    pub async fn order_failed(&self, event: &OrderFailed, ctx: &EventContext) -> Result<()> {
        self.publish(OrderFailed::TOPIC, event, ctx).await
    }

    /// Emits the `order.status.changed` progress notification.
    pub async fn status_changed(
        &self,
        event: &StatusChangedNotification,
        ctx: &EventContext,
    ) -> Result<()> {
        self.publish(StatusChangedNotification::TOPIC, event, ctx)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBroker;
    use common::{CorrelationId, Money, OrderId};

    fn setup() -> (InMemoryBroker, EventPublisher, EventContext) {
        let broker = InMemoryBroker::new();
        let publisher = EventPublisher::new(Arc::new(broker.clone()), "order.events");
        let ctx = EventContext::new(CorrelationId::new("corr-1"));
        (broker, publisher, ctx)
    }

    #[tokio::test]
    async fn publishes_with_topic_and_correlation_header() {
        let (broker, publisher, ctx) = setup();
        let order_id = OrderId::new();
        let event = PaymentProcessing::new(order_id, "cust-1", Money::from_cents(9999), "USD");

        publisher.payment_processing(&event, &ctx).await.unwrap();

        let published = broker.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].exchange, "order.events");
        assert_eq!(published[0].routing_key, "payment.processing");
        assert_eq!(published[0].headers.correlation_id(), Some("corr-1"));
        assert_eq!(
            published[0].body["orderId"],
            serde_json::to_value(order_id).unwrap()
        );
    }

    #[tokio::test]
    async fn publish_failure_propagates() {
        let (broker, publisher, ctx) = setup();
        broker.set_fail_on_publish(true);

        let event = OrderCompleted::new(OrderId::new());
        assert!(publisher.order_completed(&event, &ctx).await.is_err());
    }

    #[tokio::test]
    async fn compensation_commands_use_their_topics() {
        let (broker, publisher, ctx) = setup();
        let order_id = OrderId::new();

        publisher
            .shipping_cancellation(&ShippingCancellation::new(order_id, "SHIP-1"), &ctx)
            .await
            .unwrap();
        publisher
            .inventory_release(&InventoryRelease::new(order_id, "RES-1"), &ctx)
            .await
            .unwrap();
        publisher
            .payment_refund(&PaymentRefund::new(order_id, "PAY-1"), &ctx)
            .await
            .unwrap();

        assert_eq!(
            broker.routing_keys(),
            vec!["shipping.cancellation", "inventory.release", "payment.refund"]
        );
    }
}
