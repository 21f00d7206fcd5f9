//! Event ingress: decode, correlate, dispatch.

use std::sync::Arc;

use common::CorrelationId;
use domain::{DecodeError, InboundEvent, MessageEnvelope, topics};
use thiserror::Error;
use tracing::Instrument;

use crate::adapter::MessageHeaders;
use crate::context::{EventContext, EventHandler, HandlerError};

/// Errors the ingress surfaces to the consumer loop.
#[derive(Debug, Error)]
pub enum IngressError {
    /// Malformed envelope or body; the delivery is dead-lettered.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The handler failed; the error carries the delivery disposition.
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

/// Stateless inbound dispatcher.
///
/// For every delivery: decode the payload (unwrapping the `order.created`
/// envelope shape when present), resolve the correlation id, bind it to the
/// tracing context, and dispatch to the handler keyed by logical topic.
pub struct EventIngress {
    handler: Arc<dyn EventHandler>,
}

impl EventIngress {
    /// Creates an ingress dispatching into the given handler.
    pub fn new(handler: Arc<dyn EventHandler>) -> Self {
        Self { handler }
    }

    /// Processes one delivery.
    ///
    /// Unknown routing keys are logged and treated as handled so the broker
    /// does not redeliver them.
    pub async fn process(
        &self,
        routing_key: &str,
        payload: &[u8],
        headers: &MessageHeaders,
    ) -> Result<(), IngressError> {
        let value: serde_json::Value = serde_json::from_slice(payload).inspect_err(|_| {
            metrics::counter!("ingress_decode_failures_total").increment(1);
        })?;

        // order.created may arrive wrapped in {id, topic, data, ...}.
        let (body, envelope_correlation) = if routing_key == topics::ORDER_CREATED {
            MessageEnvelope::unwrap_body(value)
        } else {
            (value, None)
        };

        let event = match InboundEvent::decode(routing_key, body) {
            Ok(event) => event,
            Err(DecodeError::UnknownTopic(topic)) => {
                tracing::warn!(%topic, "unhandled routing key");
                metrics::counter!("ingress_unknown_topics_total").increment(1);
                return Ok(());
            }
            Err(DecodeError::Json(e)) => {
                metrics::counter!("ingress_decode_failures_total").increment(1);
                return Err(IngressError::Decode(e));
            }
        };

        let correlation_id = event
            .correlation_id()
            .filter(|c| !c.is_empty())
            .map(CorrelationId::from)
            .or_else(|| envelope_correlation.filter(|c| !c.is_empty()).map(CorrelationId::new))
            .or_else(|| headers.correlation_id().map(CorrelationId::from))
            .unwrap_or_else(CorrelationId::generate);

        let ctx = EventContext::new(correlation_id);
        let span = tracing::info_span!(
            "handle_event",
            topic = %event.topic(),
            order_id = %event.order_id(),
            correlation_id = %ctx.correlation_id,
        );

        self.handler
            .handle(event, &ctx)
            .instrument(span)
            .await
            .map_err(IngressError::Handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::X_CORRELATION_ID;
    use crate::context::Disposition;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingHandler {
        seen: Mutex<Vec<(String, String)>>,
        fail_with: Mutex<Option<Disposition>>,
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        async fn handle(
            &self,
            event: InboundEvent,
            ctx: &EventContext,
        ) -> Result<(), HandlerError> {
            if let Some(disposition) = *self.fail_with.lock().unwrap() {
                return Err(HandlerError {
                    disposition,
                    message: "induced failure".to_string(),
                });
            }
            self.seen
                .lock()
                .unwrap()
                .push((event.topic().to_string(), ctx.correlation_id.to_string()));
            Ok(())
        }
    }

    fn setup() -> (Arc<RecordingHandler>, EventIngress) {
        let handler = Arc::new(RecordingHandler::default());
        let ingress = EventIngress::new(handler.clone());
        (handler, ingress)
    }

    fn payment_processed_body() -> Vec<u8> {
        json!({"orderId": Uuid::new_v4().to_string(), "paymentId": "PAY-1"})
            .to_string()
            .into_bytes()
    }

    #[tokio::test]
    async fn dispatches_by_routing_key() {
        let (handler, ingress) = setup();

        ingress
            .process(
                topics::PAYMENT_PROCESSED,
                &payment_processed_body(),
                &MessageHeaders::new(),
            )
            .await
            .unwrap();

        let seen = handler.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, topics::PAYMENT_PROCESSED);
    }

    #[tokio::test]
    async fn body_correlation_wins_over_header() {
        let (handler, ingress) = setup();
        let body = json!({
            "orderId": Uuid::new_v4().to_string(),
            "newStatus": "cancelled",
            "correlationId": "from-body"
        });
        let headers = MessageHeaders::new().with(X_CORRELATION_ID, "from-header");

        ingress
            .process(
                topics::ORDER_STATUS_CHANGED,
                body.to_string().as_bytes(),
                &headers,
            )
            .await
            .unwrap();

        assert_eq!(handler.seen.lock().unwrap()[0].1, "from-body");
    }

    #[tokio::test]
    async fn envelope_correlation_used_when_body_has_none() {
        let (handler, ingress) = setup();
        let wrapped = json!({
            "id": "msg-1",
            "topic": "order.created",
            "correlationId": "from-envelope",
            "data": {
                "orderId": Uuid::new_v4().to_string(),
                "customerId": "cust-1",
                "orderNumber": "ORD-1",
                "totalAmount": 10.0,
                "currency": "USD"
            }
        });

        ingress
            .process(
                topics::ORDER_CREATED,
                wrapped.to_string().as_bytes(),
                &MessageHeaders::new(),
            )
            .await
            .unwrap();

        assert_eq!(handler.seen.lock().unwrap()[0].1, "from-envelope");
    }

    #[tokio::test]
    async fn header_correlation_is_case_insensitive_fallback() {
        let (handler, ingress) = setup();
        let headers = MessageHeaders::new().with("x-correlation-id", "from-header");

        ingress
            .process(topics::PAYMENT_PROCESSED, &payment_processed_body(), &headers)
            .await
            .unwrap();

        assert_eq!(handler.seen.lock().unwrap()[0].1, "from-header");
    }

    #[tokio::test]
    async fn missing_correlation_generates_one() {
        let (handler, ingress) = setup();

        ingress
            .process(
                topics::PAYMENT_PROCESSED,
                &payment_processed_body(),
                &MessageHeaders::new(),
            )
            .await
            .unwrap();

        let generated = &handler.seen.lock().unwrap()[0].1;
        assert!(!generated.is_empty());
    }

    #[tokio::test]
    async fn invalid_json_is_a_decode_error() {
        let (_, ingress) = setup();

        let result = ingress
            .process(topics::PAYMENT_PROCESSED, b"not json", &MessageHeaders::new())
            .await;
        assert!(matches!(result, Err(IngressError::Decode(_))));
    }

    #[tokio::test]
    async fn unknown_topic_is_acked_not_errored() {
        let (handler, ingress) = setup();

        ingress
            .process("order.exploded", b"{}", &MessageHeaders::new())
            .await
            .unwrap();

        assert!(handler.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn handler_error_propagates_disposition() {
        let (handler, ingress) = setup();
        *handler.fail_with.lock().unwrap() = Some(Disposition::Redeliver);

        let result = ingress
            .process(
                topics::PAYMENT_PROCESSED,
                &payment_processed_body(),
                &MessageHeaders::new(),
            )
            .await;

        match result {
            Err(IngressError::Handler(e)) => assert_eq!(e.disposition, Disposition::Redeliver),
            other => panic!("expected handler error, got {other:?}"),
        }
    }
}
