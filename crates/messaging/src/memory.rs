use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::adapter::{BrokerAdapter, MessageHeaders};
use crate::error::{MessagingError, Result};

/// One recorded publish.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub body: serde_json::Value,
    pub headers: MessageHeaders,
}

#[derive(Debug, Default)]
struct InMemoryState {
    published: Vec<PublishedMessage>,
    fail_on_publish: bool,
    healthy: bool,
}

/// In-process broker variant that records every publish.
///
/// Used by tests to assert on emitted events and as the local-run fallback
/// when no broker is available.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryBroker {
    /// Creates a new recording broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the broker to fail every subsequent publish.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.state.write().unwrap().fail_on_publish = fail;
    }

    /// Returns all recorded publishes in order.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.state.read().unwrap().published.clone()
    }

    /// Returns the routing keys of all recorded publishes, in order.
    pub fn routing_keys(&self) -> Vec<String> {
        self.state
            .read()
            .unwrap()
            .published
            .iter()
            .map(|m| m.routing_key.clone())
            .collect()
    }

    /// Returns recorded publishes for one routing key.
    pub fn published_to(&self, routing_key: &str) -> Vec<PublishedMessage> {
        self.state
            .read()
            .unwrap()
            .published
            .iter()
            .filter(|m| m.routing_key == routing_key)
            .cloned()
            .collect()
    }

    /// Clears the record.
    pub fn clear(&self) {
        self.state.write().unwrap().published.clear();
    }
}

#[async_trait]
impl BrokerAdapter for InMemoryBroker {
    async fn initialize(&self) -> Result<()> {
        self.state.write().unwrap().healthy = true;
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: &serde_json::Value,
        headers: &MessageHeaders,
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_publish {
            return Err(MessagingError::Broker("publish rejected".to_string()));
        }

        state.published.push(PublishedMessage {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            body: body.clone(),
            headers: headers.clone(),
        });
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        self.state.read().unwrap().healthy
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }

    async fn shutdown(&self) -> Result<()> {
        self.state.write().unwrap().healthy = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn records_publishes_in_order() {
        let broker = InMemoryBroker::new();
        broker.initialize().await.unwrap();

        broker
            .publish(
                "order.events",
                "payment.processing",
                &json!({"orderId": "o-1"}),
                &MessageHeaders::for_correlation("corr-1"),
            )
            .await
            .unwrap();
        broker
            .publish(
                "order.events",
                "inventory.reservation",
                &json!({"orderId": "o-1"}),
                &MessageHeaders::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            broker.routing_keys(),
            vec!["payment.processing", "inventory.reservation"]
        );
        let first = &broker.published_to("payment.processing")[0];
        assert_eq!(first.headers.correlation_id(), Some("corr-1"));
    }

    #[tokio::test]
    async fn fail_flag_rejects_publishes() {
        let broker = InMemoryBroker::new();
        broker.initialize().await.unwrap();
        broker.set_fail_on_publish(true);

        let result = broker
            .publish("order.events", "payment.refund", &json!({}), &MessageHeaders::new())
            .await;
        assert!(matches!(result, Err(MessagingError::Broker(_))));
        assert!(broker.published().is_empty());
    }

    #[tokio::test]
    async fn health_follows_lifecycle() {
        let broker = InMemoryBroker::new();
        assert!(!broker.is_healthy().await);

        broker.initialize().await.unwrap();
        assert!(broker.is_healthy().await);

        broker.shutdown().await.unwrap();
        assert!(!broker.is_healthy().await);
    }
}
