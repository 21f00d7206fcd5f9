use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;

use crate::error::{MessagingError, Result};

/// Header carrying the correlation id on every published message.
pub const X_CORRELATION_ID: &str = "X-Correlation-Id";

/// String headers attached to broker messages.
///
/// Header names are matched case-insensitively on the consume side because
/// upstream services disagree on capitalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageHeaders(BTreeMap<String, String>);

impl MessageHeaders {
    /// Creates an empty header set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Builder-style variant of [`set`](Self::set).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Builds the standard header set for an outbound message.
    pub fn for_correlation(correlation_id: &str) -> Self {
        Self::new().with(X_CORRELATION_ID, correlation_id)
    }

    /// Case-insensitive header lookup.
    pub fn get_ignore_case(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the correlation id header, if present and non-empty.
    pub fn correlation_id(&self) -> Option<&str> {
        self.get_ignore_case(X_CORRELATION_ID)
            .filter(|v| !v.is_empty())
    }

    /// Iterates over all headers.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Capability set every broker variant implements.
///
/// Variant selection is a startup-time switch on the `messaging.provider`
/// configuration key; see [`BrokerProvider`].
#[async_trait]
pub trait BrokerAdapter: Send + Sync {
    /// Establishes connections and declares broker topology.
    async fn initialize(&self) -> Result<()>;

    /// Publishes one message to `exchange` with the given routing key.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: &serde_json::Value,
        headers: &MessageHeaders,
    ) -> Result<()>;

    /// Returns true while the broker connection is usable.
    async fn is_healthy(&self) -> bool;

    /// Returns the variant name for logs and the health endpoint.
    fn provider_name(&self) -> &'static str;

    /// Closes connections and releases resources.
    async fn shutdown(&self) -> Result<()>;
}

/// The broker adapter variants this build supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerProvider {
    /// AMQP topic broker (RabbitMQ) via lapin.
    Amqp,
    /// In-process recording broker for tests and local runs.
    Memory,
}

impl BrokerProvider {
    /// Returns the provider name as written in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            BrokerProvider::Amqp => "amqp",
            BrokerProvider::Memory => "memory",
        }
    }
}

impl FromStr for BrokerProvider {
    type Err = MessagingError;

    /// Unsupported selections fail loudly, naming the supported set.
    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "amqp" | "rabbitmq" => Ok(BrokerProvider::Amqp),
            "memory" | "in-memory" => Ok(BrokerProvider::Memory),
            other => Err(MessagingError::UnsupportedProvider {
                requested: other.to_string(),
                supported: "amqp, memory",
            }),
        }
    }
}

impl std::fmt::Display for BrokerProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
