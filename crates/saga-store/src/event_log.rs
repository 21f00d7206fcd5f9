//! Append-only audit log of processed inbound events.

use chrono::{DateTime, Utc};
use common::{CorrelationId, EventId, OrderId, SagaId};
use serde::{Deserialize, Serialize};

/// Outcome recorded for each handled inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingStatus {
    /// The event mutated saga state.
    Processed,
    /// The event was idempotently dropped (duplicate, out-of-order, or
    /// addressed to an unknown or terminal saga).
    Ignored,
    /// Handling failed; the delivery is redelivered or dead-lettered.
    Failed,
}

impl ProcessingStatus {
    /// Returns the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Processed => "PROCESSED",
            ProcessingStatus::Ignored => "IGNORED",
            ProcessingStatus::Failed => "FAILED",
        }
    }

    /// Parses a stored status name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PROCESSED" => Some(ProcessingStatus::Processed),
            "IGNORED" => Some(ProcessingStatus::Ignored),
            "FAILED" => Some(ProcessingStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One audit row in `saga_event_log`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: EventId,
    pub saga_id: Option<SagaId>,
    pub order_id: Option<OrderId>,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub correlation_id: CorrelationId,
    pub status: ProcessingStatus,
    pub created_at: DateTime<Utc>,
}

impl EventLogEntry {
    /// Creates an audit entry for one handled event.
    pub fn new(
        saga_id: Option<SagaId>,
        order_id: Option<OrderId>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
        correlation_id: CorrelationId,
        status: ProcessingStatus,
    ) -> Self {
        Self {
            id: EventId::new(),
            saga_id,
            order_id,
            event_type: event_type.into(),
            payload,
            correlation_id,
            status,
            created_at: Utc::now(),
        }
    }
}
