//! The explicit per-event context and the handler seam between the ingress
//! and the saga coordinator.

use async_trait::async_trait;
use common::CorrelationId;
use domain::InboundEvent;
use thiserror::Error;

/// Context passed explicitly to every handler invocation.
///
/// Carrying the correlation id as an argument instead of ambient state keeps
/// concurrent handlers from cross-contaminating each other's traces.
#[derive(Debug, Clone)]
pub struct EventContext {
    pub correlation_id: CorrelationId,
}

impl EventContext {
    /// Creates a context for one handler invocation.
    pub fn new(correlation_id: CorrelationId) -> Self {
        Self { correlation_id }
    }
}

/// How a failed delivery should be settled with the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Negative-ack with requeue; the broker redelivers after its backoff.
    /// Used for optimistic-concurrency conflicts and transient I/O.
    Redeliver,
    /// Negative-ack without requeue; the message routes to the dead-letter
    /// exchange. Used for deliveries that will never succeed.
    DeadLetter,
}

/// Error a handler surfaces to the ingress, carrying the delivery outcome.
///
/// Handlers swallow the error categories they can resolve themselves
/// (duplicates, unknown sagas, exhausted retries); only errors that need the
/// broker's redelivery machinery escape through this type.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    pub disposition: Disposition,
    pub message: String,
}

impl HandlerError {
    /// An error the broker should retry by redelivering.
    pub fn redeliver(message: impl Into<String>) -> Self {
        Self {
            disposition: Disposition::Redeliver,
            message: message.into(),
        }
    }

    /// An error that will never succeed; dead-letter the delivery.
    pub fn dead_letter(message: impl Into<String>) -> Self {
        Self {
            disposition: Disposition::DeadLetter,
            message: message.into(),
        }
    }
}

/// The ingress dispatches every decoded event through this seam.
///
/// One event, one transaction, one outcome: return `Ok` to ack the delivery
/// or an error whose disposition tells the broker what to do next.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: InboundEvent, ctx: &EventContext) -> Result<(), HandlerError>;
}
