use messaging::{Disposition, HandlerError, MessagingError};
use saga_store::SagaStoreError;
use thiserror::Error;

/// Errors that escape a coordinator handler.
///
/// Handlers resolve most failure categories themselves (duplicates are
/// dropped, unknown sagas logged, exhausted retries compensated, fatal
/// compensation publishes mark the saga `FAILED`). What escapes here needs
/// the broker's redelivery machinery or the dead-letter queue.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Saga store failure.
    #[error("store error: {0}")]
    Store(#[from] SagaStoreError),

    /// Broker publish failure.
    #[error("publish error: {0}")]
    Publish(#[from] MessagingError),

    /// Event payload could not be serialized for the audit log.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoordinatorError {
    /// Maps the error to the delivery outcome the ingress settles with.
    pub fn into_handler_error(self) -> HandlerError {
        let disposition = match &self {
            // Optimistic-concurrency collisions and transient I/O are
            // resolved by broker redelivery.
            CoordinatorError::Store(SagaStoreError::Conflict { .. })
            | CoordinatorError::Store(SagaStoreError::Database(_))
            | CoordinatorError::Store(SagaStoreError::Migration(_))
            | CoordinatorError::Publish(_) => Disposition::Redeliver,
            // Redelivering a payload we cannot serialize or a corrupt row
            // would loop forever.
            CoordinatorError::Store(SagaStoreError::Serialization(_))
            | CoordinatorError::Store(SagaStoreError::CorruptColumn { .. })
            | CoordinatorError::Store(SagaStoreError::AlreadyExists(_))
            | CoordinatorError::Store(SagaStoreError::NotFound(_))
            | CoordinatorError::Serialization(_) => Disposition::DeadLetter,
        };
        HandlerError {
            disposition,
            message: self.to_string(),
        }
    }
}

/// Result type for coordinator operations.
pub type Result<T> = std::result::Result<T, CoordinatorError>;
