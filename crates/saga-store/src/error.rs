use common::{OrderId, SagaId, Version};
use thiserror::Error;

/// Errors that can occur when interacting with the saga store.
#[derive(Debug, Error)]
pub enum SagaStoreError {
    /// A saga row already exists for this order. The unique index on
    /// `order_id` is the duplicate-creation guard.
    #[error("saga already exists for order {0}")]
    AlreadyExists(OrderId),

    /// An optimistic-concurrency collision: the row's version moved under
    /// the caller. The triggering delivery is redelivered by the broker.
    #[error("version conflict for saga {saga_id}: expected version {expected}")]
    Conflict { saga_id: SagaId, expected: Version },

    /// The saga row was not found.
    #[error("saga not found: {0}")]
    NotFound(SagaId),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored enum value could not be mapped back to its Rust type.
    #[error("corrupt stored value in column {column}: {value}")]
    CorruptColumn { column: &'static str, value: String },
}

/// Result type for saga store operations.
pub type Result<T> = std::result::Result<T, SagaStoreError>;
