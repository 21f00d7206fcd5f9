use thiserror::Error;

/// Errors that can occur in broker integration.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// The adapter was used before `initialize` completed.
    #[error("broker adapter not initialized")]
    NotInitialized,

    /// The configured provider is not supported by this build.
    #[error("unsupported messaging provider '{requested}' (supported: {supported})")]
    UnsupportedProvider {
        requested: String,
        supported: &'static str,
    },

    /// An AMQP protocol or connection error.
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    /// Publishing did not complete within the configured timeout.
    #[error("publish of '{routing_key}' timed out")]
    PublishTimeout { routing_key: String },

    /// A broker variant reported a publish failure.
    #[error("broker error: {0}")]
    Broker(String),

    /// Event body could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for messaging operations.
pub type Result<T> = std::result::Result<T, MessagingError>;
