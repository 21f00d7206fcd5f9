use thiserror::Error;

/// Errors raised while decoding an inbound message.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload was not valid JSON or did not match the event shape.
    #[error("malformed event body: {0}")]
    Json(#[from] serde_json::Error),

    /// The routing key does not map to any known inbound event.
    #[error("unknown topic: {0}")]
    UnknownTopic(String),
}
