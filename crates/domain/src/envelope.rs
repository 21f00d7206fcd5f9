//! Wrapper envelope used by some producers of `order.created`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The wrapper shape `{id, topic, data, timestamp, correlationId}` in which
/// `order.created` may arrive; `data` holds the actual event body. All other
/// topics deliver the event body directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    pub data: serde_json::Value,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

impl MessageEnvelope {
    /// Returns true if the given JSON value looks like a wrapper envelope
    /// rather than a bare event body.
    pub fn matches(value: &serde_json::Value) -> bool {
        value
            .as_object()
            .is_some_and(|obj| obj.contains_key("data") && obj.contains_key("topic"))
    }

    /// Unwraps a value into `(event body, envelope correlation id)`.
    ///
    /// Bare event bodies pass through unchanged with no envelope
    /// correlation id.
    pub fn unwrap_body(value: serde_json::Value) -> (serde_json::Value, Option<String>) {
        if Self::matches(&value) {
            match serde_json::from_value::<MessageEnvelope>(value) {
                Ok(envelope) => (envelope.data, envelope.correlation_id),
                // An object with data/topic keys that still fails to parse is
                // treated as a bare body; the event decoder gives the real error.
                Err(_) => (serde_json::Value::Null, None),
            }
        } else {
            (value, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_wrapper_shape() {
        let wrapped = json!({
            "id": "msg-1",
            "topic": "order.created",
            "data": {"orderId": "o-1"},
            "correlationId": "corr-1"
        });
        assert!(MessageEnvelope::matches(&wrapped));

        let bare = json!({"orderId": "o-1", "totalAmount": 10.0});
        assert!(!MessageEnvelope::matches(&bare));
    }

    #[test]
    fn unwrap_extracts_data_and_correlation() {
        let wrapped = json!({
            "id": "msg-1",
            "topic": "order.created",
            "data": {"orderId": "o-1"},
            "timestamp": "2024-05-01T12:00:00Z",
            "correlationId": "corr-1"
        });

        let (body, correlation) = MessageEnvelope::unwrap_body(wrapped);
        assert_eq!(body, json!({"orderId": "o-1"}));
        assert_eq!(correlation.as_deref(), Some("corr-1"));
    }

    #[test]
    fn unwrap_passes_bare_body_through() {
        let bare = json!({"orderId": "o-1"});
        let (body, correlation) = MessageEnvelope::unwrap_body(bare.clone());
        assert_eq!(body, bare);
        assert!(correlation.is_none());
    }
}
