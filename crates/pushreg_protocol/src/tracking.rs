//! Engagement and event tracking messages.

use crate::messages::PROTOCOL_VERSION;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A batch of tracked items flushed in one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingBatch {
    /// Protocol version.
    pub protocol_version: u16,
    /// Application API key.
    pub api_key: String,
    /// Stable device identifier.
    pub device_id: String,
    /// Engagement records, oldest first.
    pub engagements: Vec<WireEngagement>,
    /// Custom events, oldest first.
    pub events: Vec<WireEvent>,
}

impl TrackingBatch {
    /// Creates an empty batch.
    pub fn new(api_key: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            api_key: api_key.into(),
            device_id: device_id.into(),
            engagements: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Returns the number of items in the batch.
    pub fn len(&self) -> usize {
        self.engagements.len() + self.events.len()
    }

    /// Returns true if the batch carries nothing.
    pub fn is_empty(&self) -> bool {
        self.engagements.is_empty() && self.events.is_empty()
    }
}

/// An engagement record on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEngagement {
    /// Engagement ID of the push the engagement is attributed to.
    pub engagement_id: Option<String>,
    /// Metric name.
    pub metric: String,
    /// Unix time in milliseconds.
    pub timestamp_ms: u64,
    /// Free-form context.
    pub context: BTreeMap<String, String>,
}

/// A custom event on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEvent {
    /// Event type.
    pub event_type: String,
    /// Unix time in milliseconds.
    pub timestamp_ms: u64,
    /// Engagement ID of the last processed push, if any.
    pub engagement_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClientMessage, ProtocolError};

    #[test]
    fn batch_len_counts_both_kinds() {
        let mut batch = TrackingBatch::new("key", "dev");
        assert!(batch.is_empty());

        batch.events.push(WireEvent {
            event_type: "checkout".into(),
            timestamp_ms: 1,
            engagement_id: None,
        });
        batch.engagements.push(WireEngagement {
            engagement_id: Some("ei-1".into()),
            metric: "social".into(),
            timestamp_ms: 2,
            context: BTreeMap::new(),
        });

        assert_eq!(batch.len(), 2);
        assert!(!batch.is_empty());
    }

    #[test]
    fn track_message_survives_encoding() {
        let mut batch = TrackingBatch::new("key", "dev");
        batch.engagements.push(WireEngagement {
            engagement_id: Some("ei-9".into()),
            metric: "inapp_purchase".into(),
            timestamp_ms: 1_700_000_000_000,
            context: BTreeMap::from([("sku".to_string(), "gold".to_string())]),
        });
        let message = ClientMessage::Track(batch);

        let decoded = ClientMessage::decode(&message.encode().unwrap()).unwrap();
        assert_eq!(decoded, message);
        assert_eq!(decoded.endpoint(), "/api/v1/engagements");
    }

    #[test]
    fn truncated_message_is_rejected() {
        let bytes = ClientMessage::Track(TrackingBatch::new("key", "dev"))
            .encode()
            .unwrap();
        let result = ClientMessage::decode(&bytes[..bytes.len() / 2]);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
