//! Engagement metrics and custom events.

use pushreg_protocol::{WireEngagement, WireEvent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix time in milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Kind of engagement being reported.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngagementMetric {
    /// App launched from a push.
    Launch,
    /// App session became active.
    ActiveSession,
    /// In-app purchase following a push.
    InAppPurchase,
    /// Premium content viewed following a push.
    PremiumContent,
    /// Social action following a push.
    Social,
    /// Notification action taken.
    Action,
    /// Uncategorized engagement.
    Other,
    /// Application-defined metric.
    Custom(String),
}

impl EngagementMetric {
    /// Returns true if the metric must be attributed to a processed push.
    pub fn requires_push(&self) -> bool {
        !matches!(self, Self::ActiveSession | Self::Other)
    }

    /// Returns the wire name of the metric.
    pub fn name(&self) -> &str {
        match self {
            Self::Launch => "launch",
            Self::ActiveSession => "active_session",
            Self::InAppPurchase => "inapp_purchase",
            Self::PremiumContent => "premium_content",
            Self::Social => "social",
            Self::Action => "action",
            Self::Other => "other",
            Self::Custom(name) => name,
        }
    }
}

/// A tracked engagement, held until flushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngagementRecord {
    /// Engagement ID of the push the engagement is attributed to.
    pub engagement_id: Option<String>,
    /// Metric.
    pub metric: EngagementMetric,
    /// Unix time in milliseconds.
    pub timestamp_ms: u64,
    /// Free-form context.
    pub context: BTreeMap<String, String>,
}

impl EngagementRecord {
    /// Creates a record stamped with the current time.
    pub fn new(metric: EngagementMetric, engagement_id: Option<String>) -> Self {
        Self {
            engagement_id,
            metric,
            timestamp_ms: now_millis(),
            context: BTreeMap::new(),
        }
    }

    /// Attaches context.
    pub fn with_context(mut self, context: BTreeMap<String, String>) -> Self {
        self.context = context;
        self
    }

    /// Converts to wire form.
    pub fn to_wire(&self) -> WireEngagement {
        WireEngagement {
            engagement_id: self.engagement_id.clone(),
            metric: self.metric.name().to_string(),
            timestamp_ms: self.timestamp_ms,
            context: self.context.clone(),
        }
    }
}

/// A custom event, held until flushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// Event type.
    pub event_type: String,
    /// Unix time in milliseconds.
    pub timestamp_ms: u64,
    /// Engagement ID of the last processed push, if any.
    pub engagement_id: Option<String>,
}

impl EventRecord {
    /// Creates a record stamped with the current time.
    pub fn new(event_type: impl Into<String>, engagement_id: Option<String>) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp_ms: now_millis(),
            engagement_id,
        }
    }

    /// Converts to wire form.
    pub fn to_wire(&self) -> WireEvent {
        WireEvent {
            event_type: self.event_type.clone(),
            timestamp_ms: self.timestamp_ms,
            engagement_id: self.engagement_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_association_requirements() {
        assert!(!EngagementMetric::ActiveSession.requires_push());
        assert!(!EngagementMetric::Other.requires_push());
        assert!(EngagementMetric::Launch.requires_push());
        assert!(EngagementMetric::InAppPurchase.requires_push());
        assert!(EngagementMetric::Custom("shared".into()).requires_push());
    }

    #[test]
    fn wire_names() {
        assert_eq!(EngagementMetric::PremiumContent.name(), "premium_content");
        assert_eq!(EngagementMetric::Custom("level_up".into()).name(), "level_up");

        let record = EngagementRecord::new(EngagementMetric::Social, Some("ei-1".into()));
        let wire = record.to_wire();
        assert_eq!(wire.metric, "social");
        assert_eq!(wire.engagement_id.as_deref(), Some("ei-1"));
        assert!(wire.timestamp_ms > 0);
    }
}
