//! Processed push payloads.

use crate::error::{CoreError, CoreResult};
use serde_json::{Map, Value};

/// Top-level key carrying the engagement ID.
const ENGAGEMENT_KEY: &str = "ei";

/// Metadata of the last processed push.
///
/// Replaced as a whole on each processed push.
#[derive(Debug, Clone, PartialEq)]
pub struct LastPushMeta {
    /// The payload as received.
    pub raw_payload: Map<String, Value>,
    /// Alert text.
    pub alert_text: Option<String>,
    /// Sound file name.
    pub sound_file_name: Option<String>,
    /// Badge update, as text.
    pub badge_update: Option<String>,
    /// Engagement ID.
    pub engagement_id: String,
    /// Whether the push announced new background content.
    pub content_available: bool,
}

impl LastPushMeta {
    /// Parses a remote notification payload.
    ///
    /// Reads `aps.alert` (a string, or an object with `body`), `aps.sound`,
    /// `aps.badge`, `aps.content-available` and the top-level `ei`.
    pub fn from_payload(payload: &Value) -> CoreResult<Self> {
        let raw = payload.as_object().ok_or_else(|| CoreError::PushPayload {
            message: "payload is not an object".into(),
        })?;

        let engagement_id = match raw.get(ENGAGEMENT_KEY) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(CoreError::PushPayload {
                    message: "missing engagement ID".into(),
                })
            }
        };

        let aps = raw.get("aps").and_then(Value::as_object);
        let field = |name: &str| aps.and_then(|a| a.get(name));

        let alert_text = match field("alert") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Object(alert)) => alert.get("body").and_then(Value::as_str).map(String::from),
            _ => None,
        };
        let sound_file_name = field("sound").and_then(Value::as_str).map(String::from);
        let badge_update = match field("badge") {
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        };
        let content_available = field("content-available").and_then(Value::as_i64) == Some(1);

        Ok(Self {
            raw_payload: raw.clone(),
            alert_text,
            sound_file_name,
            badge_update,
            engagement_id,
            content_available,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_payload() {
        let payload = json!({
            "aps": {"alert": "Game on", "sound": "whistle.caf", "badge": 3},
            "ei": "eng-42",
            "team": "broncos"
        });
        let meta = LastPushMeta::from_payload(&payload).unwrap();

        assert_eq!(meta.alert_text.as_deref(), Some("Game on"));
        assert_eq!(meta.sound_file_name.as_deref(), Some("whistle.caf"));
        assert_eq!(meta.badge_update.as_deref(), Some("3"));
        assert_eq!(meta.engagement_id, "eng-42");
        assert!(!meta.content_available);
        assert_eq!(meta.raw_payload.get("team"), Some(&json!("broncos")));
    }

    #[test]
    fn alert_object_body() {
        let payload = json!({"aps": {"alert": {"body": "Hello", "title": "T"}}, "ei": "e"});
        let meta = LastPushMeta::from_payload(&payload).unwrap();
        assert_eq!(meta.alert_text.as_deref(), Some("Hello"));
    }

    #[test]
    fn content_available_flag() {
        let payload = json!({"aps": {"content-available": 1}, "ei": "e"});
        assert!(LastPushMeta::from_payload(&payload).unwrap().content_available);
    }

    #[test]
    fn rejects_missing_engagement_id() {
        assert!(LastPushMeta::from_payload(&json!({"aps": {"alert": "x"}})).is_err());
        assert!(LastPushMeta::from_payload(&json!({"ei": ""})).is_err());
        assert!(LastPushMeta::from_payload(&json!(["ei"])).is_err());
    }
}
