//! Registration protocol messages.

use crate::codec::{from_cbor, to_cbor};
use crate::error::{ProtocolError, ProtocolResult};
use crate::tracking::TrackingBatch;
use serde::{Deserialize, Serialize};

/// Current protocol version.
pub const PROTOCOL_VERSION: u16 = 1;

/// A message sent from the client to the registration server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Create or update the device registration.
    Register(RegistrationRequest),
    /// Delete the device registration.
    Deregister(DeregistrationRequest),
    /// Deliver engagement records and custom events.
    Track(TrackingBatch),
}

impl ClientMessage {
    /// Returns the message type code.
    pub fn type_code(&self) -> u8 {
        match self {
            ClientMessage::Register(_) => 1,
            ClientMessage::Deregister(_) => 2,
            ClientMessage::Track(_) => 3,
        }
    }

    /// Returns the HTTP path this message is posted to.
    pub fn endpoint(&self) -> &'static str {
        match self {
            ClientMessage::Register(_) => "/api/v1/registrations",
            ClientMessage::Deregister(_) => "/api/v1/registrations/delete",
            ClientMessage::Track(_) => "/api/v1/engagements",
        }
    }

    /// Returns the device the message is about.
    pub fn device_id(&self) -> &str {
        match self {
            ClientMessage::Register(r) => &r.device_id,
            ClientMessage::Deregister(r) => &r.device_id,
            ClientMessage::Track(r) => &r.device_id,
        }
    }

    /// Returns the protocol version the message was built with.
    pub fn protocol_version(&self) -> u16 {
        match self {
            ClientMessage::Register(r) => r.protocol_version,
            ClientMessage::Deregister(r) => r.protocol_version,
            ClientMessage::Track(r) => r.protocol_version,
        }
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        to_cbor(self)
    }

    /// Decodes from CBOR and checks the protocol version.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        let message: Self = from_cbor(bytes)?;
        let remote = message.protocol_version();
        if remote != PROTOCOL_VERSION {
            return Err(ProtocolError::VersionMismatch {
                local: PROTOCOL_VERSION,
                remote,
            });
        }
        Ok(message)
    }
}

/// Registration of one device.
///
/// The request is idempotent: the server replaces whatever it held for
/// `device_id` with the tuple carried here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    /// Protocol version.
    pub protocol_version: u16,
    /// Application API key.
    pub api_key: String,
    /// Stable device identifier.
    pub device_id: String,
    /// Hex-encoded push token, if the OS has issued one.
    pub device_token: Option<String>,
    /// Registered user ID.
    pub user_id: Option<String>,
    /// Registered categories, sorted.
    pub categories: Vec<String>,
    /// Full preference set; `None` when preferences are unchanged.
    pub preferences: Option<Vec<WirePreference>>,
    /// Time zone the server should use for delivery windows.
    pub time_zone: Option<String>,
    /// Client library version.
    pub sdk_version: String,
    /// Hex-encoded fingerprint of the registration tuple.
    pub fingerprint: String,
}

/// Deletion of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeregistrationRequest {
    /// Protocol version.
    pub protocol_version: u16,
    /// Application API key.
    pub api_key: String,
    /// Stable device identifier.
    pub device_id: String,
}

impl DeregistrationRequest {
    /// Creates a new deregistration request.
    pub fn new(api_key: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            api_key: api_key.into(),
            device_id: device_id.into(),
        }
    }
}

/// Declared type of a preference on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WirePreferenceKind {
    /// Text value.
    String,
    /// Numeric value.
    Numeric,
    /// Boolean value.
    Boolean,
}

/// A preference value on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireValue {
    /// Text value.
    Text(String),
    /// Numeric value.
    Number(f64),
    /// Boolean value.
    Bool(bool),
}

/// A declared preference on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePreference {
    /// Preference key.
    pub key: String,
    /// Human-readable label.
    pub label: String,
    /// Declared type.
    pub kind: WirePreferenceKind,
    /// Assigned value, if any.
    pub value: Option<WireValue>,
}

/// Acknowledgement returned by the server for every client message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerAck {
    /// HTTP-style status code.
    pub status_code: u16,
    /// Fingerprint the server now holds for the device, for registrations.
    pub fingerprint: Option<String>,
    /// Error message if rejected.
    pub message: Option<String>,
}

impl ServerAck {
    /// Creates a successful acknowledgement.
    pub fn ok() -> Self {
        Self {
            status_code: 200,
            fingerprint: None,
            message: None,
        }
    }

    /// Creates a successful acknowledgement echoing a registration fingerprint.
    pub fn registered(fingerprint: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            fingerprint: Some(fingerprint.into()),
            message: None,
        }
    }

    /// Creates a rejection.
    pub fn rejected(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            fingerprint: None,
            message: Some(message.into()),
        }
    }

    /// Returns true for 2xx status codes.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        to_cbor(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        from_cbor(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_registration() -> RegistrationRequest {
        RegistrationRequest {
            protocol_version: PROTOCOL_VERSION,
            api_key: "key_123".into(),
            device_id: "3f1c0d9e-0000-4000-8000-000000000001".into(),
            device_token: Some("a1b2c3".into()),
            user_id: Some("user@example.com".into()),
            categories: vec!["birdwatchers".into(), "broncos_fans".into()],
            preferences: Some(vec![
                WirePreference {
                    key: "alerts".into(),
                    label: "Breaking alerts".into(),
                    kind: WirePreferenceKind::Boolean,
                    value: Some(WireValue::Bool(true)),
                },
                WirePreference {
                    key: "radius".into(),
                    label: "Radius (km)".into(),
                    kind: WirePreferenceKind::Numeric,
                    value: None,
                },
            ]),
            time_zone: Some("Europe/Berlin".into()),
            sdk_version: "0.4.0".into(),
            fingerprint: "00ff".into(),
        }
    }

    #[test]
    fn registration_message_decodes_to_same_message() {
        let message = ClientMessage::Register(sample_registration());
        let bytes = message.encode().unwrap();
        assert_eq!(ClientMessage::decode(&bytes).unwrap(), message);
    }

    #[test]
    fn decode_rejects_other_protocol_versions() {
        let mut request = sample_registration();
        request.protocol_version = 9;
        let bytes = ClientMessage::Register(request).encode().unwrap();

        let result = ClientMessage::decode(&bytes);
        assert_eq!(
            result,
            Err(ProtocolError::VersionMismatch {
                local: PROTOCOL_VERSION,
                remote: 9
            })
        );
    }

    #[test]
    fn message_routing() {
        let register = ClientMessage::Register(sample_registration());
        let deregister = ClientMessage::Deregister(DeregistrationRequest::new("key", "dev-1"));

        assert_eq!(register.type_code(), 1);
        assert_eq!(deregister.type_code(), 2);
        assert_eq!(register.endpoint(), "/api/v1/registrations");
        assert_eq!(deregister.endpoint(), "/api/v1/registrations/delete");
        assert_eq!(deregister.device_id(), "dev-1");
    }

    #[test]
    fn ack_status_classification() {
        assert!(ServerAck::ok().is_success());
        assert!(ServerAck::registered("ab").is_success());
        assert!(!ServerAck::rejected(503, "maintenance").is_success());
        assert!(!ServerAck::rejected(401, "bad api key").is_success());
    }

    #[test]
    fn ack_decodes_to_same_ack() {
        let ack = ServerAck::rejected(429, "slow down");
        assert_eq!(ServerAck::decode(&ack.encode().unwrap()).unwrap(), ack);
    }
}
