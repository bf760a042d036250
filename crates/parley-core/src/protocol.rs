//! Wire protocol.
//!
//! Every frame is a JSON object with an `event` and a `data` field.
//!
//! Inbound (client → hub):
//!
//! ```text
//! {"event": "PUT MESSAGE", "data": "hello"}
//! ```
//!
//! Outbound (hub → client), where `event` is a numeric tag or, for the
//! `TEST ERROR` echo, whatever code the client supplied:
//!
//! ```text
//! {"event": 100, "data": {"connected": {...}}}
//! {"event": 101, "data": {"ping": {"time": 1760000000000}}}
//! {"event": 200, "data": "OK"}
//! ```

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Value, json};

use crate::connection::ConnectionInfo;
use crate::errors::{HubError, Result};

/// `GET STATUS` event name.
pub const GET_STATUS: &str = "GET STATUS";
/// `GET MESSAGES` event name.
pub const GET_MESSAGES: &str = "GET MESSAGES";
/// `PUT MESSAGE` event name.
pub const PUT_MESSAGE: &str = "PUT MESSAGE";
/// `TEST BCAST` event name.
pub const TEST_BROADCAST: &str = "TEST BCAST";
/// `TEST ERROR` event name.
pub const TEST_ERROR: &str = "TEST ERROR";

/// Fixed diagnostic string sent with every `TEST ERROR` echo.
pub const TEST_ERROR_MESSAGE: &str = "Test Error";

/// Acknowledgement payload for `PUT MESSAGE`.
pub const ACK: &str = "OK";

/// Tag of an outbound event.
#[derive(Clone, Debug, PartialEq)]
pub enum EventTag {
    /// `100`: connect/disconnect/chat/test broadcasts.
    Broadcast,
    /// `101`: heartbeat ping.
    Ping,
    /// `200`: success reply to a unicast request.
    Ok,
    /// Client-supplied tag, echoed verbatim (string or number).
    Echo(Value),
}

impl EventTag {
    /// Numeric wire code, or `None` for an echoed tag.
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::Broadcast => Some(100),
            Self::Ping => Some(101),
            Self::Ok => Some(200),
            Self::Echo(_) => None,
        }
    }
}

impl Serialize for EventTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Echo(tag) => tag.serialize(serializer),
            other => serializer.serialize_u16(other.code().unwrap_or_default()),
        }
    }
}

/// An event the hub sends to one or more connections.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OutboundEvent {
    /// Wire tag.
    pub event: EventTag,
    /// Payload.
    pub data: Value,
}

impl OutboundEvent {
    /// A tag-100 broadcast carrying `data`.
    pub fn broadcast(data: Value) -> Self {
        Self {
            event: EventTag::Broadcast,
            data,
        }
    }

    /// `{connected: info}` announcement.
    pub fn connected(info: &ConnectionInfo) -> Self {
        Self::broadcast(json!({ "connected": info }))
    }

    /// `{disconnected: info}` announcement.
    pub fn disconnected(info: &ConnectionInfo) -> Self {
        Self::broadcast(json!({ "disconnected": info }))
    }

    /// Heartbeat carrying the server time in epoch milliseconds.
    pub fn ping(time_ms: i64) -> Self {
        Self {
            event: EventTag::Ping,
            data: json!({ "ping": { "time": time_ms } }),
        }
    }

    /// A tag-200 reply carrying `data`.
    pub fn ok(data: Value) -> Self {
        Self {
            event: EventTag::Ok,
            data,
        }
    }

    /// The `TEST ERROR` echo for a client-supplied code.
    pub fn test_error(code: Value) -> Self {
        Self {
            event: EventTag::Echo(code),
            data: Value::String(TEST_ERROR_MESSAGE.to_owned()),
        }
    }

    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// An untyped frame as read off the transport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InboundFrame {
    /// Event name.
    pub event: String,
    /// Optional payload. `null` and absent are equivalent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl InboundFrame {
    /// Build a frame by hand.
    pub fn new(event: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Parse a JSON text frame.
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// A validated client event.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientEvent {
    /// `GET STATUS`: reply with a server status snapshot.
    GetStatus,
    /// `GET MESSAGES`: reply with the message log.
    GetMessages,
    /// `PUT MESSAGE`: append and broadcast.
    PutMessage(Value),
    /// `TEST BCAST`: broadcast `{data: payload}`.
    TestBroadcast(Value),
    /// `TEST ERROR`: echo the code back to the requester.
    TestError {
        /// Client-supplied reply tag (string or number).
        code: Value,
    },
}

impl ClientEvent {
    /// Validate a raw frame against the payload shape its name requires.
    pub fn parse(frame: InboundFrame) -> Result<Self> {
        let InboundFrame { event, data } = frame;
        match event.as_str() {
            GET_STATUS => Ok(Self::GetStatus),
            GET_MESSAGES => Ok(Self::GetMessages),
            PUT_MESSAGE => data
                .map(Self::PutMessage)
                .ok_or_else(|| HubError::invalid_payload(event, "missing message payload")),
            TEST_BROADCAST => Ok(Self::TestBroadcast(data.unwrap_or(Value::Null))),
            TEST_ERROR => parse_error_code(data)
                .map(|code| Self::TestError { code })
                .map_err(|reason| HubError::invalid_payload(event, reason)),
            _ => Err(HubError::UnknownEvent(event)),
        }
    }

    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetStatus => GET_STATUS,
            Self::GetMessages => GET_MESSAGES,
            Self::PutMessage(_) => PUT_MESSAGE,
            Self::TestBroadcast(_) => TEST_BROADCAST,
            Self::TestError { .. } => TEST_ERROR,
        }
    }
}

fn parse_error_code(data: Option<Value>) -> Result<Value, &'static str> {
    let Some(Value::Object(mut map)) = data else {
        return Err("expected an object with an `error` field");
    };
    match map.remove("error") {
        Some(Value::String(code)) if !code.is_empty() => Ok(Value::String(code)),
        Some(code @ Value::Number(_)) => Ok(code),
        Some(_) => Err("`error` must be a non-empty string or a number"),
        None => Err("missing `error` field"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn frame(event: &str, data: Option<Value>) -> InboundFrame {
        InboundFrame::new(event, data)
    }

    // ── outbound ────────────────────────────────────────────────────

    #[test]
    fn numeric_tags_are_bit_exact() {
        assert_eq!(EventTag::Broadcast.code(), Some(100));
        assert_eq!(EventTag::Ping.code(), Some(101));
        assert_eq!(EventTag::Ok.code(), Some(200));
        assert_eq!(EventTag::Echo(json!("x")).code(), None);
    }

    #[test]
    fn broadcast_serializes_numeric_tag() {
        let json = OutboundEvent::broadcast(json!("hi")).to_json().unwrap();
        assert_eq!(json, r#"{"event":100,"data":"hi"}"#);
    }

    #[test]
    fn ping_payload_shape() {
        let value = serde_json::to_value(OutboundEvent::ping(1_700_000_000_123)).unwrap();
        assert_eq!(value["event"], 101);
        assert_eq!(value["data"]["ping"]["time"], 1_700_000_000_123_i64);
    }

    #[test]
    fn ok_reply_serializes_200() {
        let value = serde_json::to_value(OutboundEvent::ok(json!(ACK))).unwrap();
        assert_eq!(value, json!({"event": 200, "data": "OK"}));
    }

    #[test]
    fn echo_tag_keeps_string() {
        let value = serde_json::to_value(OutboundEvent::test_error(json!("42"))).unwrap();
        assert_eq!(value, json!({"event": "42", "data": "Test Error"}));
    }

    #[test]
    fn echo_tag_keeps_number() {
        let value = serde_json::to_value(OutboundEvent::test_error(json!(503))).unwrap();
        assert_eq!(value["event"], 503);
    }

    #[test]
    fn connected_wraps_info() {
        let info = ConnectionInfo::new("127.0.0.1:4000".parse().unwrap());
        let value = serde_json::to_value(OutboundEvent::connected(&info)).unwrap();
        assert_eq!(value["event"], 100);
        assert_eq!(value["data"]["connected"]["id"], "127.0.0.1:4000");
        let value = serde_json::to_value(OutboundEvent::disconnected(&info)).unwrap();
        assert_eq!(value["data"]["disconnected"]["port"], 4000);
    }

    // ── inbound ─────────────────────────────────────────────────────

    #[test]
    fn parse_frame_without_data() {
        let f = InboundFrame::parse(r#"{"event":"GET STATUS"}"#).unwrap();
        assert_eq!(f.event, "GET STATUS");
        assert!(f.data.is_none());
    }

    #[test]
    fn parse_frame_with_null_data() {
        let f = InboundFrame::parse(r#"{"event":"GET MESSAGES","data":null}"#).unwrap();
        assert!(f.data.is_none());
    }

    #[test]
    fn parse_frame_rejects_non_object() {
        assert!(InboundFrame::parse("[1,2]").is_err());
        assert!(InboundFrame::parse("not json").is_err());
        assert!(InboundFrame::parse(r#"{"data":1}"#).is_err());
    }

    #[test]
    fn read_only_events() {
        assert_eq!(
            ClientEvent::parse(frame(GET_STATUS, None)).unwrap(),
            ClientEvent::GetStatus
        );
        assert_eq!(
            ClientEvent::parse(frame(GET_MESSAGES, Some(json!({"ignored": true})))).unwrap(),
            ClientEvent::GetMessages
        );
    }

    #[test]
    fn put_message_keeps_payload() {
        let event = ClientEvent::parse(frame(PUT_MESSAGE, Some(json!({"text": "hi"})))).unwrap();
        assert_eq!(event, ClientEvent::PutMessage(json!({"text": "hi"})));
        assert_eq!(event.name(), "PUT MESSAGE");
    }

    #[test]
    fn put_message_without_payload_is_invalid() {
        let err = ClientEvent::parse(frame(PUT_MESSAGE, None)).unwrap_err();
        assert_matches!(err, HubError::InvalidPayload { .. });
    }

    #[test]
    fn test_broadcast_defaults_to_null() {
        let event = ClientEvent::parse(frame(TEST_BROADCAST, None)).unwrap();
        assert_eq!(event, ClientEvent::TestBroadcast(Value::Null));
    }

    #[test]
    fn test_error_with_string_code() {
        let event = ClientEvent::parse(frame(TEST_ERROR, Some(json!({"error": "42"})))).unwrap();
        assert_eq!(event, ClientEvent::TestError { code: json!("42") });
    }

    #[test]
    fn test_error_with_numeric_code() {
        let event = ClientEvent::parse(frame(TEST_ERROR, Some(json!({"error": 404})))).unwrap();
        assert_eq!(event, ClientEvent::TestError { code: json!(404) });
    }

    #[test]
    fn test_error_without_code_is_invalid() {
        for data in [None, Some(json!({})), Some(json!("42")), Some(json!({"error": null}))] {
            let err = ClientEvent::parse(frame(TEST_ERROR, data)).unwrap_err();
            assert_matches!(err, HubError::InvalidPayload { ref event, .. } if event == TEST_ERROR);
        }
    }

    #[test]
    fn test_error_with_empty_code_is_invalid() {
        let err = ClientEvent::parse(frame(TEST_ERROR, Some(json!({"error": ""})))).unwrap_err();
        assert_matches!(err, HubError::InvalidPayload { .. });
    }

    #[test]
    fn unknown_event_rejected() {
        let err = ClientEvent::parse(frame("get status", None)).unwrap_err();
        assert_eq!(err, HubError::UnknownEvent("get status".into()));
    }
}
