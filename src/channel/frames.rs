//! Wire frames exchanged over the chat channel.
//!
//! Inbound frames are JSON objects tagged by a `type` field:
//!
//! ```text
//! {"type":"auth_success"}
//! {"type":"message","sender_id":"u2","text":"Is it still available?","room_id":"r1"}
//! {"type":"status", ...}
//! ```
//!
//! Outbound frames are the `auth` handshake and plain chat frames, which
//! carry no `type` tag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::Session;

/// Payload of an inbound `message` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message body shown to the user.
    pub text: String,
    /// Sender's user id.
    #[serde(
        default,
        deserialize_with = "id_format::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub sender_id: Option<String>,
    /// Sender's display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    /// Recipient's user id.
    #[serde(
        default,
        deserialize_with = "id_format::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub receiver_id: Option<String>,
    /// Chat room the message belongs to.
    #[serde(
        default,
        deserialize_with = "id_format::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub room_id: Option<String>,
    /// Server timestamp, as sent. Older servers call it `timestamp`.
    #[serde(default, alias = "timestamp", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl ChatMessage {
    /// Parsed server timestamp, if present and well-formed.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.created_at
            .as_deref()
            .and_then(crate::inbox::parse_timestamp)
    }
}

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Server accepted the `auth` frame.
    AuthSuccess,
    /// A chat message for this user.
    Message(ChatMessage),
    /// Presence/status update. Carried verbatim, currently unused.
    Status(serde_json::Value),
    /// Any other `type` (or none at all).
    Unknown(Option<String>),
}

impl InboundFrame {
    /// Parse one raw text frame.
    pub fn parse(raw: &str) -> Result<Self, FrameError> {
        let value: serde_json::Value = serde_json::from_str(raw).map_err(FrameError::Json)?;
        if !value.is_object() {
            return Err(FrameError::NotAnObject);
        }

        match value.get("type").and_then(serde_json::Value::as_str) {
            Some("auth_success") => Ok(Self::AuthSuccess),
            Some("message") => Self::message(value),
            Some("status") => Ok(Self::Status(value)),
            other => Ok(Self::Unknown(other.map(str::to_string))),
        }
    }

    fn message(mut value: serde_json::Value) -> Result<Self, FrameError> {
        // `created_at` wins when both timestamp keys are present.
        if let Some(object) = value.as_object_mut() {
            if object.contains_key("created_at") {
                object.remove("timestamp");
            }
        }
        serde_json::from_value(value)
            .map(Self::Message)
            .map_err(FrameError::InvalidMessage)
    }

    /// The frame's `type` tag, for logging.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::AuthSuccess => "auth_success",
            Self::Message(_) => "message",
            Self::Status(_) => "status",
            Self::Unknown(Some(kind)) => kind,
            Self::Unknown(None) => "<none>",
        }
    }
}

/// Why a raw frame could not be parsed.
#[derive(Debug)]
pub enum FrameError {
    /// Payload is not JSON.
    Json(serde_json::Error),
    /// Payload is JSON but not an object.
    NotAnObject,
    /// A `message` frame is missing required fields.
    InvalidMessage(serde_json::Error),
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(e) => write!(f, "frame is not valid JSON: {e}"),
            Self::NotAnObject => write!(f, "frame is not a JSON object"),
            Self::InvalidMessage(e) => write!(f, "invalid message frame: {e}"),
        }
    }
}

impl std::error::Error for FrameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(e) | Self::InvalidMessage(e) => Some(e),
            Self::NotAnObject => None,
        }
    }
}

/// Handshake frame sent once per successful transport open.
#[must_use]
pub fn auth_frame(session: &Session) -> String {
    serde_json::json!({
        "type": "auth",
        "user_id": session.user_id,
    })
    .to_string()
}

/// Outbound chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatFrame {
    /// Message body.
    pub text: String,
    /// Recipient's user id.
    pub receiver_id: String,
    /// Sender's user id.
    pub sender_id: String,
    /// Chat room identifier.
    pub room_id: String,
}

impl ChatFrame {
    /// Builds a frame from `session` to `receiver_id` in `room_id`.
    pub fn new(
        session: &Session,
        room_id: impl Into<String>,
        receiver_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            receiver_id: receiver_id.into(),
            sender_id: session.user_id.clone(),
            room_id: room_id.into(),
        }
    }

    /// JSON text as sent on the wire.
    #[must_use]
    pub fn to_text(&self) -> String {
        serde_json::json!({
            "text": self.text,
            "receiver_id": self.receiver_id,
            "sender_id": self.sender_id,
            "room_id": self.room_id,
        })
        .to_string()
    }
}

/// Serde helpers for backend identifiers, which arrive either as JSON
/// strings or as numbers depending on the table they come from.
pub(crate) mod id_format {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    impl RawId {
        fn into_string(self) -> String {
            match self {
                Self::Text(text) => text,
                Self::Number(n) => n.to_string(),
            }
        }
    }

    pub(crate) fn required<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        RawId::deserialize(deserializer).map(RawId::into_string)
    }

    pub(crate) fn optional<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(Option::<RawId>::deserialize(deserializer)?.map(RawId::into_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_auth_success() {
        let frame = InboundFrame::parse(r#"{"type":"auth_success"}"#).expect("parse");
        assert_eq!(frame, InboundFrame::AuthSuccess);
    }

    #[test]
    fn test_parse_message_with_all_fields() {
        let raw = r#"{
            "type": "message",
            "text": "Is the flat still available?",
            "sender_id": "u2",
            "sender_name": "Grace",
            "receiver_id": "u1",
            "room_id": "r7",
            "created_at": "2025-03-04T10:15:00Z"
        }"#;

        let InboundFrame::Message(message) = InboundFrame::parse(raw).expect("parse") else {
            panic!("expected message frame");
        };
        assert_eq!(message.text, "Is the flat still available?");
        assert_eq!(message.sender_id.as_deref(), Some("u2"));
        assert_eq!(message.room_id.as_deref(), Some("r7"));
        assert_eq!(
            message.timestamp().map(|t| t.to_rfc3339()),
            Some("2025-03-04T10:15:00+00:00".to_string())
        );
    }

    #[test]
    fn test_parse_message_accepts_timestamp_alias() {
        let raw = r#"{"type":"message","text":"hi","timestamp":"2025-03-04T10:15:00Z"}"#;
        let InboundFrame::Message(message) = InboundFrame::parse(raw).expect("parse") else {
            panic!("expected message frame");
        };
        assert!(message.timestamp().is_some());
    }

    #[test]
    fn test_parse_message_without_text_is_invalid() {
        let err = InboundFrame::parse(r#"{"type":"message","sender_id":"u2"}"#)
            .expect_err("missing text");
        assert!(matches!(err, FrameError::InvalidMessage(_)));
    }

    #[test]
    fn test_parse_message_with_numeric_ids() {
        let raw = r#"{"type":"message","text":"hi","sender_id":42,"room_id":7}"#;
        let InboundFrame::Message(message) = InboundFrame::parse(raw).expect("parse") else {
            panic!("expected message frame");
        };
        assert_eq!(message.sender_id.as_deref(), Some("42"));
        assert_eq!(message.room_id.as_deref(), Some("7"));
        assert_eq!(message.receiver_id, None);
    }

    #[test]
    fn test_parse_message_with_both_timestamp_keys() {
        let raw = r#"{
            "type": "message",
            "text": "hi",
            "created_at": "2025-03-04T10:15:00Z",
            "timestamp": "2025-03-04T09:00:00Z"
        }"#;
        let InboundFrame::Message(message) = InboundFrame::parse(raw).expect("parse") else {
            panic!("expected message frame");
        };
        assert_eq!(message.created_at.as_deref(), Some("2025-03-04T10:15:00Z"));
    }

    #[test]
    fn test_parse_message_with_large_and_fractional_ids() {
        let raw = r#"{"type":"message","text":"hi","sender_id":18446744073709551615,"room_id":7.5}"#;
        let InboundFrame::Message(message) = InboundFrame::parse(raw).expect("parse") else {
            panic!("expected message frame");
        };
        assert_eq!(message.sender_id.as_deref(), Some("18446744073709551615"));
        assert_eq!(message.room_id.as_deref(), Some("7.5"));
    }

    #[test]
    fn test_parse_status_keeps_payload() {
        let frame = InboundFrame::parse(r#"{"type":"status","online":true}"#).expect("parse");
        let InboundFrame::Status(value) = frame else {
            panic!("expected status frame");
        };
        assert_eq!(value["online"], true);
    }

    #[test]
    fn test_parse_unknown_type() {
        let frame = InboundFrame::parse(r#"{"type":"typing"}"#).expect("parse");
        assert_eq!(frame, InboundFrame::Unknown(Some("typing".to_string())));
        assert_eq!(frame.kind(), "typing");

        let untagged = InboundFrame::parse(r#"{"text":"hi"}"#).expect("parse");
        assert_eq!(untagged, InboundFrame::Unknown(None));
    }

    #[test]
    fn test_parse_rejects_non_json_and_non_objects() {
        assert!(matches!(
            InboundFrame::parse("hello there"),
            Err(FrameError::Json(_))
        ));
        assert!(matches!(
            InboundFrame::parse("[1,2,3]"),
            Err(FrameError::NotAnObject)
        ));
    }

    #[test]
    fn test_auth_frame_format() {
        let frame: serde_json::Value =
            serde_json::from_str(&auth_frame(&Session::new("u1"))).expect("valid JSON");
        assert_eq!(frame, serde_json::json!({ "type": "auth", "user_id": "u1" }));
    }

    #[test]
    fn test_chat_frame_format() {
        let session = Session::new("u1");
        let frame = ChatFrame::new(&session, "r1", "u2", "Hello!");
        let value: serde_json::Value = serde_json::from_str(&frame.to_text()).expect("valid JSON");
        assert_eq!(
            value,
            serde_json::json!({
                "text": "Hello!",
                "receiver_id": "u2",
                "sender_id": "u1",
                "room_id": "r1",
            })
        );
        assert!(value.get("type").is_none());
    }
}
