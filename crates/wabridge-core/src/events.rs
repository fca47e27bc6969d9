use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{MessageId, PeerId};

/// Routing metadata attached to every remote message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageInfo {
    pub id: MessageId,
    pub remote_peer: PeerId,
    pub timestamp: DateTime<Utc>,
    pub from_me: bool,
}

impl MessageInfo {
    /// Metadata for an inbound message from `peer`, stamped now.
    pub fn inbound(peer: PeerId) -> Self {
        Self {
            id: MessageId::new(),
            remote_peer: peer,
            timestamp: Utc::now(),
            from_me: false,
        }
    }

    /// Metadata for a locally originated message to `peer`, stamped now.
    pub fn outbound(peer: PeerId) -> Self {
        Self {
            id: MessageId::new(),
            remote_peer: peer,
            timestamp: Utc::now(),
            from_me: true,
        }
    }
}

/// A plain text message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TextMessage {
    pub info: MessageInfo,
    pub text: String,
}

impl TextMessage {
    pub fn inbound(peer: PeerId, text: impl Into<String>) -> Self {
        Self {
            info: MessageInfo::inbound(peer),
            text: text.into(),
        }
    }
}

/// An image or video message. Payload bytes stay with the remote session
/// client; only the metadata crosses into the bridge.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MediaMessage {
    pub info: MessageInfo,
    pub mime_type: String,
    pub caption: Option<String>,
}

/// Everything the remote session can hand to the bridge, dispatched by an
/// explicit tag rather than handler-interface method resolution.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    #[serde(rename = "text")]
    Text(TextMessage),

    #[serde(rename = "image")]
    Image(MediaMessage),

    #[serde(rename = "video")]
    Video(MediaMessage),

    /// Untyped protocol payload, forwarded verbatim.
    #[serde(rename = "raw")]
    Raw { payload: String },

    /// Transport-level failure reported by the session client.
    #[serde(rename = "error")]
    Error { message: String },
}

impl SessionEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Image(_) => "image",
            Self::Video(_) => "video",
            Self::Raw { .. } => "raw",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_event_serializes_with_tag() {
        let event = SessionEvent::Text(TextMessage::inbound(PeerId::new("49155"), "hello"));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"text\""));
        assert!(json.contains("\"text\":\"hello\""));
        assert!(json.contains("\"remote_peer\":\"49155\""));
    }

    #[test]
    fn raw_event_serializes_with_tag() {
        let event = SessionEvent::Raw {
            payload: "[\"presence\",\"available\"]".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"raw\""));
        assert!(json.contains("presence"));
    }

    #[test]
    fn event_roundtrip() {
        let event = SessionEvent::Image(MediaMessage {
            info: MessageInfo::inbound(PeerId::new("49155")),
            mime_type: "image/jpeg".into(),
            caption: Some("holiday".into()),
        });
        let json = serde_json::to_string(&event).unwrap();
        let parsed: SessionEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.event_type(), "image");
    }

    #[test]
    fn event_type_labels() {
        assert_eq!(
            SessionEvent::Error { message: "eof".into() }.event_type(),
            "error"
        );
        assert_eq!(
            SessionEvent::Raw { payload: "{}".into() }.event_type(),
            "raw"
        );
    }

    #[test]
    fn inbound_and_outbound_direction() {
        let inbound = MessageInfo::inbound(PeerId::new("1"));
        let outbound = MessageInfo::outbound(PeerId::new("1"));
        assert!(!inbound.from_me);
        assert!(outbound.from_me);
    }
}
