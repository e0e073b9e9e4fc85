//! JSON frames exchanged over the chat WebSocket.
//!
//! Inbound text is parsed once into [`InboundFrame`]; anything with an
//! unrecognized `type` becomes [`InboundFrame::Unknown`]. Payloads that are
//! not JSON, lack `type`, or miss a required field fail to parse.

use axum::extract::ws::Message;
use serde::{de, Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum InboundFrame {
    #[serde(rename = "auth")]
    Auth { token: String },

    #[serde(rename = "message")]
    Chat {
        #[serde(rename = "receiverId", deserialize_with = "user_id_lenient")]
        receiver_id: i64,
        content: String,
    },

    #[serde(other)]
    Unknown,
}

impl InboundFrame {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UserIdRepr {
    Number(i64),
    Text(String),
}

/// Accept a user id given either as a JSON integer or a numeric string.
pub fn user_id_lenient<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match UserIdRepr::deserialize(deserializer)? {
        UserIdRepr::Number(id) => Ok(id),
        UserIdRepr::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid user id: {:?}", text))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum OutboundFrame {
    #[serde(rename = "auth_success")]
    AuthSuccess { message: String },

    /// Delivery to the receiving user
    #[serde(rename = "message")]
    Message {
        id: i64,
        #[serde(rename = "senderId")]
        sender_id: i64,
        content: String,
        /// Epoch millis at dispatch
        timestamp: i64,
    },

    /// Acknowledgement to the sender once the message is stored
    #[serde(rename = "message_sent")]
    MessageSent {
        #[serde(rename = "messageId")]
        message_id: i64,
    },
}

impl OutboundFrame {
    pub fn to_json(&self) -> String {
        // Only integers and strings: serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn to_ws_message(&self) -> Message {
        Message::Text(self.to_json().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn parses_auth_frame() {
        let frame = InboundFrame::parse(r#"{"type":"auth","token":"abc"}"#).unwrap();
        assert_eq!(
            frame,
            InboundFrame::Auth {
                token: "abc".to_string()
            }
        );
    }

    #[test]
    fn chat_frame_accepts_numeric_or_string_receiver() {
        let numeric =
            InboundFrame::parse(r#"{"type":"message","receiverId":7,"content":"hi"}"#).unwrap();
        let string =
            InboundFrame::parse(r#"{"type":"message","receiverId":"7","content":"hi"}"#).unwrap();

        let expected = InboundFrame::Chat {
            receiver_id: 7,
            content: "hi".to_string(),
        };
        assert_eq!(numeric, expected);
        assert_eq!(string, expected);
    }

    #[test]
    fn unknown_type_is_not_an_error() {
        let frame = InboundFrame::parse(r#"{"type":"typing","to":3}"#).unwrap();
        assert_eq!(frame, InboundFrame::Unknown);
    }

    #[test]
    fn malformed_payloads_fail_to_parse() {
        assert!(InboundFrame::parse("not json").is_err());
        assert!(InboundFrame::parse(r#"{"token":"abc"}"#).is_err());
        assert!(InboundFrame::parse(r#"{"type":"auth"}"#).is_err());
        assert!(InboundFrame::parse(r#"{"type":"message","receiverId":"bob","content":"x"}"#).is_err());
        assert!(InboundFrame::parse(r#"{"type":"message","receiverId":2}"#).is_err());
    }

    #[test]
    fn outbound_frames_use_wire_field_names() {
        let delivery: Value = serde_json::from_str(
            &OutboundFrame::Message {
                id: 10,
                sender_id: 1,
                content: "hi".to_string(),
                timestamp: 1_700_000_000_000,
            }
            .to_json(),
        )
        .unwrap();
        assert_eq!(
            delivery,
            json!({
                "type": "message",
                "id": 10,
                "senderId": 1,
                "content": "hi",
                "timestamp": 1_700_000_000_000i64,
            })
        );

        let ack: Value =
            serde_json::from_str(&OutboundFrame::MessageSent { message_id: 10 }.to_json()).unwrap();
        assert_eq!(ack, json!({"type": "message_sent", "messageId": 10}));

        let auth: Value = serde_json::from_str(
            &OutboundFrame::AuthSuccess {
                message: "ok".to_string(),
            }
            .to_json(),
        )
        .unwrap();
        assert_eq!(auth["type"], "auth_success");
    }
}
