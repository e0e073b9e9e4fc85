//! Database row types.
//! These correspond 1:1 to the SQLite schema defined in migrations.rs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Media kind of a direct message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    Video,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Video => "video",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MessageKind::Text),
            "image" => Ok(MessageKind::Image),
            "video" => Ok(MessageKind::Video),
            other => Err(format!("unknown message kind: {}", other)),
        }
    }
}

/// Row in the messages table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub kind: MessageKind,
    /// JSON array of media URLs for image/video messages
    pub media_urls: Option<String>,
    pub is_read: bool,
    /// RFC 3339, UTC, millisecond precision; assigned at insert
    pub created_at: String,
    pub deleted: bool,
}

/// Per-peer summary for the conversation list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub peer_id: i64,
    pub last_message: String,
    pub last_message_at: String,
    pub unread_count: i64,
    pub peer_username: Option<String>,
    pub peer_nickname: Option<String>,
}

/// Row in the users table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Argon2id PHC string
    pub password_hash: String,
    pub email: Option<String>,
    pub nickname: Option<String>,
    pub created_at: String,
}
