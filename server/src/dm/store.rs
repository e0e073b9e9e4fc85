//! Message persistence and history queries.
//!
//! Every function takes a plain `&Connection` so callers decide how the lock
//! is held. Async callers go through `tokio::task::spawn_blocking`.

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, Row};

use crate::db::models::{ConversationSummary, Message, MessageKind};
use crate::db::DbPool;
use crate::error::StoreError;

/// A message about to be persisted.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub kind: MessageKind,
    pub media_urls: Option<String>,
}

impl NewMessage {
    pub fn text(sender_id: i64, receiver_id: i64, content: impl Into<String>) -> Self {
        Self {
            sender_id,
            receiver_id,
            content: content.into(),
            kind: MessageKind::Text,
            media_urls: None,
        }
    }
}

/// Persistence collaborator used by the chat relay.
///
/// Implementations are blocking; the relay calls them from `spawn_blocking`.
pub trait MessageStore: Send + Sync + 'static {
    fn insert(&self, message: &NewMessage) -> Result<Message, StoreError>;
}

/// `MessageStore` backed by the shared SQLite connection.
#[derive(Clone)]
pub struct SqliteMessageStore {
    db: DbPool,
}

impl SqliteMessageStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

impl MessageStore for SqliteMessageStore {
    fn insert(&self, message: &NewMessage) -> Result<Message, StoreError> {
        let conn = self.db.lock().map_err(|_| StoreError::LockPoisoned)?;
        insert_message(&conn, message)
    }
}

const MESSAGE_COLUMNS: &str =
    "id, sender_id, receiver_id, content, kind, media_urls, is_read, created_at, deleted";

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let kind: String = row.get(4)?;
    Ok(Message {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        content: row.get(3)?,
        // CHECK constraint limits kind to known values
        kind: kind.parse().unwrap_or_default(),
        media_urls: row.get(5)?,
        is_read: row.get(6)?,
        created_at: row.get(7)?,
        deleted: row.get(8)?,
    })
}

/// Insert a message as unread and return the stored row.
pub fn insert_message(conn: &Connection, message: &NewMessage) -> Result<Message, StoreError> {
    let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

    conn.execute(
        "INSERT INTO messages (sender_id, receiver_id, content, kind, media_urls, is_read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        params![
            message.sender_id,
            message.receiver_id,
            message.content,
            message.kind.as_str(),
            message.media_urls,
            created_at,
        ],
    )?;

    Ok(Message {
        id: conn.last_insert_rowid(),
        sender_id: message.sender_id,
        receiver_id: message.receiver_id,
        content: message.content.clone(),
        kind: message.kind,
        media_urls: message.media_urls.clone(),
        is_read: false,
        created_at,
        deleted: false,
    })
}

/// Messages exchanged between two users, newest first.
/// `page` is 1-based; pages below 1 are treated as 1.
pub fn chat_history(
    conn: &Connection,
    user_a: i64,
    user_b: i64,
    page: u32,
    size: u32,
) -> Result<Vec<Message>, StoreError> {
    let offset = (page.max(1) - 1) as i64 * size as i64;
    let sql = format!(
        "SELECT {} FROM messages
         WHERE deleted = 0
           AND ((sender_id = ?1 AND receiver_id = ?2) OR (sender_id = ?2 AND receiver_id = ?1))
         ORDER BY created_at DESC, id DESC
         LIMIT ?3 OFFSET ?4",
        MESSAGE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let messages = stmt
        .query_map(
            params![user_a, user_b, size as i64, offset],
            message_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(messages)
}

/// Mark everything `sender_id` sent to `receiver_id` as read.
/// Returns the number of messages updated.
pub fn mark_read(conn: &Connection, sender_id: i64, receiver_id: i64) -> Result<usize, StoreError> {
    let updated = conn.execute(
        "UPDATE messages SET is_read = 1
         WHERE sender_id = ?1 AND receiver_id = ?2 AND is_read = 0 AND deleted = 0",
        params![sender_id, receiver_id],
    )?;
    Ok(updated)
}

/// Unread messages addressed to `receiver_id`.
pub fn unread_count(conn: &Connection, receiver_id: i64) -> Result<i64, StoreError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE receiver_id = ?1 AND is_read = 0 AND deleted = 0",
        params![receiver_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// One summary per peer the user has exchanged messages with, newest first.
/// Peer profile fields are filled when the peer has an account.
pub fn conversations(conn: &Connection, user_id: i64) -> Result<Vec<ConversationSummary>, StoreError> {
    let mut stmt = conn.prepare(
        "WITH exchanged AS (
             SELECT id, content, created_at,
                    CASE WHEN sender_id = ?1 THEN receiver_id ELSE sender_id END AS peer_id,
                    CASE WHEN receiver_id = ?1 AND is_read = 0 THEN 1 ELSE 0 END AS unread
             FROM messages
             WHERE deleted = 0 AND (sender_id = ?1 OR receiver_id = ?1)
         ),
         ranked AS (
             SELECT peer_id, id, content, created_at,
                    ROW_NUMBER() OVER (PARTITION BY peer_id ORDER BY created_at DESC, id DESC) AS rn,
                    SUM(unread) OVER (PARTITION BY peer_id) AS unread_count
             FROM exchanged
         )
         SELECT r.peer_id, r.content, r.created_at, r.unread_count, u.username, u.nickname
         FROM ranked r
         LEFT JOIN users u ON u.id = r.peer_id
         WHERE r.rn = 1
         ORDER BY r.created_at DESC, r.id DESC",
    )?;

    let summaries = stmt
        .query_map(params![user_id], |row| {
            Ok(ConversationSummary {
                peer_id: row.get(0)?,
                last_message: row.get(1)?,
                last_message_at: row.get(2)?,
                unread_count: row.get(3)?,
                peer_username: row.get(4)?,
                peer_nickname: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(summaries)
}
