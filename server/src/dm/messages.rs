//! REST endpoints for sending and reading direct messages.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::Claims;
use crate::db::models::{Message, MessageKind};
use crate::dm::store::{self, NewMessage};
use crate::dm::with_conn;
use crate::error::ApiError;
use crate::state::AppState;
use crate::ws::protocol::user_id_lenient;
use crate::ws::relay::Delivery;

/// Default page size for message history.
const DEFAULT_SIZE: u32 = 50;
/// Maximum page size for message history.
const MAX_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(deserialize_with = "user_id_lenient")]
    pub receiver_id: i64,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    /// JSON array of media URLs for image/video messages
    pub media_urls: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub media_urls: Option<String>,
    pub is_read: bool,
    pub create_time: String,
}

impl From<Message> for MessageResponse {
    fn from(msg: Message) -> Self {
        Self {
            id: msg.id,
            sender_id: msg.sender_id,
            receiver_id: msg.receiver_id,
            content: msg.content,
            kind: msg.kind,
            media_urls: msg.media_urls,
            is_read: msg.is_read,
            create_time: msg.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

/// POST /api/messages/send -- Persist a message and push it to the receiver if online.
pub async fn send_message(
    State(state): State<AppState>,
    claims: Claims,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    if body.content.trim().is_empty() && body.media_urls.is_none() {
        return Err(ApiError::BadRequest(
            "content or mediaUrls is required".to_string(),
        ));
    }

    let new_message = NewMessage {
        sender_id: claims.user_id,
        receiver_id: body.receiver_id,
        content: body.content,
        kind: body.kind,
        media_urls: body.media_urls,
    };

    let stored = with_conn(&state.db, move |conn| store::insert_message(conn, &new_message)).await?;

    match state.relay.deliver(&stored) {
        Ok(Delivery::Delivered) => {
            tracing::debug!(message_id = stored.id, "REST message delivered live");
        }
        Ok(Delivery::Offline) => {}
        Err(e) => {
            tracing::warn!(message_id = stored.id, error = %e, "REST message dispatch failed");
        }
    }

    Ok((StatusCode::CREATED, Json(stored.into())))
}

/// GET /api/messages/history/{other_user_id}?page={n}&size={n}
/// Newest first. Messages from the other user to the caller are marked read
/// after the page is fetched.
pub async fn get_history(
    State(state): State<AppState>,
    claims: Claims,
    Path(other_user_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    let user_id = claims.user_id;
    let page = query.page.unwrap_or(1).max(1);
    let size = query.size.unwrap_or(DEFAULT_SIZE).clamp(1, MAX_SIZE);

    let messages = with_conn(&state.db, move |conn| {
        let messages = store::chat_history(conn, user_id, other_user_id, page, size)?;
        store::mark_read(conn, other_user_id, user_id)?;
        Ok(messages)
    })
    .await?;

    Ok(Json(messages.into_iter().map(MessageResponse::from).collect()))
}

/// GET /api/messages/unread/count -- Bare integer body.
pub async fn get_unread_count(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<i64>, ApiError> {
    let user_id = claims.user_id;
    let count = with_conn(&state.db, move |conn| store::unread_count(conn, user_id)).await?;
    Ok(Json(count))
}
