use axum::{extract::State, Json};
use serde::Serialize;

use crate::auth::middleware::Claims;
use crate::db::models::ConversationSummary;
use crate::dm::store;
use crate::dm::with_conn;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub user_id: i64,
    pub username: Option<String>,
    pub nickname: Option<String>,
    pub last_message: String,
    pub last_message_time: String,
    pub unread_count: i64,
}

impl From<ConversationSummary> for ConversationResponse {
    fn from(summary: ConversationSummary) -> Self {
        Self {
            user_id: summary.peer_id,
            username: summary.peer_username,
            nickname: summary.peer_nickname,
            last_message: summary.last_message,
            last_message_time: summary.last_message_at,
            unread_count: summary.unread_count,
        }
    }
}

/// GET /api/messages/conversations -- Latest message per peer, newest first.
pub async fn list_conversations(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<Vec<ConversationResponse>>, ApiError> {
    let user_id = claims.user_id;
    let summaries = with_conn(&state.db, move |conn| store::conversations(conn, user_id)).await?;
    Ok(Json(
        summaries.into_iter().map(ConversationResponse::from).collect(),
    ))
}
