use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
};

use crate::state::AppState;
use crate::ws::actor;

/// GET /ws
/// WebSocket upgrade endpoint. Authentication happens in-band: the client
/// sends `{"type":"auth","token":...}` after the upgrade.
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let relay = state.relay.clone();
    let keepalive = state.keepalive.clone();
    ws.on_upgrade(move |socket| actor::run_connection(socket, relay, keepalive))
}
