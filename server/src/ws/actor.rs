use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::ws::session::Session;
use crate::ws::{ConnectionHandle, Relay};

/// Close code sent when a frame cannot be persisted (RFC 6455 internal error).
const CLOSE_INTERNAL_ERROR: u16 = 1011;

/// How long the writer may keep flushing queued frames after the reader stops.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Run one chat connection from open to close.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader loop: feeds text frames to the session state machine
///
/// The connection starts unauthenticated and is only put in the directory
/// once an auth frame succeeds. Whatever ends the reader loop, the session
/// is closed exactly once, which releases its directory entry.
pub async fn run_connection(socket: WebSocket, relay: Relay, keepalive: RelayConfig) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (conn, rx) = ConnectionHandle::channel();
    let session_id = conn.session_id();
    let mut session = Session::new(conn.clone());

    tracing::info!(session_id = %session_id, "WebSocket connection opened");

    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    let (pong_tx, pong_rx) = mpsc::unbounded_channel::<()>();
    let mut ping_handle = tokio::spawn(ping_task(conn.clone(), pong_rx, keepalive));

    loop {
        let next = tokio::select! {
            next = ws_receiver.next() => next,
            _ = &mut ping_handle => {
                tracing::info!(session_id = %session_id, "Keepalive stopped, ending connection");
                break;
            }
        };

        match next {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    if let Err(err) = session.handle_text(text.as_str(), &relay).await {
                        if err.is_fatal() {
                            tracing::error!(
                                session_id = %session_id,
                                user_id = ?session.bound_user(),
                                error = %err,
                                "Closing connection after fatal relay error"
                            );
                            conn.close(CLOSE_INTERNAL_ERROR, "Message could not be stored");
                            break;
                        }
                        log_recoverable(&session_id, &session, &err);
                    }
                }
                Message::Binary(data) => {
                    tracing::debug!(
                        session_id = %session_id,
                        bytes = data.len(),
                        "Ignoring binary frame"
                    );
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = conn.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(
                        session_id = %session_id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    session_id = %session_id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                tracing::info!(session_id = %session_id, "WebSocket stream ended");
                break;
            }
        }
    }

    ping_handle.abort();

    let user_id = session.bound_user();
    session.close(&relay);
    drop(session);
    drop(conn);

    // Every sender is gone now, so the writer stops after flushing the queue.
    let writer_abort = writer_handle.abort_handle();
    if timeout(WRITER_DRAIN_TIMEOUT, writer_handle).await.is_err() {
        writer_abort.abort();
    }

    tracing::info!(
        session_id = %session_id,
        user_id = ?user_id,
        "WebSocket connection closed"
    );
}

fn log_recoverable(session_id: &Uuid, session: &Session, err: &RelayError) {
    match err {
        RelayError::InvalidCredential(_) => {
            tracing::warn!(session_id = %session_id, error = %err, "Chat authentication rejected");
        }
        RelayError::MalformedFrame(_) => {
            tracing::debug!(
                session_id = %session_id,
                user_id = ?session.bound_user(),
                error = %err,
                "Ignoring malformed frame"
            );
        }
        _ => {
            tracing::warn!(
                session_id = %session_id,
                user_id = ?session.bound_user(),
                error = %err,
                "Relay error"
            );
        }
    }
}

/// Writer task: receives messages from mpsc channel and forwards them to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let is_close = matches!(msg, Message::Close(_));
        if ws_sender.send(msg).await.is_err() || is_close {
            break;
        }
    }
}

/// Ping task: sends periodic pings and closes the connection when a pong
/// does not arrive in time. Returning ends the reader loop as well.
async fn ping_task(
    conn: ConnectionHandle,
    mut pong_rx: mpsc::UnboundedReceiver<()>,
    keepalive: RelayConfig,
) {
    let mut ping_timer = interval(Duration::from_secs(keepalive.ping_interval_secs.max(1)));
    let pong_timeout = Duration::from_secs(keepalive.pong_timeout_secs.max(1));
    // Skip the first immediate tick
    ping_timer.tick().await;

    loop {
        ping_timer.tick().await;

        if conn.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
            // Writer task has died, connection is gone
            break;
        }

        match timeout(pong_timeout, pong_rx.recv()).await {
            Ok(Some(())) => {}
            _ => {
                tracing::warn!(session_id = %conn.session_id(), "Pong timeout, closing connection");
                conn.close(1001, "Pong timeout");
                break;
            }
        }
    }
}
