pub mod actor;
pub mod directory;
pub mod handler;
pub mod protocol;
pub mod relay;
pub mod session;

use axum::extract::ws::{CloseFrame, Message};
use tokio::sync::mpsc;
use uuid::Uuid;

use protocol::OutboundFrame;

pub use directory::ConnectionDirectory;
pub use relay::Relay;

/// Type alias for the sender half of a WebSocket connection's channel.
pub type ConnectionSender = mpsc::UnboundedSender<Message>;

/// Handle to one live chat connection.
///
/// Cloning is cheap. The socket itself is owned by the connection actor; a
/// handle only feeds the actor's writer task, so the connection counts as
/// open while that task still holds the receiving end.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    session_id: Uuid,
    tx: ConnectionSender,
}

impl ConnectionHandle {
    pub fn new(tx: ConnectionSender) -> Self {
        Self {
            session_id: Uuid::now_v7(),
            tx,
        }
    }

    /// Create a handle together with the receiver its writer should drain.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queue a raw WebSocket message. Fails once the writer has gone away.
    pub fn send(&self, msg: Message) -> Result<(), mpsc::error::SendError<Message>> {
        self.tx.send(msg)
    }

    /// Serialize and queue a JSON frame.
    pub fn send_frame(&self, frame: &OutboundFrame) -> Result<(), mpsc::error::SendError<Message>> {
        self.send(frame.to_ws_message())
    }

    /// Ask the writer to send a Close frame.
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })));
    }
}
