use chrono::Utc;
use std::sync::Arc;

use crate::auth::jwt::Authenticator;
use crate::db::models::Message;
use crate::dm::store::{MessageStore, NewMessage};
use crate::error::{RelayError, StoreError};

use super::protocol::OutboundFrame;
use super::ConnectionDirectory;

/// What happened when a stored message was pushed to its receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// No live connection for the receiver; the message waits in history.
    Offline,
}

/// Collaborators shared by every chat connection.
#[derive(Clone)]
pub struct Relay {
    directory: ConnectionDirectory,
    authenticator: Authenticator,
    store: Arc<dyn MessageStore>,
}

impl Relay {
    pub fn new(
        directory: ConnectionDirectory,
        authenticator: Authenticator,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            directory,
            authenticator,
            store,
        }
    }

    pub fn directory(&self) -> &ConnectionDirectory {
        &self.directory
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    /// Persist a message on the blocking pool.
    pub async fn persist(&self, message: NewMessage) -> Result<Message, StoreError> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.insert(&message)).await?
    }

    /// Push a stored message to its receiver if they have a live connection.
    ///
    /// The directory entry is cloned out before sending, so no directory
    /// lock is held during dispatch.
    pub fn deliver(&self, message: &Message) -> Result<Delivery, RelayError> {
        let receiver = match self.directory.lookup(message.receiver_id) {
            Some(conn) if conn.is_open() => conn,
            _ => return Ok(Delivery::Offline),
        };

        let frame = OutboundFrame::Message {
            id: message.id,
            sender_id: message.sender_id,
            content: message.content.clone(),
            timestamp: Utc::now().timestamp_millis(),
        };

        receiver
            .send_frame(&frame)
            .map(|_| Delivery::Delivered)
            .map_err(|_| RelayError::Dispatch {
                user_id: message.receiver_id,
            })
    }
}
