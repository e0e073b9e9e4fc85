//! Per-connection chat protocol state machine.
//!
//! `Unauthenticated -> Authenticated -> Closed`. Frames are handled one at a
//! time by the owning connection actor; no state is shared between sessions
//! except through the [`ConnectionDirectory`](super::ConnectionDirectory).

use crate::auth::jwt::Identity;
use crate::dm::store::NewMessage;
use crate::error::RelayError;

use super::protocol::{InboundFrame, OutboundFrame};
use super::relay::{Delivery, Relay};
use super::ConnectionHandle;

const AUTH_SUCCESS_MESSAGE: &str = "Authentication successful";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated(Identity),
    Closed,
}

pub struct Session {
    conn: ConnectionHandle,
    state: SessionState,
}

impl Session {
    pub fn new(conn: ConnectionHandle) -> Self {
        Self {
            conn,
            state: SessionState::Unauthenticated,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn bound_user(&self) -> Option<i64> {
        match &self.state {
            SessionState::Authenticated(identity) => Some(identity.user_id),
            _ => None,
        }
    }

    /// Parse and handle one inbound text frame.
    pub async fn handle_text(&mut self, text: &str, relay: &Relay) -> Result<(), RelayError> {
        let frame = InboundFrame::parse(text)?;
        self.handle_frame(frame, relay).await
    }

    /// Advance the state machine by one frame.
    ///
    /// Errors other than [`RelayError::Persistence`] leave the session usable.
    pub async fn handle_frame(&mut self, frame: InboundFrame, relay: &Relay) -> Result<(), RelayError> {
        match frame {
            InboundFrame::Auth { token } => match &self.state {
                SessionState::Unauthenticated => self.authenticate(&token, relay),
                SessionState::Authenticated(identity) => {
                    tracing::debug!(
                        session_id = %self.conn.session_id(),
                        user_id = identity.user_id,
                        "Ignoring auth frame on authenticated connection"
                    );
                    Ok(())
                }
                SessionState::Closed => Ok(()),
            },
            InboundFrame::Chat {
                receiver_id,
                content,
            } => match self.bound_user() {
                Some(sender_id) => self.relay_chat(sender_id, receiver_id, content, relay).await,
                None => {
                    tracing::debug!(
                        session_id = %self.conn.session_id(),
                        "Ignoring chat frame on unauthenticated connection"
                    );
                    Ok(())
                }
            },
            InboundFrame::Unknown => {
                tracing::debug!(session_id = %self.conn.session_id(), "Ignoring unknown frame type");
                Ok(())
            }
        }
    }

    fn authenticate(&mut self, token: &str, relay: &Relay) -> Result<(), RelayError> {
        let identity = relay.authenticator().authenticate(token)?;

        if let Some(previous) = relay.directory().bind(identity.user_id, self.conn.clone()) {
            if previous.session_id() != self.conn.session_id() {
                tracing::info!(
                    user_id = identity.user_id,
                    superseded = %previous.session_id(),
                    "Connection superseded by newer authentication"
                );
            }
        }

        tracing::info!(
            session_id = %self.conn.session_id(),
            user_id = identity.user_id,
            username = %identity.username,
            "Chat connection authenticated"
        );

        self.state = SessionState::Authenticated(identity);
        let _ = self.conn.send_frame(&OutboundFrame::AuthSuccess {
            message: AUTH_SUCCESS_MESSAGE.to_string(),
        });
        Ok(())
    }

    async fn relay_chat(
        &self,
        sender_id: i64,
        receiver_id: i64,
        content: String,
        relay: &Relay,
    ) -> Result<(), RelayError> {
        let stored = relay
            .persist(NewMessage::text(sender_id, receiver_id, content))
            .await?;

        match relay.deliver(&stored) {
            Ok(Delivery::Delivered) => {
                tracing::debug!(message_id = stored.id, receiver_id, "Message delivered");
            }
            Ok(Delivery::Offline) => {
                tracing::debug!(message_id = stored.id, receiver_id, "Receiver offline, message stored");
            }
            Err(e) => {
                tracing::warn!(message_id = stored.id, error = %e, "Message dispatch failed");
            }
        }

        let _ = self
            .conn
            .send_frame(&OutboundFrame::MessageSent { message_id: stored.id });
        Ok(())
    }

    /// Enter `Closed`, releasing the directory entry if this session owns it.
    /// Calling it again is a no-op.
    pub fn close(&mut self, relay: &Relay) {
        let previous = std::mem::replace(&mut self.state, SessionState::Closed);
        if let SessionState::Authenticated(identity) = previous {
            relay
                .directory()
                .unbind(identity.user_id, self.conn.session_id());
        }
    }
}
