use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::ConnectionHandle;

/// Directory of authenticated chat connections: user id -> live connection.
///
/// At most one entry per user. Binding again replaces the previous entry
/// without closing it. All operations are total and never hold a shard lock
/// beyond the call, so callers can dispatch to a looked-up handle freely.
#[derive(Clone, Default)]
pub struct ConnectionDirectory {
    entries: Arc<DashMap<i64, ConnectionHandle>>,
}

impl ConnectionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `user_id`, returning the superseded handle.
    pub fn bind(&self, user_id: i64, connection: ConnectionHandle) -> Option<ConnectionHandle> {
        let previous = self.entries.insert(user_id, connection);
        tracing::debug!(
            user_id = user_id,
            connections = self.entries.len(),
            "Connection bound"
        );
        previous
    }

    pub fn lookup(&self, user_id: i64) -> Option<ConnectionHandle> {
        self.entries.get(&user_id).map(|entry| entry.value().clone())
    }

    /// Remove the entry for `user_id` only if it still belongs to `session_id`.
    /// Returns whether an entry was removed.
    pub fn unbind(&self, user_id: i64, session_id: Uuid) -> bool {
        let removed = self
            .entries
            .remove_if(&user_id, |_, conn| conn.session_id() == session_id)
            .is_some();
        tracing::debug!(user_id = user_id, removed = removed, "Connection unbound");
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
