use std::sync::Arc;

use crate::auth::jwt::{Authenticator, DEFAULT_TOKEN_TTL_SECS};
use crate::config::RelayConfig;
use crate::db::DbPool;
use crate::dm::store::{MessageStore, SqliteMessageStore};
use crate::ws::{ConnectionDirectory, Relay};

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// HS256 secret shared by the REST extractor and the chat authenticator
    pub jwt_secret: Vec<u8>,
    /// Lifetime of tokens minted by login and register
    pub token_ttl_secs: i64,
    /// Chat relay: connection directory, authenticator and message store
    pub relay: Relay,
    /// Ping/pong settings for chat connections
    pub keepalive: RelayConfig,
}

impl AppState {
    /// Wire the relay to the SQLite store and a fresh connection directory.
    pub fn new(db: DbPool, jwt_secret: Vec<u8>, keepalive: RelayConfig) -> Self {
        let store = Arc::new(SqliteMessageStore::new(db.clone()));
        Self::with_store(db, jwt_secret, keepalive, store)
    }

    /// Same as [`AppState::new`] but the relay persists through `store`.
    pub fn with_store(
        db: DbPool,
        jwt_secret: Vec<u8>,
        keepalive: RelayConfig,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        let relay = Relay::new(
            ConnectionDirectory::new(),
            Authenticator::new(jwt_secret.clone()),
            store,
        );
        Self {
            db,
            jwt_secret,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            relay,
            keepalive,
        }
    }

    pub fn with_token_ttl(mut self, token_ttl_secs: i64) -> Self {
        self.token_ttl_secs = token_ttl_secs;
        self
    }
}
