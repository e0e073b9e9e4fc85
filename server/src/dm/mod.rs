//! Direct messages: persistence plus the REST history endpoints.
//! Live delivery goes through the chat relay in `crate::ws`.

pub mod conversations;
pub mod messages;
pub mod store;

use rusqlite::Connection;

use crate::db::DbPool;
use crate::error::StoreError;

/// Run a store query on the blocking pool with the connection locked.
pub(crate) async fn with_conn<T, F>(db: &DbPool, f: F) -> Result<T, StoreError>
where
    F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let db = db.clone();
    tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&conn)
    })
    .await?
}
