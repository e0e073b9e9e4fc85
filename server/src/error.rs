use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failures raised while handling frames on a chat connection.
///
/// Only `Persistence` is fatal to the connection. The others are logged and
/// the connection keeps running.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid credential: {0}")]
    InvalidCredential(#[from] AuthError),

    #[error("failed to persist message: {0}")]
    Persistence(#[from] StoreError),

    #[error("failed to dispatch to user {user_id}")]
    Dispatch { user_id: i64 },

    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),
}

impl RelayError {
    /// Whether the connection that produced this error must be closed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RelayError::Persistence(_))
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token expired")]
    Expired,

    #[error("token rejected: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::Invalid(err),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Errors returned by the REST endpoints.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::Store(err) => {
                tracing::error!(error = %err, "Message store failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
