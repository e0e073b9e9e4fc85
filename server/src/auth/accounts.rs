//! Account registration and password login. Both mint the bearer token the
//! REST extractor and the chat relay accept.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::auth::{jwt, password};
use crate::db::models::User;
use crate::dm::with_conn;
use crate::error::{ApiError, StoreError};
use crate::state::AppState;

// --- Request/Response types for JSON API ---

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub nickname: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub nickname: Option<String>,
    pub create_time: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            nickname: user.nickname,
            create_time: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

// --- Storage ---

const USER_COLUMNS: &str = "id, username, password_hash, email, nickname, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        email: row.get(3)?,
        nickname: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn find_by_username(conn: &Connection, username: &str) -> Result<Option<User>, StoreError> {
    let sql = format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS);
    let user = conn
        .query_row(&sql, params![username], user_from_row)
        .optional()?;
    Ok(user)
}

/// Why a registration was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Taken {
    Username,
    Email,
}

/// Insert a new account unless the username or email is already in use.
/// Both checks and the insert run under the caller's connection lock.
pub fn create_user(
    conn: &Connection,
    username: &str,
    password_hash: &str,
    email: Option<&str>,
    nickname: Option<&str>,
) -> Result<Result<User, Taken>, StoreError> {
    if find_by_username(conn, username)?.is_some() {
        return Ok(Err(Taken::Username));
    }
    if let Some(email) = email {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
            params![email],
            |row| row.get(0),
        )?;
        if exists {
            return Ok(Err(Taken::Email));
        }
    }

    let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    conn.execute(
        "INSERT INTO users (username, password_hash, email, nickname, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![username, password_hash, email, nickname, created_at],
    )?;

    Ok(Ok(User {
        id: conn.last_insert_rowid(),
        username: username.to_string(),
        password_hash: password_hash.to_string(),
        email: email.map(str::to_string),
        nickname: nickname.map(str::to_string),
        created_at,
    }))
}

// --- Handlers ---

fn mint_token(state: &AppState, user: &User) -> Result<String, ApiError> {
    jwt::issue_access_token(
        &state.jwt_secret,
        user.id,
        &user.username,
        state.token_ttl_secs,
    )
    .map_err(|e| ApiError::Internal(format!("token signing failed: {}", e)))
}

/// POST /api/auth/register
/// Create an account and return a token for it. No auth required.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let username = req.username.trim().to_string();
    if username.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "username and password are required".to_string(),
        ));
    }

    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(StoreError::from)?
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))?;

    let email = req.email.filter(|e| !e.trim().is_empty());
    let nickname = req.nickname;
    let created = with_conn(&state.db, move |conn| {
        create_user(
            conn,
            &username,
            &password_hash,
            email.as_deref(),
            nickname.as_deref(),
        )
    })
    .await?;

    let user = match created {
        Ok(user) => user,
        Err(Taken::Username) => {
            return Err(ApiError::Conflict("username already exists".to_string()))
        }
        Err(Taken::Email) => {
            return Err(ApiError::Conflict("email already registered".to_string()))
        }
    };

    tracing::info!(user_id = user.id, username = %user.username, "Account registered");

    let token = mint_token(&state, &user)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

/// POST /api/auth/login
/// Verify username and password, then return a fresh token. No auth required.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let username = req.username.trim().to_string();
    let user = with_conn(&state.db, move |conn| find_by_username(conn, &username)).await?;

    // Unknown user and wrong password are indistinguishable to the caller
    let Some(user) = user else {
        return Err(ApiError::Unauthorized);
    };

    let password = req.password;
    let stored = user.password_hash.clone();
    let verified =
        tokio::task::spawn_blocking(move || password::verify_password(&password, &stored))
            .await
            .map_err(StoreError::from)?;
    if !verified {
        tracing::debug!(user_id = user.id, "Login rejected");
        return Err(ApiError::Unauthorized);
    }

    let token = mint_token(&state, &user)?;
    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}
