use std::path::Path;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;

use crate::auth::middleware::Claims;
use crate::error::AuthError;

/// Access token lifetime when none is configured (24 hours).
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 86400;

/// Load or generate the JWT signing key (256-bit random secret).
/// Key is stored as raw bytes in data_dir/jwt_secret.
pub fn load_or_generate_jwt_secret(data_dir: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(data_dir)?;
    let key_path = Path::new(data_dir).join("jwt_secret");

    if key_path.exists() {
        let key = std::fs::read(&key_path)?;
        if key.len() == 32 {
            tracing::info!("JWT signing key loaded from {}", key_path.display());
            return Ok(key);
        }
        tracing::warn!("JWT key file has wrong size ({}), regenerating", key.len());
    }

    let key: [u8; 32] = rand::rng().random();
    std::fs::write(&key_path, key)?;
    tracing::info!("JWT signing key generated at {}", key_path.display());
    Ok(key.to_vec())
}

/// Use the configured shared secret when present, otherwise the key in data_dir.
pub fn resolve_jwt_secret(
    configured: Option<&str>,
    data_dir: &str,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    match configured {
        Some(secret) if !secret.is_empty() => Ok(secret.as_bytes().to_vec()),
        _ => load_or_generate_jwt_secret(data_dir),
    }
}

/// Issue an HS256 access token for a user.
/// Claims: sub=username, userId, username, iat, exp
pub fn issue_access_token(
    secret: &[u8],
    user_id: i64,
    username: &str,
    ttl_secs: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: username.to_string(),
        user_id,
        username: username.to_string(),
        iat: now,
        exp: now + ttl_secs,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
}

/// Validate an access token and return its claims.
pub fn validate_access_token(secret: &[u8], token: &str) -> Result<Claims, AuthError> {
    let validation = Validation::new(Algorithm::HS256);
    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)?;
    Ok(token_data.claims)
}

/// Identity resolved from a valid bearer credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
}

/// Stateless token verifier for chat connections.
///
/// Checks signature and expiry against the shared secret; never touches the
/// database or the connection directory.
#[derive(Clone)]
pub struct Authenticator {
    secret: Vec<u8>,
}

impl Authenticator {
    pub fn new(secret: Vec<u8>) -> Self {
        Self { secret }
    }

    pub fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = validate_access_token(&self.secret, token)?;
        Ok(Identity {
            user_id: claims.user_id,
            username: claims.username,
        })
    }
}
