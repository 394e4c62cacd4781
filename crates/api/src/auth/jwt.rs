//! Bearer credentials.
//!
//! An access token is an HS256 JWT over [`Claims`], issued and verified by
//! [`JwtConfig`]. A [`RefreshToken`] is a random UUID handed to the client
//! once; the database keeps only its SHA-256 hex digest.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use triggerflow_core::types::DbId;
use uuid::Uuid;

/// Shortest `JWT_SECRET` accepted, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id.
    pub sub: DbId,
    pub is_superuser: bool,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expiry_mins: i64,
    pub refresh_token_expiry_days: i64,
}

impl JwtConfig {
    /// | Env Var                   | Default               |
    /// |---------------------------|-----------------------|
    /// | `JWT_SECRET`              | required, >= 32 bytes |
    /// | `JWT_ACCESS_EXPIRY_MINS`  | `15`                  |
    /// | `JWT_REFRESH_EXPIRY_DAYS` | `7`                   |
    ///
    /// Panics on a missing or invalid value.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok()).unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or("JWT_SECRET must be set")?;
        if secret.len() < MIN_SECRET_LEN {
            return Err(format!("JWT_SECRET must be at least {MIN_SECRET_LEN} bytes"));
        }

        Ok(Self {
            secret,
            access_token_expiry_mins: positive(&lookup, "JWT_ACCESS_EXPIRY_MINS", 15)?,
            refresh_token_expiry_days: positive(&lookup, "JWT_REFRESH_EXPIRY_DAYS", 7)?,
        })
    }

    /// Access token lifetime, reported to clients as `expires_in`.
    pub fn access_ttl_secs(&self) -> i64 {
        self.access_token_expiry_mins * 60
    }

    pub fn refresh_expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(self.refresh_token_expiry_days)
    }

    pub fn issue_access_token(
        &self,
        user_id: DbId,
        is_superuser: bool,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id,
            is_superuser,
            exp: now + self.access_ttl_secs(),
            iat: now,
            jti: Uuid::new_v4().to_string(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
    }

    /// Signature, algorithm and expiry are checked.
    pub fn verify_access_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
    }
}

fn positive<F>(lookup: &F, name: &str, default: i64) -> Result<i64, String>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name).filter(|v| !v.trim().is_empty()) else {
        return Ok(default);
    };
    match raw.trim().parse::<i64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(format!("{name} must be a positive integer, got '{raw}'")),
    }
}

/// Refresh token as issued: `plaintext` goes to the client, `hash` to the
/// database.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub plaintext: String,
    pub hash: String,
}

impl RefreshToken {
    pub fn generate() -> Self {
        let plaintext = Uuid::new_v4().to_string();
        let hash = Self::hash(&plaintext);
        Self { plaintext, hash }
    }

    /// Digest under which a presented token is looked up.
    pub fn hash(token: &str) -> String {
        format!("{:x}", Sha256::digest(token.as_bytes()))
    }
}
