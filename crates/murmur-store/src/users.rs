//! Credential store implementations.
//!
//! Tokens are opaque `mn_at_`-prefixed secrets handed to the client once and
//! stored only as SHA-256 hashes with an expiry. Verification is a hash
//! lookup plus expiry check; missing, malformed, and expired tokens are all
//! the same `Unauthorized` to the caller. Passwords are salted and hashed,
//! never stored or logged in the clear.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use murmur_core::defaults::{TOKEN_PREFIX, TOKEN_SECRET_LEN, TOKEN_TTL_SECS};
use murmur_core::{new_v7, CredentialStore, Error, Result, Session, User};

/// Generate a cryptographically secure random string.
pub fn generate_secret(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Hash a secret using SHA-256.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash a password with a fresh random salt.
///
/// Stored shape: `sha256:{salt}:{hash}`.
pub fn hash_password(password: &str) -> String {
    let salt = generate_secret(16);
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("sha256:{}:{}", salt, hex::encode(hasher.finalize()))
}

/// Verify a password against its stored salted hash.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, ':');
    let (Some("sha256"), Some(salt), Some(hash)) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize()) == hash
}

fn issue_token(ttl_secs: i64) -> (String, String, DateTime<Utc>) {
    let token = format!("{}{}", TOKEN_PREFIX, generate_secret(TOKEN_SECRET_LEN));
    let hash = hash_secret(&token);
    let expires_at = Utc::now() + Duration::seconds(ttl_secs);
    (token, hash, expires_at)
}

fn unauthorized() -> Error {
    // One message for missing/malformed/expired: the distinction must not
    // leak to the caller.
    Error::Unauthorized("invalid or expired token".into())
}

fn validate_credentials(username: &str, password: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(Error::Validation("username is required".into()));
    }
    if password.is_empty() {
        return Err(Error::Validation("password is required".into()));
    }
    Ok(())
}

// =============================================================================
// IN-MEMORY IMPLEMENTATION
// =============================================================================

struct StoredUser {
    id: Uuid,
    username: String,
    password_hash: String,
}

struct StoredToken {
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}

/// In-memory [`CredentialStore`] for tests and the server's memory mode.
pub struct MemoryCredentialStore {
    users: Mutex<Vec<StoredUser>>,
    tokens: Mutex<HashMap<String, StoredToken>>,
    ttl_secs: i64,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::with_ttl(TOKEN_TTL_SECS)
    }

    /// Override the token lifetime (tests use short or negative TTLs).
    pub fn with_ttl(ttl_secs: i64) -> Self {
        Self {
            users: Mutex::new(Vec::new()),
            tokens: Mutex::new(HashMap::new()),
            ttl_secs,
        }
    }

    fn issue_session(&self, user: User) -> Session {
        let (token, hash, expires_at) = issue_token(self.ttl_secs);
        self.tokens.lock().unwrap().insert(
            hash,
            StoredToken {
                user_id: user.id,
                expires_at,
            },
        );
        Session {
            user,
            token,
            expires_at,
        }
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn signup(&self, username: &str, password: &str) -> Result<Session> {
        validate_credentials(username, password)?;
        let user = {
            let mut users = self.users.lock().unwrap();
            if users.iter().any(|u| u.username == username) {
                return Err(Error::Validation("username already exists".into()));
            }
            let user = StoredUser {
                id: new_v7(),
                username: username.to_string(),
                password_hash: hash_password(password),
            };
            let public = User {
                id: user.id,
                username: user.username.clone(),
            };
            users.push(user);
            public
        };
        Ok(self.issue_session(user))
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<Session> {
        validate_credentials(username, password)?;
        let user = {
            let users = self.users.lock().unwrap();
            let stored = users
                .iter()
                .find(|u| u.username == username)
                .ok_or_else(|| Error::Unauthorized("invalid credentials".into()))?;
            if !verify_password(password, &stored.password_hash) {
                return Err(Error::Unauthorized("invalid credentials".into()));
            }
            User {
                id: stored.id,
                username: stored.username.clone(),
            }
        };
        Ok(self.issue_session(user))
    }

    async fn verify(&self, token: &str) -> Result<Uuid> {
        let hash = hash_secret(token);
        let tokens = self.tokens.lock().unwrap();
        let stored = tokens.get(&hash).ok_or_else(unauthorized)?;
        if stored.expires_at <= Utc::now() {
            return Err(unauthorized());
        }
        Ok(stored.user_id)
    }
}

// =============================================================================
// POSTGRESQL IMPLEMENTATION
// =============================================================================

/// PostgreSQL implementation of [`CredentialStore`].
pub struct PgCredentialStore {
    pool: PgPool,
    ttl_secs: i64,
}

impl PgCredentialStore {
    /// Create a new PgCredentialStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self::with_ttl(pool, TOKEN_TTL_SECS)
    }

    pub fn with_ttl(pool: PgPool, ttl_secs: i64) -> Self {
        Self { pool, ttl_secs }
    }

    async fn issue_session(&self, user: User) -> Result<Session> {
        let (token, hash, expires_at) = issue_token(self.ttl_secs);
        sqlx::query(
            "INSERT INTO access_token (token_hash, user_id, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(&hash)
        .bind(user.id)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(Session {
            user,
            token,
            expires_at,
        })
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn signup(&self, username: &str, password: &str) -> Result<Session> {
        validate_credentials(username, password)?;

        let existing = sqlx::query("SELECT 1 AS one FROM app_user WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        if existing.is_some() {
            return Err(Error::Validation("username already exists".into()));
        }

        let id = new_v7();
        sqlx::query("INSERT INTO app_user (id, username, password_hash) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(username)
            .bind(hash_password(password))
            .execute(&self.pool)
            .await?;

        self.issue_session(User {
            id,
            username: username.to_string(),
        })
        .await
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<Session> {
        validate_credentials(username, password)?;

        let row = sqlx::query("SELECT id, password_hash FROM app_user WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::Unauthorized("invalid credentials".into()))?;

        let password_hash: String = row.get("password_hash");
        if !verify_password(password, &password_hash) {
            return Err(Error::Unauthorized("invalid credentials".into()));
        }

        self.issue_session(User {
            id: row.get("id"),
            username: username.to_string(),
        })
        .await
    }

    async fn verify(&self, token: &str) -> Result<Uuid> {
        let row = sqlx::query(
            "SELECT user_id FROM access_token WHERE token_hash = $1 AND expires_at > now()",
        )
        .bind(hash_secret(token))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(unauthorized)?;

        Ok(row.get("user_id"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_round_trip() {
        let stored = hash_password("hunter2");
        assert!(stored.starts_with("sha256:"));
        assert!(verify_password("hunter2", &stored));
        assert!(!verify_password("hunter3", &stored));
    }

    #[test]
    fn test_password_hash_is_salted() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn test_verify_password_rejects_malformed_stored_value() {
        assert!(!verify_password("x", "not-a-hash"));
        assert!(!verify_password("x", "md5:a:b"));
    }

    #[tokio::test]
    async fn test_signup_then_verify() {
        let store = MemoryCredentialStore::new();
        let session = store.signup("ada", "pw").await.unwrap();
        assert!(session.token.starts_with(TOKEN_PREFIX));

        let user_id = store.verify(&session.token).await.unwrap();
        assert_eq!(user_id, session.user.id);
    }

    #[tokio::test]
    async fn test_signup_duplicate_username() {
        let store = MemoryCredentialStore::new();
        store.signup("ada", "pw").await.unwrap();
        let err = store.signup("ada", "other").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_authenticate_wrong_password() {
        let store = MemoryCredentialStore::new();
        store.signup("ada", "pw").await.unwrap();
        let err = store.authenticate("ada", "wrong").await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_authenticate_unknown_user() {
        let store = MemoryCredentialStore::new();
        let err = store.authenticate("ghost", "pw").await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_verify_rejects_garbage_and_tampered_tokens() {
        let store = MemoryCredentialStore::new();
        let session = store.signup("ada", "pw").await.unwrap();

        assert!(store.verify("").await.is_err());
        assert!(store.verify("mn_at_forged").await.is_err());

        let mut tampered = session.token.clone();
        tampered.pop();
        tampered.push('!');
        assert!(store.verify(&tampered).await.is_err());
    }

    #[tokio::test]
    async fn test_verify_rejects_expired_token() {
        let store = MemoryCredentialStore::with_ttl(-1);
        let session = store.signup("ada", "pw").await.unwrap();
        let err = store.verify(&session.token).await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }
}
