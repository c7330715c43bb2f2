//! Session lifecycle management over the record store
//!
//! Every credential-issuing or credential-consuming operation goes through
//! this manager: login, refresh (rotation-on-use), logout, signup-token
//! password initialization, and the inline config-token flows. Token
//! validity is never cached; every operation re-queries the record store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::error::StoreError;
use common::store::RecordStore;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{CitySummary, SignupToken, User};
use crate::password::{self, CONFIG_TOKEN_COST, SIGNUP_COST};
use crate::repositories::{CityRepository, TokenRepository, UserRepository};
use crate::token::{
    ACCESS_TOKEN_BYTES, REFRESH_TOKEN_BYTES, access_token_ttl, generate_token, refresh_token_ttl,
};

/// Closed failure set for session operations
#[derive(Error, Debug)]
pub enum SessionError {
    /// Unknown email, unset password, or password mismatch; the caller
    /// cannot tell these apart
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The presented refresh token does not exist (or was already rotated)
    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    /// The presented refresh token exists but is past its expiry
    #[error("Refresh token expired")]
    ExpiredRefreshToken,

    /// Logout requires both tokens to be present
    #[error("Access token and refresh token are required")]
    MissingTokens,

    /// Signup token absent from the store
    #[error("Token not found")]
    TokenNotFound,

    /// Token exists but is past its expiry
    #[error("Token expired")]
    TokenExpired,

    /// The token's owning-user reference is dangling
    #[error("User not found")]
    UserNotFound,

    /// No user carries the presented inline config token
    #[error("Invalid token")]
    InvalidToken,

    /// Missing or malformed request field
    #[error("{0}")]
    Validation(String),

    /// Too many failed attempts for this account
    #[error("Too many attempts, try again later")]
    RateLimited,

    /// Record store failure
    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    /// Password hashing failure
    #[error("Password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

/// A freshly minted access/refresh pair with its expiries
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub tokens: TokenPair,
}

/// Result of validating a signup token
#[derive(Debug, Clone)]
pub struct SignupTokenInfo {
    pub user_id: String,
    pub user_name: String,
}

/// Result of validating an inline config token
#[derive(Debug, Clone)]
pub struct InlineTokenInfo {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub cities: Vec<CitySummary>,
}

/// Session lifecycle manager
#[derive(Clone)]
pub struct SessionManager {
    users: UserRepository,
    tokens: TokenRepository,
    cities: CityRepository,
}

impl SessionManager {
    /// Create a new session manager over the given record store
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            users: UserRepository::new(store.clone()),
            tokens: TokenRepository::new(store.clone()),
            cities: CityRepository::new(store),
        }
    }

    /// Authenticate with email and password, minting a fresh token pair
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, SessionError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(SessionError::InvalidCredentials)?;

        let hash = user
            .password_hash
            .as_deref()
            .ok_or(SessionError::InvalidCredentials)?;

        if !password::verify_password(password, hash)? {
            return Err(SessionError::InvalidCredentials);
        }

        info!("Login successful for user: {}", user.id);
        let tokens = self.mint_token_pair(&user.id).await?;
        Ok(LoginOutcome { user, tokens })
    }

    /// Rotate a refresh token, issuing a new access/refresh pair
    ///
    /// The presented refresh token is destroyed before anything else; the
    /// delete result gates minting, so two racing calls presenting the same
    /// token cannot both issue a pair. The presented access token is
    /// discarded best-effort (it may already be gone).
    pub async fn refresh(
        &self,
        refresh_token: &str,
        access_token: Option<&str>,
    ) -> Result<TokenPair, SessionError> {
        let stored = self
            .tokens
            .find_refresh_token(refresh_token)
            .await?
            .ok_or(SessionError::InvalidRefreshToken)?;

        if stored.is_expired(Utc::now()) {
            return Err(SessionError::ExpiredRefreshToken);
        }

        if !self.tokens.delete_refresh_token(&stored.id).await? {
            // A concurrent refresh already consumed this token.
            return Err(SessionError::InvalidRefreshToken);
        }

        if let Some(token) = access_token {
            self.discard_access_token(token).await;
        }

        info!("Rotating session for user: {}", stored.user_id);
        self.mint_token_pair(&stored.user_id).await
    }

    /// Destroy the presented tokens; absence of either row is not an error
    pub async fn logout(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<(), SessionError> {
        let (Some(access_token), Some(refresh_token)) = (access_token, refresh_token) else {
            return Err(SessionError::MissingTokens);
        };
        if access_token.is_empty() || refresh_token.is_empty() {
            return Err(SessionError::MissingTokens);
        }

        self.discard_access_token(access_token).await;
        self.discard_refresh_token(refresh_token).await;
        Ok(())
    }

    /// Validate a signup token without consuming it
    pub async fn validate_signup_token(
        &self,
        token: &str,
    ) -> Result<SignupTokenInfo, SessionError> {
        let (_, user) = self.resolve_signup_token(token).await?;
        Ok(SignupTokenInfo {
            user_name: user.full_name(),
            user_id: user.id,
        })
    }

    /// Set the user's first password and consume the signup token
    ///
    /// The password write happens before the token is destroyed: a crash
    /// between the two steps leaves the token valid, so the call can be
    /// retried safely instead of locking the user out.
    pub async fn initialize_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), SessionError> {
        let (stored, user) = self.resolve_signup_token(token).await?;

        let hash = password::hash_password(new_password, SIGNUP_COST)?;
        self.users.set_password_hash(&user.id, &hash).await?;
        self.tokens.delete_signup_token(&stored.id).await?;

        info!("Password initialized for user: {}", user.id);
        Ok(())
    }

    /// Set a password via the inline config token stored on the user record
    ///
    /// The hash write and the token clear go out as one combined update.
    pub async fn set_password_by_inline_token(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<String, SessionError> {
        let user = self.resolve_inline_token(token).await?;

        let hash = password::hash_password(new_password, CONFIG_TOKEN_COST)?;
        self.users
            .set_password_and_clear_config_token(&user.id, &hash)
            .await?;

        info!("Password set via config token for user: {}", user.id);
        Ok(user.id)
    }

    /// Validate an inline config token and resolve the user's linked cities
    pub async fn validate_inline_token(
        &self,
        token: &str,
    ) -> Result<InlineTokenInfo, SessionError> {
        let user = self.resolve_inline_token(token).await?;
        let cities = self.cities.resolve_summaries(&user.city_ids).await;

        Ok(InlineTokenInfo {
            user_id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            cities,
        })
    }

    /// Resolve the user behind a validated access token
    pub async fn current_user(&self, user_id: &str) -> Result<User, SessionError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(SessionError::UserNotFound)
    }

    /// Mint and persist an access/refresh pair for the user
    ///
    /// If the refresh-token write fails after the access-token row was
    /// created, the orphan access token is deleted before the error
    /// propagates, so no half-issued pair is ever observable.
    async fn mint_token_pair(&self, user_id: &str) -> Result<TokenPair, SessionError> {
        let now = Utc::now();
        let access_token = generate_token(ACCESS_TOKEN_BYTES);
        let refresh_token = generate_token(REFRESH_TOKEN_BYTES);
        let access_expires_at = now + access_token_ttl();
        let refresh_expires_at = now + refresh_token_ttl();

        let access_row = self
            .tokens
            .create_access_token(user_id, &access_token, access_expires_at)
            .await?;

        if let Err(e) = self
            .tokens
            .create_refresh_token(user_id, &refresh_token, refresh_expires_at)
            .await
        {
            if let Err(cleanup) = self.tokens.delete_access_token(&access_row.id).await {
                warn!(
                    "Failed to clean up orphan access token {}: {}",
                    access_row.id, cleanup
                );
            }
            return Err(e.into());
        }

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        })
    }

    async fn resolve_signup_token(
        &self,
        token: &str,
    ) -> Result<(SignupToken, User), SessionError> {
        let stored = self
            .tokens
            .find_signup_token(token)
            .await?
            .ok_or(SessionError::TokenNotFound)?;

        if stored.is_expired(Utc::now()) {
            return Err(SessionError::TokenExpired);
        }

        let user = self
            .users
            .find_by_id(&stored.user_id)
            .await?
            .ok_or(SessionError::UserNotFound)?;

        Ok((stored, user))
    }

    async fn resolve_inline_token(&self, token: &str) -> Result<User, SessionError> {
        if token.is_empty() {
            return Err(SessionError::InvalidToken);
        }

        let user = self
            .users
            .find_by_config_token(token)
            .await?
            .ok_or(SessionError::InvalidToken)?;

        let expires_at = user
            .config_token_expires_at
            .ok_or(SessionError::InvalidToken)?;

        if Utc::now() > expires_at {
            return Err(SessionError::TokenExpired);
        }

        Ok(user)
    }

    async fn discard_access_token(&self, token: &str) {
        match self.tokens.find_access_token(token).await {
            Ok(Some(row)) => {
                if let Err(e) = self.tokens.delete_access_token(&row.id).await {
                    warn!("Failed to discard access token: {}", e);
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to look up access token for discard: {}", e),
        }
    }

    async fn discard_refresh_token(&self, token: &str) {
        match self.tokens.find_refresh_token(token).await {
            Ok(Some(row)) => {
                if let Err(e) = self.tokens.delete_refresh_token(&row.id).await {
                    warn!("Failed to discard refresh token: {}", e);
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to look up refresh token for discard: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::store::memory::MemoryStore;
    use serde_json::{Map, Value, json};

    use crate::models::{
        ACCESS_TOKENS_TABLE, CITIES_TABLE, REFRESH_TOKENS_TABLE, SIGNUP_TOKENS_TABLE, USERS_TABLE,
    };

    // Minimum bcrypt cost keeps seeded hashes fast; verification does not
    // depend on the cost a hash was created with.
    const TEST_COST: u32 = 4;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn manager() -> (Arc<MemoryStore>, SessionManager) {
        let store = Arc::new(MemoryStore::new());
        let sessions = SessionManager::new(store.clone());
        (store, sessions)
    }

    async fn seed_user(store: &MemoryStore, email: &str, password: Option<&str>) -> String {
        let mut user = json!({
            "email": email,
            "first_name": "Marie",
            "last_name": "Dupont",
        });
        if let Some(password) = password {
            user["password_hash"] = json!(bcrypt::hash(password, TEST_COST).unwrap());
        }
        store.insert(USERS_TABLE, fields(user)).await.unwrap().id
    }

    async fn seed_refresh_token(
        store: &MemoryStore,
        user_id: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) {
        store
            .insert(
                REFRESH_TOKENS_TABLE,
                fields(json!({
                    "token": token,
                    "user_id": user_id,
                    "expires_at": expires_at.to_rfc3339(),
                })),
            )
            .await
            .unwrap();
    }

    async fn seed_signup_token(
        store: &MemoryStore,
        user_id: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) {
        store
            .insert(
                SIGNUP_TOKENS_TABLE,
                fields(json!({
                    "token": token,
                    "user_id": user_id,
                    "created_at": Utc::now().to_rfc3339(),
                    "expires_at": expires_at.to_rfc3339(),
                })),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn login_returns_user_summary_and_token_pair() {
        let (store, sessions) = manager();
        seed_user(&store, "marie@epicu.fr", Some("secret123")).await;

        let outcome = sessions.login("marie@epicu.fr", "secret123").await.unwrap();

        assert_eq!(outcome.user.email, "marie@epicu.fr");
        assert_eq!(outcome.user.full_name(), "Marie Dupont");
        assert_eq!(outcome.tokens.access_token.len(), ACCESS_TOKEN_BYTES * 2);
        assert_eq!(outcome.tokens.refresh_token.len(), REFRESH_TOKEN_BYTES * 2);
        assert_eq!(store.row_count(ACCESS_TOKENS_TABLE).await, 1);
        assert_eq!(store.row_count(REFRESH_TOKENS_TABLE).await, 1);
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials_uniformly() {
        let (store, sessions) = manager();
        seed_user(&store, "marie@epicu.fr", Some("secret123")).await;
        seed_user(&store, "fresh@epicu.fr", None).await;

        let wrong_password = sessions.login("marie@epicu.fr", "wrong").await;
        assert!(matches!(
            wrong_password,
            Err(SessionError::InvalidCredentials)
        ));

        let unknown_email = sessions.login("ghost@epicu.fr", "secret123").await;
        assert!(matches!(unknown_email, Err(SessionError::InvalidCredentials)));

        let no_password_yet = sessions.login("fresh@epicu.fr", "anything").await;
        assert!(matches!(
            no_password_yet,
            Err(SessionError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn refresh_rotates_the_presented_pair() {
        let (store, sessions) = manager();
        seed_user(&store, "marie@epicu.fr", Some("secret123")).await;
        let outcome = sessions.login("marie@epicu.fr", "secret123").await.unwrap();

        let pair = sessions
            .refresh(
                &outcome.tokens.refresh_token,
                Some(&outcome.tokens.access_token),
            )
            .await
            .unwrap();
        assert_ne!(pair.refresh_token, outcome.tokens.refresh_token);
        assert_ne!(pair.access_token, outcome.tokens.access_token);

        // Exactly the new pair remains; the presented rows are gone.
        assert_eq!(store.row_count(ACCESS_TOKENS_TABLE).await, 1);
        assert_eq!(store.row_count(REFRESH_TOKENS_TABLE).await, 1);

        // Single-use: presenting the consumed refresh token again fails.
        let replay = sessions
            .refresh(&outcome.tokens.refresh_token, None)
            .await;
        assert!(matches!(replay, Err(SessionError::InvalidRefreshToken)));
    }

    #[tokio::test]
    async fn refresh_expiries_follow_issuance() {
        let (store, sessions) = manager();
        let user_id = seed_user(&store, "marie@epicu.fr", None).await;
        seed_refresh_token(&store, &user_id, "seeded-token", Utc::now() + Duration::days(30)).await;

        let before = Utc::now();
        let pair = sessions.refresh("seeded-token", None).await.unwrap();
        let after = Utc::now();

        assert!(pair.access_expires_at > before);
        assert!(pair.refresh_expires_at > before);
        assert!(pair.access_expires_at >= before + Duration::hours(1));
        assert!(pair.access_expires_at <= after + Duration::hours(1));
        assert!(pair.refresh_expires_at >= before + Duration::days(90));
        assert!(pair.refresh_expires_at <= after + Duration::days(90));
    }

    #[tokio::test]
    async fn refresh_rejects_expired_and_unknown_tokens() {
        let (store, sessions) = manager();
        let user_id = seed_user(&store, "marie@epicu.fr", None).await;
        seed_refresh_token(
            &store,
            &user_id,
            "stale-token",
            Utc::now() - Duration::milliseconds(1),
        )
        .await;

        let expired = sessions.refresh("stale-token", None).await;
        assert!(matches!(expired, Err(SessionError::ExpiredRefreshToken)));
        // An expired token is rejected before rotation, so the row survives.
        assert_eq!(store.row_count(REFRESH_TOKENS_TABLE).await, 1);

        let unknown = sessions.refresh("never-issued", None).await;
        assert!(matches!(unknown, Err(SessionError::InvalidRefreshToken)));
    }

    #[tokio::test]
    async fn refresh_compensates_when_the_refresh_row_cannot_be_written() {
        let (store, sessions) = manager();
        let user_id = seed_user(&store, "marie@epicu.fr", None).await;
        seed_refresh_token(&store, &user_id, "seeded-token", Utc::now() + Duration::days(30)).await;

        store.fail_inserts_into(REFRESH_TOKENS_TABLE).await;
        let result = sessions.refresh("seeded-token", None).await;
        assert!(matches!(result, Err(SessionError::Store(_))));

        // No half-issued pair: the orphan access token was rolled back, and
        // the presented refresh token stays consumed.
        assert_eq!(store.row_count(ACCESS_TOKENS_TABLE).await, 0);
        assert_eq!(store.row_count(REFRESH_TOKENS_TABLE).await, 0);
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let (store, sessions) = manager();
        seed_user(&store, "marie@epicu.fr", Some("secret123")).await;
        let outcome = sessions.login("marie@epicu.fr", "secret123").await.unwrap();

        let access = outcome.tokens.access_token.as_str();
        let refresh = outcome.tokens.refresh_token.as_str();

        sessions.logout(Some(access), Some(refresh)).await.unwrap();
        assert_eq!(store.row_count(ACCESS_TOKENS_TABLE).await, 0);
        assert_eq!(store.row_count(REFRESH_TOKENS_TABLE).await, 0);

        // Second logout with the same, already-consumed tokens still succeeds.
        sessions.logout(Some(access), Some(refresh)).await.unwrap();
    }

    #[tokio::test]
    async fn logout_requires_both_tokens() {
        let (_, sessions) = manager();

        let missing = sessions.logout(Some("token"), None).await;
        assert!(matches!(missing, Err(SessionError::MissingTokens)));

        let empty = sessions.logout(Some(""), Some("token")).await;
        assert!(matches!(empty, Err(SessionError::MissingTokens)));
    }

    #[tokio::test]
    async fn signup_token_expiry_is_strict() {
        let (store, sessions) = manager();
        let user_id = seed_user(&store, "marie@epicu.fr", None).await;
        seed_signup_token(&store, &user_id, "fresh", Utc::now() + Duration::hours(1)).await;
        seed_signup_token(
            &store,
            &user_id,
            "stale",
            Utc::now() - Duration::milliseconds(1),
        )
        .await;

        let info = sessions.validate_signup_token("fresh").await.unwrap();
        assert_eq!(info.user_id, user_id);
        assert_eq!(info.user_name, "Marie Dupont");

        let expired = sessions.validate_signup_token("stale").await;
        assert!(matches!(expired, Err(SessionError::TokenExpired)));

        let unknown = sessions.validate_signup_token("never-issued").await;
        assert!(matches!(unknown, Err(SessionError::TokenNotFound)));
    }

    #[tokio::test]
    async fn signup_token_with_dangling_user_reference_fails() {
        let (store, sessions) = manager();
        seed_signup_token(&store, "rec999999", "orphan", Utc::now() + Duration::hours(1)).await;

        let result = sessions.validate_signup_token("orphan").await;
        assert!(matches!(result, Err(SessionError::UserNotFound)));
    }

    #[tokio::test]
    async fn initialize_password_hashes_and_consumes_the_token() {
        let (store, sessions) = manager();
        let user_id = seed_user(&store, "fresh@epicu.fr", None).await;
        seed_signup_token(&store, &user_id, "welcome", Utc::now() + Duration::hours(1)).await;

        sessions
            .initialize_password("welcome", "secret123")
            .await
            .unwrap();

        let record = store.fetch(USERS_TABLE, &user_id).await.unwrap().unwrap();
        let hash = record.str_field(USERS_TABLE, "password_hash").unwrap();
        assert_ne!(hash, "secret123");
        assert!(bcrypt::verify("secret123", &hash).unwrap());

        // Single-use: the token row is gone, so a retry cannot find it.
        let replay = sessions.initialize_password("welcome", "other-pass").await;
        assert!(matches!(replay, Err(SessionError::TokenNotFound)));

        // The freshly set password authenticates.
        let outcome = sessions.login("fresh@epicu.fr", "secret123").await.unwrap();
        assert_eq!(outcome.user.id, user_id);
    }

    #[tokio::test]
    async fn inline_token_sets_password_and_clears_itself_in_one_write() {
        let (store, sessions) = manager();
        let user_id = store
            .insert(
                USERS_TABLE,
                fields(json!({
                    "email": "inline@epicu.fr",
                    "first_name": "Paul",
                    "last_name": "Morel",
                    "config_token": "inline-token",
                    "config_token_expires_at": (Utc::now() + Duration::hours(1)).to_rfc3339(),
                })),
            )
            .await
            .unwrap()
            .id;

        let returned = sessions
            .set_password_by_inline_token("inline-token", "secret123")
            .await
            .unwrap();
        assert_eq!(returned, user_id);

        let record = store.fetch(USERS_TABLE, &user_id).await.unwrap().unwrap();
        let hash = record.str_field(USERS_TABLE, "password_hash").unwrap();
        assert!(bcrypt::verify("secret123", &hash).unwrap());
        assert_eq!(record.opt_str_field("config_token"), None);
        assert_eq!(record.opt_str_field("config_token_expires_at"), None);

        // Hash write and token clear went out as one combined update.
        assert_eq!(store.update_calls(USERS_TABLE).await, 1);

        // The cleared token no longer validates.
        let replay = sessions
            .set_password_by_inline_token("inline-token", "secret123")
            .await;
        assert!(matches!(replay, Err(SessionError::InvalidToken)));
    }

    #[tokio::test]
    async fn inline_token_validation_tolerates_broken_city_links() {
        let (store, sessions) = manager();
        let city_id = store
            .insert(
                CITIES_TABLE,
                fields(json!({"name": "Paris", "region": "Île-de-France"})),
            )
            .await
            .unwrap()
            .id;
        store
            .insert(
                USERS_TABLE,
                fields(json!({
                    "email": "lead@epicu.fr",
                    "first_name": "Claire",
                    "last_name": "Besson",
                    "config_token": "inline-token",
                    "config_token_expires_at": (Utc::now() + Duration::hours(1)).to_rfc3339(),
                    "city_ids": [city_id, "recMISSING"],
                })),
            )
            .await
            .unwrap();

        let info = sessions.validate_inline_token("inline-token").await.unwrap();
        assert_eq!(info.first_name, "Claire");
        assert_eq!(info.last_name, "Besson");
        assert_eq!(info.cities.len(), 1);
        assert_eq!(info.cities[0].name, "Paris");
    }

    #[tokio::test]
    async fn inline_token_validation_checks_expiry_strictly() {
        let (store, sessions) = manager();
        store
            .insert(
                USERS_TABLE,
                fields(json!({
                    "email": "late@epicu.fr",
                    "config_token": "stale-inline",
                    "config_token_expires_at": (Utc::now() - Duration::milliseconds(1)).to_rfc3339(),
                })),
            )
            .await
            .unwrap();

        let expired = sessions.validate_inline_token("stale-inline").await;
        assert!(matches!(expired, Err(SessionError::TokenExpired)));

        let unknown = sessions.validate_inline_token("never-issued").await;
        assert!(matches!(unknown, Err(SessionError::InvalidToken)));
    }
}
