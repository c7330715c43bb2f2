//! Token repository for the three credential tables
//!
//! Lookups are exact-match filtered queries capped to one row; deletes
//! report whether a row was actually removed so callers can detect a lost
//! race on single-use tokens.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::error::StoreResult;
use common::store::{ExactFilter, Record, RecordStore};
use serde_json::{Map, Value};
use tracing::info;

use crate::models::{
    ACCESS_TOKENS_TABLE, AccessToken, REFRESH_TOKENS_TABLE, RefreshToken, SIGNUP_TOKENS_TABLE,
    SignupToken,
};

/// Token repository
#[derive(Clone)]
pub struct TokenRepository {
    store: Arc<dyn RecordStore>,
}

fn token_fields(user_id: &str, token: &str, expires_at: DateTime<Utc>) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("token".to_string(), Value::String(token.to_string()));
    fields.insert("user_id".to_string(), Value::String(user_id.to_string()));
    fields.insert(
        "expires_at".to_string(),
        Value::String(expires_at.to_rfc3339()),
    );
    fields
}

impl TokenRepository {
    /// Create a new token repository
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    async fn find_by_token(&self, table: &str, token: &str) -> StoreResult<Option<Record>> {
        let rows = self
            .store
            .query(
                table,
                ExactFilter {
                    field: "token",
                    value: token,
                    max_records: 1,
                },
            )
            .await?;

        Ok(rows.into_iter().next())
    }

    /// Look up an access token by its opaque string
    pub async fn find_access_token(&self, token: &str) -> StoreResult<Option<AccessToken>> {
        let row = self.find_by_token(ACCESS_TOKENS_TABLE, token).await?;
        row.as_ref().map(AccessToken::from_record).transpose()
    }

    /// Persist a freshly minted access token
    pub async fn create_access_token(
        &self,
        user_id: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<AccessToken> {
        info!("Creating access token for user: {}", user_id);
        let record = self
            .store
            .insert(ACCESS_TOKENS_TABLE, token_fields(user_id, token, expires_at))
            .await?;
        AccessToken::from_record(&record)
    }

    /// Destroy an access token row; returns whether a row existed
    pub async fn delete_access_token(&self, id: &str) -> StoreResult<bool> {
        self.store.delete(ACCESS_TOKENS_TABLE, id).await
    }

    /// Look up a refresh token by its opaque string
    pub async fn find_refresh_token(&self, token: &str) -> StoreResult<Option<RefreshToken>> {
        let row = self.find_by_token(REFRESH_TOKENS_TABLE, token).await?;
        row.as_ref().map(RefreshToken::from_record).transpose()
    }

    /// Persist a freshly minted refresh token
    pub async fn create_refresh_token(
        &self,
        user_id: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<RefreshToken> {
        info!("Creating refresh token for user: {}", user_id);
        let record = self
            .store
            .insert(
                REFRESH_TOKENS_TABLE,
                token_fields(user_id, token, expires_at),
            )
            .await?;
        RefreshToken::from_record(&record)
    }

    /// Destroy a refresh token row; returns whether a row existed
    ///
    /// The returned flag is the linchpin of rotation-on-use: only the caller
    /// that actually deleted the row may mint a replacement pair.
    pub async fn delete_refresh_token(&self, id: &str) -> StoreResult<bool> {
        self.store.delete(REFRESH_TOKENS_TABLE, id).await
    }

    /// Look up a signup token by its opaque string
    pub async fn find_signup_token(&self, token: &str) -> StoreResult<Option<SignupToken>> {
        let row = self.find_by_token(SIGNUP_TOKENS_TABLE, token).await?;
        row.as_ref().map(SignupToken::from_record).transpose()
    }

    /// Destroy a signup token row; returns whether a row existed
    pub async fn delete_signup_token(&self, id: &str) -> StoreResult<bool> {
        self.store.delete(SIGNUP_TOKENS_TABLE, id).await
    }
}
