//! Token models for the stored credential kinds
//!
//! Access, refresh, and signup tokens are separate record-store tables with
//! the same lifecycle shape: issued, valid until expiry or explicit
//! consumption, then destroyed. The inline config token lives on the user
//! record itself (see [`super::User`]).

use chrono::{DateTime, Utc};
use common::error::StoreResult;
use common::store::Record;

/// Record-store table holding access-token rows
pub const ACCESS_TOKENS_TABLE: &str = "AccessTokens";
/// Record-store table holding refresh-token rows
pub const REFRESH_TOKENS_TABLE: &str = "RefreshTokens";
/// Record-store table holding signup-token rows
pub const SIGNUP_TOKENS_TABLE: &str = "SignupTokens";

/// Short-lived bearer credential
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub id: String,
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn from_record(record: &Record) -> StoreResult<Self> {
        Ok(Self {
            id: record.id.clone(),
            token: record.str_field(ACCESS_TOKENS_TABLE, "token")?,
            user_id: record.str_field(ACCESS_TOKENS_TABLE, "user_id")?,
            expires_at: record.datetime_field(ACCESS_TOKENS_TABLE, "expires_at")?,
        })
    }

    /// Strict comparison: a token expiring exactly now is still valid
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Long-lived credential, single-use (rotated on refresh)
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub id: String,
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn from_record(record: &Record) -> StoreResult<Self> {
        Ok(Self {
            id: record.id.clone(),
            token: record.str_field(REFRESH_TOKENS_TABLE, "token")?,
            user_id: record.str_field(REFRESH_TOKENS_TABLE, "user_id")?,
            expires_at: record.datetime_field(REFRESH_TOKENS_TABLE, "expires_at")?,
        })
    }

    /// Strict comparison: a token expiring exactly now is still valid
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// One-time credential enabling the first password set
#[derive(Debug, Clone)]
pub struct SignupToken {
    pub id: String,
    pub token: String,
    pub user_id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl SignupToken {
    pub fn from_record(record: &Record) -> StoreResult<Self> {
        Ok(Self {
            id: record.id.clone(),
            token: record.str_field(SIGNUP_TOKENS_TABLE, "token")?,
            user_id: record.str_field(SIGNUP_TOKENS_TABLE, "user_id")?,
            created_at: record.opt_datetime_field(SIGNUP_TOKENS_TABLE, "created_at")?,
            expires_at: record.datetime_field(SIGNUP_TOKENS_TABLE, "expires_at")?,
        })
    }

    /// Strict comparison: a token expiring exactly now is still valid
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
