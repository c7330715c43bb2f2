//! User model and related functionality

use chrono::{DateTime, Utc};
use common::error::StoreResult;
use common::store::Record;
use serde::Serialize;

/// Record-store table holding user rows
pub const USERS_TABLE: &str = "Users";

/// User entity
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    /// Absent until the user has completed password initialization
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
    /// Inline one-time token for setting a password outside the signup flow
    pub config_token: Option<String>,
    pub config_token_expires_at: Option<DateTime<Utc>>,
    /// Linked city record ids
    pub city_ids: Vec<String>,
}

impl User {
    /// Map a raw store row into a typed user
    pub fn from_record(record: &Record) -> StoreResult<Self> {
        Ok(Self {
            id: record.id.clone(),
            email: record.str_field(USERS_TABLE, "email")?,
            password_hash: record.opt_str_field("password_hash"),
            first_name: record.opt_str_field("first_name").unwrap_or_default(),
            last_name: record.opt_str_field("last_name").unwrap_or_default(),
            config_token: record.opt_str_field("config_token"),
            config_token_expires_at: record
                .opt_datetime_field(USERS_TABLE, "config_token_expires_at")?,
            city_ids: record.str_list_field("city_ids"),
        })
    }

    /// Concatenated first and last name
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// User shape returned by the session endpoints
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub name: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.full_name(),
        }
    }
}
