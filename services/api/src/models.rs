//! API models for response payloads

use chrono::{DateTime, Utc};
use common::error::StoreResult;
use common::store::Record;
use serde::Serialize;

/// Record-store table holding user rows
pub const USERS_TABLE: &str = "Users";
/// Record-store table holding city rows
pub const CITIES_TABLE: &str = "Cities";
/// Record-store table holding access-token rows
pub const ACCESS_TOKENS_TABLE: &str = "AccessTokens";

/// Response for user directory reads
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub city_ids: Vec<String>,
}

impl UserResponse {
    pub fn from_record(record: &Record) -> StoreResult<Self> {
        Ok(Self {
            id: record.id.clone(),
            email: record.str_field(USERS_TABLE, "email")?,
            first_name: record.opt_str_field("first_name").unwrap_or_default(),
            last_name: record.opt_str_field("last_name").unwrap_or_default(),
            city_ids: record.str_list_field("city_ids"),
        })
    }
}

/// Response for city directory reads
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CityResponse {
    pub id: String,
    pub name: String,
    pub region: Option<String>,
}

impl CityResponse {
    pub fn from_record(record: &Record) -> StoreResult<Self> {
        Ok(Self {
            id: record.id.clone(),
            name: record.str_field(CITIES_TABLE, "name")?,
            region: record.opt_str_field("region"),
        })
    }
}

/// Stored access-token row, as much of it as the middleware needs
#[derive(Debug, Clone)]
pub struct AccessTokenInfo {
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessTokenInfo {
    pub fn from_record(record: &Record) -> StoreResult<Self> {
        Ok(Self {
            user_id: record.str_field(ACCESS_TOKENS_TABLE, "user_id")?,
            expires_at: record.datetime_field(ACCESS_TOKENS_TABLE, "expires_at")?,
        })
    }
}
