//! Repositories for record-store reads

use std::sync::Arc;

use common::error::StoreResult;
use common::store::{ExactFilter, RecordStore};

use crate::models::{
    ACCESS_TOKENS_TABLE, AccessTokenInfo, CITIES_TABLE, CityResponse, USERS_TABLE, UserResponse,
};

/// Row cap for directory listings
const LIST_LIMIT: u32 = 100;

/// User repository for record-store reads
#[derive(Clone)]
pub struct UserRepository {
    store: Arc<dyn RecordStore>,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Get all users
    pub async fn get_all(&self) -> StoreResult<Vec<UserResponse>> {
        let rows = self.store.list(USERS_TABLE, LIST_LIMIT).await?;
        rows.iter().map(UserResponse::from_record).collect()
    }

    /// Find a user by record id
    pub async fn find_by_id(&self, id: &str) -> StoreResult<Option<UserResponse>> {
        let row = self.store.fetch(USERS_TABLE, id).await?;
        row.as_ref().map(UserResponse::from_record).transpose()
    }
}

/// City repository for record-store reads
#[derive(Clone)]
pub struct CityRepository {
    store: Arc<dyn RecordStore>,
}

impl CityRepository {
    /// Create a new city repository
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Get all cities
    pub async fn get_all(&self) -> StoreResult<Vec<CityResponse>> {
        let rows = self.store.list(CITIES_TABLE, LIST_LIMIT).await?;
        rows.iter().map(CityResponse::from_record).collect()
    }
}

/// Session repository: access-token lookups for the auth middleware
#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn RecordStore>,
}

impl SessionRepository {
    /// Create a new session repository
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Look up an access token by its opaque string
    pub async fn find_access_token(&self, token: &str) -> StoreResult<Option<AccessTokenInfo>> {
        let rows = self
            .store
            .query(
                ACCESS_TOKENS_TABLE,
                ExactFilter {
                    field: "token",
                    value: token,
                    max_records: 1,
                },
            )
            .await?;

        rows.first().map(AccessTokenInfo::from_record).transpose()
    }
}
