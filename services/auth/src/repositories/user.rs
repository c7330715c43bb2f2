//! User repository for record-store operations

use std::sync::Arc;

use common::error::StoreResult;
use common::store::{ExactFilter, RecordStore};
use serde_json::{Map, Value};
use tracing::info;

use crate::models::{USERS_TABLE, User};

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    store: Arc<dyn RecordStore>,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Find a user by exact email match
    pub async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let rows = self
            .store
            .query(
                USERS_TABLE,
                ExactFilter {
                    field: "email",
                    value: email,
                    max_records: 1,
                },
            )
            .await?;

        rows.first().map(User::from_record).transpose()
    }

    /// Find a user by record id
    pub async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        let row = self.store.fetch(USERS_TABLE, id).await?;
        row.as_ref().map(User::from_record).transpose()
    }

    /// Find the user carrying the given inline config token
    pub async fn find_by_config_token(&self, token: &str) -> StoreResult<Option<User>> {
        let rows = self
            .store
            .query(
                USERS_TABLE,
                ExactFilter {
                    field: "config_token",
                    value: token,
                    max_records: 1,
                },
            )
            .await?;

        rows.first().map(User::from_record).transpose()
    }

    /// Write a freshly hashed password to the user record
    pub async fn set_password_hash(&self, user_id: &str, password_hash: &str) -> StoreResult<()> {
        info!("Setting password for user: {}", user_id);

        let mut fields = Map::new();
        fields.insert(
            "password_hash".to_string(),
            Value::String(password_hash.to_string()),
        );
        self.store.update(USERS_TABLE, user_id, fields).await?;

        Ok(())
    }

    /// Write the password hash and clear the inline config-token fields in a
    /// single combined update
    pub async fn set_password_and_clear_config_token(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> StoreResult<()> {
        info!("Setting password via config token for user: {}", user_id);

        let mut fields = Map::new();
        fields.insert(
            "password_hash".to_string(),
            Value::String(password_hash.to_string()),
        );
        fields.insert("config_token".to_string(), Value::String(String::new()));
        fields.insert(
            "config_token_expires_at".to_string(),
            Value::String(String::new()),
        );
        self.store.update(USERS_TABLE, user_id, fields).await?;

        Ok(())
    }
}
