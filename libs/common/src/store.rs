//! Record-store client for the external tabular database service
//!
//! All persistent entities (users, tokens, domain records) live in a
//! spreadsheet-style remote store reached over HTTP. This module provides
//! the [`RecordStore`] contract the services program against, the
//! [`HttpRecordStore`] implementation, and typed field accessors so that
//! untyped rows never leak past the client boundary.
//!
//! ```rust,no_run
//! use common::store::{ExactFilter, HttpRecordStore, RecordStore, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StoreConfig::from_env()?;
//!     let store = HttpRecordStore::new(&config)?;
//!     let rows = store
//!         .query(
//!             "Users",
//!             ExactFilter {
//!                 field: "email",
//!                 value: "someone@epicu.fr",
//!                 max_records: 1,
//!             },
//!         )
//!         .await?;
//!     println!("matched {} rows", rows.len());
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::env;
use std::time::Duration;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

pub mod memory;

/// Configuration for the record-store connection
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base URL of the record-store API
    pub api_url: String,
    /// Bearer key authenticating this application against the store
    pub api_key: String,
    /// Identifier of the base (workspace) holding the application tables
    pub base_id: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl StoreConfig {
    /// Create a new StoreConfig from environment variables
    ///
    /// # Environment Variables
    /// - `RECORD_STORE_URL`: Base URL of the store API (default: "https://api.airtable.com/v0")
    /// - `RECORD_STORE_API_KEY`: Bearer key for the store (required)
    /// - `RECORD_STORE_BASE`: Base identifier holding the tables (required)
    /// - `RECORD_STORE_TIMEOUT_SECONDS`: Request timeout (default: 30)
    pub fn from_env() -> StoreResult<Self> {
        let api_url = env::var("RECORD_STORE_URL")
            .unwrap_or_else(|_| "https://api.airtable.com/v0".to_string());

        let api_key = env::var("RECORD_STORE_API_KEY").map_err(|_| {
            StoreError::Configuration("RECORD_STORE_API_KEY environment variable not set".into())
        })?;

        let base_id = env::var("RECORD_STORE_BASE").map_err(|_| {
            StoreError::Configuration("RECORD_STORE_BASE environment variable not set".into())
        })?;

        let timeout_seconds = env::var("RECORD_STORE_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            api_url,
            api_key,
            base_id,
            timeout_seconds,
        })
    }
}

/// A single row returned by the record store
#[derive(Debug, Clone, Deserialize)]
pub struct Record {
    /// Store-assigned record identifier
    pub id: String,
    /// Raw field map; use the typed accessors instead of reading this directly
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Record {
    fn malformed(&self, table: &str, message: impl Into<String>) -> StoreError {
        StoreError::Malformed {
            table: table.to_string(),
            id: self.id.clone(),
            message: message.into(),
        }
    }

    /// Read a required string field
    pub fn str_field(&self, table: &str, name: &str) -> StoreResult<String> {
        match self.fields.get(name) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(self.malformed(table, format!("field {name} is not a string"))),
            None => Err(self.malformed(table, format!("missing field {name}"))),
        }
    }

    /// Read an optional string field; absent and empty both map to None
    pub fn opt_str_field(&self, name: &str) -> Option<String> {
        match self.fields.get(name) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }

    /// Read a required RFC 3339 timestamp field
    pub fn datetime_field(&self, table: &str, name: &str) -> StoreResult<DateTime<Utc>> {
        let raw = self.str_field(table, name)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| self.malformed(table, format!("field {name} is not a timestamp: {e}")))
    }

    /// Read an optional RFC 3339 timestamp field; absent and empty map to None,
    /// a present-but-unparseable value is an error
    pub fn opt_datetime_field(
        &self,
        table: &str,
        name: &str,
    ) -> StoreResult<Option<DateTime<Utc>>> {
        let Some(raw) = self.opt_str_field(name) else {
            return Ok(None);
        };
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| self.malformed(table, format!("field {name} is not a timestamp: {e}")))
    }

    /// Read a link field holding zero or more record ids; absent maps to empty
    pub fn str_list_field(&self, name: &str) -> Vec<String> {
        match self.fields.get(name) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// An exact-match filter on a single field, capped to a bounded row count
#[derive(Debug, Clone, Copy)]
pub struct ExactFilter<'a> {
    pub field: &'a str,
    pub value: &'a str,
    pub max_records: u32,
}

impl ExactFilter<'_> {
    /// Render the filter as a store formula, quoting the value
    pub fn formula(&self) -> String {
        let escaped = self.value.replace('\\', "\\\\").replace('\'', "\\'");
        format!("{{{}}} = '{}'", self.field, escaped)
    }
}

/// Contract for the external record store
///
/// The services only ever issue exact-match filtered reads with a small row
/// cap, point fetches for link resolution, and row create/update/destroy.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Filtered read returning at most `filter.max_records` rows
    async fn query(&self, table: &str, filter: ExactFilter<'_>) -> StoreResult<Vec<Record>>;

    /// Unfiltered read returning at most `max_records` rows
    async fn list(&self, table: &str, max_records: u32) -> StoreResult<Vec<Record>>;

    /// Point read by record id; None when the record does not exist
    async fn fetch(&self, table: &str, id: &str) -> StoreResult<Option<Record>>;

    /// Create a row and return it as stored
    async fn insert(&self, table: &str, fields: Map<String, Value>) -> StoreResult<Record>;

    /// Partial update of a row and return it as stored
    async fn update(&self, table: &str, id: &str, fields: Map<String, Value>)
    -> StoreResult<Record>;

    /// Destroy a row; returns whether a row was actually deleted
    async fn delete(&self, table: &str, id: &str) -> StoreResult<bool>;
}

#[derive(Deserialize)]
struct RecordList {
    records: Vec<Record>,
}

#[derive(Deserialize)]
struct DeleteResponse {
    #[serde(default)]
    deleted: bool,
}

#[derive(Serialize)]
struct FieldsBody {
    fields: Map<String, Value>,
}

/// HTTP client for the record-store service
#[derive(Clone)]
pub struct HttpRecordStore {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    base_id: String,
}

impl HttpRecordStore {
    /// Initialize a new record-store client
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(StoreError::Request)?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            base_id: config.base_id.clone(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}/{}", self.api_url, self.base_id, table)
    }

    fn record_url(&self, table: &str, id: &str) -> String {
        format!("{}/{}/{}/{}", self.api_url, self.base_id, table, id)
    }

    async fn error_from(response: reqwest::Response) -> StoreError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        StoreError::Api { status, message }
    }

    async fn parse_record(response: reqwest::Response) -> StoreResult<Record> {
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        response.json().await.map_err(StoreError::Request)
    }

    /// Check store connectivity by reading a single row from `table`
    pub async fn health_check(&self, table: &str) -> StoreResult<bool> {
        self.list(table, 1).await?;
        Ok(true)
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn query(&self, table: &str, filter: ExactFilter<'_>) -> StoreResult<Vec<Record>> {
        debug!("Querying table {} by field {}", table, filter.field);

        let response = self
            .client
            .get(self.table_url(table))
            .bearer_auth(&self.api_key)
            .query(&[
                ("filterByFormula", filter.formula()),
                ("maxRecords", filter.max_records.to_string()),
            ])
            .send()
            .await
            .map_err(StoreError::Request)?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let list: RecordList = response.json().await.map_err(StoreError::Request)?;
        Ok(list.records)
    }

    async fn list(&self, table: &str, max_records: u32) -> StoreResult<Vec<Record>> {
        let response = self
            .client
            .get(self.table_url(table))
            .bearer_auth(&self.api_key)
            .query(&[("maxRecords", max_records.to_string())])
            .send()
            .await
            .map_err(StoreError::Request)?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let list: RecordList = response.json().await.map_err(StoreError::Request)?;
        Ok(list.records)
    }

    async fn fetch(&self, table: &str, id: &str) -> StoreResult<Option<Record>> {
        let response = self
            .client
            .get(self.record_url(table, id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(StoreError::Request)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        Self::parse_record(response).await.map(Some)
    }

    async fn insert(&self, table: &str, fields: Map<String, Value>) -> StoreResult<Record> {
        let response = self
            .client
            .post(self.table_url(table))
            .bearer_auth(&self.api_key)
            .json(&FieldsBody { fields })
            .send()
            .await
            .map_err(StoreError::Request)?;

        Self::parse_record(response).await
    }

    async fn update(
        &self,
        table: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> StoreResult<Record> {
        let response = self
            .client
            .patch(self.record_url(table, id))
            .bearer_auth(&self.api_key)
            .json(&FieldsBody { fields })
            .send()
            .await
            .map_err(StoreError::Request)?;

        Self::parse_record(response).await
    }

    async fn delete(&self, table: &str, id: &str) -> StoreResult<bool> {
        debug!("Deleting record {} from table {}", id, table);

        let response = self
            .client
            .delete(self.record_url(table, id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(StoreError::Request)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let body: DeleteResponse = response.json().await.map_err(StoreError::Request)?;
        Ok(body.deleted)
    }
}
