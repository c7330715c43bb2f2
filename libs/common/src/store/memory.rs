//! In-memory implementation of the record-store contract
//!
//! Backs the service test suites and local development runs where the real
//! record-store service is not reachable. Rows live in per-table vectors
//! behind a single async mutex; ids follow the store's `recNNNNNN` shape.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::store::{ExactFilter, Record, RecordStore};

#[derive(Default)]
struct State {
    tables: HashMap<String, Vec<Record>>,
    next_id: u64,
    failing_inserts: HashSet<String>,
    update_calls: HashMap<String, u32>,
}

/// In-memory record store
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent insert into `table` fail with a synthetic
    /// service error, until cleared
    pub async fn fail_inserts_into(&self, table: &str) {
        let mut state = self.state.lock().await;
        state.failing_inserts.insert(table.to_string());
    }

    /// Stop failing inserts into `table`
    pub async fn restore_inserts_into(&self, table: &str) {
        let mut state = self.state.lock().await;
        state.failing_inserts.remove(table);
    }

    /// Number of rows currently held in `table`
    pub async fn row_count(&self, table: &str) -> usize {
        let state = self.state.lock().await;
        state.tables.get(table).map(Vec::len).unwrap_or(0)
    }

    /// Number of update calls issued against `table`
    pub async fn update_calls(&self, table: &str) -> u32 {
        let state = self.state.lock().await;
        state.update_calls.get(table).copied().unwrap_or(0)
    }
}

fn matches(record: &Record, filter: &ExactFilter<'_>) -> bool {
    match record.fields.get(filter.field) {
        Some(Value::String(s)) => s == filter.value,
        _ => false,
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn query(&self, table: &str, filter: ExactFilter<'_>) -> StoreResult<Vec<Record>> {
        let state = self.state.lock().await;
        let rows = state
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| matches(r, &filter))
                    .take(filter.max_records as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }

    async fn list(&self, table: &str, max_records: u32) -> StoreResult<Vec<Record>> {
        let state = self.state.lock().await;
        let rows = state
            .tables
            .get(table)
            .map(|rows| rows.iter().take(max_records as usize).cloned().collect())
            .unwrap_or_default();
        Ok(rows)
    }

    async fn fetch(&self, table: &str, id: &str) -> StoreResult<Option<Record>> {
        let state = self.state.lock().await;
        let row = state
            .tables
            .get(table)
            .and_then(|rows| rows.iter().find(|r| r.id == id))
            .cloned();
        Ok(row)
    }

    async fn insert(&self, table: &str, fields: Map<String, Value>) -> StoreResult<Record> {
        let mut state = self.state.lock().await;
        if state.failing_inserts.contains(table) {
            return Err(StoreError::Api {
                status: 503,
                message: format!("synthetic insert failure for table {table}"),
            });
        }

        state.next_id += 1;
        let record = Record {
            id: format!("rec{:06}", state.next_id),
            fields,
        };
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        table: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> StoreResult<Record> {
        let mut state = self.state.lock().await;
        *state.update_calls.entry(table.to_string()).or_default() += 1;

        let row = state
            .tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|r| r.id == id))
            .ok_or_else(|| StoreError::Api {
                status: 404,
                message: format!("no record {id} in table {table}"),
            })?;

        for (name, value) in fields {
            row.fields.insert(name, value);
        }
        Ok(row.clone())
    }

    async fn delete(&self, table: &str, id: &str) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let Some(rows) = state.tables.get_mut(table) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|r| r.id != id);
        Ok(rows.len() < before)
    }
}
