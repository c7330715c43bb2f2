//! City repository for linked-city resolution

use std::sync::Arc;

use common::store::RecordStore;
use tracing::warn;

use crate::models::{CITIES_TABLE, CitySummary};

/// City repository
#[derive(Clone)]
pub struct CityRepository {
    store: Arc<dyn RecordStore>,
}

impl CityRepository {
    /// Create a new city repository
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Resolve linked city ids into display summaries
    ///
    /// A broken link (dangling id, malformed row, store failure) is skipped
    /// with a warning rather than failing the caller.
    pub async fn resolve_summaries(&self, ids: &[String]) -> Vec<CitySummary> {
        let mut cities = Vec::with_capacity(ids.len());
        for id in ids {
            match self.store.fetch(CITIES_TABLE, id).await {
                Ok(Some(record)) => match CitySummary::from_record(&record) {
                    Ok(city) => cities.push(city),
                    Err(e) => warn!("Skipping malformed city record {}: {}", id, e),
                },
                Ok(None) => warn!("Skipping dangling city link: {}", id),
                Err(e) => warn!("Failed to resolve city link {}: {}", id, e),
            }
        }
        cities
    }
}
