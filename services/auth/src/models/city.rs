//! City model for linked-city resolution

use common::error::StoreResult;
use common::store::Record;
use serde::Serialize;

/// Record-store table holding city rows
pub const CITIES_TABLE: &str = "Cities";

/// Display summary of a city linked to a user
#[derive(Debug, Clone, Serialize)]
pub struct CitySummary {
    pub id: String,
    pub name: String,
    pub region: Option<String>,
}

impl CitySummary {
    pub fn from_record(record: &Record) -> StoreResult<Self> {
        Ok(Self {
            id: record.id.clone(),
            name: record.str_field(CITIES_TABLE, "name")?,
            region: record.opt_str_field("region"),
        })
    }
}
