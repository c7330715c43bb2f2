//! Integration tests for the record-store contract
//!
//! These tests exercise the full insert/query/update/delete cycle against
//! the in-memory implementation, which the service test suites also build
//! on.

use common::store::{ExactFilter, RecordStore, memory::MemoryStore};
use serde_json::{Value, json};

fn fields(value: Value) -> serde_json::Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

/// Test that verifies a row survives a full lifecycle through the store
#[tokio::test]
async fn test_record_lifecycle() -> Result<(), Box<dyn std::error::Error>> {
    let store = MemoryStore::new();

    // Create a row
    let created = store
        .insert(
            "Users",
            fields(json!({
                "email": "lifecycle@epicu.fr",
                "first_name": "Ana",
                "last_name": "Martin",
            })),
        )
        .await?;
    assert!(created.id.starts_with("rec"));

    // Read it back through an exact-match filtered query with a row cap of 1
    let rows = store
        .query(
            "Users",
            ExactFilter {
                field: "email",
                value: "lifecycle@epicu.fr",
                max_records: 1,
            },
        )
        .await?;
    assert_eq!(rows.len(), 1, "filtered query should find the created row");
    assert_eq!(rows[0].id, created.id);

    // Update a single field; other fields must be preserved
    let updated = store
        .update("Users", &created.id, fields(json!({"first_name": "Anaïs"})))
        .await?;
    assert_eq!(updated.str_field("Users", "first_name")?, "Anaïs");
    assert_eq!(updated.str_field("Users", "last_name")?, "Martin");

    // Point fetch resolves the row by id
    let fetched = store.fetch("Users", &created.id).await?;
    assert!(fetched.is_some(), "point fetch should resolve the row");

    // Delete reports that a row was removed, then that nothing matched
    assert!(store.delete("Users", &created.id).await?);
    assert!(!store.delete("Users", &created.id).await?);

    let fetched = store.fetch("Users", &created.id).await?;
    assert!(fetched.is_none(), "deleted row must not resolve");

    Ok(())
}

/// Queries against an unknown table behave like an empty table
#[tokio::test]
async fn test_unknown_table_reads_as_empty() -> Result<(), Box<dyn std::error::Error>> {
    let store = MemoryStore::new();

    let rows = store
        .query(
            "NoSuchTable",
            ExactFilter {
                field: "token",
                value: "anything",
                max_records: 1,
            },
        )
        .await?;
    assert!(rows.is_empty());
    assert!(store.fetch("NoSuchTable", "rec000001").await?.is_none());
    assert!(!store.delete("NoSuchTable", "rec000001").await?);

    Ok(())
}
