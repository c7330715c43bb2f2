//! Custom error types for the common library
//!
//! This module defines application-specific error types that can be used
//! throughout the application.

use thiserror::Error;

/// Custom error type for record-store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Error occurred while talking to the record-store service
    #[error("Record store request error: {0}")]
    Request(#[source] reqwest::Error),

    /// The record-store service rejected the request
    #[error("Record store returned status {status}: {message}")]
    Api { status: u16, message: String },

    /// A row came back without a field the caller requires, or with the
    /// wrong shape
    #[error("Malformed record {id} in table {table}: {message}")]
    Malformed {
        table: String,
        id: String,
        message: String,
    },

    /// Configuration error
    #[error("Record store configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with StoreError
pub type StoreResult<T> = Result<T, StoreError>;
