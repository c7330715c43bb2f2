//! Common library for the EPICU dashboard backend
//!
//! This crate provides shared functionality used across the different
//! services of the EPICU dashboard backend: the record-store client,
//! error handling, and other common utilities.

pub mod error;
pub mod store;
