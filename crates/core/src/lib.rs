//! Domain types and pure logic for the request analytics ingestion service.
//!
//! This crate has no database or HTTP dependencies. It owns the canonical
//! record model (wire payloads, validation, the fixed HTTP method table),
//! the admission policy used at the intake boundary, and the shared
//! [`error::CoreError`] type.

pub mod config;
pub mod error;
pub mod geo;
pub mod rate_limit;
pub mod record;
pub mod types;
