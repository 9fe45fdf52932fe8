//! Row models for the persisted entity kinds.
//!
//! Inserts take the validated events from `apilytics_core::record`; these
//! structs describe rows as read back from the database.

pub mod account;
pub mod monitor;
pub mod ping;
pub mod request;
