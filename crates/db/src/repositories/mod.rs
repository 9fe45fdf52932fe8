//! Repository layer: one zero-sized struct per table, all queries
//! parameterized.
//!
//! Bulk inserts run inside a caller-owned transaction so a batch is written
//! all-or-nothing. Rows whose `api_key` has no account are skipped by the
//! insert itself rather than failing the whole batch; the returned count is
//! the number of rows actually written.

pub mod account_repo;
pub mod monitor_repo;
pub mod ping_repo;
pub mod request_repo;

pub use account_repo::AccountRepo;
pub use monitor_repo::MonitorRepo;
pub use ping_repo::PingRepo;
pub use request_repo::RequestRepo;
