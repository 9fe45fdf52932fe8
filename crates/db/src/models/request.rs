//! Request row model (append-only time series).

use serde::Serialize;
use sqlx::FromRow;
use apilytics_core::types::{ApiKey, Timestamp};

/// A row from the `requests` table.
///
/// `ip_address` is selected as text (`host(ip_address)`).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RequestRow {
    pub request_id: i64,
    pub api_key: ApiKey,
    pub ip_address: Option<String>,
    pub path: String,
    pub hostname: Option<String>,
    pub user_agent: Option<String>,
    pub user_agent_id: Option<i32>,
    pub method: i16,
    pub response_time: i32,
    pub framework: i16,
    pub status: i16,
    pub location: Option<String>,
    pub created_at: Timestamp,
}
