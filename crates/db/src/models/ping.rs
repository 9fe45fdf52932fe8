use serde::Serialize;
use sqlx::FromRow;
use apilytics_core::types::{ApiKey, Timestamp};

/// A row from the `pings` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PingRow {
    pub ping_id: i64,
    pub api_key: ApiKey,
    pub url: String,
    pub response_time: Option<i32>,
    pub status: Option<i16>,
    pub created_at: Timestamp,
}
