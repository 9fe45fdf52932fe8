use serde::Serialize;
use sqlx::FromRow;
use apilytics_core::types::{ApiKey, Timestamp};

/// A row from the `monitor` table. Unique per (`api_key`, `url`).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MonitorRow {
    pub monitor_id: i64,
    pub api_key: ApiKey,
    pub url: String,
    pub secure: bool,
    pub ping: bool,
    pub created_at: Timestamp,
}
