use serde::Serialize;
use sqlx::FromRow;
use apilytics_core::types::{ApiKey, Timestamp};

/// A row from the `users` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Account {
    pub user_id: uuid::Uuid,
    pub api_key: ApiKey,
    pub created_at: Timestamp,
    pub last_accessed: Timestamp,
}
