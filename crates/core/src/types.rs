/// Tenant identifier. Every persisted row is partitioned by this key.
pub type ApiKey = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
