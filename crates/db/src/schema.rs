//! Schema initializer.
//!
//! Every statement is guarded by `IF NOT EXISTS`, so [`ensure_schema`] can be
//! run on every startup, by any number of instances at once, without an
//! external lock.

use sqlx::PgPool;

/// Tables, constraints, and indexes for all four entity kinds plus the
/// deduplicated user-agent lookup.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    user_id       UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    api_key       UUID NOT NULL UNIQUE DEFAULT gen_random_uuid(),
    created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    last_accessed TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS user_agents (
    id         SERIAL PRIMARY KEY,
    user_agent VARCHAR(255) NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS requests (
    request_id    BIGSERIAL PRIMARY KEY,
    api_key       UUID NOT NULL REFERENCES users (api_key),
    ip_address    INET,
    path          VARCHAR(255) NOT NULL,
    hostname      VARCHAR(255),
    user_agent    VARCHAR(255),
    user_agent_id INTEGER REFERENCES user_agents (id),
    method        SMALLINT NOT NULL CHECK (method BETWEEN 0 AND 8),
    response_time INTEGER NOT NULL CHECK (response_time >= 0),
    framework     SMALLINT NOT NULL,
    status        SMALLINT NOT NULL,
    location      VARCHAR(255),
    created_at    TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS monitor (
    monitor_id BIGSERIAL PRIMARY KEY,
    api_key    UUID NOT NULL REFERENCES users (api_key),
    url        VARCHAR(255) NOT NULL,
    secure     BOOLEAN NOT NULL,
    ping       BOOLEAN NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS pings (
    ping_id       BIGSERIAL PRIMARY KEY,
    api_key       UUID NOT NULL REFERENCES users (api_key),
    url           VARCHAR(255) NOT NULL,
    response_time INTEGER,
    status        SMALLINT,
    created_at    TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_users_api_key ON users (api_key);

CREATE INDEX IF NOT EXISTS idx_requests_api_key ON requests (api_key);
CREATE INDEX IF NOT EXISTS idx_requests_created_at ON requests (created_at);
CREATE INDEX IF NOT EXISTS idx_requests_user_agent_id ON requests (user_agent_id);

CREATE INDEX IF NOT EXISTS idx_monitor_api_key ON monitor (api_key);
CREATE UNIQUE INDEX IF NOT EXISTS idx_monitor_api_key_url ON monitor (api_key, url);

CREATE INDEX IF NOT EXISTS idx_pings_api_key ON pings (api_key);
CREATE INDEX IF NOT EXISTS idx_pings_api_key_url ON pings (api_key, url);
"#;

/// PostgreSQL `unique_violation`: raised on `pg_type` when two sessions
/// create the same table at the same instant.
const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL `duplicate_table` (also used for indexes).
const DUPLICATE_TABLE: &str = "42P07";

/// Create all tables and indexes that do not exist yet.
///
/// `IF NOT EXISTS` is not fully race-free in PostgreSQL: two instances
/// starting together can both pass the existence check. The loser sees a
/// duplicate error; the script is then re-run once, which succeeds because
/// the objects now exist.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    match sqlx::raw_sql(SCHEMA_SQL).execute(pool).await {
        Ok(_) => {
            tracing::debug!("Schema ensured");
            Ok(())
        }
        Err(e) if is_concurrent_create(&e) => {
            tracing::warn!(error = %e, "Concurrent schema creation detected, retrying once");
            sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn is_concurrent_create(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => matches!(
            db_err.code().as_deref(),
            Some(UNIQUE_VIOLATION | DUPLICATE_TABLE)
        ),
        _ => false,
    }
}
