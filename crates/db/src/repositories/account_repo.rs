//! Repository for the `users` table: provisioning, access tracking, and the
//! per-account purge used when a tenant is offboarded.

use sqlx::PgPool;
use apilytics_core::types::ApiKey;

use crate::models::account::Account;

/// Column list for `users` SELECT queries.
const COLUMNS: &str = "user_id, api_key, created_at, last_accessed";

/// Delete statements run by [`AccountRepo::purge`], children before parent.
const PURGE_STATEMENTS: [&str; 4] = [
    "DELETE FROM pings WHERE api_key = $1",
    "DELETE FROM monitor WHERE api_key = $1",
    "DELETE FROM requests WHERE api_key = $1",
    "DELETE FROM users WHERE api_key = $1",
];

/// Provides query operations for accounts.
pub struct AccountRepo;

impl AccountRepo {
    /// Provision a new account with a generated `user_id` and `api_key`.
    pub async fn create(pool: &PgPool) -> Result<Account, sqlx::Error> {
        let query = format!("INSERT INTO users DEFAULT VALUES RETURNING {COLUMNS}");
        sqlx::query_as::<_, Account>(&query).fetch_one(pool).await
    }

    /// Find an account by its API key.
    pub async fn find_by_api_key(
        pool: &PgPool,
        api_key: ApiKey,
    ) -> Result<Option<Account>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE api_key = $1");
        sqlx::query_as::<_, Account>(&query)
            .bind(api_key)
            .fetch_optional(pool)
            .await
    }

    /// Set `last_accessed = NOW()` for every listed key.
    ///
    /// Returns the number of accounts touched. Unknown keys are ignored.
    pub async fn touch_many(pool: &PgPool, api_keys: &[ApiKey]) -> Result<u64, sqlx::Error> {
        if api_keys.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("UPDATE users SET last_accessed = NOW() WHERE api_key = ANY($1)")
            .bind(api_keys)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete an account and every row it owns in one transaction.
    ///
    /// Returns `false` if no account had this key. Shared `user_agents`
    /// rows are left in place.
    pub async fn purge(pool: &PgPool, api_key: ApiKey) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut deleted_user = 0;
        for statement in PURGE_STATEMENTS {
            deleted_user = sqlx::query(statement)
                .bind(api_key)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;

        tracing::info!(%api_key, found = deleted_user > 0, "Account purged");
        Ok(deleted_user > 0)
    }
}
