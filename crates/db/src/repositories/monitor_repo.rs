//! Repository for the `monitor` table.

use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use apilytics_core::record::MonitorEvent;
use apilytics_core::types::ApiKey;

use crate::models::monitor::MonitorRow;

const COLUMNS: &str = "monitor_id, api_key, url, secure, ping, created_at";

const INSERT_COLUMNS: &str = "api_key, url, secure, ping, created_at";

/// Provides query operations for monitor configurations.
pub struct MonitorRepo;

impl MonitorRepo {
    /// Bulk-insert monitor configurations.
    ///
    /// A (`api_key`, `url`) pair that is already registered, or repeated
    /// within the batch, is skipped rather than failing the batch.
    pub async fn insert_batch(
        tx: &mut Transaction<'_, Postgres>,
        rows: &[MonitorEvent],
    ) -> Result<u64, sqlx::Error> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO monitor ({INSERT_COLUMNS}) \
             SELECT v.api_key, v.url, v.secure, v.ping, v.created_at FROM ("
        ));
        query.push_values(rows, |mut row, event| {
            row.push_bind(event.api_key)
                .push_bind(event.url.clone())
                .push_bind(event.secure)
                .push_bind(event.ping)
                .push_bind(event.created_at);
        });
        query.push(format!(
            ") AS v ({INSERT_COLUMNS}) \
             WHERE EXISTS (SELECT 1 FROM users u WHERE u.api_key = v.api_key) \
             ON CONFLICT (api_key, url) DO NOTHING"
        ));

        let result = query.build().execute(&mut **tx).await?;
        Ok(result.rows_affected())
    }

    pub async fn list_for_api_key(
        pool: &PgPool,
        api_key: ApiKey,
    ) -> Result<Vec<MonitorRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM monitor WHERE api_key = $1 ORDER BY monitor_id");
        sqlx::query_as::<_, MonitorRow>(&query)
            .bind(api_key)
            .fetch_all(pool)
            .await
    }
}
