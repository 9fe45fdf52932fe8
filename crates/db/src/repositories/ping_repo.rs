//! Repository for the `pings` table (append-only time series).

use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use apilytics_core::record::PingEvent;
use apilytics_core::types::ApiKey;

use crate::models::ping::PingRow;

const COLUMNS: &str = "ping_id, api_key, url, response_time, status, created_at";

const INSERT_COLUMNS: &str = "api_key, url, response_time, status, created_at";

/// Provides query operations for ping results.
pub struct PingRepo;

impl PingRepo {
    /// Bulk-insert ping results. Rows for unknown accounts are skipped.
    pub async fn insert_batch(
        tx: &mut Transaction<'_, Postgres>,
        rows: &[PingEvent],
    ) -> Result<u64, sqlx::Error> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO pings ({INSERT_COLUMNS}) \
             SELECT v.api_key, v.url, v.response_time, v.status, v.created_at FROM ("
        ));
        query.push_values(rows, |mut row, event| {
            row.push_bind(event.api_key)
                .push_bind(event.url.clone())
                .push_bind(event.response_time)
                .push_bind(event.status)
                .push_bind(event.created_at);
        });
        query.push(format!(
            ") AS v ({INSERT_COLUMNS}) \
             WHERE EXISTS (SELECT 1 FROM users u WHERE u.api_key = v.api_key)"
        ));

        let result = query.build().execute(&mut **tx).await?;
        Ok(result.rows_affected())
    }

    pub async fn list_for_api_key(
        pool: &PgPool,
        api_key: ApiKey,
    ) -> Result<Vec<PingRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM pings WHERE api_key = $1 ORDER BY ping_id");
        sqlx::query_as::<_, PingRow>(&query)
            .bind(api_key)
            .fetch_all(pool)
            .await
    }
}
