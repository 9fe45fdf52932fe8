//! Repository for the `requests` table (append-only time series).

use std::collections::BTreeSet;

use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use apilytics_core::record::RequestEvent;
use apilytics_core::types::ApiKey;

use crate::models::request::RequestRow;

/// Column list for `requests` SELECT queries.
const COLUMNS: &str = "\
    request_id, api_key, host(ip_address) AS ip_address, path, hostname, \
    user_agent, user_agent_id, method, response_time, framework, status, \
    location, created_at";

/// Column list for `requests` INSERT statements (excludes `request_id`).
const INSERT_COLUMNS: &str = "\
    api_key, ip_address, path, hostname, user_agent, user_agent_id, \
    method, response_time, framework, status, location, created_at";

/// Names of the bound columns in the `VALUES` derived table.
const VALUE_COLUMNS: &str = "\
    ord, api_key, ip_address, path, hostname, user_agent, \
    method, response_time, framework, status, location, created_at";

/// Provides query operations for request records.
pub struct RequestRepo;

impl RequestRepo {
    /// Bulk-insert a batch of request events in a single statement.
    ///
    /// Distinct user-agent strings are first upserted into `user_agents`;
    /// each row's `user_agent_id` is then resolved by join. Rows whose
    /// `api_key` has no account are skipped. Every value is bound as a
    /// parameter; `None` binds as SQL `NULL`. `request_id`s follow batch
    /// order.
    ///
    /// Returns the number of rows written.
    pub async fn insert_batch(
        tx: &mut Transaction<'_, Postgres>,
        rows: &[RequestEvent],
    ) -> Result<u64, sqlx::Error> {
        if rows.is_empty() {
            return Ok(0);
        }

        // Sorted so concurrent flushes take `user_agents` row locks in the same order.
        let user_agents: Vec<String> = rows
            .iter()
            .filter_map(|r| r.user_agent.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if !user_agents.is_empty() {
            sqlx::query(
                "INSERT INTO user_agents (user_agent) \
                 SELECT UNNEST($1::TEXT[]) \
                 ON CONFLICT (user_agent) DO NOTHING",
            )
            .bind(&user_agents)
            .execute(&mut **tx)
            .await?;
        }

        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO requests ({INSERT_COLUMNS}) \
             SELECT v.api_key, v.ip_address::INET, v.path, v.hostname, v.user_agent, ua.id, \
                    v.method, v.response_time, v.framework, v.status, v.location, v.created_at \
             FROM ("
        ));
        query.push_values(rows.iter().enumerate(), |mut row, (ord, event)| {
            row.push_bind(ord as i32)
                .push_bind(event.api_key)
                .push_bind(event.ip_address.map(|ip| ip.to_string()))
                .push_bind(event.path.clone())
                .push_bind(event.hostname.clone())
                .push_bind(event.user_agent.clone())
                .push_bind(event.method.code())
                .push_bind(event.response_time)
                .push_bind(event.framework)
                .push_bind(event.status)
                .push_bind(event.location.clone())
                .push_bind(event.created_at);
        });
        query.push(format!(
            ") AS v ({VALUE_COLUMNS}) \
             LEFT JOIN user_agents ua ON ua.user_agent = v.user_agent \
             WHERE EXISTS (SELECT 1 FROM users u WHERE u.api_key = v.api_key) \
             ORDER BY v.ord"
        ));

        let result = query.build().execute(&mut **tx).await?;
        Ok(result.rows_affected())
    }

    /// List all request rows for a tenant in insertion order.
    pub async fn list_for_api_key(
        pool: &PgPool,
        api_key: ApiKey,
    ) -> Result<Vec<RequestRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM requests WHERE api_key = $1 ORDER BY request_id"
        );
        sqlx::query_as::<_, RequestRow>(&query)
            .bind(api_key)
            .fetch_all(pool)
            .await
    }
}
