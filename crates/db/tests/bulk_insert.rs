//! Integration tests for the transactional bulk inserts.

use apilytics_core::record::{HttpMethod, MonitorEvent, PingEvent, RequestEvent};
use apilytics_core::types::ApiKey;
use apilytics_db::repositories::{AccountRepo, MonitorRepo, PingRepo, RequestRepo};
use chrono::{TimeZone, Utc};
use sqlx::PgPool;

async fn setup(pool: &PgPool) -> ApiKey {
    apilytics_db::ensure_schema(pool).await.unwrap();
    AccountRepo::create(pool).await.unwrap().api_key
}

fn request(api_key: ApiKey, path: &str) -> RequestEvent {
    RequestEvent {
        api_key,
        hostname: None,
        path: path.to_string(),
        user_agent: None,
        method: HttpMethod::Get,
        response_time: 42,
        status: 200,
        framework: 1,
        ip_address: None,
        location: None,
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    }
}

async fn count(pool: &PgPool, table: &str) -> i64 {
    let (n,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap();
    n
}

#[sqlx::test(migrations = false)]
async fn request_row_stores_every_field(pool: PgPool) {
    let api_key = setup(&pool).await;
    let event = RequestEvent {
        hostname: Some("api.example.com".into()),
        user_agent: Some("curl/8.0".into()),
        method: HttpMethod::Delete,
        status: 404,
        ip_address: Some("203.0.113.7".parse().unwrap()),
        location: Some("FI".into()),
        ..request(api_key, "/v1/items/3")
    };

    let mut tx = pool.begin().await.unwrap();
    let written = RequestRepo::insert_batch(&mut tx, &[event.clone()])
        .await
        .unwrap();
    tx.commit().await.unwrap();
    assert_eq!(written, 1);

    let rows = RequestRepo::list_for_api_key(&pool, api_key).await.unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.path, "/v1/items/3");
    assert_eq!(row.hostname.as_deref(), Some("api.example.com"));
    assert_eq!(row.user_agent.as_deref(), Some("curl/8.0"));
    assert!(row.user_agent_id.is_some());
    assert_eq!(row.method, 4);
    assert_eq!(row.response_time, 42);
    assert_eq!(row.framework, 1);
    assert_eq!(row.status, 404);
    assert_eq!(row.ip_address.as_deref(), Some("203.0.113.7"));
    assert_eq!(row.location.as_deref(), Some("FI"));
    assert_eq!(row.created_at, event.created_at);
}

#[sqlx::test(migrations = false)]
async fn null_and_empty_strings_stay_distinct(pool: PgPool) {
    let api_key = setup(&pool).await;
    let with_null = request(api_key, "/a");
    let with_empty = RequestEvent {
        hostname: Some(String::new()),
        ..request(api_key, "/b")
    };

    let mut tx = pool.begin().await.unwrap();
    RequestRepo::insert_batch(&mut tx, &[with_null, with_empty])
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let rows = RequestRepo::list_for_api_key(&pool, api_key).await.unwrap();
    assert_eq!(rows[0].hostname, None);
    assert_eq!(rows[1].hostname.as_deref(), Some(""));
}

#[sqlx::test(migrations = false)]
async fn repeated_user_agents_share_one_lookup_row(pool: PgPool) {
    let api_key = setup(&pool).await;
    let ua = |path: &str, agent: &str| RequestEvent {
        user_agent: Some(agent.to_string()),
        ..request(api_key, path)
    };

    let mut tx = pool.begin().await.unwrap();
    RequestRepo::insert_batch(
        &mut tx,
        &[ua("/1", "agent-a"), ua("/2", "agent-b"), ua("/3", "agent-a")],
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let mut tx = pool.begin().await.unwrap();
    RequestRepo::insert_batch(&mut tx, &[ua("/4", "agent-a")])
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(count(&pool, "user_agents").await, 2);
    let rows = RequestRepo::list_for_api_key(&pool, api_key).await.unwrap();
    assert_eq!(rows[0].user_agent_id, rows[2].user_agent_id);
    assert_eq!(rows[0].user_agent_id, rows[3].user_agent_id);
    assert_ne!(rows[0].user_agent_id, rows[1].user_agent_id);
}

#[sqlx::test(migrations = false)]
async fn rows_for_unknown_keys_are_skipped(pool: PgPool) {
    let api_key = setup(&pool).await;

    let mut tx = pool.begin().await.unwrap();
    let written = RequestRepo::insert_batch(
        &mut tx,
        &[request(api_key, "/ok"), request(uuid::Uuid::new_v4(), "/orphan")],
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(written, 1);
    assert_eq!(count(&pool, "requests").await, 1);
}

#[sqlx::test(migrations = false)]
async fn failed_batch_leaves_nothing_behind(pool: PgPool) {
    let api_key = setup(&pool).await;
    let too_long = RequestEvent {
        user_agent: Some("agent-x".into()),
        ..request(api_key, &"p".repeat(300))
    };
    let fine = RequestEvent {
        user_agent: Some("agent-y".into()),
        ..request(api_key, "/fine")
    };

    let mut tx = pool.begin().await.unwrap();
    let result = RequestRepo::insert_batch(&mut tx, &[fine, too_long]).await;
    assert!(result.is_err());
    tx.rollback().await.unwrap();

    assert_eq!(count(&pool, "requests").await, 0);
    assert_eq!(count(&pool, "user_agents").await, 0);
}

#[sqlx::test(migrations = false)]
async fn duplicate_monitors_are_ignored(pool: PgPool) {
    let api_key = setup(&pool).await;
    let monitor = MonitorEvent {
        api_key,
        url: "status.example.com".into(),
        secure: true,
        ping: true,
        created_at: Utc::now(),
    };

    let mut tx = pool.begin().await.unwrap();
    let first = MonitorRepo::insert_batch(&mut tx, &[monitor.clone(), monitor.clone()])
        .await
        .unwrap();
    tx.commit().await.unwrap();
    assert_eq!(first, 1);

    let mut tx = pool.begin().await.unwrap();
    let second = MonitorRepo::insert_batch(&mut tx, &[monitor]).await.unwrap();
    tx.commit().await.unwrap();
    assert_eq!(second, 0);

    let rows = MonitorRepo::list_for_api_key(&pool, api_key).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].secure);
}

#[sqlx::test(migrations = false)]
async fn pings_are_appended(pool: PgPool) {
    let api_key = setup(&pool).await;
    let ping = |status: i16| PingEvent {
        api_key,
        url: "status.example.com".into(),
        response_time: 120,
        status,
        created_at: Utc::now(),
    };

    let mut tx = pool.begin().await.unwrap();
    let written = PingRepo::insert_batch(&mut tx, &[ping(200), ping(503)])
        .await
        .unwrap();
    tx.commit().await.unwrap();
    assert_eq!(written, 2);

    let rows = PingRepo::list_for_api_key(&pool, api_key).await.unwrap();
    let mut statuses: Vec<_> = rows.iter().map(|r| r.status).collect();
    statuses.sort();
    assert_eq!(statuses, vec![Some(200), Some(503)]);
    assert!(rows.iter().all(|r| r.response_time == Some(120)));
}
