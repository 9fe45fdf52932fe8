//! Binding of each event type to its repository.

use std::collections::BTreeSet;

use apilytics_core::record::{MonitorEvent, PingEvent, RequestEvent};
use apilytics_db::repositories::{AccountRepo, MonitorRepo, PingRepo, RequestRepo};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

/// An event type that can be bulk-written by a flush worker.
#[async_trait]
pub trait Persist: Send + Sync + Sized + 'static {
    /// Stream name used in logs and stats.
    const STREAM: &'static str;

    /// Write `batch` inside `tx`. Returns the number of rows written.
    async fn insert_batch(
        tx: &mut Transaction<'_, Postgres>,
        batch: &[Self],
    ) -> Result<u64, sqlx::Error>;

    /// Best-effort follow-up after the batch committed.
    async fn after_commit(_pool: &PgPool, _batch: &[Self]) {}
}

#[async_trait]
impl Persist for RequestEvent {
    const STREAM: &'static str = "requests";

    async fn insert_batch(
        tx: &mut Transaction<'_, Postgres>,
        batch: &[Self],
    ) -> Result<u64, sqlx::Error> {
        RequestRepo::insert_batch(tx, batch).await
    }

    /// Refresh `last_accessed` for every account seen in the batch.
    async fn after_commit(pool: &PgPool, batch: &[Self]) {
        let keys: Vec<_> = batch
            .iter()
            .map(|event| event.api_key)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if let Err(e) = AccountRepo::touch_many(pool, &keys).await {
            tracing::warn!(error = %e, accounts = keys.len(), "Failed to update last_accessed");
        }
    }
}

#[async_trait]
impl Persist for MonitorEvent {
    const STREAM: &'static str = "monitors";

    async fn insert_batch(
        tx: &mut Transaction<'_, Postgres>,
        batch: &[Self],
    ) -> Result<u64, sqlx::Error> {
        MonitorRepo::insert_batch(tx, batch).await
    }
}

#[async_trait]
impl Persist for PingEvent {
    const STREAM: &'static str = "pings";

    async fn insert_batch(
        tx: &mut Transaction<'_, Postgres>,
        batch: &[Self],
    ) -> Result<u64, sqlx::Error> {
        PingRepo::insert_batch(tx, batch).await
    }
}
