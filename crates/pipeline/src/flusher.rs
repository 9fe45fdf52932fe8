//! Bulk persistence of closed batches.
//!
//! [`flush`] writes one batch in one transaction. [`FlushWorker`] is the
//! long-lived task that drains a stream's queue, flushes each batch, and
//! paces itself between flushes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::batcher::Batcher;
use crate::pacing::Pacing;
use crate::persist::Persist;
use crate::stats::FlushStats;

/// Result of a committed flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushOutcome {
    pub written: u64,
    /// Rows in the batch that were not written.
    pub rejected: u64,
}

/// Write `batch` in a single transaction.
///
/// The connection is taken from the pool for this flush only and goes back
/// when the transaction guard drops. On error nothing from the batch is
/// committed; the batch is not retried.
pub async fn flush<T: Persist>(pool: &PgPool, batch: &[T]) -> Result<FlushOutcome, sqlx::Error> {
    if batch.is_empty() {
        return Ok(FlushOutcome::default());
    }

    let mut tx = pool.begin().await?;
    let written = T::insert_batch(&mut tx, batch).await?;
    tx.commit().await?;

    T::after_commit(pool, batch).await;

    Ok(FlushOutcome {
        written,
        rejected: (batch.len() as u64).saturating_sub(written),
    })
}

/// Background writer for one stream.
pub struct FlushWorker<T: Persist> {
    pool: PgPool,
    batcher: Arc<Batcher<T>>,
    queue: mpsc::Receiver<Vec<T>>,
    pacing: Pacing,
    max_age: Duration,
    stats: Arc<FlushStats>,
}

impl<T: Persist> FlushWorker<T> {
    /// `max_age` is how often a partially filled window is flushed anyway.
    pub fn new(
        pool: PgPool,
        batcher: Arc<Batcher<T>>,
        queue: mpsc::Receiver<Vec<T>>,
        pacing: Pacing,
        max_age: Duration,
        stats: Arc<FlushStats>,
    ) -> Self {
        Self {
            pool,
            batcher,
            queue,
            pacing,
            max_age: max_age.max(Duration::from_millis(1)),
            stats,
        }
    }

    /// Run until `cancel` is triggered, then drain.
    ///
    /// On cancellation the batcher is closed, queued batches are flushed
    /// back-to-back, and the last partial window is flushed after them. A
    /// flush already in progress always runs to completion.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.max_age);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        tracing::info!(
            stream = T::STREAM,
            batch_size = self.batcher.batch_size(),
            max_age_secs = self.max_age.as_secs(),
            pacing = ?self.pacing,
            "Flush worker started",
        );

        loop {
            let pause = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(batch) = self.queue.recv() => self.process(batch).await,
                _ = ticker.tick() => match self.batcher.take().await {
                    Some(batch) => {
                        tracing::debug!(stream = T::STREAM, rows = batch.len(), "Max batch age reached");
                        self.process(batch).await
                    }
                    None => continue,
                },
            };

            if !pause.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(pause) => {}
                }
            }
        }

        self.drain().await;
    }

    async fn drain(mut self) {
        tracing::info!(stream = T::STREAM, "Flush worker draining");
        let remainder = self.batcher.close().await;
        self.queue.close();

        while let Some(batch) = self.queue.recv().await {
            self.process(batch).await;
        }
        if !remainder.is_empty() {
            self.process(remainder).await;
        }

        let stats = self.stats.snapshot();
        tracing::info!(
            stream = T::STREAM,
            rows_written = stats.rows_written,
            rows_dropped = stats.rows_dropped,
            "Flush worker stopped",
        );
    }

    /// Flush one batch, record the outcome, and return the pause to apply.
    async fn process(&self, batch: Vec<T>) -> Duration {
        let rows = batch.len();
        let started = Instant::now();
        let result = flush(&self.pool, &batch).await;
        let latency = started.elapsed();

        match result {
            Ok(outcome) => {
                self.stats.record_success(outcome);
                if outcome.rejected > 0 {
                    tracing::warn!(
                        stream = T::STREAM,
                        rows,
                        rejected = outcome.rejected,
                        "Rows skipped during flush",
                    );
                }
                tracing::debug!(
                    stream = T::STREAM,
                    rows,
                    written = outcome.written,
                    latency_ms = latency.as_millis() as u64,
                    "Batch flushed",
                );
                self.pacing.next_pause(latency, true)
            }
            Err(e) => {
                self.stats.record_failure(rows);
                tracing::error!(
                    stream = T::STREAM,
                    rows,
                    error = %e,
                    "Batch flush failed, rows dropped",
                );
                self.pacing.next_pause(latency, false)
            }
        }
    }
}
