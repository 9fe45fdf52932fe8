//! Per-stream wiring and lifecycle of the flush workers.

use std::sync::Arc;
use std::time::Duration;

use apilytics_core::record::{MonitorEvent, PingEvent, RequestEvent};
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::batcher::Batcher;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::flusher::FlushWorker;
use crate::persist::Persist;
use crate::stats::{FlushStats, FlushStatsSnapshot};

/// Append side of one entity stream.
pub struct StreamHandle<T> {
    batcher: Arc<Batcher<T>>,
    stats: Arc<FlushStats>,
}

impl<T: Persist> StreamHandle<T> {
    /// Append validated events to the open batch. Returns how many were
    /// accepted; the write itself happens later on the stream's worker.
    pub async fn submit(&self, events: Vec<T>) -> Result<usize, PipelineError> {
        self.batcher.extend(events).await
    }

    pub async fn pending(&self) -> usize {
        self.batcher.pending().await
    }

    pub fn stats(&self) -> FlushStatsSnapshot {
        self.stats.snapshot()
    }
}

/// Flush counters for every stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub requests: FlushStatsSnapshot,
    pub monitors: FlushStatsSnapshot,
    pub pings: FlushStatsSnapshot,
}

/// The three ingestion streams and their background workers.
pub struct Pipeline {
    pub requests: StreamHandle<RequestEvent>,
    pub monitors: StreamHandle<MonitorEvent>,
    pub pings: StreamHandle<PingEvent>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Pipeline {
    /// Create every stream and spawn its flush worker.
    pub fn start(pool: PgPool, config: &PipelineConfig) -> Self {
        let cancel = CancellationToken::new();
        let mut tasks = Vec::with_capacity(3);

        let requests = spawn_stream(&pool, config, &cancel, &mut tasks);
        let monitors = spawn_stream(&pool, config, &cancel, &mut tasks);
        let pings = spawn_stream(&pool, config, &cancel, &mut tasks);

        tracing::info!(
            batch_size = config.batch_size,
            queue_capacity = config.queue_capacity,
            "Ingestion pipeline started",
        );

        Self {
            requests,
            monitors,
            pings,
            cancel,
            tasks: Mutex::new(tasks),
        }
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            requests: self.requests.stats(),
            monitors: self.monitors.stats(),
            pings: self.pings.stats(),
        }
    }

    /// Stop accepting events, drain every stream, and wait for the workers.
    ///
    /// Returns `false` if the workers did not finish within `timeout`; any
    /// data they still held is lost. Calling this again is a no-op.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.cancel.cancel();
        let tasks = std::mem::take(&mut *self.tasks.lock().await);
        if tasks.is_empty() {
            return true;
        }

        match tokio::time::timeout(timeout, futures::future::join_all(tasks)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "Flush worker panicked");
                    }
                }
                tracing::info!("Ingestion pipeline drained");
                true
            }
            Err(_) => {
                tracing::error!(
                    timeout_secs = timeout.as_secs(),
                    stats = ?self.stats(),
                    "Ingestion pipeline did not drain in time, pending rows lost",
                );
                false
            }
        }
    }
}

fn spawn_stream<T: Persist>(
    pool: &PgPool,
    config: &PipelineConfig,
    cancel: &CancellationToken,
    tasks: &mut Vec<JoinHandle<()>>,
) -> StreamHandle<T> {
    let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
    let batcher = Arc::new(Batcher::new(config.batch_size, sender));
    let stats = Arc::new(FlushStats::default());

    let worker = FlushWorker::new(
        pool.clone(),
        Arc::clone(&batcher),
        receiver,
        config.pacing,
        config.max_age,
        Arc::clone(&stats),
    );
    tasks.push(tokio::spawn(worker.run(cancel.clone())));

    StreamHandle { batcher, stats }
}
