//! Batching and bulk persistence for ingested events.
//!
//! Each entity stream (requests, monitors, pings) has a [`Batcher`] that the
//! intake boundary appends to, a bounded queue of closed batches, and one
//! [`FlushWorker`] task that writes those batches to PostgreSQL with a pause
//! between flushes. [`Pipeline`] wires the three streams together and owns
//! their shutdown.

pub mod batcher;
pub mod config;
pub mod error;
pub mod flusher;
pub mod pacing;
pub mod persist;
pub mod stats;
pub mod streams;

pub use batcher::Batcher;
pub use config::PipelineConfig;
pub use error::PipelineError;
pub use flusher::{flush, FlushOutcome, FlushWorker};
pub use pacing::Pacing;
pub use persist::Persist;
pub use stats::{FlushStats, FlushStatsSnapshot};
pub use streams::{Pipeline, PipelineStats, StreamHandle};
