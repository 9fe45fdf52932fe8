//! Pause between consecutive flushes of one stream.

use std::time::Duration;

/// Default fixed pause after each flush.
pub const DEFAULT_PAUSE: Duration = Duration::from_secs(8);

/// How long a flush worker waits before taking the next batch.
///
/// The pause bounds write pressure on the datastore: a stream never runs
/// flushes back-to-back while it is pacing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pacing {
    /// Same pause after every flush, successful or not.
    Fixed(Duration),
    /// Pause proportional to how long the last flush took, clamped to
    /// `[min, max]`. A failed flush is followed by `max`.
    Adaptive {
        min: Duration,
        max: Duration,
        latency_factor: f64,
    },
}

impl Default for Pacing {
    fn default() -> Self {
        Pacing::Fixed(DEFAULT_PAUSE)
    }
}

impl Pacing {
    /// Pause to apply after a flush that took `latency`.
    pub fn next_pause(&self, latency: Duration, succeeded: bool) -> Duration {
        match *self {
            Pacing::Fixed(pause) => pause,
            Pacing::Adaptive {
                min,
                max,
                latency_factor,
            } => {
                if !succeeded {
                    return max;
                }
                Duration::try_from_secs_f64(latency.as_secs_f64() * latency_factor)
                    .unwrap_or(max)
                    .max(min)
                    .min(max)
            }
        }
    }
}
