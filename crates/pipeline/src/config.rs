use std::time::Duration;

use apilytics_core::config::{env_or, ConfigError};

use crate::pacing::{Pacing, DEFAULT_PAUSE};

/// Largest accepted batch size. A request row binds 12 parameters and
/// PostgreSQL caps a statement at 65535 bind parameters.
pub const MAX_BATCH_SIZE: usize = 5000;

/// Batching and flush settings shared by every stream.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Events per batch (default: `1000`).
    pub batch_size: usize,
    /// Partial windows are flushed at least this often (default: `60s`).
    pub max_age: Duration,
    /// Closed batches a stream may have waiting for its worker (default: `16`).
    pub queue_capacity: usize,
    pub pacing: Pacing,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_age: Duration::from_secs(60),
            queue_capacity: 16,
            pacing: Pacing::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from environment variables.
    ///
    /// | Env Var                | Default  |
    /// |------------------------|----------|
    /// | `BATCH_SIZE`           | `1000`   |
    /// | `BATCH_MAX_AGE_SECS`   | `60`     |
    /// | `FLUSH_QUEUE_CAPACITY` | `16`     |
    /// | `FLUSH_PACING`         | `fixed`  |
    /// | `FLUSH_PAUSE_MS`       | `8000`   |
    /// | `FLUSH_PAUSE_MAX_MS`   | `30000`  |
    /// | `FLUSH_LATENCY_FACTOR` | `4.0`    |
    ///
    /// With `FLUSH_PACING=adaptive`, `FLUSH_PAUSE_MS` is the lower bound of
    /// the pause and `FLUSH_PAUSE_MAX_MS` the upper bound.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let batch_size: usize = env_or("BATCH_SIZE", defaults.batch_size)?;
        if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
            return Err(invalid(
                "BATCH_SIZE",
                batch_size,
                format!("must be between 1 and {MAX_BATCH_SIZE}"),
            ));
        }

        let max_age_secs: u64 = env_or("BATCH_MAX_AGE_SECS", defaults.max_age.as_secs())?;
        if max_age_secs == 0 {
            return Err(invalid("BATCH_MAX_AGE_SECS", max_age_secs, "must be at least 1"));
        }

        let queue_capacity: usize = env_or("FLUSH_QUEUE_CAPACITY", defaults.queue_capacity)?;
        if queue_capacity == 0 {
            return Err(invalid("FLUSH_QUEUE_CAPACITY", queue_capacity, "must be at least 1"));
        }

        let pause = Duration::from_millis(env_or(
            "FLUSH_PAUSE_MS",
            DEFAULT_PAUSE.as_millis() as u64,
        )?);
        let mode: String = env_or("FLUSH_PACING", "fixed".to_string())?;
        let pacing = match mode.trim().to_ascii_lowercase().as_str() {
            "fixed" => Pacing::Fixed(pause),
            "adaptive" => {
                let max = Duration::from_millis(env_or("FLUSH_PAUSE_MAX_MS", 30_000u64)?);
                if max < pause {
                    return Err(invalid(
                        "FLUSH_PAUSE_MAX_MS",
                        max.as_millis(),
                        "must not be below FLUSH_PAUSE_MS",
                    ));
                }
                let latency_factor: f64 = env_or("FLUSH_LATENCY_FACTOR", 4.0)?;
                if !latency_factor.is_finite() || latency_factor < 0.0 {
                    return Err(invalid(
                        "FLUSH_LATENCY_FACTOR",
                        latency_factor,
                        "must be a non-negative number",
                    ));
                }
                Pacing::Adaptive {
                    min: pause,
                    max,
                    latency_factor,
                }
            }
            _ => return Err(invalid("FLUSH_PACING", mode, "expected 'fixed' or 'adaptive'")),
        };

        Ok(Self {
            batch_size,
            max_age: Duration::from_secs(max_age_secs),
            queue_capacity,
            pacing,
        })
    }
}

fn invalid(name: &'static str, value: impl ToString, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.into(),
    }
}
