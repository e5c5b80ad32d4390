//! Reconciliation settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Error returned when settings fail validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid settings: {0}")]
pub struct InvalidSettings(pub &'static str);

/// Tuning knobs for remote fan-out and job polling.
///
/// Values are provided by the embedding application (how they are loaded is
/// out of scope here) and validated once at service construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSettings {
    /// Maximum identifiers per chunked remote query.
    pub chunk_size: usize,
    /// Global ceiling on simultaneous in-flight remote requests.
    pub max_parallel: usize,
    /// Seconds between consecutive job status checks.
    pub job_poll_interval_secs: u64,
    /// Seconds after which a still-running job is given up on.
    pub job_poll_timeout_secs: u64,
}

impl ReconcileSettings {
    /// Interval between job status checks as a `Duration`.
    #[must_use]
    pub fn job_poll_interval(&self) -> Duration {
        Duration::from_secs(self.job_poll_interval_secs)
    }

    /// Job polling deadline as a `Duration`.
    #[must_use]
    pub fn job_poll_timeout(&self) -> Duration {
        Duration::from_secs(self.job_poll_timeout_secs)
    }

    /// Check that this configuration is usable.
    pub fn validate(&self) -> Result<(), InvalidSettings> {
        if self.chunk_size < 1 {
            return Err(InvalidSettings("chunk size must be at least 1"));
        }
        if self.chunk_size > 10_000 {
            return Err(InvalidSettings("chunk size cannot exceed 10000"));
        }
        if self.max_parallel < 1 {
            return Err(InvalidSettings("max parallel requests must be at least 1"));
        }
        if self.job_poll_interval_secs < 1 {
            return Err(InvalidSettings("job poll interval must be at least 1 second"));
        }
        if self.job_poll_timeout_secs <= self.job_poll_interval_secs {
            return Err(InvalidSettings("job poll timeout must exceed the poll interval"));
        }
        Ok(())
    }
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            max_parallel: 50,
            job_poll_interval_secs: 2,
            job_poll_timeout_secs: 600,
        }
    }
}
