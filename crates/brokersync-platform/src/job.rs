//! Asynchronous job polling.
//!
//! Some platform mutations run as background jobs identified by a URL. The
//! poller checks the job's status on a fixed interval until it reaches a
//! terminal state, bounded by a deadline, collecting any warnings reported
//! along the way.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::PlatformClient;
use crate::error::{PlatformError, Result};

/// Remote-reported state of an asynchronous job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// The platform has accepted the job and is working on it.
    Processing,
    /// The platform is itself waiting on a downstream operation.
    Polling,
    /// Terminal success.
    Complete,
    /// Terminal failure.
    Failed,
    /// A state this client does not know; treated as non-terminal.
    Other(String),
}

impl JobState {
    /// Parse the wire representation of a job state.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "PROCESSING" => JobState::Processing,
            "POLLING" => JobState::Polling,
            "COMPLETE" => JobState::Complete,
            "FAILED" => JobState::Failed,
            other => JobState::Other(other.to_string()),
        }
    }

    /// The wire representation of this state.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            JobState::Processing => "PROCESSING",
            JobState::Polling => "POLLING",
            JobState::Complete => "COMPLETE",
            JobState::Failed => "FAILED",
            JobState::Other(state) => state,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One status response for an asynchronous job.
#[derive(Debug, Clone)]
pub struct JobStatus {
    pub state: JobState,
    /// Advisory messages attached to this poll response.
    pub warnings: Vec<String>,
    /// Error details reported by the platform; meaningful when `state` is
    /// [`JobState::Failed`].
    pub errors: Vec<String>,
}

impl JobStatus {
    /// A bare status with no warnings or errors.
    #[must_use]
    pub fn new(state: JobState) -> Self {
        Self {
            state,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// Phase classification of a job failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobFailureKind {
    /// The status check call itself errored.
    Request,
    /// The platform reported the job as failed.
    Status,
    /// The deadline elapsed while the job was still running.
    Timeout,
    /// The platform reported failure without saying why.
    Unknown,
}

impl fmt::Display for JobFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobFailureKind::Request => "request",
            JobFailureKind::Status => "status",
            JobFailureKind::Timeout => "timeout",
            JobFailureKind::Unknown => "unknown",
        };
        write!(f, "{label}")
    }
}

/// Terminal failure of an asynchronous platform job.
#[derive(Debug, Error)]
#[error("job {job_url} failed ({kind}): {message}")]
pub struct JobError {
    pub kind: JobFailureKind,
    pub job_url: String,
    pub message: String,
    /// Warnings collected across every poll before the failure.
    pub warnings: Vec<String>,
}

/// Polls an asynchronous job until it reaches a terminal state.
///
/// The poller itself never touches the admission gate: callers submit one
/// poll sequence as a single unit of work while holding a slot, so job waits
/// share the parallel-request ceiling with fan-out work without being able
/// to deadlock against it.
#[derive(Clone)]
pub struct JobPoller {
    client: Arc<dyn PlatformClient>,
    poll_interval: Duration,
    timeout: Duration,
}

impl JobPoller {
    /// Create a poller checking every `poll_interval`, giving up once
    /// `timeout` has elapsed without a terminal state.
    #[must_use]
    pub fn new(client: Arc<dyn PlatformClient>, poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            client,
            poll_interval,
            timeout,
        }
    }

    /// Poll `job_url` until terminal, returning the warnings accumulated
    /// across every status response.
    ///
    /// Failure is a [`crate::job::JobError`] tagged with the phase that went
    /// wrong (the status request itself, a platform-reported failure, or the
    /// deadline), carrying the warnings gathered so far. Cancellation during
    /// the inter-poll sleep returns [`PlatformError::Cancelled`].
    pub async fn poll(&self, cancel: &CancellationToken, job_url: &str) -> Result<Vec<String>> {
        let started = Instant::now();
        let mut warnings: Vec<String> = Vec::new();
        let mut polls: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(PlatformError::Cancelled);
            }
            let status = match self.client.get_job(job_url).await {
                Ok(status) => status,
                Err(error) => {
                    return Err(JobError {
                        kind: JobFailureKind::Request,
                        job_url: job_url.to_string(),
                        message: error.to_string(),
                        warnings,
                    }
                    .into());
                }
            };
            polls += 1;
            warnings.extend(status.warnings);

            match status.state {
                JobState::Complete => {
                    debug!(job_url, polls, warnings = warnings.len(), "Job completed");
                    return Ok(warnings);
                }
                JobState::Failed => {
                    let (kind, message) = if status.errors.is_empty() {
                        (
                            JobFailureKind::Unknown,
                            "platform reported failure without details".to_string(),
                        )
                    } else {
                        (JobFailureKind::Status, status.errors.join("; "))
                    };
                    return Err(JobError {
                        kind,
                        job_url: job_url.to_string(),
                        message,
                        warnings,
                    }
                    .into());
                }
                state => {
                    if started.elapsed() >= self.timeout {
                        return Err(JobError {
                            kind: JobFailureKind::Timeout,
                            job_url: job_url.to_string(),
                            message: format!(
                                "job still {state} after {}ms",
                                self.timeout.as_millis()
                            ),
                            warnings,
                        }
                        .into());
                    }
                    debug!(job_url, %state, polls, "Job not terminal yet");
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(PlatformError::Cancelled),
                        () = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
            }
        }
    }
}
