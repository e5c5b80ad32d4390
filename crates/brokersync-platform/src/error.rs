//! Error types for platform reconciliation.

use std::fmt;
use thiserror::Error;

use crate::job::JobError;

/// Errors produced by the reconciliation core.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The requested entity is not present in the resolver cache.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The targeted plan already has the requested visibility.
    #[error("plan {catalog_plan_id} of broker {broker_name} is already {}", state_word(.public))]
    AlreadyInState {
        catalog_plan_id: String,
        broker_name: String,
        public: bool,
    },

    /// A remote request failed outright.
    #[error("request failed ({context}): {message}")]
    Request { context: String, message: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// One or more chunk queries of a fan-out operation failed.
    #[error(transparent)]
    Composite(#[from] CompositeError),

    /// An asynchronous platform job did not succeed.
    #[error(transparent)]
    Job(#[from] JobError),

    /// The caller's cancellation signal fired.
    #[error("operation cancelled")]
    Cancelled,
}

impl PlatformError {
    /// Create a not-found error.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create a request error carrying the identifiers involved.
    pub fn request(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Request {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Check if this error was caused by cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PlatformError::Cancelled)
    }
}

/// Result type for platform reconciliation operations.
pub type Result<T> = std::result::Result<T, PlatformError>;

/// Aggregate of every failure from one chunked fan-out operation.
///
/// Callers see the full failure surface of a fan-out, not just the first
/// chunk that went wrong.
#[derive(Debug, Default)]
pub struct CompositeError {
    errors: Vec<PlatformError>,
}

impl CompositeError {
    /// Create an empty aggregate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one chunk failure.
    pub fn push(&mut self, error: PlatformError) {
        self.errors.push(error);
    }

    /// True when no failure has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of recorded failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// The recorded failures, in completion order.
    #[must_use]
    pub fn errors(&self) -> &[PlatformError] {
        &self.errors
    }
}

impl fmt::Display for CompositeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} chunk queries failed: ", self.errors.len())?;
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompositeError {}

fn state_word(public: &bool) -> &'static str {
    if *public {
        "public"
    } else {
        "restricted"
    }
}
