//! # brokersync platform
//!
//! Reconciles service-broker metadata held by a control plane against a
//! remote platform's API, and answers fast queries about that state while
//! reconciliation is in flight.
//!
//! Three pieces cooperate:
//!
//! - [`resolver::PlanResolver`] - an in-memory join of broker, offering and
//!   plan records, answering point lookups without blocking readers behind
//!   network refreshes
//! - [`fanout::query_chunked`] - bounded-parallelism fan-out of chunked
//!   remote queries under one shared admission gate, with cancellation and
//!   full-failure-surface error aggregation
//! - [`job::JobPoller`] - a deadline-bounded poll loop for the platform's
//!   asynchronous jobs, scheduled through the same admission gate
//!
//! [`visibility::VisibilityService`] orchestrates the three behind the
//! [`client::PlatformClient`] boundary; transport, authentication and wire
//! decoding live in the client implementation, never here.
//!
//! ## Crate Organization
//!
//! - [`client`] - Remote platform client trait and mutation types
//! - [`error`] - Error taxonomy with composite fan-out failures
//! - [`fanout`] - Chunked fan-out engine
//! - [`job`] - Asynchronous job polling
//! - [`resolver`] - Plan resolver cache
//! - [`visibility`] - Visibility reconciliation services

pub mod client;
pub mod error;
pub mod fanout;
pub mod job;
pub mod resolver;
pub mod visibility;

pub use client::{PlatformClient, VisibilityUpdate};
pub use error::{CompositeError, PlatformError, Result};
pub use job::{JobError, JobFailureKind, JobPoller, JobState, JobStatus};
pub use resolver::PlanResolver;
pub use visibility::{AccessRequest, VisibilityService};
