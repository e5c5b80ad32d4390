//! brokersync core library
//!
//! Shared types for reconciling service-broker metadata against a remote
//! platform.
//!
//! # Modules
//!
//! - [`models`] - Domain records (brokers, offerings, plans, visibilities)
//! - [`settings`] - Reconciliation tuning knobs

pub mod models;
pub mod settings;

// Re-export main types for convenient access
pub use models::{
    Broker, Organization, PlanData, ServiceOffering, ServicePlan, Visibility, VisibilityRecord,
};
pub use settings::{InvalidSettings, ReconcileSettings};
