//! Remote platform client boundary.
//!
//! The reconciliation core talks to the remote platform exclusively through
//! [`PlatformClient`]. Implementations own transport, authentication,
//! pagination and wire decoding; the core only ever sees resolved records.

use async_trait::async_trait;

use brokersync_core::models::{
    Broker, Organization, ServiceOffering, ServicePlan, VisibilityRecord,
};

use crate::error::Result;
use crate::job::JobStatus;

/// A visibility mutation to apply to one service plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityUpdate {
    /// Make the plan visible everywhere.
    SetPublic,
    /// Remove every discrete visibility from the plan.
    ClearAll,
    /// Grant the plan to one organization.
    AddOrganization(String),
    /// Revoke the plan from one organization.
    RemoveOrganization(String),
}

/// Access to the remote platform's resource API.
///
/// Listing methods page transparently until the result set is exhausted and
/// return plain records. Filter slices restrict the result to the given
/// GUIDs; an empty slice means "everything" for the catalog listings, while
/// the visibility and organization listings treat their input as the exact
/// query set.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// List every registered service broker.
    async fn list_brokers(&self) -> Result<Vec<Broker>>;

    /// List service offerings, optionally restricted to the given brokers.
    async fn list_service_offerings(&self, broker_guids: &[String])
        -> Result<Vec<ServiceOffering>>;

    /// List service plans, optionally restricted to the given offerings.
    async fn list_service_plans(&self, offering_guids: &[String]) -> Result<Vec<ServicePlan>>;

    /// List discrete visibility records for the given plans.
    async fn list_visibilities(&self, plan_guids: &[String]) -> Result<Vec<VisibilityRecord>>;

    /// List the organizations matching the given GUIDs.
    ///
    /// GUIDs unknown to the platform are absent from the result rather than
    /// reported as errors.
    async fn list_organizations(&self, organization_guids: &[String])
        -> Result<Vec<Organization>>;

    /// Fetch the current status of an asynchronous job.
    async fn get_job(&self, job_url: &str) -> Result<JobStatus>;

    /// Apply a visibility mutation to a plan.
    ///
    /// Returns the URL of the asynchronous job executing the change when the
    /// platform runs it in the background, `None` when it applied
    /// synchronously.
    async fn update_plan_visibility(
        &self,
        plan_guid: &str,
        update: VisibilityUpdate,
    ) -> Result<Option<String>>;
}
