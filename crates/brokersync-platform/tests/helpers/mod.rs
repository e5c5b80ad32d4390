//! In-memory mock of the remote platform API.
//!
//! Provides a scripted [`PlatformClient`] double that tracks calls,
//! concurrency and applied mutations, and supports failure scenarios
//! (failing chunks, failing job sequences).

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use brokersync_core::models::{
    Broker, Organization, ServiceOffering, ServicePlan, VisibilityRecord,
};
use brokersync_platform::client::{PlatformClient, VisibilityUpdate};
use brokersync_platform::error::{PlatformError, Result};
use brokersync_platform::job::{JobState, JobStatus};

/// Scripted platform double.
#[derive(Default)]
pub struct MockPlatform {
    pub brokers: Mutex<Vec<Broker>>,
    pub offerings: Mutex<Vec<ServiceOffering>>,
    pub plans: Mutex<Vec<ServicePlan>>,
    pub visibilities: Mutex<Vec<VisibilityRecord>>,
    pub organizations: Mutex<Vec<Organization>>,
    /// Job status responses, popped one per `get_job` call. When empty, the
    /// job reports `PROCESSING` forever.
    pub job_statuses: Mutex<VecDeque<Result<JobStatus>>>,
    /// Job URL returned by visibility mutations, if any.
    pub mutation_job_url: Mutex<Option<String>>,
    /// Plan GUIDs whose visibility chunk fails when queried.
    pub failing_plan_guids: Mutex<Vec<String>>,
    /// Organization GUIDs whose mutation fails.
    pub failing_organization_guids: Mutex<Vec<String>>,
    /// Recorded visibility mutations, in call order.
    pub mutations: Mutex<Vec<(String, VisibilityUpdate)>>,
    /// Artificial latency per visibility query, to observe concurrency.
    pub visibility_latency: Mutex<Option<Duration>>,
    pub visibility_calls: AtomicUsize,
    pub organization_calls: AtomicUsize,
    pub job_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the catalog listings.
    pub fn with_catalog(
        self,
        brokers: Vec<Broker>,
        offerings: Vec<ServiceOffering>,
        plans: Vec<ServicePlan>,
    ) -> Self {
        *self.brokers.lock().unwrap() = brokers;
        *self.offerings.lock().unwrap() = offerings;
        *self.plans.lock().unwrap() = plans;
        self
    }

    /// Script the next job status responses, oldest first.
    pub fn push_job_status(&self, status: Result<JobStatus>) {
        self.job_statuses.lock().unwrap().push_back(status);
    }

    /// Recorded mutations so far.
    pub fn recorded_mutations(&self) -> Vec<(String, VisibilityUpdate)> {
        self.mutations.lock().unwrap().clone()
    }

    fn track(&self) -> InFlightGuard<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlightGuard(self)
    }
}

struct InFlightGuard<'a>(&'a MockPlatform);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PlatformClient for MockPlatform {
    async fn list_brokers(&self) -> Result<Vec<Broker>> {
        Ok(self.brokers.lock().unwrap().clone())
    }

    async fn list_service_offerings(
        &self,
        broker_guids: &[String],
    ) -> Result<Vec<ServiceOffering>> {
        let offerings = self.offerings.lock().unwrap();
        if broker_guids.is_empty() {
            return Ok(offerings.clone());
        }
        Ok(offerings
            .iter()
            .filter(|o| broker_guids.contains(&o.broker_guid))
            .cloned()
            .collect())
    }

    async fn list_service_plans(&self, offering_guids: &[String]) -> Result<Vec<ServicePlan>> {
        let plans = self.plans.lock().unwrap();
        if offering_guids.is_empty() {
            return Ok(plans.clone());
        }
        Ok(plans
            .iter()
            .filter(|p| offering_guids.contains(&p.service_offering_guid))
            .cloned()
            .collect())
    }

    async fn list_visibilities(&self, plan_guids: &[String]) -> Result<Vec<VisibilityRecord>> {
        let _guard = self.track();
        self.visibility_calls.fetch_add(1, Ordering::SeqCst);

        let latency = *self.visibility_latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let failing = self.failing_plan_guids.lock().unwrap().clone();
        if let Some(bad) = plan_guids.iter().find(|g| failing.contains(g)) {
            return Err(PlatformError::request(
                format!("visibilities of plan {bad}"),
                "boom",
            ));
        }

        let visibilities = self.visibilities.lock().unwrap();
        Ok(visibilities
            .iter()
            .filter(|v| plan_guids.contains(&v.plan_guid))
            .cloned()
            .collect())
    }

    async fn list_organizations(&self, organization_guids: &[String]) -> Result<Vec<Organization>> {
        let _guard = self.track();
        self.organization_calls.fetch_add(1, Ordering::SeqCst);
        // Unknown GUIDs are silently absent from the listing.
        let organizations = self.organizations.lock().unwrap();
        Ok(organizations
            .iter()
            .filter(|o| organization_guids.contains(&o.guid))
            .cloned()
            .collect())
    }

    async fn get_job(&self, _job_url: &str) -> Result<JobStatus> {
        self.job_calls.fetch_add(1, Ordering::SeqCst);
        match self.job_statuses.lock().unwrap().pop_front() {
            Some(status) => status,
            None => Ok(JobStatus::new(JobState::Processing)),
        }
    }

    async fn update_plan_visibility(
        &self,
        plan_guid: &str,
        update: VisibilityUpdate,
    ) -> Result<Option<String>> {
        let _guard = self.track();

        let failing = self.failing_organization_guids.lock().unwrap().clone();
        let target_org = match &update {
            VisibilityUpdate::AddOrganization(org) | VisibilityUpdate::RemoveOrganization(org) => {
                Some(org.clone())
            }
            _ => None,
        };
        if let Some(org) = &target_org {
            if failing.contains(org) {
                return Err(PlatformError::request(
                    format!("visibility of organization {org}"),
                    "boom",
                ));
            }
        }

        self.mutations
            .lock()
            .unwrap()
            .push((plan_guid.to_string(), update));
        Ok(self.mutation_job_url.lock().unwrap().clone())
    }
}
