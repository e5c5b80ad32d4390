//! Visibility reconciliation services.
//!
//! Orchestrates the plan resolver, the chunked fan-out engine and the job
//! poller to answer "which plans are visible where" and to change a plan's
//! visibility, resolving catalog identifiers to platform GUIDs through the
//! resolver before any remote call.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use brokersync_core::models::{PlanData, Visibility};
use brokersync_core::settings::ReconcileSettings;

use crate::client::{PlatformClient, VisibilityUpdate};
use crate::error::{PlatformError, Result};
use crate::fanout::query_chunked;
use crate::job::JobPoller;
use crate::resolver::PlanResolver;

/// A request to change who can consume one service plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequest {
    pub catalog_plan_id: String,
    pub broker_name: String,
    /// Organizations to scope the change to. Empty means the change is
    /// global: make the plan public, or clear every discrete visibility.
    pub organization_guids: Vec<String>,
}

/// Visibility reconciliation facade over one remote platform.
///
/// All remote traffic issued through this service shares one admission gate
/// of `max_parallel` slots — chunked queries, per-organization mutations and
/// job polls alike.
pub struct VisibilityService {
    client: Arc<dyn PlatformClient>,
    resolver: PlanResolver,
    gate: Arc<Semaphore>,
    chunk_size: usize,
    poller: JobPoller,
}

impl VisibilityService {
    /// Create a service from validated settings.
    pub fn new(client: Arc<dyn PlatformClient>, settings: &ReconcileSettings) -> Result<Self> {
        settings
            .validate()
            .map_err(|e| PlatformError::configuration(e.to_string()))?;
        Ok(Self {
            client: Arc::clone(&client),
            resolver: PlanResolver::new(),
            gate: Arc::new(Semaphore::new(settings.max_parallel)),
            chunk_size: settings.chunk_size,
            poller: JobPoller::new(
                client,
                settings.job_poll_interval(),
                settings.job_poll_timeout(),
            ),
        })
    }

    /// Override the job polling cadence.
    ///
    /// Settings express the cadence in whole seconds; embedders driving a
    /// fast platform (and tests) can tighten it here.
    #[must_use]
    pub fn with_job_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poller = JobPoller::new(Arc::clone(&self.client), interval, timeout);
        self
    }

    /// Rebuild the plan resolver from a full platform listing.
    ///
    /// Readers of the resolver keep getting the previous index until the
    /// rebuilt one is swapped in.
    #[instrument(skip(self, cancel))]
    pub async fn reset_cache(&self, cancel: &CancellationToken) -> Result<()> {
        ensure_live(cancel)?;
        let brokers = self.client.list_brokers().await?;
        let offerings = self.client.list_service_offerings(&[]).await?;
        let plans = self.client.list_service_plans(&[]).await?;
        info!(
            brokers = brokers.len(),
            offerings = offerings.len(),
            plans = plans.len(),
            "Rebuilding plan resolver"
        );
        self.resolver.reset(brokers, offerings, plans);
        Ok(())
    }

    /// Refresh a single broker's cached plans without a full reload.
    #[instrument(skip(self, cancel))]
    pub async fn reset_broker_cache(
        &self,
        cancel: &CancellationToken,
        broker_name: &str,
    ) -> Result<()> {
        ensure_live(cancel)?;
        let brokers = self.client.list_brokers().await?;
        let Some(broker) = brokers.into_iter().find(|b| b.name == broker_name) else {
            return Err(PlatformError::not_found("broker", broker_name));
        };

        let offerings = self
            .client
            .list_service_offerings(std::slice::from_ref(&broker.guid))
            .await?;
        let offering_guids: Vec<String> = offerings.iter().map(|o| o.guid.clone()).collect();
        let plans = if offering_guids.is_empty() {
            Vec::new()
        } else {
            self.client.list_service_plans(&offering_guids).await?
        };

        let resolved: Vec<PlanData> = plans
            .into_iter()
            .map(|p| PlanData {
                guid: p.guid,
                broker_name: broker.name.clone(),
                catalog_plan_id: p.catalog_plan_id,
                public: p.public,
            })
            .collect();
        debug!(broker = %broker.name, plans = resolved.len(), "Refreshed broker plans");
        self.resolver.reset_broker(&broker.name, resolved);
        Ok(())
    }

    /// Drop a deregistered broker's plans from the resolver.
    pub fn delete_broker_cache(&self, broker_name: &str) {
        self.resolver.delete_broker(broker_name);
    }

    /// Point lookup of a cached plan by catalog plan ID and broker name.
    #[must_use]
    pub fn plan(&self, catalog_plan_id: &str, broker_name: &str) -> Option<PlanData> {
        self.resolver.get_plan(catalog_plan_id, broker_name)
    }

    /// All visibilities of the plans belonging to the given brokers.
    ///
    /// Discrete visibility records are fetched for non-public plans through
    /// the chunked fan-out engine; each public plan contributes one synthetic
    /// everywhere-visible entry without any network traffic.
    #[instrument(skip(self, cancel))]
    pub async fn visibilities_by_brokers(
        &self,
        cancel: &CancellationToken,
        broker_names: &[String],
    ) -> Result<Vec<Visibility>> {
        let plans = self.resolver.broker_plans(broker_names);
        let restricted: Vec<String> = plans
            .values()
            .filter(|p| !p.public)
            .map(|p| p.guid.clone())
            .collect();

        let mut visibilities = Vec::new();
        if !restricted.is_empty() {
            let client = Arc::clone(&self.client);
            let records = query_chunked(cancel, &self.gate, restricted, self.chunk_size, move |chunk| {
                let client = Arc::clone(&client);
                async move {
                    client.list_visibilities(&chunk).await.map_err(|e| {
                        PlatformError::request(
                            format!("listing visibilities for {} plans", chunk.len()),
                            e.to_string(),
                        )
                    })
                }
            })
            .await?;

            for record in records {
                let Some(plan) = plans.get(&record.plan_guid) else {
                    warn!(plan_guid = %record.plan_guid, "Visibility record for unknown plan, skipping");
                    continue;
                };
                visibilities.push(Visibility {
                    public: false,
                    catalog_plan_id: plan.catalog_plan_id.clone(),
                    broker_name: plan.broker_name.clone(),
                    organization_guid: Some(record.organization_guid),
                });
            }
        }

        for plan in plans.values().filter(|p| p.public) {
            visibilities.push(Visibility {
                public: true,
                catalog_plan_id: plan.catalog_plan_id.clone(),
                broker_name: plan.broker_name.clone(),
                organization_guid: None,
            });
        }

        debug!(
            brokers = broker_names.len(),
            visibilities = visibilities.len(),
            "Resolved visibilities"
        );
        Ok(visibilities)
    }

    /// Grant access to a plan, globally or for specific organizations.
    #[instrument(skip(self, cancel, request), fields(plan = %request.catalog_plan_id, broker = %request.broker_name))]
    pub async fn enable_access(
        &self,
        cancel: &CancellationToken,
        request: &AccessRequest,
    ) -> Result<()> {
        self.change_access(cancel, request, true).await
    }

    /// Revoke access to a plan, globally or for specific organizations.
    #[instrument(skip(self, cancel, request), fields(plan = %request.catalog_plan_id, broker = %request.broker_name))]
    pub async fn disable_access(
        &self,
        cancel: &CancellationToken,
        request: &AccessRequest,
    ) -> Result<()> {
        self.change_access(cancel, request, false).await
    }

    /// Wait for an asynchronous platform job to reach a terminal state.
    ///
    /// The whole poll sequence occupies one admission slot, so job waits
    /// share the parallel-request ceiling with fan-out work.
    #[instrument(skip(self, cancel))]
    pub async fn poll_job(&self, cancel: &CancellationToken, job_url: &str) -> Result<Vec<String>> {
        let _permit = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(PlatformError::Cancelled),
            permit = Arc::clone(&self.gate).acquire_owned() => {
                permit.map_err(|_| PlatformError::Cancelled)?
            }
        };
        self.poller.poll(cancel, job_url).await
    }

    async fn change_access(
        &self,
        cancel: &CancellationToken,
        request: &AccessRequest,
        enable: bool,
    ) -> Result<()> {
        ensure_live(cancel)?;
        let plan = self
            .resolver
            .get_plan(&request.catalog_plan_id, &request.broker_name)
            .ok_or_else(|| {
                PlatformError::not_found(
                    "plan",
                    format!("{} (broker {})", request.catalog_plan_id, request.broker_name),
                )
            })?;

        if request.organization_guids.is_empty() {
            self.change_access_globally(cancel, &plan, enable).await
        } else {
            self.change_access_for_organizations(cancel, &plan, &request.organization_guids, enable)
                .await
        }
    }

    /// Make the plan public or clear all of its discrete visibilities, then
    /// flip the cached flag instead of reloading the whole catalog.
    async fn change_access_globally(
        &self,
        cancel: &CancellationToken,
        plan: &PlanData,
        enable: bool,
    ) -> Result<()> {
        if plan.public == enable {
            return Err(PlatformError::AlreadyInState {
                catalog_plan_id: plan.catalog_plan_id.clone(),
                broker_name: plan.broker_name.clone(),
                public: plan.public,
            });
        }

        let update = if enable {
            VisibilityUpdate::SetPublic
        } else {
            VisibilityUpdate::ClearAll
        };
        let job_url = self
            .client
            .update_plan_visibility(&plan.guid, update)
            .await
            .map_err(|e| {
                PlatformError::request(
                    format!("updating visibility of plan {}", plan.catalog_plan_id),
                    e.to_string(),
                )
            })?;

        if let Some(url) = job_url {
            let warnings = self.poll_job(cancel, &url).await?;
            for warning in warnings {
                warn!(job_url = %url, warning = %warning, "Platform job warning");
            }
        }

        self.resolver
            .update_plan(&plan.catalog_plan_id, &plan.broker_name, enable);
        info!(
            plan = %plan.catalog_plan_id,
            broker = %plan.broker_name,
            public = enable,
            "Plan visibility updated"
        );
        Ok(())
    }

    /// Fan one visibility mutation out per organization under the shared
    /// admission gate.
    ///
    /// A public plan has no per-organization visibilities to edit, so the
    /// request is rejected up front. For enables, organizations the platform
    /// does not know are silently excluded; revoking a visibility that does
    /// not exist is already a platform-side no-op, so disables skip the
    /// existence filter.
    async fn change_access_for_organizations(
        &self,
        cancel: &CancellationToken,
        plan: &PlanData,
        organization_guids: &[String],
        enable: bool,
    ) -> Result<()> {
        if plan.public {
            return Err(PlatformError::AlreadyInState {
                catalog_plan_id: plan.catalog_plan_id.clone(),
                broker_name: plan.broker_name.clone(),
                public: true,
            });
        }

        // A GUID must not ride in two chunks.
        let mut seen = HashSet::new();
        let requested: Vec<String> = organization_guids
            .iter()
            .filter(|g| seen.insert(g.as_str()))
            .cloned()
            .collect();

        let targets = if enable {
            self.existing_organizations(cancel, requested).await?
        } else {
            requested
        };

        let client = Arc::clone(&self.client);
        let poller = self.poller.clone();
        let token = cancel.clone();
        let plan_guid = plan.guid.clone();
        let catalog_plan_id = plan.catalog_plan_id.clone();
        query_chunked(cancel, &self.gate, targets, 1, move |chunk| {
            let client = Arc::clone(&client);
            let poller = poller.clone();
            let token = token.clone();
            let plan_guid = plan_guid.clone();
            let catalog_plan_id = catalog_plan_id.clone();
            async move {
                for org in &chunk {
                    let update = if enable {
                        VisibilityUpdate::AddOrganization(org.clone())
                    } else {
                        VisibilityUpdate::RemoveOrganization(org.clone())
                    };
                    let job_url = client
                        .update_plan_visibility(&plan_guid, update)
                        .await
                        .map_err(|e| {
                            PlatformError::request(
                                format!(
                                    "updating visibility of plan {catalog_plan_id} for organization {org}"
                                ),
                                e.to_string(),
                            )
                        })?;
                    if let Some(url) = job_url {
                        // The admission slot for this chunk is already held;
                        // waiting on the job inline keeps mutation and poll
                        // one unit of work under the gate.
                        let warnings = poller.poll(&token, &url).await?;
                        for warning in warnings {
                            warn!(job_url = %url, organization = %org, warning = %warning, "Platform job warning");
                        }
                    }
                }
                Ok(Vec::<()>::new())
            }
        })
        .await?;

        info!(
            plan = %plan.catalog_plan_id,
            broker = %plan.broker_name,
            organizations = organization_guids.len(),
            enable,
            "Organization visibilities updated"
        );
        Ok(())
    }

    /// Filter organization GUIDs down to those the platform knows.
    ///
    /// The platform drops unknown GUIDs from filtered listings instead of
    /// erroring, so anything missing from the response is excluded here.
    async fn existing_organizations(
        &self,
        cancel: &CancellationToken,
        requested: Vec<String>,
    ) -> Result<Vec<String>> {
        let client = Arc::clone(&self.client);
        let existing = query_chunked(
            cancel,
            &self.gate,
            requested.clone(),
            self.chunk_size,
            move |chunk| {
                let client = Arc::clone(&client);
                async move {
                    client.list_organizations(&chunk).await.map_err(|e| {
                        PlatformError::request(
                            format!("listing {} organizations", chunk.len()),
                            e.to_string(),
                        )
                    })
                }
            },
        )
        .await?;

        let known: HashSet<String> = existing.into_iter().map(|o| o.guid).collect();
        let (targets, unknown): (Vec<String>, Vec<String>) =
            requested.into_iter().partition(|g| known.contains(g));
        if !unknown.is_empty() {
            debug!(
                unknown = unknown.len(),
                "Skipping organizations unknown to the platform"
            );
        }
        Ok(targets)
    }
}

fn ensure_live(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(PlatformError::Cancelled);
    }
    Ok(())
}
