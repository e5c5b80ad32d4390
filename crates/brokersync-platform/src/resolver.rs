//! Plan resolver cache.
//!
//! Joins broker, service offering and plan records into an in-memory index
//! keyed by broker name, so visibility operations can translate catalog plan
//! IDs into platform plan GUIDs without touching the network.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::{debug, warn};

use brokersync_core::models::{Broker, PlanData, ServiceOffering, ServicePlan};

/// In-memory index of resolved service plans, keyed by broker name.
///
/// A single read-write lock guards the map. Every mutation happens inside
/// one critical section, so readers observe either the previous or the next
/// index, never a partial rebuild. Lookups hand out clones — a caller can
/// never watch a mutation in progress through a returned value.
#[derive(Debug, Default)]
pub struct PlanResolver {
    plans: RwLock<HashMap<String, Vec<PlanData>>>,
}

impl PlanResolver {
    /// Create an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the whole index from freshly listed platform records.
    ///
    /// Plans are resolved through their service offering to the owning
    /// broker. A plan whose offering or broker is missing from the input is
    /// skipped with a diagnostic — the index never contains orphaned plans.
    /// The new index replaces the old one atomically.
    pub fn reset(
        &self,
        brokers: Vec<Broker>,
        offerings: Vec<ServiceOffering>,
        plans: Vec<ServicePlan>,
    ) {
        let offerings_by_guid: HashMap<&str, &ServiceOffering> =
            offerings.iter().map(|o| (o.guid.as_str(), o)).collect();
        let brokers_by_guid: HashMap<&str, &Broker> =
            brokers.iter().map(|b| (b.guid.as_str(), b)).collect();

        let mut rebuilt: HashMap<String, Vec<PlanData>> = HashMap::new();
        for plan in plans {
            let Some(offering) = offerings_by_guid.get(plan.service_offering_guid.as_str())
            else {
                warn!(
                    plan_guid = %plan.guid,
                    catalog_plan_id = %plan.catalog_plan_id,
                    service_offering_guid = %plan.service_offering_guid,
                    "Skipping plan: owning service offering not found"
                );
                continue;
            };
            let Some(broker) = brokers_by_guid.get(offering.broker_guid.as_str()) else {
                warn!(
                    plan_guid = %plan.guid,
                    catalog_plan_id = %plan.catalog_plan_id,
                    broker_guid = %offering.broker_guid,
                    "Skipping plan: owning broker not found"
                );
                continue;
            };
            rebuilt.entry(broker.name.clone()).or_default().push(PlanData {
                guid: plan.guid,
                broker_name: broker.name.clone(),
                catalog_plan_id: plan.catalog_plan_id,
                public: plan.public,
            });
        }

        let broker_count = rebuilt.len();
        let plan_count: usize = rebuilt.values().map(Vec::len).sum();
        let mut guard = self.plans.write().unwrap_or_else(|e| e.into_inner());
        *guard = rebuilt;
        drop(guard);
        debug!(brokers = broker_count, plans = plan_count, "Plan resolver rebuilt");
    }

    /// Replace the cached plans of a single broker.
    pub fn reset_broker(&self, broker_name: &str, plans: Vec<PlanData>) {
        let mut guard = self.plans.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(broker_name.to_string(), plans);
    }

    /// Remove a broker and its plans from the index.
    pub fn delete_broker(&self, broker_name: &str) {
        let mut guard = self.plans.write().unwrap_or_else(|e| e.into_inner());
        guard.remove(broker_name);
    }

    /// Look up one plan by its catalog ID within one broker.
    ///
    /// Catalog plan IDs are only unique per broker, so the lookup is keyed
    /// by the (catalog plan ID, broker name) pair. The per-broker list is
    /// bounded by that broker's catalog size, so a linear scan suffices.
    #[must_use]
    pub fn get_plan(&self, catalog_plan_id: &str, broker_name: &str) -> Option<PlanData> {
        let guard = self.plans.read().unwrap_or_else(|e| e.into_inner());
        guard
            .get(broker_name)
            .and_then(|plans| plans.iter().find(|p| p.catalog_plan_id == catalog_plan_id))
            .cloned()
    }

    /// Union the plans of the given brokers, keyed by plan GUID.
    ///
    /// Plan GUIDs are globally unique; should an earlier broker already have
    /// produced a GUID, the earlier entry is kept.
    #[must_use]
    pub fn broker_plans(&self, broker_names: &[String]) -> HashMap<String, PlanData> {
        let guard = self.plans.read().unwrap_or_else(|e| e.into_inner());
        let mut result = HashMap::new();
        for name in broker_names {
            let Some(plans) = guard.get(name) else {
                continue;
            };
            for plan in plans {
                result
                    .entry(plan.guid.clone())
                    .or_insert_with(|| plan.clone());
            }
        }
        result
    }

    /// Flip the `public` flag of a cached plan in place.
    ///
    /// Identity fields are untouched; an unknown plan is a no-op.
    pub fn update_plan(&self, catalog_plan_id: &str, broker_name: &str, public: bool) {
        let mut guard = self.plans.write().unwrap_or_else(|e| e.into_inner());
        if let Some(plan) = guard
            .get_mut(broker_name)
            .and_then(|plans| plans.iter_mut().find(|p| p.catalog_plan_id == catalog_plan_id))
        {
            plan.public = public;
        }
    }
}
