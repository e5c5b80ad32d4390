//! Domain records shared across brokersync crates.
//!
//! All platform identifiers are remote-assigned GUID strings. Catalog plan
//! IDs are chosen by the broker and are only unique within a single broker's
//! catalog, so plan lookups always carry the broker name alongside them.

use serde::{Deserialize, Serialize};

/// A service broker registered in the remote platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Broker {
    /// Remote-assigned GUID, stable across refreshes.
    pub guid: String,
    /// Broker name. Unique within one refresh; used as the cache join key.
    pub name: String,
}

/// A service offering owned by a broker.
///
/// Only an intermediate join key between brokers and plans; it is not
/// retained once a cache rebuild completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceOffering {
    pub guid: String,
    /// GUID of the owning broker.
    pub broker_guid: String,
}

/// A service plan as decoded from the remote platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePlan {
    pub guid: String,
    /// Plan identifier from the broker's catalog. Not globally unique.
    pub catalog_plan_id: String,
    /// GUID of the owning service offering.
    pub service_offering_guid: String,
    /// Whether the plan is visible everywhere.
    pub public: bool,
}

/// A fully resolved plan as held by the plan resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanData {
    /// Remote plan GUID.
    pub guid: String,
    /// Name of the owning broker.
    pub broker_name: String,
    /// Catalog plan ID, unique within `broker_name`.
    pub catalog_plan_id: String,
    /// Whether the plan is visible everywhere.
    pub public: bool,
}

/// An organization known to the remote platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub guid: String,
    pub name: String,
}

/// A discrete plan visibility record on the remote platform.
///
/// Public plans have no discrete records; they are visible everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityRecord {
    pub plan_guid: String,
    pub organization_guid: String,
}

/// The resolved visibility of one plan in one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visibility {
    /// True for the synthetic everywhere-visible entry of a public plan.
    pub public: bool,
    pub catalog_plan_id: String,
    pub broker_name: String,
    /// Organization scope; `None` for public plans.
    pub organization_guid: Option<String>,
}
