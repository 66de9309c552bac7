//! Construction of the optimisation instance.
//!
//! An [`Instance`] is the full entity graph the solver works on: suppliers,
//! ports, vessel classes, one [`Route`] per (supplier, port, vessel class)
//! tuple for which cost data exists, and the current demand per port. The
//! builder validates every cross-table reference up front; a table referring
//! to an unknown supplier or port aborts construction with a
//! [`DataMismatchError`] naming the offending ids.
use crate::demand::DemandEntry;
use crate::id::{PortID, SupplierID, VesselClassID};
use crate::port::PortMap;
use crate::supplier::SupplierMap;
use crate::transport::{onshore_unit_cost, OffshoreCost, OffshoreCostTables, OnshoreDistance};
use crate::units::{Dimensionless, Kilometres, MoneyPerTonne, Tonnes};
use crate::vessel::VesselClassMap;
use anyhow::{ensure, Result};
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use serde::Deserialize;
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};
use std::error::Error;
use std::fmt;

/// How port demand constraints are expressed in the program.
#[derive(
    PartialEq, Clone, Copy, Debug, DeserializeLabeledStringEnum, SerializeLabeledStringEnum,
)]
pub enum DemandPolicy {
    /// Inflow to each port must equal its demand exactly
    #[string = "equality"]
    Equality,
    /// Inflow to each port must be at least its demand
    #[string = "at-least"]
    AtLeast,
}

impl Default for DemandPolicy {
    fn default() -> Self {
        Self::Equality
    }
}

fn default_factor() -> Dimensionless {
    Dimensionless(1.0)
}

fn default_extra_demand() -> Tonnes {
    Tonnes(0.0)
}

/// Construction-time policy options for the instance.
#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct InstancePolicy {
    /// How port demand constraints are expressed
    #[serde(default)]
    pub demand_policy: DemandPolicy,
    /// A designated port whose baseline demand is adjusted at build time
    #[serde(default)]
    pub fixed_port: Option<PortID>,
    /// Multiplicative scaling applied to the designated port's demand
    #[serde(default = "default_factor")]
    pub fixed_port_demand_factor: Dimensionless,
    /// Additive demand injected at the designated port (e.g. onward energy imports)
    #[serde(default = "default_extra_demand", rename = "fixed_port_extra_demand_t")]
    pub fixed_port_extra_demand: Tonnes,
}

impl Default for InstancePolicy {
    fn default() -> Self {
        Self {
            demand_policy: DemandPolicy::default(),
            fixed_port: None,
            fixed_port_demand_factor: default_factor(),
            fixed_port_extra_demand: default_extra_demand(),
        }
    }
}

/// Identifies one flow decision variable.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct RouteKey {
    /// The producing supplier
    pub supplier_id: SupplierID,
    /// The receiving port
    pub port_id: PortID,
    /// The vessel class carrying the flow
    pub vessel_class_id: VesselClassID,
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({})",
            self.supplier_id, self.port_id, self.vessel_class_id
        )
    }
}

/// A map of [`Route`]s, keyed by (supplier, port, vessel class)
pub type RouteMap = IndexMap<RouteKey, Route>;

/// One transport option from a supplier to a port with a given vessel class.
///
/// The route's flow variable is the core decision variable of the program.
#[derive(PartialEq, Debug, Clone)]
pub struct Route {
    /// Overland pipeline distance from the production site to its export port
    pub distance: Kilometres,
    /// Total unit cost of one delivered tonne on this route
    /// (production + onshore + offshore)
    pub unit_cost: MoneyPerTonne,
    /// Lower bound on the flow variable
    pub lower_bound: Tonnes,
    /// Upper bound on the flow variable; `None` means only the supplier's
    /// capacity constraint limits it
    pub upper_bound: Option<Tonnes>,
}

impl Route {
    /// Whether variable fixing has pinned this route's flow to zero
    pub fn is_fixed_to_zero(&self) -> bool {
        self.upper_bound.is_some_and(|ub| ub.value() <= 0.0)
    }
}

/// Input tables reference entities absent from the companion table.
///
/// Fatal: a model with dangling references must not produce a silently wrong
/// instance.
#[derive(Debug, Clone)]
pub struct DataMismatchError {
    /// The input table containing the dangling references
    pub table: String,
    /// The unknown ids, deduplicated
    pub missing: Vec<String>,
}

impl DataMismatchError {
    fn new(table: &str, missing: impl IntoIterator<Item = String>) -> Self {
        Self {
            table: table.to_string(),
            missing: missing.into_iter().unique().sorted().collect(),
        }
    }
}

impl fmt::Display for DataMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} references unknown entities: {}",
            self.table,
            self.missing.iter().join(", ")
        )
    }
}

impl Error for DataMismatchError {}

/// The aggregate optimisation model.
///
/// Exclusively owned and mutated by the scenario driver between solves; the
/// solver borrows it for the duration of one solve call.
#[derive(Debug)]
pub struct Instance {
    /// The selected supplier sites
    pub suppliers: SupplierMap,
    /// The demand ports
    pub ports: PortMap,
    /// The vessel fleet (possibly with classes disabled by variable fixing)
    pub vessel_classes: VesselClassMap,
    /// The flow decision variables
    pub routes: RouteMap,
    /// How port demand constraints are expressed
    pub demand_policy: DemandPolicy,
    /// Current demand per port, mutated across scenarios
    demand: IndexMap<PortID, Tonnes>,
    /// Baseline demand per port, as built; `reset_demand` restores this
    original_demand: IndexMap<PortID, Tonnes>,
    /// Minimum production pinned per supplier (forced suppliers)
    production_floors: IndexMap<SupplierID, Tonnes>,
}

impl Instance {
    /// Current demand at the given port
    pub fn demand(&self, port_id: &PortID) -> Tonnes {
        *self.demand.get(port_id).expect("No demand entry for port")
    }

    /// Iterate over current demand per port
    pub fn iter_demand(&self) -> impl Iterator<Item = (&PortID, Tonnes)> {
        self.demand.iter().map(|(id, demand)| (id, *demand))
    }

    /// Sum of current demand over all ports
    pub fn total_demand(&self) -> Tonnes {
        self.demand.values().copied().sum()
    }

    /// Sum of production capacity over all suppliers
    pub fn total_capacity(&self) -> Tonnes {
        self.suppliers.values().map(|s| s.capacity).sum()
    }

    /// Restore every port's demand to its original (pre-scaling) value
    pub fn reset_demand(&mut self) {
        self.demand.clone_from(&self.original_demand);
    }

    /// Multiply every port's demand by the given factor
    pub fn scale_demand(&mut self, factor: Dimensionless) {
        for demand in self.demand.values_mut() {
            *demand = *demand * factor;
        }
    }

    /// The production floor for a supplier (zero unless the supplier is forced)
    pub fn production_floor(&self, supplier_id: &SupplierID) -> Tonnes {
        self.production_floors
            .get(supplier_id)
            .copied()
            .unwrap_or(Tonnes(0.0))
    }

    /// Pin a supplier's minimum production
    pub fn set_production_floor(&mut self, supplier_id: SupplierID, floor: Tonnes) {
        self.production_floors.insert(supplier_id, floor);
    }

    /// Iterate over routes whose flow variable is still free
    pub fn iter_live_routes(&self) -> impl Iterator<Item = (&RouteKey, &Route)> {
        self.routes
            .iter()
            .filter(|(_, route)| !route.is_fixed_to_zero())
    }
}

/// Check that every referenced id is present in the given id set.
fn check_references<'a, ID, I>(table: &str, referenced: I, known: &IndexSet<ID>) -> Result<()>
where
    ID: crate::id::IDLike,
    I: Iterator<Item = &'a String>,
{
    let missing: Vec<String> = referenced
        .filter(|id| known.get(id.as_str()).is_none())
        .cloned()
        .collect();

    if !missing.is_empty() {
        return Err(DataMismatchError::new(table, missing).into());
    }

    Ok(())
}

/// Build an offshore cost lookup keyed by (supplier, port), validating ids.
fn build_offshore_lookup(
    class_id: &VesselClassID,
    table: &[OffshoreCost],
    supplier_ids: &IndexSet<SupplierID>,
    port_ids: &IndexSet<PortID>,
) -> Result<IndexMap<(String, String), MoneyPerTonne>> {
    let table_name = format!("offshore costs ({class_id})");
    check_references(
        &table_name,
        table.iter().map(|cost| &cost.supplier_id),
        supplier_ids,
    )?;
    check_references(&table_name, table.iter().map(|cost| &cost.port_id), port_ids)?;

    let mut lookup = IndexMap::new();
    for cost in table {
        ensure!(
            lookup
                .insert((cost.supplier_id.clone(), cost.port_id.clone()), cost.cost)
                .is_none(),
            "Duplicate offshore cost entry for {} -> {} ({class_id})",
            cost.supplier_id,
            cost.port_id
        );
    }

    Ok(lookup)
}

/// Build the optimisation instance from validated input tables.
///
/// A route is created for every (supplier, port) pair with an onshore
/// distance entry, for every enabled vessel class the port admits and whose
/// cost surface covers the pair. Pairs lacking distance or cost data are
/// omitted entirely; there is no implicit default cost.
///
/// # Arguments
///
/// * `suppliers` - The selected supplier sites
/// * `ports` - The demand ports
/// * `vessel_classes` - The vessel fleet
/// * `onshore_distances` - Overland distance per (supplier, port) pair
/// * `offshore_costs` - Per-class offshore unit cost tables
/// * `demand` - Assembled demand per port
/// * `policy` - Construction-time policy options
pub fn build(
    suppliers: SupplierMap,
    ports: PortMap,
    vessel_classes: VesselClassMap,
    onshore_distances: &[OnshoreDistance],
    offshore_costs: &OffshoreCostTables,
    demand: &[DemandEntry],
    policy: &InstancePolicy,
) -> Result<Instance> {
    let supplier_ids: IndexSet<SupplierID> = suppliers.keys().cloned().collect();
    let port_ids: IndexSet<PortID> = ports.keys().cloned().collect();

    // Validate all cross-table references before any construction
    check_references(
        "demand",
        demand.iter().map(|entry| &entry.port_id),
        &port_ids,
    )?;
    check_references(
        "onshore distances",
        onshore_distances.iter().map(|row| &row.supplier_id),
        &supplier_ids,
    )?;
    check_references(
        "onshore distances",
        onshore_distances.iter().map(|row| &row.port_id),
        &port_ids,
    )?;

    let mut offshore_lookups = IndexMap::new();
    for (class_id, table) in offshore_costs {
        ensure!(
            vessel_classes.contains_key(class_id),
            "Offshore cost table provided for unknown vessel class {class_id}"
        );
        let lookup = build_offshore_lookup(class_id, table, &supplier_ids, &port_ids)?;
        offshore_lookups.insert(class_id.clone(), lookup);
    }

    // Baseline demand: every port gets an entry, zero if the demand table
    // does not mention it
    let mut original_demand: IndexMap<PortID, Tonnes> =
        port_ids.iter().map(|id| (id.clone(), Tonnes(0.0))).collect();
    for entry in demand {
        let port_id = PortID::from(entry.port_id.as_str());
        original_demand[&port_id] = entry.fuel_consumption;
    }

    // Fixed-port adjustment happens once, at construction
    if let Some(port_id) = &policy.fixed_port {
        let demand = original_demand
            .get_mut(port_id)
            .ok_or_else(|| DataMismatchError::new("fixed port", [port_id.to_string()]))?;
        *demand = *demand * policy.fixed_port_demand_factor + policy.fixed_port_extra_demand;
    }

    let mut routes = RouteMap::new();
    for row in onshore_distances {
        let supplier_id = SupplierID::from(row.supplier_id.as_str());
        let port_id = PortID::from(row.port_id.as_str());
        let supplier = &suppliers[&supplier_id];
        let port = &ports[&port_id];

        for class in vessel_classes.values() {
            if !class.enabled || !port.admits(class.size) {
                continue;
            }

            // No offshore cost sample for this pair and class: no route
            let Some(offshore) = offshore_lookups
                .get(&class.id)
                .and_then(|lookup| lookup.get(&(row.supplier_id.clone(), row.port_id.clone())))
            else {
                continue;
            };

            let key = RouteKey {
                supplier_id: supplier_id.clone(),
                port_id: port_id.clone(),
                vessel_class_id: class.id.clone(),
            };
            let route = Route {
                distance: row.distance,
                unit_cost: supplier.production_cost + onshore_unit_cost(row.distance) + *offshore,
                lower_bound: Tonnes(0.0),
                upper_bound: None,
            };
            ensure!(
                routes.insert(key, route).is_none(),
                "Duplicate onshore distance entry for {} -> {}",
                supplier_id,
                port_id
            );
        }
    }

    let demand = original_demand.clone();
    Ok(Instance {
        suppliers,
        ports,
        vessel_classes,
        routes,
        demand_policy: policy.demand_policy,
        demand,
        original_demand,
        production_floors: IndexMap::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::*;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_build_creates_routes_per_enabled_class(instance: Instance) {
        // Three suppliers x two ports x one enabled class, minus the pair
        // with no distance entry
        assert_eq!(instance.routes.len(), 5);
        assert!(instance
            .routes
            .keys()
            .all(|key| key.vessel_class_id == VesselClassID::from("panamax")));
    }

    #[rstest]
    fn test_missing_distance_omits_route(instance: Instance) {
        // sup2 -> port2 has no onshore distance entry, so no route for any
        // vessel class may exist, not a zero-cost one
        assert!(!instance
            .routes
            .keys()
            .any(|key| key.supplier_id == "sup2".into() && key.port_id == "port2".into()));
    }

    #[rstest]
    fn test_route_cost_is_production_plus_onshore_plus_offshore(instance: Instance) {
        let key = RouteKey {
            supplier_id: "sup1".into(),
            port_id: "port1".into(),
            vessel_class_id: "panamax".into(),
        };
        // production 100 + onshore 1000 km * 0.0025 + offshore 30
        assert_approx_eq!(f64, instance.routes[&key].unit_cost.value(), 132.5);
    }

    #[rstest]
    fn test_unknown_demand_port_is_mismatch(
        suppliers: crate::supplier::SupplierMap,
        ports: crate::port::PortMap,
        vessel_classes: crate::vessel::VesselClassMap,
        onshore_distances: Vec<OnshoreDistance>,
        offshore_costs: OffshoreCostTables,
    ) {
        let demand = vec![crate::demand::DemandEntry {
            port_id: "port9".into(),
            fuel_consumption: Tonnes(1.0),
        }];
        let err = build(
            suppliers,
            ports,
            vessel_classes,
            &onshore_distances,
            &offshore_costs,
            &demand,
            &InstancePolicy::default(),
        )
        .unwrap_err();

        let mismatch = err.downcast_ref::<DataMismatchError>().unwrap();
        assert_eq!(mismatch.table, "demand");
        assert_eq!(mismatch.missing, vec!["port9".to_string()]);
    }

    #[rstest]
    fn test_fixed_port_adjustment(
        suppliers: crate::supplier::SupplierMap,
        ports: crate::port::PortMap,
        vessel_classes: crate::vessel::VesselClassMap,
        onshore_distances: Vec<OnshoreDistance>,
        offshore_costs: OffshoreCostTables,
        demand: Vec<crate::demand::DemandEntry>,
    ) {
        let policy = InstancePolicy {
            fixed_port: Some("port1".into()),
            fixed_port_demand_factor: Dimensionless(2.0),
            fixed_port_extra_demand: Tonnes(3.0),
            ..InstancePolicy::default()
        };
        let instance = build(
            suppliers,
            ports,
            vessel_classes,
            &onshore_distances,
            &offshore_costs,
            &demand,
            &policy,
        )
        .unwrap();

        // port1 baseline demand is 8
        assert_approx_eq!(f64, instance.demand(&"port1".into()).value(), 19.0);
    }

    #[rstest]
    fn test_reset_and_scale_round_trip(mut instance: Instance) {
        let baseline = instance.demand(&"port1".into());
        instance.scale_demand(Dimensionless(3.0));
        instance.scale_demand(Dimensionless(0.1));
        instance.reset_demand();
        instance.scale_demand(Dimensionless(2.0));
        assert_approx_eq!(
            f64,
            instance.demand(&"port1".into()).value(),
            (baseline * Dimensionless(2.0)).value()
        );
    }
}
