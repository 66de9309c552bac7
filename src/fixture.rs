//! Fixtures for tests
use crate::demand::DemandEntry;
use crate::instance::{build, Instance, InstancePolicy};
use crate::port::{Port, PortMap};
use crate::supplier::{Supplier, SupplierMap};
use crate::transport::{OffshoreCost, OffshoreCostTables, OnshoreDistance};
use crate::units::{Dimensionless, Kilometres, MoneyPerTonne, Tonnes};
use crate::vessel::{standard_fleet, VesselClassMap, VesselSize};
use rstest::fixture;

fn supplier(id: &str, capacity: f64, production_cost: f64) -> Supplier {
    Supplier {
        id: id.into(),
        latitude: 10.0,
        longitude: 20.0,
        capacity: Tonnes(capacity),
        production_cost: MoneyPerTonne(production_cost),
        electricity_cost_fraction: Dimensionless(0.4),
    }
}

fn port(id: &str, name: &str) -> Port {
    Port {
        id: id.into(),
        name: name.into(),
        latitude: 50.0,
        longitude: -1.0,
        max_class: VesselSize::Large,
    }
}

fn distance(supplier_id: &str, port_id: &str, km: f64) -> OnshoreDistance {
    OnshoreDistance {
        supplier_id: supplier_id.into(),
        port_id: port_id.into(),
        distance: Kilometres(km),
    }
}

fn offshore(supplier_id: &str, port_id: &str, cost: f64) -> OffshoreCost {
    OffshoreCost {
        supplier_id: supplier_id.into(),
        port_id: port_id.into(),
        cost: MoneyPerTonne(cost),
    }
}

#[fixture]
pub fn suppliers() -> SupplierMap {
    [
        supplier("sup1", 10.0, 100.0),
        supplier("sup2", 5.0, 105.0),
        supplier("sup3", 0.0, 80.0),
    ]
    .into_iter()
    .map(|s| (s.id.clone(), s))
    .collect()
}

#[fixture]
pub fn ports() -> PortMap {
    [port("port1", "Rotterdam_NL"), port("port2", "Felixstowe_UK")]
        .into_iter()
        .map(|p| (p.id.clone(), p))
        .collect()
}

/// The small ship type is switched off so the instance carries one route per
/// connected (supplier, port) pair.
#[fixture]
pub fn vessel_classes() -> VesselClassMap {
    let mut fleet = standard_fleet();
    fleet.get_mut("handysize").unwrap().enabled = false;
    fleet
}

/// All pairs are connected except (sup2, port2), which has no overland link.
#[fixture]
pub fn onshore_distances() -> Vec<OnshoreDistance> {
    vec![
        distance("sup1", "port1", 1000.0),
        distance("sup1", "port2", 800.0),
        distance("sup2", "port1", 500.0),
        distance("sup3", "port1", 200.0),
        distance("sup3", "port2", 300.0),
    ]
}

#[fixture]
pub fn offshore_costs() -> OffshoreCostTables {
    let panamax = vec![
        offshore("sup1", "port1", 30.0),
        offshore("sup1", "port2", 40.0),
        offshore("sup2", "port1", 25.0),
        offshore("sup3", "port1", 20.0),
        offshore("sup3", "port2", 10.0),
    ];
    // The handysize surface exists but the class is disabled, so it
    // contributes no routes
    let handysize = vec![offshore("sup1", "port1", 45.0)];

    [("panamax".into(), panamax), ("handysize".into(), handysize)]
        .into_iter()
        .collect()
}

#[fixture]
pub fn demand() -> Vec<DemandEntry> {
    vec![
        DemandEntry {
            port_id: "port1".into(),
            fuel_consumption: Tonnes(8.0),
        },
        DemandEntry {
            port_id: "port2".into(),
            fuel_consumption: Tonnes(6.0),
        },
    ]
}

#[fixture]
pub fn instance(
    suppliers: SupplierMap,
    ports: PortMap,
    vessel_classes: VesselClassMap,
    onshore_distances: Vec<OnshoreDistance>,
    offshore_costs: OffshoreCostTables,
    demand: Vec<DemandEntry>,
) -> Instance {
    build(
        suppliers,
        ports,
        vessel_classes,
        &onshore_distances,
        &offshore_costs,
        &demand,
        &InstancePolicy::default(),
    )
    .unwrap()
}
