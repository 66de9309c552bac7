//! Pre-solve variable fixing.
//!
//! Deterministic rules that pin flow variables whose optimal value is known
//! before solving, shrinking the problem the solver sees without changing
//! the optimum. Disabling a whole vessel class is the single biggest size
//! lever; the distance rule trims structurally uncompetitive routes.
//! Fixing never reports infeasibility itself; that is the solver's job.
use crate::id::VesselClassID;
use crate::instance::Instance;
use crate::units::{Kilometres, Tonnes};
use log::{info, warn};
use serde::Deserialize;
use std::collections::HashMap;

/// Configuration for the variable-fixing pass.
#[derive(PartialEq, Debug, Clone, Default, Deserialize)]
pub struct FixingConfig {
    /// Vessel classes whose routes are all pinned to zero flow
    #[serde(default)]
    pub disabled_vessel_classes: Vec<VesselClassID>,
    /// Routes with an onshore distance beyond this are pinned to zero flow
    #[serde(default, rename = "max_route_distance_km")]
    pub max_route_distance: Option<Kilometres>,
}

/// Counts of variables pinned by each rule.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FixingSummary {
    /// Routes pinned because their vessel class is disabled
    pub fixed_by_class: usize,
    /// Routes pinned because they exceed the distance limit
    pub fixed_by_distance: usize,
}

/// Apply the variable-fixing rules to the instance in place.
///
/// A route is never pinned if it is the last live route into its port; a
/// port left with no admissible route would turn a size reduction into a
/// correctness bug.
pub fn fix_variables(instance: &mut Instance, config: &FixingConfig) -> FixingSummary {
    let mut summary = FixingSummary::default();

    for class_id in &config.disabled_vessel_classes {
        if let Some(class) = instance.vessel_classes.get_mut(class_id) {
            class.enabled = false;
        }
    }

    for (key, route) in &mut instance.routes {
        if route.is_fixed_to_zero() {
            continue;
        }
        if config
            .disabled_vessel_classes
            .contains(&key.vessel_class_id)
        {
            route.upper_bound = Some(Tonnes(0.0));
            summary.fixed_by_class += 1;
        }
    }

    if let Some(max_distance) = config.max_route_distance {
        // Ports must keep at least one live route, so count them first
        let mut live_routes_per_port: HashMap<_, usize> = HashMap::new();
        for (key, _) in instance.iter_live_routes() {
            *live_routes_per_port.entry(key.port_id.clone()).or_insert(0) += 1;
        }

        for (key, route) in &mut instance.routes {
            if route.is_fixed_to_zero() || route.distance <= max_distance {
                continue;
            }

            let live = live_routes_per_port
                .get_mut(&key.port_id)
                .expect("Live route not counted");
            if *live <= 1 {
                warn!("Keeping over-distance route {key}: it is the only route into {}",
                    key.port_id);
                continue;
            }

            route.upper_bound = Some(Tonnes(0.0));
            *live -= 1;
            summary.fixed_by_distance += 1;
        }
    }

    info!(
        "Variable fixing pinned {} routes by vessel class and {} by distance ({} free remain)",
        summary.fixed_by_class,
        summary.fixed_by_distance,
        instance.iter_live_routes().count()
    );

    summary
}
