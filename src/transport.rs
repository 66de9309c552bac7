//! Transport cost inputs: onshore distances and offshore cost surfaces.
//!
//! Onshore movement (production site to export port) is costed linearly in
//! pipeline distance. Offshore movement is costed from a pre-sampled unit
//! cost surface, one table per vessel class. Both tables are keyed by
//! `(supplier, port)` pairs; how the distances and surfaces were computed is
//! upstream of this crate.
use crate::id::VesselClassID;
use crate::input::read_csv;
use crate::units::{Kilometres, MoneyPerTonne, MoneyPerTonneKilometre};
use anyhow::Result;
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

const ONSHORE_DISTANCES_FILE_NAME: &str = "onshore_distances.csv";

/// Cost of moving one tonne of ammonia one kilometre overland by pipeline.
pub const ONSHORE_COST_PER_TONNE_KM: MoneyPerTonneKilometre = MoneyPerTonneKilometre(0.0025);

/// One onshore distance record for a (supplier, port) pair.
///
/// Pairs absent from the distance table get no route at all; absence means
/// "no overland connection", not "free".
#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct OnshoreDistance {
    /// The supplier end of the overland link
    pub supplier_id: String,
    /// The port end of the overland link
    pub port_id: String,
    /// Overland pipeline distance
    #[serde(rename = "distance_km")]
    pub distance: Kilometres,
}

/// One sampled offshore unit cost for a (supplier, port) pair.
#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct OffshoreCost {
    /// The supplier whose export port the voyage starts from
    pub supplier_id: String,
    /// The destination port
    pub port_id: String,
    /// Return-voyage cost per tonne delivered
    #[serde(rename = "cost_per_t")]
    pub cost: MoneyPerTonne,
}

/// The offshore cost surfaces, one table per vessel class.
pub type OffshoreCostTables = IndexMap<VesselClassID, Vec<OffshoreCost>>;

/// The unit cost of overland transport for a given pipeline distance.
pub fn onshore_unit_cost(distance: Kilometres) -> MoneyPerTonne {
    ONSHORE_COST_PER_TONNE_KM * distance
}

/// Read the onshore distance table.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model input files
pub fn read_onshore_distances(model_dir: &Path) -> Result<Vec<OnshoreDistance>> {
    read_csv(&model_dir.join(ONSHORE_DISTANCES_FILE_NAME))
}

/// Read the offshore cost surface for each vessel class.
///
/// The tables are stored one file per class, named
/// `offshore_costs_<class>.csv`.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model input files
/// * `class_ids` - The vessel classes to read surfaces for
pub fn read_offshore_costs<'a, I>(model_dir: &Path, class_ids: I) -> Result<OffshoreCostTables>
where
    I: Iterator<Item = &'a VesselClassID>,
{
    let mut tables = OffshoreCostTables::new();
    for class_id in class_ids {
        let file_path = model_dir.join(format!("offshore_costs_{class_id}.csv"));
        tables.insert(class_id.clone(), read_csv(&file_path)?);
    }

    Ok(tables)
}
