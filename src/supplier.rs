//! Candidate production suppliers and the location down-selection step.
//!
//! The raw supplier table usually covers far more candidate sites than the
//! optimisation can carry, so a ranking filter picks the most productive
//! sites before the instance is built.
use crate::id::SupplierID;
use crate::input::read_csv;
use crate::units::{Dimensionless, MoneyPerTonne, Tonnes};
use anyhow::{ensure, Result};
use indexmap::IndexMap;
use log::warn;
use serde::Deserialize;
use std::path::Path;

const SUPPLIERS_FILE_NAME: &str = "suppliers.csv";

/// A map of [`Supplier`]s, keyed by supplier ID
pub type SupplierMap = IndexMap<SupplierID, Supplier>;

/// A candidate ammonia production site.
///
/// Immutable once built; the optimisation only reads it.
#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct Supplier {
    /// Unique identifier for the supplier (e.g. "sup0042")
    pub id: SupplierID,
    /// Latitude of the site in decimal degrees
    pub latitude: f64,
    /// Longitude of the site in decimal degrees
    pub longitude: f64,
    /// Annual production capacity
    #[serde(rename = "capacity_t")]
    pub capacity: Tonnes,
    /// Levelised cost of production at this site
    #[serde(rename = "production_cost_per_t")]
    pub production_cost: MoneyPerTonne,
    /// Fraction of the production cost attributable to electricity
    pub electricity_cost_fraction: Dimensionless,
}

/// Parameters for the location down-selection step
#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct SupplierSelection {
    /// The maximum number of supplier sites to keep
    pub number_of_locations: usize,
    /// Minimum annual production for a site to be considered
    #[serde(rename = "min_production_t")]
    pub min_production: Tonnes,
}

/// Rank suppliers by production capacity and keep the best candidates.
///
/// Sites below `min_production` are dropped, the rest are sorted by capacity
/// (largest first) and truncated to `number_of_locations`. A warning is
/// logged when fewer sites survive the threshold than were requested.
pub fn select_locations(mut suppliers: Vec<Supplier>, selection: &SupplierSelection) -> Vec<Supplier> {
    suppliers.retain(|supplier| supplier.capacity >= selection.min_production);
    suppliers.sort_by(|a, b| b.capacity.value().total_cmp(&a.capacity.value()));

    if suppliers.len() < selection.number_of_locations {
        warn!(
            "Only {} suppliers meet the production requirement of {} t (requested {})",
            suppliers.len(),
            selection.min_production.value(),
            selection.number_of_locations
        );
    }
    suppliers.truncate(selection.number_of_locations);

    suppliers
}

/// Read the suppliers file and apply the location down-selection.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model input files
/// * `selection` - Parameters for the down-selection step
pub fn read_suppliers(model_dir: &Path, selection: &SupplierSelection) -> Result<SupplierMap> {
    let file_path = model_dir.join(SUPPLIERS_FILE_NAME);
    let suppliers = select_locations(read_csv(&file_path)?, selection);
    suppliers_to_map(suppliers)
}

/// Build a [`SupplierMap`], rejecting duplicate IDs.
pub fn suppliers_to_map(suppliers: Vec<Supplier>) -> Result<SupplierMap> {
    let mut map = SupplierMap::new();
    for supplier in suppliers {
        let id = supplier.id.clone();
        ensure!(
            map.insert(id.clone(), supplier).is_none(),
            "Duplicate supplier ID {id}"
        );
    }

    Ok(map)
}
