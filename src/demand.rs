//! Port fuel demand and the demand-assembly step.
//!
//! The primary demand source is shipping fuel consumption per port. An
//! optional secondary source (downscaled aviation fuel demand) is merged
//! additively on port id. The primary table defines the port universe for
//! demand: a secondary entry for an unknown port is an error, never silently
//! dropped.
use crate::input::{read_csv, read_csv_optional};
use crate::units::Tonnes;
use anyhow::{bail, ensure, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

const DEMAND_FILE_NAME: &str = "demand.csv";
const AVIATION_DEMAND_FILE_NAME: &str = "aviation_demand.csv";

/// Annual fuel demand at a single port.
#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct DemandEntry {
    /// The port this demand entry refers to
    pub port_id: String,
    /// Annual ammonia demand
    #[serde(rename = "fuel_consumption_t")]
    pub fuel_consumption: Tonnes,
}

/// Merge the primary demand table with an optional secondary source.
///
/// Secondary quantities are added to the primary entry for the same port.
///
/// # Arguments
///
/// * `primary` - The shipping demand table; defines the port universe
/// * `secondary` - Additional demand (e.g. aviation), possibly empty
pub fn assemble_demand(
    primary: Vec<DemandEntry>,
    secondary: Vec<DemandEntry>,
) -> Result<Vec<DemandEntry>> {
    let mut merged: IndexMap<String, Tonnes> = IndexMap::new();
    for entry in primary {
        ensure!(
            merged
                .insert(entry.port_id.clone(), entry.fuel_consumption)
                .is_none(),
            "Duplicate demand entry for port {}",
            entry.port_id
        );
    }

    for entry in secondary {
        match merged.get_mut(&entry.port_id) {
            Some(demand) => *demand = *demand + entry.fuel_consumption,
            None => bail!(
                "Secondary demand references port {} which has no primary demand entry",
                entry.port_id
            ),
        }
    }

    Ok(merged
        .into_iter()
        .map(|(port_id, fuel_consumption)| DemandEntry {
            port_id,
            fuel_consumption,
        })
        .collect())
}

/// Read and assemble the demand tables for a model directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model input files
pub fn read_demand(model_dir: &Path) -> Result<Vec<DemandEntry>> {
    let primary = read_csv(&model_dir.join(DEMAND_FILE_NAME))?;
    let secondary = read_csv_optional(&model_dir.join(AVIATION_DEMAND_FILE_NAME))?;
    assemble_demand(primary, secondary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    fn entry(port_id: &str, tonnes: f64) -> DemandEntry {
        DemandEntry {
            port_id: port_id.into(),
            fuel_consumption: Tonnes(tonnes),
        }
    }

    #[test]
    fn test_assemble_demand_merges_additively() {
        let primary = vec![entry("p1", 10.0), entry("p2", 5.0)];
        let secondary = vec![entry("p1", 2.5)];

        let merged = assemble_demand(primary, secondary).unwrap();
        assert_eq!(merged.len(), 2);
        assert_approx_eq!(f64, merged[0].fuel_consumption.value(), 12.5);
        assert_approx_eq!(f64, merged[1].fuel_consumption.value(), 5.0);
    }

    #[test]
    fn test_assemble_demand_unknown_secondary_port() {
        let primary = vec![entry("p1", 10.0)];
        let secondary = vec![entry("p9", 1.0)];
        assert!(assemble_demand(primary, secondary).is_err());
    }

    #[test]
    fn test_assemble_demand_duplicate_primary() {
        let primary = vec![entry("p1", 10.0), entry("p1", 1.0)];
        assert!(assemble_demand(primary, Vec::new()).is_err());
    }
}
