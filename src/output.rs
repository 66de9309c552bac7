//! The module responsible for writing output data to disk.
//!
//! Each scenario gets its own subdirectory of the output folder, written as
//! soon as the scenario is solved: route flows (with the onshore distance
//! alongside, so no post-hoc join is needed), per-supplier and per-port
//! summaries, and a small headline-figures file with the cost per delivered
//! tonne.
use crate::driver::{ResultWriter, Scenario};
use crate::id::{PortID, SupplierID, VesselClassID};
use crate::instance::Instance;
use crate::solver::Solution;
use crate::units::{Dimensionless, Kilometres, Money, MoneyPerTonne, Tonnes};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "gpo_results";

/// The output file name for route flows
const FLOWS_FILE_NAME: &str = "flows.csv";

/// The output file name for the per-supplier summary
const SUPPLIERS_FILE_NAME: &str = "suppliers.csv";

/// The output file name for the per-port summary
const PORTS_FILE_NAME: &str = "ports.csv";

/// The output file name for headline figures
const HEADLINE_FILE_NAME: &str = "headline_figures.csv";

/// Flows below this are written as zero rows nowhere; they are solver noise
const FLOW_TOLERANCE: f64 = 1e-9;

/// Get the default output folder for the model at the specified path
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // Canonicalise in case the user has specified "."
    let model_dir = model_dir
        .canonicalize()
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create the output directory, clearing a previous run's results if allowed.
///
/// # Returns
///
/// Whether an existing directory was overwritten.
pub fn create_output_directory(output_dir: &Path, overwrite: bool) -> Result<bool> {
    let existed = output_dir.is_dir();
    if existed {
        if !overwrite {
            bail!(
                "Output directory {} already exists (pass --overwrite to replace it)",
                output_dir.display()
            );
        }
        fs::remove_dir_all(output_dir)?;
    }
    fs::create_dir_all(output_dir)?;

    Ok(existed)
}

/// Represents a row in the route flows CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct FlowRow {
    supplier_id: SupplierID,
    port_id: PortID,
    vessel_class: VesselClassID,
    flow_t: Tonnes,
    unit_cost_per_t: MoneyPerTonne,
    distance_km: Kilometres,
    cost: Money,
}

/// Represents a row in the supplier summary CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct SupplierSummaryRow {
    supplier_id: SupplierID,
    capacity_t: Tonnes,
    local_production_t: Tonnes,
    utilisation: Dimensionless,
    electricity_cost_fraction: Dimensionless,
}

/// Represents a row in the port summary CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct PortSummaryRow {
    port_id: PortID,
    name: String,
    demand_t: Tonnes,
    delivered_t: Tonnes,
    marginal_cost_per_t: Option<MoneyPerTonne>,
    average_cost_per_t: MoneyPerTonne,
}

/// Represents a row in the headline figures CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct HeadlineRow {
    parameter: String,
    value: f64,
}

/// Writes each solved scenario's results as CSV files.
pub struct CsvResultWriter {
    output_path: PathBuf,
}

impl CsvResultWriter {
    /// Create a writer rooted at the given output folder.
    pub fn new(output_path: &Path) -> Self {
        Self {
            output_path: output_path.to_path_buf(),
        }
    }

    fn write_flows(&self, path: &Path, instance: &Instance, solution: &Solution) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for (key, flow) in solution.iter_flows() {
            if flow.value() <= FLOW_TOLERANCE {
                continue;
            }

            let route = &instance.routes[key];
            writer.serialize(FlowRow {
                supplier_id: key.supplier_id.clone(),
                port_id: key.port_id.clone(),
                vessel_class: key.vessel_class_id.clone(),
                flow_t: flow,
                unit_cost_per_t: route.unit_cost,
                distance_km: route.distance,
                cost: route.unit_cost * flow,
            })?;
        }
        writer.flush()?;

        Ok(())
    }

    fn write_suppliers(&self, path: &Path, instance: &Instance, solution: &Solution) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for (id, supplier) in &instance.suppliers {
            let production = solution.supplier_production(id);
            let utilisation = if supplier.capacity.value() > 0.0 {
                production / supplier.capacity
            } else {
                Dimensionless(0.0)
            };
            writer.serialize(SupplierSummaryRow {
                supplier_id: id.clone(),
                capacity_t: supplier.capacity,
                local_production_t: production,
                utilisation,
                electricity_cost_fraction: supplier.electricity_cost_fraction,
            })?;
        }
        writer.flush()?;

        Ok(())
    }

    fn write_ports(&self, path: &Path, instance: &Instance, solution: &Solution) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for (id, port) in &instance.ports {
            let delivered = solution.port_delivery(id);
            let cost: Money = solution
                .iter_flows()
                .filter(|(key, _)| &key.port_id == id)
                .map(|(key, flow)| instance.routes[key].unit_cost * flow)
                .sum();
            let average_cost_per_t = if delivered.value() > 0.0 {
                cost / delivered
            } else {
                MoneyPerTonne(0.0)
            };
            writer.serialize(PortSummaryRow {
                port_id: id.clone(),
                name: port.name.clone(),
                demand_t: instance.demand(id),
                delivered_t: delivered,
                marginal_cost_per_t: solution.marginal_delivery_cost(id),
                average_cost_per_t,
            })?;
        }
        writer.flush()?;

        Ok(())
    }

    fn write_headline(&self, path: &Path, solution: &Solution) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        let rows = [
            ("total_cost", solution.objective.value()),
            ("total_delivered_t", solution.total_delivered().value()),
            ("cost_per_tonne", solution.cost_per_tonne().value()),
        ];
        for (parameter, value) in rows {
            writer.serialize(HeadlineRow {
                parameter: parameter.to_string(),
                value,
            })?;
        }
        writer.flush()?;

        Ok(())
    }
}

impl ResultWriter for CsvResultWriter {
    fn write(
        &mut self,
        scenario_index: usize,
        scenario: &Scenario,
        instance: &Instance,
        solution: &Solution,
    ) -> Result<()> {
        let scenario_dir = self
            .output_path
            .join(format!("{scenario_index:02}_{}", scenario.name));
        fs::create_dir_all(&scenario_dir)
            .with_context(|| format!("Failed to create {}", scenario_dir.display()))?;

        self.write_flows(&scenario_dir.join(FLOWS_FILE_NAME), instance, solution)?;
        self.write_suppliers(&scenario_dir.join(SUPPLIERS_FILE_NAME), instance, solution)?;
        self.write_ports(&scenario_dir.join(PORTS_FILE_NAME), instance, solution)?;
        self.write_headline(&scenario_dir.join(HEADLINE_FILE_NAME), solution)?;

        Ok(())
    }
}
