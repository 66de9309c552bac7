//! Loading a model directory.
//!
//! A model directory contains the input tables (suppliers, ports, distances,
//! offshore cost surfaces, demand) and a `model.toml` with the run
//! configuration: supplier down-selection, instance policy, variable-fixing
//! rules and the scenario sweep.
use crate::demand::{read_demand, DemandEntry};
use crate::driver::Scenario;
use crate::fixing::FixingConfig;
use crate::input::read_toml;
use crate::instance::{build, Instance, InstancePolicy};
use crate::port::{read_ports, PortMap};
use crate::supplier::{read_suppliers, SupplierMap, SupplierSelection};
use crate::transport::{
    read_offshore_costs, read_onshore_distances, OffshoreCostTables, OnshoreDistance,
};
use crate::vessel::{standard_fleet, VesselClassMap};
use anyhow::{ensure, Result};
use serde::Deserialize;
use std::path::Path;

const MODEL_FILE_NAME: &str = "model.toml";

/// Represents the contents of the entire model file.
#[derive(Debug, Deserialize, PartialEq)]
struct ModelFile {
    /// Parameters for supplier down-selection
    suppliers: SupplierSelection,
    /// Construction-time instance policy
    #[serde(default)]
    instance: InstancePolicy,
    /// Variable-fixing configuration
    #[serde(default)]
    fixing: FixingConfig,
    /// The scenario sweep, in order
    scenarios: Vec<Scenario>,
}

/// A loaded model: input tables plus run configuration.
pub struct Model {
    /// The selected supplier sites
    pub suppliers: SupplierMap,
    /// The demand ports
    pub ports: PortMap,
    /// The vessel fleet
    pub vessel_classes: VesselClassMap,
    /// Overland distances per (supplier, port) pair
    pub onshore_distances: Vec<OnshoreDistance>,
    /// Offshore unit cost tables per vessel class
    pub offshore_costs: OffshoreCostTables,
    /// Assembled demand per port
    pub demand: Vec<DemandEntry>,
    /// Construction-time instance policy
    pub policy: InstancePolicy,
    /// Variable-fixing configuration
    pub fixing: FixingConfig,
    /// The scenario sweep, in order
    pub scenarios: Vec<Scenario>,
}

impl Model {
    /// Read a model from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model input files
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<Model> {
        let model_dir = model_dir.as_ref();
        let model_file: ModelFile = read_toml(&model_dir.join(MODEL_FILE_NAME))?;

        let vessel_classes = standard_fleet();
        for class_id in &model_file.fixing.disabled_vessel_classes {
            ensure!(
                vessel_classes.contains_key(class_id),
                "Fixing config disables unknown vessel class {class_id}"
            );
        }

        let suppliers = read_suppliers(model_dir, &model_file.suppliers)?;
        let ports = read_ports(model_dir)?;
        let onshore_distances = read_onshore_distances(model_dir)?;
        let offshore_costs = read_offshore_costs(model_dir, vessel_classes.keys())?;
        let demand = read_demand(model_dir)?;

        Ok(Model {
            suppliers,
            ports,
            vessel_classes,
            onshore_distances,
            offshore_costs,
            demand,
            policy: model_file.instance,
            fixing: model_file.fixing,
            scenarios: model_file.scenarios,
        })
    }

    /// Build the optimisation instance for this model.
    pub fn build_instance(&self) -> Result<Instance> {
        build(
            self.suppliers.clone(),
            self.ports.clone(),
            self.vessel_classes.clone(),
            &self.onshore_distances,
            &self.offshore_costs,
            &self.demand,
            &self.policy,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::DemandPolicy;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_model_file_parsing() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(MODEL_FILE_NAME)).unwrap();
            writeln!(
                file,
                r#"
                [suppliers]
                number_of_locations = 100
                min_production_t = 1.0

                [instance]
                demand_policy = "at-least"

                [fixing]
                disabled_vessel_classes = ["handysize"]

                [[scenarios]]
                name = "baseline"

                [[scenarios]]
                name = "double"
                demand_factor = 2.0
                reset_demand = true
                overwrite_lb = true
                "#
            )
            .unwrap();
        }

        let model_file: ModelFile = read_toml(&dir.path().join(MODEL_FILE_NAME)).unwrap();
        assert_eq!(model_file.suppliers.number_of_locations, 100);
        assert_eq!(model_file.instance.demand_policy, DemandPolicy::AtLeast);
        assert_eq!(model_file.fixing.disabled_vessel_classes.len(), 1);
        assert_eq!(model_file.scenarios.len(), 2);
        assert!(!model_file.scenarios[0].overwrite_lb);
        assert!(model_file.scenarios[1].reset_demand);
    }

    #[test]
    fn test_scenario_defaults() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(MODEL_FILE_NAME)).unwrap();
            writeln!(
                file,
                r#"
                [suppliers]
                number_of_locations = 10
                min_production_t = 0.5

                [[scenarios]]
                name = "only"
                "#
            )
            .unwrap();
        }

        let model_file: ModelFile = read_toml(&dir.path().join(MODEL_FILE_NAME)).unwrap();
        let scenario = &model_file.scenarios[0];
        assert_eq!(scenario.demand_factor.value(), 1.0);
        assert!(!scenario.reset_demand);
        assert!(scenario.forced_suppliers.is_none());
    }
}
