//! Integration tests running the bundled demo model end to end.
use float_cmp::assert_approx_eq;
use gpo::driver::{run_sweep, ScenarioOutcome, SweepOptions};
use gpo::fixing::fix_variables;
use gpo::model::Model;
use gpo::output::CsvResultWriter;
use std::path::{Path, PathBuf};

/// Get the path to the demo model.
fn get_model_dir() -> PathBuf {
    Path::new(file!())
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("demos")
        .join("simple")
}

#[test]
fn test_model_from_path() {
    let model = Model::from_path(get_model_dir()).unwrap();
    assert_eq!(model.suppliers.len(), 6);
    assert_eq!(model.ports.len(), 3);
    assert_eq!(model.scenarios.len(), 3);
}

#[test]
fn test_instance_construction() {
    let model = Model::from_path(get_model_dir()).unwrap();
    let instance = model.build_instance().unwrap();

    // 17 connected (supplier, port) pairs x 2 enabled vessel classes; the
    // luderitz -> singapore pair has no distance entry, hence no route
    assert_eq!(instance.routes.len(), 34);
    assert!(!instance
        .routes
        .keys()
        .any(|key| key.supplier_id == "luderitz".into() && key.port_id == "singapore".into()));

    // Rotterdam demand = shipping + aviation + fixed-port injection
    assert_approx_eq!(
        f64,
        instance.demand(&"rotterdam".into()).value(),
        1_200_000.0 + 150_000.0 + 50_000.0
    );
}

#[test]
fn test_full_sweep() {
    let model = Model::from_path(get_model_dir()).unwrap();
    let mut instance = model.build_instance().unwrap();

    // The demo switches the small ship class off: one route per pair goes
    let summary = fix_variables(&mut instance, &model.fixing);
    assert_eq!(summary.fixed_by_class, 17);

    let output_dir = tempfile::tempdir().unwrap();
    let mut writer = CsvResultWriter::new(output_dir.path());
    let outcomes = run_sweep(
        instance,
        &model.scenarios,
        &SweepOptions::default(),
        &mut writer,
    )
    .unwrap();

    assert_eq!(outcomes.len(), 3);
    let objectives: Vec<f64> = outcomes
        .iter()
        .map(|outcome| match outcome {
            ScenarioOutcome::Solved { objective, .. } => objective.value(),
            other => panic!("Scenario did not solve: {other:?}"),
        })
        .collect();

    // Growing demand under a warm start can only cost more
    assert!(objectives[0] < objectives[1]);
    assert!(objectives[1] < objectives[2]);

    // Every scenario's results were persisted
    for scenario_dir in ["00_baseline", "01_df1.25", "02_df1.5_forced_luderitz"] {
        for file_name in ["flows.csv", "suppliers.csv", "ports.csv", "headline_figures.csv"] {
            assert!(output_dir.path().join(scenario_dir).join(file_name).is_file());
        }
    }
}
