//! The scenario sweep driver.
//!
//! One [`Instance`] is repeatedly perturbed and re-solved across an ordered
//! sequence of scenarios. Each scenario's perturbation may depend on the
//! previous scenario's solution (lower-bound overwrite), so scenarios run
//! strictly in sequence and the driver owns the instance for the whole
//! sweep. Every solved scenario is persisted through the [`ResultWriter`]
//! before the next one starts; a failed scenario never produces a
//! substitute result.
use crate::id::SupplierID;
use crate::instance::Instance;
use crate::solver::{solve, Solution, SolveStatus};
use crate::units::{Dimensionless, Money, MoneyPerTonne, Tonnes};
use anyhow::{bail, Result};
use log::{error, info, warn};
use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Production floor for forced suppliers, as a fraction of capacity.
///
/// Small enough not to distort the plan, large enough that the site cannot
/// be switched off entirely.
pub const FORCED_PRODUCTION_FLOOR_FRACTION: f64 = 0.001;

fn default_demand_factor() -> Dimensionless {
    Dimensionless(1.0)
}

/// One demand/override configuration to be solved to completion.
#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Name used in logs and output paths
    pub name: String,
    /// Multiplicative scale applied to all port demands
    #[serde(default = "default_demand_factor")]
    pub demand_factor: Dimensionless,
    /// Whether to restore baseline demand before scaling
    #[serde(default)]
    pub reset_demand: bool,
    /// Whether to carry the previous solution forward as a floor on each
    /// route's flow (warm-started, monotone sweeps)
    #[serde(default)]
    pub overwrite_lb: bool,
    /// Suppliers whose production is pinned above zero
    #[serde(default)]
    pub forced_suppliers: Option<Vec<SupplierID>>,
}

/// Mutually inconsistent scenario options, caught before any solve.
#[derive(Debug, Clone)]
pub struct ConfigurationError {
    /// Explanation of the inconsistency
    pub message: String,
}

impl ConfigurationError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid scenario configuration: {}", self.message)
    }
}

impl Error for ConfigurationError {}

/// The solver found no feasible point for a scenario.
#[derive(Debug, Clone)]
pub struct InfeasibleScenarioError {
    /// Position of the scenario in the sweep
    pub scenario_index: usize,
    /// Name of the scenario
    pub scenario_name: String,
}

impl fmt::Display for InfeasibleScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scenario {} ({}) is infeasible",
            self.scenario_index, self.scenario_name
        )
    }
}

impl Error for InfeasibleScenarioError {}

/// The solver exceeded its time budget on a scenario.
#[derive(Debug, Clone)]
pub struct SolverTimeoutError {
    /// Position of the scenario in the sweep
    pub scenario_index: usize,
    /// Name of the scenario
    pub scenario_name: String,
}

impl fmt::Display for SolverTimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Solver timed out on scenario {} ({}); its result is incomplete",
            self.scenario_index, self.scenario_name
        )
    }
}

impl Error for SolverTimeoutError {}

/// Persists one solved scenario.
///
/// Each scenario's record is independently durable once written; the driver
/// never buffers results across scenarios.
pub trait ResultWriter {
    /// Write the solution for one scenario.
    fn write(
        &mut self,
        scenario_index: usize,
        scenario: &Scenario,
        instance: &Instance,
        solution: &Solution,
    ) -> Result<()>;
}

/// How one scenario of the sweep ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ScenarioOutcome {
    /// Solved to optimality and persisted
    Solved {
        /// Total cost of the plan
        objective: Money,
        /// Total tonnage delivered
        total_delivered: Tonnes,
        /// Headline cost per delivered tonne
        cost_per_tonne: MoneyPerTonne,
    },
    /// The solver reported no feasible point
    Infeasible,
    /// The solver exceeded its time budget
    TimedOut,
}

/// Cooperative cancellation flag for a sweep.
///
/// Checked at the top of each scenario iteration; cancellation mid-solve is
/// delegated to the solver's own limits.
#[derive(Clone, Default)]
pub struct SweepCancelToken(Arc<AtomicBool>);

impl SweepCancelToken {
    /// Create a token in the not-cancelled state
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation before the next scenario starts
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Options applying to a whole sweep.
#[derive(Clone, Default)]
pub struct SweepOptions {
    /// Solver time budget per scenario, in seconds
    pub time_limit: Option<f64>,
    /// Whether to abort the sweep on the first failed scenario instead of
    /// recording the failure and continuing
    pub halt_on_failure: bool,
    /// Cancellation flag, if the caller wants one
    pub cancel: Option<SweepCancelToken>,
}

/// Check the scenario sequence for inconsistencies before any solve.
fn validate_scenarios(scenarios: &[Scenario], instance: &Instance) -> Result<()> {
    if scenarios.is_empty() {
        return Err(ConfigurationError::new("no scenarios to run").into());
    }

    if scenarios[0].overwrite_lb {
        return Err(ConfigurationError::new(format!(
            "scenario 0 ({}) sets overwrite_lb but there is no previous solution",
            scenarios[0].name
        ))
        .into());
    }

    for scenario in scenarios {
        let factor = scenario.demand_factor.value();
        if !factor.is_finite() || factor < 0.0 {
            return Err(ConfigurationError::new(format!(
                "scenario {} has invalid demand_factor {factor}",
                scenario.name
            ))
            .into());
        }

        for supplier_id in scenario.forced_suppliers.iter().flatten() {
            if !instance.suppliers.contains_key(supplier_id) {
                return Err(ConfigurationError::new(format!(
                    "scenario {} forces unknown supplier {supplier_id}",
                    scenario.name
                ))
                .into());
            }
        }
    }

    Ok(())
}

/// State carried from one scenario to the next: the current instance
/// snapshot plus the previous scenario's solution.
///
/// Threading this value through the sweep keeps the carry-over explicit;
/// there is no hidden dependence on call order beyond it.
struct ScenarioState {
    instance: Instance,
    previous: Option<Solution>,
}

/// Apply one scenario's overrides to the state.
///
/// The steps run in a fixed order: demand reset, demand scaling, lower-bound
/// overwrite, forced-supplier pinning.
fn perturb(mut state: ScenarioState, scenario: &Scenario) -> Result<ScenarioState> {
    let instance = &mut state.instance;
    if scenario.reset_demand {
        instance.reset_demand();
    }
    instance.scale_demand(scenario.demand_factor);

    if scenario.overwrite_lb {
        // Checked in validate_scenarios, but the invariant is cheap to state
        let Some(previous) = &state.previous else {
            return Err(
                ConfigurationError::new("overwrite_lb with no previous solution").into(),
            );
        };
        for (key, route) in &mut instance.routes {
            route.lower_bound = previous.flow(key);
        }
    }

    if let Some(forced) = &scenario.forced_suppliers {
        for supplier_id in forced {
            let floor = instance.suppliers[supplier_id].capacity
                * Dimensionless(FORCED_PRODUCTION_FLOOR_FRACTION);
            instance.set_production_floor(supplier_id.clone(), floor);
        }
    }

    Ok(state)
}

/// Run the scenario sweep to completion.
///
/// Scenarios are solved strictly in sequence; each solved scenario is
/// persisted through `writer` before the next perturbation. Failed scenarios
/// are recorded in the returned outcomes (or abort the sweep, per
/// [`SweepOptions::halt_on_failure`]); fatal errors (bad configuration,
/// writer failures) abort immediately.
pub fn run_sweep(
    instance: Instance,
    scenarios: &[Scenario],
    options: &SweepOptions,
    writer: &mut dyn ResultWriter,
) -> Result<Vec<ScenarioOutcome>> {
    validate_scenarios(scenarios, &instance)?;

    let mut outcomes = Vec::with_capacity(scenarios.len());
    let mut state = ScenarioState {
        instance,
        previous: None,
    };
    for (index, scenario) in scenarios.iter().enumerate() {
        if options.cancel.as_ref().is_some_and(SweepCancelToken::is_cancelled) {
            warn!("Sweep cancelled before scenario {index} ({})", scenario.name);
            break;
        }

        info!(
            "Scenario {index} ({}): demand_factor={}, reset_demand={}, overwrite_lb={}",
            scenario.name,
            scenario.demand_factor.value(),
            scenario.reset_demand,
            scenario.overwrite_lb
        );
        state = perturb(state, scenario)?;

        let outcome = solve(&state.instance, options.time_limit);
        match outcome.status {
            SolveStatus::Optimal => {
                let solution = outcome.solution.expect("Optimal solve must carry a solution");
                writer.write(index, scenario, &state.instance, &solution)?;

                let total_delivered = solution.total_delivered();
                let cost_per_tonne = solution.cost_per_tonne();
                info!(
                    "Scenario {index} ({}): objective {:.2}, {:.2} t delivered at {:.2}/t",
                    scenario.name,
                    solution.objective.value(),
                    total_delivered.value(),
                    cost_per_tonne.value()
                );
                outcomes.push(ScenarioOutcome::Solved {
                    objective: solution.objective,
                    total_delivered,
                    cost_per_tonne,
                });
                state.previous = Some(solution);
            }
            SolveStatus::Infeasible => {
                let err = InfeasibleScenarioError {
                    scenario_index: index,
                    scenario_name: scenario.name.clone(),
                };
                if options.halt_on_failure {
                    return Err(err.into());
                }
                error!("{err}");
                outcomes.push(ScenarioOutcome::Infeasible);
            }
            SolveStatus::Timeout => {
                let err = SolverTimeoutError {
                    scenario_index: index,
                    scenario_name: scenario.name.clone(),
                };
                if options.halt_on_failure {
                    return Err(err.into());
                }
                error!("{err}");
                outcomes.push(ScenarioOutcome::TimedOut);
            }
            SolveStatus::Error(message) => {
                bail!(
                    "Solver failed on scenario {index} ({}): {message}",
                    scenario.name
                );
            }
        }
    }

    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::*;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    /// Collects written scenario objectives instead of touching disk
    #[derive(Default)]
    struct RecordingWriter {
        written: Vec<(usize, f64)>,
    }

    impl ResultWriter for RecordingWriter {
        fn write(
            &mut self,
            scenario_index: usize,
            _scenario: &Scenario,
            _instance: &Instance,
            solution: &Solution,
        ) -> Result<()> {
            self.written.push((scenario_index, solution.objective.value()));
            Ok(())
        }
    }

    fn neutral_scenario(name: &str) -> Scenario {
        Scenario {
            name: name.into(),
            demand_factor: Dimensionless(1.0),
            reset_demand: false,
            overwrite_lb: false,
            forced_suppliers: None,
        }
    }

    fn initial_state(instance: Instance) -> ScenarioState {
        ScenarioState {
            instance,
            previous: None,
        }
    }

    #[rstest]
    fn test_neutral_perturb_is_identity(instance: Instance) {
        let demand_before: Vec<_> = instance.iter_demand().map(|(_, d)| d).collect();
        let bounds_before: Vec<_> = instance
            .routes
            .values()
            .map(|r| (r.lower_bound, r.upper_bound))
            .collect();

        let state = perturb(initial_state(instance), &neutral_scenario("noop")).unwrap();

        let demand_after: Vec<_> = state.instance.iter_demand().map(|(_, d)| d).collect();
        let bounds_after: Vec<_> = state
            .instance
            .routes
            .values()
            .map(|r| (r.lower_bound, r.upper_bound))
            .collect();
        assert_eq!(demand_before, demand_after);
        assert_eq!(bounds_before, bounds_after);
    }

    #[rstest]
    fn test_reset_then_scale_round_trip(instance: Instance) {
        let baseline = instance.demand(&"port1".into());
        let mut state = initial_state(instance);

        // Scale arbitrarily across two perturbations, then reset + scale
        let mut scenario = neutral_scenario("warp");
        scenario.demand_factor = Dimensionless(3.0);
        state = perturb(state, &scenario).unwrap();
        scenario.demand_factor = Dimensionless(0.25);
        state = perturb(state, &scenario).unwrap();

        let mut last = neutral_scenario("reset");
        last.reset_demand = true;
        last.demand_factor = Dimensionless(1.5);
        state = perturb(state, &last).unwrap();

        assert_approx_eq!(
            f64,
            state.instance.demand(&"port1".into()).value(),
            baseline.value() * 1.5
        );
    }

    #[rstest]
    fn test_forced_supplier_floor(instance: Instance) {
        let mut scenario = neutral_scenario("forced");
        scenario.forced_suppliers = Some(vec!["sup2".into()]);
        let state = perturb(initial_state(instance), &scenario).unwrap();

        // sup2 has 5 t capacity; the floor is 0.1% of that
        let instance = &state.instance;
        assert_approx_eq!(f64, instance.production_floor(&"sup2".into()).value(), 0.005);
        assert_approx_eq!(f64, instance.production_floor(&"sup1".into()).value(), 0.0);
    }

    #[rstest]
    fn test_overwrite_lb_on_first_scenario_is_config_error(instance: Instance) {
        let mut scenario = neutral_scenario("warm");
        scenario.overwrite_lb = true;

        let err = run_sweep(
            instance,
            &[scenario],
            &SweepOptions::default(),
            &mut RecordingWriter::default(),
        )
        .unwrap_err();
        assert!(err.downcast_ref::<ConfigurationError>().is_some());
    }

    #[rstest]
    fn test_unknown_forced_supplier_is_config_error(instance: Instance) {
        let mut scenario = neutral_scenario("forced");
        scenario.forced_suppliers = Some(vec!["sup99".into()]);

        let err = run_sweep(
            instance,
            &[scenario],
            &SweepOptions::default(),
            &mut RecordingWriter::default(),
        )
        .unwrap_err();
        assert!(err.downcast_ref::<ConfigurationError>().is_some());
    }

    #[rstest]
    fn test_sweep_solves_and_persists_each_scenario(instance: Instance) {
        let scenarios = [neutral_scenario("baseline"), {
            let mut s = neutral_scenario("shrunk");
            s.reset_demand = true;
            s.demand_factor = Dimensionless(0.5);
            s
        }];

        let mut writer = RecordingWriter::default();
        let outcomes = run_sweep(instance, &scenarios, &SweepOptions::default(), &mut writer)
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(writer.written.len(), 2);
        assert!(matches!(outcomes[0], ScenarioOutcome::Solved { .. }));
        assert!(matches!(outcomes[1], ScenarioOutcome::Solved { .. }));
    }

    #[rstest]
    fn test_warm_start_is_monotone(instance: Instance) {
        // Growing demand with overwrite_lb: flows may only grow
        let scenarios = [neutral_scenario("baseline"), {
            let mut s = neutral_scenario("grown");
            s.reset_demand = true;
            s.demand_factor = Dimensionless(1.05);
            s.overwrite_lb = true;
            s
        }];

        let mut writer = RecordingWriter::default();
        let outcomes = run_sweep(instance, &scenarios, &SweepOptions::default(), &mut writer)
            .unwrap();
        assert!(outcomes
            .iter()
            .all(|o| matches!(o, ScenarioOutcome::Solved { .. })));

        // Objectives can only grow when demand grows under a warm start
        assert!(writer.written[1].1 >= writer.written[0].1 - 1e-9);
    }

    #[rstest]
    fn test_infeasible_scenario_recorded_not_skipped(instance: Instance) {
        let mut scenario = neutral_scenario("too_much");
        scenario.demand_factor = Dimensionless(10.0);

        let mut writer = RecordingWriter::default();
        let outcomes = run_sweep(instance, &[scenario], &SweepOptions::default(), &mut writer)
            .unwrap();
        assert_eq!(outcomes, vec![ScenarioOutcome::Infeasible]);
        assert!(writer.written.is_empty());
    }

    #[rstest]
    fn test_halt_on_failure_surfaces_error(instance: Instance) {
        let mut scenario = neutral_scenario("too_much");
        scenario.demand_factor = Dimensionless(10.0);

        let options = SweepOptions {
            halt_on_failure: true,
            ..SweepOptions::default()
        };
        let err = run_sweep(instance, &[scenario], &options, &mut RecordingWriter::default())
            .unwrap_err();

        let infeasible = err.downcast_ref::<InfeasibleScenarioError>().unwrap();
        assert_eq!(infeasible.scenario_index, 0);
    }

    #[rstest]
    fn test_cancellation_checkpoint(instance: Instance) {
        let cancel = SweepCancelToken::new();
        cancel.cancel();
        let options = SweepOptions {
            cancel: Some(cancel),
            ..SweepOptions::default()
        };

        let mut writer = RecordingWriter::default();
        let outcomes = run_sweep(
            instance,
            &[neutral_scenario("never_runs")],
            &options,
            &mut writer,
        )
        .unwrap();
        assert!(outcomes.is_empty());
        assert!(writer.written.is_empty());
    }

    #[rstest]
    fn test_monotone_route_flows_under_overwrite_lb(instance: Instance) {
        // Solve once, overwrite lower bounds, reset demand: the bounds must
        // hold every route's flow at its previously committed level
        let first = solve(&instance, None).solution.unwrap();
        let committed: Vec<_> = instance
            .routes
            .keys()
            .map(|key| (key.clone(), first.flow(key)))
            .collect();

        let mut scenario = neutral_scenario("locked");
        scenario.reset_demand = true;
        scenario.overwrite_lb = true;
        let state = perturb(
            ScenarioState {
                instance,
                previous: Some(first),
            },
            &scenario,
        )
        .unwrap();

        for (key, flow) in committed {
            assert!(state.instance.routes[&key].lower_bound.value() >= flow.value() - 1e-9);
        }
    }

    #[test]
    fn test_cancel_token_default_not_cancelled() {
        assert!(!SweepCancelToken::new().is_cancelled());
    }
}
