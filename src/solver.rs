//! The solver boundary.
//!
//! Translates the current [`Instance`] into a HiGHS linear program (one
//! column per free route flow, one row per port demand constraint and per
//! supplier capacity constraint) and maps the solver's exit status onto the
//! small [`SolveStatus`] vocabulary the driver understands. The solver
//! borrows the instance for the duration of one call and retains nothing.
use crate::id::{PortID, SupplierID};
use crate::instance::{DemandPolicy, Instance, RouteKey};
use crate::units::{Money, MoneyPerTonne, Tonnes};
use highs::{HighsModelStatus, RowProblem as Problem, Sense};
use indexmap::IndexMap;

/// A decision variable in the optimisation
///
/// Note that this type does **not** include the value of the variable; it
/// just refers to a particular column of the problem.
type Variable = highs::Col;

/// A map for easy lookup of variables in the problem.
///
/// The entries are ordered (see [`IndexMap`]), so the map doubles as the
/// record of which route each solution column belongs to.
#[derive(Default)]
struct VariableMap(IndexMap<RouteKey, Variable>);

/// Status reported by one solve call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveStatus {
    /// An optimal solution was found
    Optimal,
    /// No feasible point exists for the current instance
    Infeasible,
    /// The solver exceeded its time budget
    Timeout,
    /// Any other solver-reported condition
    Error(String),
}

/// The result of one solve call: a status, plus a solution when optimal.
pub struct SolveOutcome {
    /// The solver's exit status
    pub status: SolveStatus,
    /// The solution, present only when the status is [`SolveStatus::Optimal`]
    pub solution: Option<Solution>,
}

/// The solution to one solve of the distribution problem.
pub struct Solution {
    flows: IndexMap<RouteKey, Tonnes>,
    port_duals: IndexMap<PortID, MoneyPerTonne>,
    /// Total cost of the optimal plan
    pub objective: Money,
}

impl Solution {
    /// The flow on the given route (zero for routes fixed out of the problem)
    pub fn flow(&self, key: &RouteKey) -> Tonnes {
        self.flows.get(key).copied().unwrap_or(Tonnes(0.0))
    }

    /// Iterate over the flows for all free routes
    pub fn iter_flows(&self) -> impl Iterator<Item = (&RouteKey, Tonnes)> {
        self.flows.iter().map(|(key, flow)| (key, *flow))
    }

    /// Total production dispatched from the given supplier
    pub fn supplier_production(&self, supplier_id: &SupplierID) -> Tonnes {
        self.flows
            .iter()
            .filter(|(key, _)| &key.supplier_id == supplier_id)
            .map(|(_, flow)| *flow)
            .sum()
    }

    /// Total tonnage delivered to the given port
    pub fn port_delivery(&self, port_id: &PortID) -> Tonnes {
        self.flows
            .iter()
            .filter(|(key, _)| &key.port_id == port_id)
            .map(|(_, flow)| *flow)
            .sum()
    }

    /// Total tonnage delivered across all ports
    pub fn total_delivered(&self) -> Tonnes {
        self.flows.values().copied().sum()
    }

    /// The marginal cost of one extra tonne of demand at the given port.
    ///
    /// Read from the dual value of the port's demand constraint.
    pub fn marginal_delivery_cost(&self, port_id: &PortID) -> Option<MoneyPerTonne> {
        self.port_duals.get(port_id).copied()
    }

    /// Average cost of one delivered tonne over the whole plan
    pub fn cost_per_tonne(&self) -> MoneyPerTonne {
        self.objective / self.total_delivered()
    }
}

/// Solve the distribution problem for the instance's current state.
///
/// # Arguments
///
/// * `instance` - The optimisation instance
/// * `time_limit` - Solver time budget in seconds, if any
pub fn solve(instance: &Instance, time_limit: Option<f64>) -> SolveOutcome {
    let mut problem = Problem::default();
    let variables = add_variables(&mut problem, instance);

    // Demand rows are added first: their dual values are read back from the
    // first rows of the solution
    let port_keys = add_demand_constraints(&mut problem, &variables, instance);
    add_capacity_constraints(&mut problem, &variables, instance);

    let mut model = problem.optimise(Sense::Minimise);
    model.set_option("output_flag", false);
    if let Some(limit) = time_limit {
        model.set_option("time_limit", limit);
    }

    let solved = model.solve();
    match solved.status() {
        HighsModelStatus::Optimal => {
            let solution = extract_solution(&solved.get_solution(), variables, port_keys, instance);
            SolveOutcome {
                status: SolveStatus::Optimal,
                solution: Some(solution),
            }
        }
        // All costs are non-negative and demand is finite, so the model
        // cannot be unbounded; the ambiguous presolve status means infeasible
        HighsModelStatus::Infeasible | HighsModelStatus::UnboundedOrInfeasible => SolveOutcome {
            status: SolveStatus::Infeasible,
            solution: None,
        },
        HighsModelStatus::ReachedTimeLimit => SolveOutcome {
            status: SolveStatus::Timeout,
            solution: None,
        },
        status => SolveOutcome {
            status: SolveStatus::Error(format!("{status:?}")),
            solution: None,
        },
    }
}

/// Add one column per free route flow.
///
/// Routes pinned to zero by variable fixing are left out of the problem
/// entirely; their flow is implicitly zero.
fn add_variables(problem: &mut Problem, instance: &Instance) -> VariableMap {
    let mut variables = VariableMap::default();

    for (key, route) in instance.iter_live_routes() {
        let cost = route.unit_cost.value();
        let var = match route.upper_bound {
            Some(ub) => problem.add_column(cost, route.lower_bound.value()..=ub.value()),
            None => problem.add_column(cost, route.lower_bound.value()..),
        };

        let existing = variables.0.insert(key.clone(), var).is_some();
        assert!(!existing, "Duplicate entry for var");
    }

    variables
}

/// Add one demand constraint per port: the sum of all inflow equals (or, in
/// the relaxed policy, at least covers) the port's current demand.
///
/// A port with positive demand and no live route gets an unsatisfiable row,
/// which the solver then reports as infeasible; missing routes are never
/// papered over.
fn add_demand_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    instance: &Instance,
) -> Vec<PortID> {
    let mut terms_by_port: IndexMap<PortID, Vec<(Variable, f64)>> = instance
        .ports
        .keys()
        .map(|id| (id.clone(), Vec::new()))
        .collect();
    for (key, var) in &variables.0 {
        terms_by_port[&key.port_id].push((*var, 1.0));
    }

    let mut keys = Vec::new();
    for (port_id, terms) in terms_by_port {
        let demand = instance.demand(&port_id).value();
        match instance.demand_policy {
            DemandPolicy::Equality => problem.add_row(demand..=demand, terms),
            DemandPolicy::AtLeast => problem.add_row(demand.., terms),
        };
        keys.push(port_id);
    }

    keys
}

/// Add one capacity constraint per supplier: total outgoing flow is bounded
/// by production capacity above and by the production floor (non-zero only
/// for forced suppliers) below.
fn add_capacity_constraints(problem: &mut Problem, variables: &VariableMap, instance: &Instance) {
    let mut terms_by_supplier: IndexMap<SupplierID, Vec<(Variable, f64)>> = instance
        .suppliers
        .keys()
        .map(|id| (id.clone(), Vec::new()))
        .collect();
    for (key, var) in &variables.0 {
        terms_by_supplier[&key.supplier_id].push((*var, 1.0));
    }

    for (supplier_id, terms) in terms_by_supplier {
        let floor = instance.production_floor(&supplier_id).value();
        let capacity = instance.suppliers[&supplier_id].capacity.value();
        problem.add_row(floor..=capacity, terms);
    }
}

/// Read flows, duals and the objective back out of the solver's solution.
fn extract_solution(
    solution: &highs::Solution,
    variables: VariableMap,
    port_keys: Vec<PortID>,
    instance: &Instance,
) -> Solution {
    let flows: IndexMap<RouteKey, Tonnes> = variables
        .0
        .into_keys()
        .zip(solution.columns().iter().copied())
        .map(|(key, flow)| (key, Tonnes(flow)))
        .collect();

    let port_duals: IndexMap<PortID, MoneyPerTonne> = port_keys
        .into_iter()
        .zip(solution.dual_rows().iter().copied())
        .map(|(port_id, dual)| (port_id, MoneyPerTonne(dual)))
        .collect();

    // The objective is reconstructed from the flows; the solution object
    // does not carry it
    let objective = flows
        .iter()
        .map(|(key, flow)| instance.routes[key].unit_cost * *flow)
        .sum();

    Solution {
        flows,
        port_duals,
        objective,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::*;
    use crate::units::Dimensionless;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_solve_optimal(instance: Instance) {
        let outcome = solve(&instance, None);
        assert_eq!(outcome.status, SolveStatus::Optimal);

        let solution = outcome.solution.unwrap();
        // port2 can only be served by sup1 (sup3 has zero capacity); port1
        // takes all of sup2 (cheapest) and tops up from sup1
        assert_approx_eq!(f64, solution.total_delivered().value(), 14.0);
        assert_approx_eq!(f64, solution.supplier_production(&"sup1".into()).value(), 9.0);
        assert_approx_eq!(f64, solution.supplier_production(&"sup2".into()).value(), 5.0);
        assert_approx_eq!(f64, solution.supplier_production(&"sup3".into()).value(), 0.0);
        // 6 x 142.0 + 5 x 131.25 + 3 x 132.5
        assert_approx_eq!(f64, solution.objective.value(), 1905.75);
    }

    #[rstest]
    fn test_capacity_never_exceeded(instance: Instance) {
        let solution = solve(&instance, None).solution.unwrap();
        for (id, supplier) in &instance.suppliers {
            assert!(
                solution.supplier_production(id).value() <= supplier.capacity.value() + 1e-6
            );
        }
    }

    #[rstest]
    fn test_demand_exceeding_capacity_is_infeasible(mut instance: Instance) {
        // Total capacity is 15 t; demand scaled to 28 t must be reported
        // infeasible, not clamped
        instance.scale_demand(Dimensionless(2.0));
        let outcome = solve(&instance, None);
        assert_eq!(outcome.status, SolveStatus::Infeasible);
        assert!(outcome.solution.is_none());
    }

    #[rstest]
    fn test_relaxed_policy_never_over_delivers(mut instance: Instance) {
        // With inflow >= demand and positive costs, the optimum still meets
        // demand exactly
        instance.demand_policy = DemandPolicy::AtLeast;
        let solution = solve(&instance, None).solution.unwrap();
        assert_approx_eq!(f64, solution.total_delivered().value(), 14.0);
        assert_approx_eq!(f64, solution.objective.value(), 1905.75);
    }

    #[rstest]
    fn test_port_duals_present(instance: Instance) {
        let solution = solve(&instance, None).solution.unwrap();
        for port_id in instance.ports.keys() {
            assert!(solution.marginal_delivery_cost(port_id).is_some());
        }
    }
}
