use good_lp::Solution as LpSolution;
use good_lp::solvers::microlp::microlp;
use good_lp::{
    Expression, ProblemVariables, ResolutionError, SolverModel, Variable, variable, variables,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use crate::constraint::{Constraint, LinearExpr, Relation};
use crate::error::{ModelError, SolveError};
use crate::model::Model;
use crate::objective::Sense;
use crate::vars::{Capabilities, Domain, ModelId, VarId};

pub const DEFAULT_BACKEND: &str = "microlp";

/// Solver status flag, separate from why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverStatus {
    Ok,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminationCondition {
    Optimal,
    Infeasible,
    Unbounded,
}

impl fmt::Display for TerminationCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationCondition::Optimal => f.write_str("optimal"),
            TerminationCondition::Infeasible => f.write_str("infeasible"),
            TerminationCondition::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// What a backend hands back: dense values by variable slot when optimal.
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutcome {
    Optimal(Vec<f64>),
    Infeasible,
    Unbounded,
}

/// External MILP solver boundary.
pub trait SolverBackend {
    fn capabilities(&self) -> Capabilities;

    fn run(&self, model: &Model) -> Result<RawOutcome, SolveError>;
}

/// Outcome of one solve. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveResult {
    model: ModelId,
    model_name: String,
    backend: String,
    status: SolverStatus,
    termination: TerminationCondition,
    objective: Option<f64>,
    values: Option<Vec<f64>>,
}

impl SolveResult {
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn status(&self) -> SolverStatus {
        self.status
    }

    pub fn termination(&self) -> TerminationCondition {
        self.termination
    }

    pub fn is_optimal(&self) -> bool {
        self.termination == TerminationCondition::Optimal
    }

    /// Objective value; `None` unless optimal.
    pub fn objective(&self) -> Option<f64> {
        self.objective
    }

    /// Solved value of `var`; `None` unless optimal or if `var` belongs to
    /// another model.
    pub fn value(&self, var: VarId) -> Option<f64> {
        if var.model != self.model {
            return None;
        }
        self.values.as_ref()?.get(var.slot).copied()
    }

    pub fn values(&self) -> Option<&[f64]> {
        self.values.as_deref()
    }

    pub(crate) fn model_id(&self) -> ModelId {
        self.model
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SolverSettings {
    pub backend: String,
    /// Slack allowed when a solver answer is checked against the model.
    pub verify_tolerance: f64,
    /// Wall-clock limit; only honoured by backends that support one.
    pub time_limit_secs: Option<f64>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        SolverSettings {
            backend: DEFAULT_BACKEND.to_owned(),
            verify_tolerance: 1e-6,
            time_limit_secs: None,
        }
    }
}

impl SolverSettings {
    pub fn backend(&self) -> Result<Box<dyn SolverBackend>, SolveError> {
        match self.backend.as_str() {
            DEFAULT_BACKEND => Ok(Box::new(MicrolpBackend)),
            other => Err(SolveError::SolverUnavailable {
                backend: other.to_owned(),
                reason: format!("only `{DEFAULT_BACKEND}` is compiled in"),
            }),
        }
    }
}

/// Solve with default settings.
pub fn solve(model: &Model, backend: &dyn SolverBackend) -> Result<SolveResult, SolveError> {
    solve_with(model, backend, &SolverSettings::default())
}

/// Validate `model`, hand it to `backend` and check the answer.
///
/// Infeasible and unbounded models come back as `Ok` with a warning status.
/// A backend failure, or an answer that breaks a constraint, is an error.
/// Nothing is retried.
pub fn solve_with(
    model: &Model,
    backend: &dyn SolverBackend,
    settings: &SolverSettings,
) -> Result<SolveResult, SolveError> {
    model.validate()?;
    let capabilities = backend.capabilities();
    if let Some(var) = model
        .variables()
        .iter()
        .find(|v| !capabilities.supports(v.domain))
    {
        return Err(ModelError::InvalidDomain {
            variable: var.name.clone(),
            domain: var.domain,
            backend: capabilities.backend,
        }
        .into());
    }
    if let Some(limit) = settings.time_limit_secs {
        warn!(
            backend = %capabilities.backend,
            limit,
            "time limit not supported by backend; ignoring"
        );
    }

    info!(
        model = model.name(),
        backend = %capabilities.backend,
        variables = model.variables().len(),
        constraints = model.constraints().len(),
        "solving"
    );

    let outcome = backend.run(model)?;
    let result = |status, termination, objective, values| SolveResult {
        model: model.id(),
        model_name: model.name().to_owned(),
        backend: capabilities.backend.clone(),
        status,
        termination,
        objective,
        values,
    };

    match outcome {
        RawOutcome::Optimal(values) => {
            let violations = model.violations(&values, settings.verify_tolerance);
            if let Some(first) = violations.first() {
                return Err(SolveError::Solver {
                    backend: capabilities.backend.clone(),
                    reason: format!(
                        "answer rejected, {} violation(s), first: {first}",
                        violations.len()
                    ),
                });
            }
            let objective = model.objective()?.expr.eval(&values);
            info!(model = model.name(), objective, "optimal");
            Ok(result(
                SolverStatus::Ok,
                TerminationCondition::Optimal,
                Some(objective),
                Some(values),
            ))
        }
        RawOutcome::Infeasible => {
            warn!(model = model.name(), "infeasible");
            Ok(result(
                SolverStatus::Warning,
                TerminationCondition::Infeasible,
                None,
                None,
            ))
        }
        RawOutcome::Unbounded => {
            warn!(model = model.name(), "unbounded; a capacity constraint is probably missing");
            Ok(result(
                SolverStatus::Warning,
                TerminationCondition::Unbounded,
                None,
                None,
            ))
        }
    }
}

/// `good_lp` with the pure-Rust microlp branch-and-bound solver.
#[derive(Debug, Clone, Copy, Default)]
pub struct MicrolpBackend;

impl SolverBackend for MicrolpBackend {
    fn capabilities(&self) -> Capabilities {
        Capabilities::milp(DEFAULT_BACKEND)
    }

    fn run(&self, model: &Model) -> Result<RawOutcome, SolveError> {
        let objective = model.objective()?;
        let (problem_vars, lp_vars) = init_variables(model);
        let lp_objective = to_expression(&lp_vars, &objective.expr);

        let unsolved = match objective.sense {
            Sense::Maximize => problem_vars.maximise(lp_objective),
            Sense::Minimize => problem_vars.minimise(lp_objective),
        };
        let lp = model
            .constraints()
            .iter()
            .fold(unsolved.using(microlp), |m, c| {
                m.with(to_lp_constraint(&lp_vars, c))
            });

        match lp.solve() {
            Ok(solution) => {
                let values = lp_vars.iter().map(|&v| solution.value(v)).collect();
                debug!(model = model.name(), "microlp returned a solution");
                Ok(RawOutcome::Optimal(values))
            }
            Err(ResolutionError::Infeasible) => Ok(RawOutcome::Infeasible),
            Err(ResolutionError::Unbounded) => Ok(RawOutcome::Unbounded),
            Err(other) => Err(SolveError::Solver {
                backend: DEFAULT_BACKEND.to_owned(),
                reason: other.to_string(),
            }),
        }
    }
}

/// One `good_lp` variable per model variable, in slot order.
fn init_variables(model: &Model) -> (ProblemVariables, Vec<Variable>) {
    let mut problem_vars = variables!();
    let lp_vars = model
        .variables()
        .iter()
        .map(|v| {
            let definition = match v.domain {
                Domain::Binary => variable().binary(),
                Domain::NonNegativeReal => variable().min(0),
            };
            problem_vars.add(definition.name(v.name.clone()))
        })
        .collect();
    (problem_vars, lp_vars)
}

fn to_expression(lp_vars: &[Variable], expr: &LinearExpr) -> Expression {
    expr.terms()
        .iter()
        .fold(Expression::from(expr.constant()), |sum, &(var, coefficient)| {
            sum + lp_vars[var.slot] * coefficient
        })
}

fn to_lp_constraint(lp_vars: &[Variable], c: &Constraint) -> good_lp::Constraint {
    let lhs = to_expression(lp_vars, &c.lhs);
    match c.relation {
        Relation::Leq => lhs.leq(c.rhs),
        Relation::Geq => lhs.geq(c.rhs),
        Relation::Eq => lhs.eq(c.rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{capacity, fixed};
    use crate::sets::IndexSet;

    /// Knapsack: values 7, 5, 6 and weights 5, 8, 13 under capacity 14.
    fn knapsack() -> (Model, crate::vars::VarFamily) {
        let mut m = Model::new("knapsack");
        let items = m.add_set(IndexSet::range("I", 3)).unwrap();
        let x = m.add_var("x", Domain::Binary, &items).unwrap();
        let value = [7.0, 5.0, 6.0];
        let weight = [5.0, 8.0, 13.0];
        let objective = x
            .iter()
            .map(|(i, v)| (v, value[i.first() as usize - 1]))
            .collect();
        m.set_objective(Sense::Maximize, objective).unwrap();
        let weighted = x.iter().map(|(i, v)| (v, weight[i.first() as usize - 1]));
        m.add_constraint(capacity("cap", weighted, 14.0)).unwrap();
        (m, x)
    }

    struct Canned(RawOutcome);

    impl SolverBackend for Canned {
        fn capabilities(&self) -> Capabilities {
            Capabilities::milp("canned")
        }

        fn run(&self, _: &Model) -> Result<RawOutcome, SolveError> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    impl SolverBackend for Broken {
        fn capabilities(&self) -> Capabilities {
            Capabilities::milp("broken")
        }

        fn run(&self, _: &Model) -> Result<RawOutcome, SolveError> {
            Err(SolveError::SolverUnavailable {
                backend: "broken".into(),
                reason: "binary not found".into(),
            })
        }
    }

    struct LpOnly;

    impl SolverBackend for LpOnly {
        fn capabilities(&self) -> Capabilities {
            Capabilities::lp_only("lp-only")
        }

        fn run(&self, _: &Model) -> Result<RawOutcome, SolveError> {
            unreachable!("model must be rejected before the backend runs")
        }
    }

    #[test]
    fn knapsack_is_solved_optimally() {
        let (m, x) = knapsack();
        let result = solve(&m, &MicrolpBackend).unwrap();
        assert_eq!(result.status(), SolverStatus::Ok);
        assert_eq!(result.termination(), TerminationCondition::Optimal);
        assert!((result.objective().unwrap() - 12.0).abs() < 1e-6);
        assert!(result.value(x.at(1).unwrap()).unwrap() > 0.5);
        assert!(result.value(x.at(3).unwrap()).unwrap() < 0.5);
    }

    #[test]
    fn infeasible_model_has_no_values() {
        let (mut m, x) = knapsack();
        m.add_constraint(fixed("force", x.at(3).unwrap(), 1.0)).unwrap();
        m.add_constraint(fixed("force2", x.at(2).unwrap(), 1.0)).unwrap();
        let result = solve(&m, &MicrolpBackend).unwrap();
        assert_eq!(result.termination(), TerminationCondition::Infeasible);
        assert_eq!(result.status(), SolverStatus::Warning);
        assert!(result.objective().is_none());
        assert!(result.value(x.at(1).unwrap()).is_none());
    }

    #[test]
    fn unbounded_model_is_reported() {
        let mut m = Model::new("unbounded");
        let set = m.add_set(IndexSet::range("R", 1)).unwrap();
        let q = m.add_var("q", Domain::NonNegativeReal, &set).unwrap();
        let q1 = q.at(1).unwrap();
        m.set_objective(Sense::Maximize, LinearExpr::new().term(q1, 1.0))
            .unwrap();
        m.add_constraint(Constraint::new(
            "floor",
            LinearExpr::new().term(q1, 1.0),
            Relation::Geq,
            1.0,
        ))
        .unwrap();
        let result = solve(&m, &MicrolpBackend).unwrap();
        assert_eq!(result.termination(), TerminationCondition::Unbounded);
    }

    #[test]
    fn answer_breaking_capacity_is_rejected() {
        let (m, _) = knapsack();
        let err = solve(&m, &Canned(RawOutcome::Optimal(vec![1.0, 1.0, 1.0]))).unwrap_err();
        assert!(matches!(err, SolveError::Solver { .. }));
    }

    #[test]
    fn nan_answer_is_rejected() {
        let mut m = Model::new("pair");
        let set = m.add_set(IndexSet::range("I", 2)).unwrap();
        let x = m.add_var("x", Domain::Binary, &set).unwrap();
        m.set_objective(Sense::Maximize, x.iter().map(|(_, v)| (v, 1.0)).collect())
            .unwrap();

        let err = solve(&m, &Canned(RawOutcome::Optimal(vec![0.0, f64::NAN]))).unwrap_err();
        assert!(matches!(err, SolveError::Solver { .. }));
        assert!(err.to_string().contains("x[2]"));
    }

    #[test]
    fn short_answer_is_rejected() {
        let (m, _) = knapsack();
        let err = solve(&m, &Canned(RawOutcome::Optimal(vec![1.0]))).unwrap_err();
        assert!(matches!(err, SolveError::Solver { .. }));
    }

    #[test]
    fn backend_failure_is_surfaced() {
        let (m, _) = knapsack();
        assert!(matches!(
            solve(&m, &Broken),
            Err(SolveError::SolverUnavailable { .. })
        ));
    }

    #[test]
    fn binaries_never_reach_an_lp_only_backend() {
        let (m, _) = knapsack();
        assert!(matches!(
            solve(&m, &LpOnly),
            Err(SolveError::Model(ModelError::InvalidDomain { .. }))
        ));
    }

    #[test]
    fn model_without_objective_is_not_solved() {
        let mut m = Model::new("empty");
        let set = m.add_set(IndexSet::range("T", 1)).unwrap();
        m.add_var("x", Domain::Binary, &set).unwrap();
        assert!(matches!(
            solve(&m, &MicrolpBackend),
            Err(SolveError::Model(ModelError::ModelStructure(_)))
        ));
    }

    #[test]
    fn unknown_backend_is_unavailable() {
        let settings = SolverSettings {
            backend: "glpk".into(),
            ..SolverSettings::default()
        };
        assert!(matches!(
            settings.backend(),
            Err(SolveError::SolverUnavailable { .. })
        ));
        assert!(SolverSettings::default().backend().is_ok());
    }

    #[test]
    fn values_of_another_model_are_not_readable() {
        let (m, _) = knapsack();
        let (_, foreign) = knapsack();
        let result = solve(&m, &MicrolpBackend).unwrap();
        assert!(result.value(foreign.at(1).unwrap()).is_none());
    }
}
