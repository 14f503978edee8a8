use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::constraint::{Constraint, LinearExpr, Relation};
use crate::error::ModelError;
use crate::objective::{Objective, Sense};
use crate::params::Parameter;
use crate::sets::{Index, IndexSet};
use crate::solve::DEFAULT_BACKEND;
use crate::vars::{Capabilities, Domain, ModelId, VarFamily, VarId, Variable, instance_name};

static NEXT_MODEL_ID: AtomicU64 = AtomicU64::new(1);

/// One optimization problem instance: its sets, parameters, variables,
/// constraints and objective.
///
/// Models are independent values. Variables and constraints of one model
/// cannot be referenced from another.
#[derive(Debug)]
pub struct Model {
    id: ModelId,
    name: String,
    capabilities: Capabilities,
    sets: Vec<IndexSet>,
    params: BTreeMap<String, Parameter>,
    variables: Vec<Variable>,
    families: Vec<VarFamily>,
    constraints: Vec<Constraint>,
    objective: Option<Objective>,
}

/// A broken constraint or domain in a candidate assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    Constraint {
        name: String,
        lhs: f64,
        relation: Relation,
        rhs: f64,
    },
    Domain {
        variable: String,
        domain: Domain,
        value: f64,
    },
    /// The answer does not carry one value per variable.
    Length { expected: usize, found: usize },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Constraint {
                name,
                lhs,
                relation,
                rhs,
            } => write!(f, "{name}: {lhs} {relation} {rhs} does not hold"),
            Violation::Domain {
                variable,
                domain,
                value,
            } => write!(f, "{variable} = {value} is outside {domain}"),
            Violation::Length { expected, found } => {
                write!(f, "expected {expected} values, found {found}")
            }
        }
    }
}

impl Model {
    /// A model targeting the default MILP backend.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capabilities(name, Capabilities::milp(DEFAULT_BACKEND))
    }

    pub fn with_capabilities(name: impl Into<String>, capabilities: Capabilities) -> Self {
        Model {
            id: ModelId(NEXT_MODEL_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
            capabilities,
            sets: Vec::new(),
            params: BTreeMap::new(),
            variables: Vec::new(),
            families: Vec::new(),
            constraints: Vec::new(),
            objective: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn id(&self) -> ModelId {
        self.id
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Register an index set. Set names are unique within a model.
    pub fn add_set(&mut self, set: IndexSet) -> Result<IndexSet, ModelError> {
        if self.sets.iter().any(|s| s.name() == set.name()) {
            return Err(ModelError::structure(format!(
                "set `{}` declared twice in model `{}`",
                set.name(),
                self.name
            )));
        }
        self.sets.push(set.clone());
        Ok(set)
    }

    /// Register a parameter. Parameter names are unique within a model.
    pub fn add_param(&mut self, param: Parameter) -> Result<Parameter, ModelError> {
        if self.params.contains_key(param.name()) {
            return Err(ModelError::structure(format!(
                "parameter `{}` declared twice in model `{}`",
                param.name(),
                self.name
            )));
        }
        self.params.insert(param.name().to_owned(), param.clone());
        Ok(param)
    }

    /// Declare a variable family over one set.
    pub fn add_var(
        &mut self,
        name: impl Into<String>,
        domain: Domain,
        rows: &IndexSet,
    ) -> Result<VarFamily, ModelError> {
        let indices: Vec<Index> = rows.iter().map(Index::from).collect();
        self.declare_family(name.into(), domain, rows, None, indices)
    }

    /// Declare a variable family over `rows × cols`.
    pub fn add_var2(
        &mut self,
        name: impl Into<String>,
        domain: Domain,
        rows: &IndexSet,
        cols: &IndexSet,
    ) -> Result<VarFamily, ModelError> {
        let indices: Vec<Index> = rows.product(cols).map(Index::from).collect();
        self.declare_family(name.into(), domain, rows, Some(cols), indices)
    }

    fn declare_family(
        &mut self,
        name: String,
        domain: Domain,
        rows: &IndexSet,
        cols: Option<&IndexSet>,
        indices: Vec<Index>,
    ) -> Result<VarFamily, ModelError> {
        if !self.capabilities.supports(domain) {
            return Err(ModelError::InvalidDomain {
                variable: name,
                domain,
                backend: self.capabilities.backend.clone(),
            });
        }
        if self.families.iter().any(|f| f.name() == name) {
            return Err(ModelError::structure(format!(
                "variable `{name}` declared twice in model `{}`",
                self.name
            )));
        }
        for set in std::iter::once(rows).chain(cols) {
            if !self.sets.contains(set) {
                return Err(ModelError::structure(format!(
                    "variable `{name}` ranges over set `{}`, which model `{}` does not declare",
                    set.name(),
                    self.name
                )));
            }
        }

        let mut slots = BTreeMap::new();
        for index in indices {
            slots.insert(index, self.variables.len());
            self.variables.push(Variable {
                name: instance_name(&name, index),
                domain,
            });
        }
        debug!(
            model = %self.name,
            variable = %name,
            count = slots.len(),
            "declared variable family"
        );

        let family = VarFamily::new(self.id, name, domain, rows.clone(), cols.cloned(), slots);
        self.families.push(family.clone());
        Ok(family)
    }

    fn check_expr(&self, owner: &str, expr: &LinearExpr) -> Result<(), ModelError> {
        for (var, coefficient) in expr.terms() {
            if var.model != self.id || var.slot >= self.variables.len() {
                return Err(ModelError::structure(format!(
                    "`{owner}` references a variable that does not belong to model `{}`",
                    self.name
                )));
            }
            if !coefficient.is_finite() {
                return Err(ModelError::structure(format!(
                    "`{owner}` has a non-finite coefficient on `{}`",
                    self.variables[var.slot].name
                )));
            }
        }
        Ok(())
    }

    fn check_constraint(&self, constraint: &Constraint) -> Result<(), ModelError> {
        if self.constraints.iter().any(|c| c.name == constraint.name) {
            return Err(ModelError::structure(format!(
                "constraint `{}` declared twice in model `{}`",
                constraint.name, self.name
            )));
        }
        if !constraint.rhs.is_finite() {
            return Err(ModelError::structure(format!(
                "constraint `{}` has a non-finite bound",
                constraint.name
            )));
        }
        self.check_expr(&constraint.name, &constraint.lhs)
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<(), ModelError> {
        self.check_constraint(&constraint)?;
        self.constraints.push(constraint);
        Ok(())
    }

    /// Add a whole family. Either every row is added or none is.
    pub fn add_constraints(
        &mut self,
        constraints: impl IntoIterator<Item = Constraint>,
    ) -> Result<(), ModelError> {
        let start = self.constraints.len();
        for constraint in constraints {
            if let Err(e) = self.add_constraint(constraint) {
                self.constraints.truncate(start);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Set the single objective. A second call is an error.
    pub fn set_objective(&mut self, sense: Sense, expr: LinearExpr) -> Result<(), ModelError> {
        if self.objective.is_some() {
            return Err(ModelError::structure(format!(
                "model `{}` already has an objective",
                self.name
            )));
        }
        self.check_expr("objective", &expr)?;
        self.objective = Some(Objective { sense, expr });
        Ok(())
    }

    pub fn objective(&self) -> Result<&Objective, ModelError> {
        self.objective.as_ref().ok_or_else(|| {
            ModelError::structure(format!("model `{}` has no objective", self.name))
        })
    }

    /// Structural checks that must pass before a solve.
    pub fn validate(&self) -> Result<(), ModelError> {
        self.objective()?;
        if self.variables.is_empty() {
            return Err(ModelError::structure(format!(
                "model `{}` declares no variables",
                self.name
            )));
        }
        Ok(())
    }

    pub fn owns(&self, var: VarId) -> bool {
        var.model == self.id && var.slot < self.variables.len()
    }

    /// Every constraint and domain that `values` break.
    ///
    /// `values` is dense, one entry per variable in declaration order.
    pub fn violations(&self, values: &[f64], tolerance: f64) -> Vec<Violation> {
        if values.len() != self.variables.len() {
            return vec![Violation::Length {
                expected: self.variables.len(),
                found: values.len(),
            }];
        }

        let domain_violations = self
            .variables
            .iter()
            .zip(values)
            .filter(|&(var, &value)| {
                !value.is_finite()
                    || match var.domain {
                        Domain::Binary => {
                            value.abs() > tolerance && (value - 1.0).abs() > tolerance
                        }
                        Domain::NonNegativeReal => value < -tolerance,
                    }
            })
            .map(|(var, &value)| Violation::Domain {
                variable: var.name.clone(),
                domain: var.domain,
                value,
            });

        let constraint_violations = self
            .constraints
            .iter()
            .filter(|c| !c.holds(values, tolerance))
            .map(|c| Violation::Constraint {
                name: c.name.clone(),
                lhs: c.lhs.eval(values),
                relation: c.relation,
                rhs: c.rhs,
            });

        domain_violations.chain(constraint_violations).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{at_most_one, capacity};

    fn small_model() -> (Model, VarFamily) {
        let mut m = Model::new("small");
        let tasks = m.add_set(IndexSet::range("T", 3)).unwrap();
        let x = m.add_var("x", Domain::Binary, &tasks).unwrap();
        (m, x)
    }

    #[test]
    fn variables_are_named_by_index() {
        let (m, x) = small_model();
        let names: Vec<_> = m.variables().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["x[1]", "x[2]", "x[3]"]);
        assert_eq!(x.at(2).unwrap().slot(), 1);
        assert!(x.at(9).is_err());
    }

    #[test]
    fn second_objective_is_rejected() {
        let (mut m, x) = small_model();
        let expr: LinearExpr = x.iter().map(|(_, v)| (v, 1.0)).collect();
        m.set_objective(Sense::Maximize, expr.clone()).unwrap();
        assert!(matches!(
            m.set_objective(Sense::Maximize, expr),
            Err(ModelError::ModelStructure(_))
        ));
    }

    #[test]
    fn missing_objective_fails_validation() {
        let (m, _) = small_model();
        assert!(matches!(m.validate(), Err(ModelError::ModelStructure(_))));
    }

    #[test]
    fn foreign_variable_is_a_dangling_reference() {
        let (mut a, _) = small_model();
        let (_, x_of_b) = small_model();
        let c = capacity("cap", [(x_of_b.at(1).unwrap(), 1.0)], 1.0);
        assert!(matches!(
            a.add_constraint(c),
            Err(ModelError::ModelStructure(_))
        ));
        assert!(a.constraints().is_empty());
    }

    #[test]
    fn undeclared_set_is_rejected() {
        let mut m = Model::new("m");
        let stray = IndexSet::range("S", 2);
        assert!(matches!(
            m.add_var("x", Domain::Binary, &stray),
            Err(ModelError::ModelStructure(_))
        ));
    }

    #[test]
    fn binary_on_lp_only_backend_is_invalid_domain() {
        let mut m = Model::with_capabilities("lp", Capabilities::lp_only("simplex"));
        let set = m.add_set(IndexSet::range("R", 2)).unwrap();
        assert!(m.add_var("q", Domain::NonNegativeReal, &set).is_ok());
        assert!(matches!(
            m.add_var("y", Domain::Binary, &set),
            Err(ModelError::InvalidDomain { .. })
        ));
    }

    #[test]
    fn failed_family_leaves_no_rows_behind() {
        let (mut m, x) = small_model();
        let tasks = IndexSet::range("T", 3);
        let rows = at_most_one("u", &tasks, |t| Ok(vec![x.at(t)?])).unwrap();
        m.add_constraints(rows.clone()).unwrap();
        assert!(m.add_constraints(rows).is_err());
        assert_eq!(m.constraints().len(), 3);
    }

    #[test]
    fn violations_report_constraints_and_domains() {
        let (mut m, x) = small_model();
        let weighted = x.iter().map(|(_, v)| (v, 5.0));
        m.add_constraint(capacity("cap", weighted, 10.0)).unwrap();

        assert!(m.violations(&[1.0, 1.0, 0.0], 1e-6).is_empty());

        let broken = m.violations(&[1.0, 1.0, 1.0], 1e-6);
        assert_eq!(broken.len(), 1);
        assert!(matches!(&broken[0], Violation::Constraint { name, .. } if name == "cap"));

        let fractional = m.violations(&[0.5, 0.0, 0.0], 1e-6);
        assert!(matches!(&fractional[0], Violation::Domain { variable, .. } if variable == "x[1]"));
    }

    #[test]
    fn non_finite_values_break_the_domain() {
        let mut m = Model::new("m");
        let set = m.add_set(IndexSet::range("R", 2)).unwrap();
        m.add_var("q", Domain::NonNegativeReal, &set).unwrap();

        let broken = m.violations(&[f64::NAN, f64::INFINITY], 1e-6);
        assert_eq!(broken.len(), 2);
        assert!(
            broken
                .iter()
                .all(|v| matches!(v, Violation::Domain { domain: Domain::NonNegativeReal, .. }))
        );
    }

    #[test]
    fn wrong_number_of_values_is_a_length_violation() {
        let (m, _) = small_model();
        assert_eq!(
            m.violations(&[1.0, 0.0], 1e-6),
            vec![Violation::Length {
                expected: 3,
                found: 2
            }]
        );
    }
}
