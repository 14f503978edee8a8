//! Constraint records and the families shared by the allocation problems.
//!
//! Every family is a plain function from sets and parameters to
//! `(terms, relation, bound)` records. Indexed families name their
//! instances `name[i]`.

use serde::Serialize;
use std::fmt;

use crate::error::ModelError;
use crate::sets::{Index, IndexSet};
use crate::vars::{VarId, instance_name};

/// `Σ coefficient · variable + constant`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: Vec<(VarId, f64)>,
    constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn term(mut self, var: VarId, coefficient: f64) -> Self {
        self.terms.push((var, coefficient));
        self
    }

    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    /// Value of the expression for a dense assignment indexed by slot.
    pub fn eval(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .fold(self.constant, |sum, &(var, c)| sum + c * values[var.slot])
    }
}

impl FromIterator<(VarId, f64)> for LinearExpr {
    fn from_iter<I: IntoIterator<Item = (VarId, f64)>>(iter: I) -> Self {
        LinearExpr {
            terms: iter.into_iter().collect(),
            constant: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Relation {
    #[serde(rename = "<=")]
    Leq,
    #[serde(rename = ">=")]
    Geq,
    #[serde(rename = "=")]
    Eq,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Leq => f.write_str("<="),
            Relation::Geq => f.write_str(">="),
            Relation::Eq => f.write_str("="),
        }
    }
}

/// Named linear relation `lhs (<= | >= | =) rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub lhs: LinearExpr,
    pub relation: Relation,
    pub rhs: f64,
}

impl Constraint {
    pub fn new(name: impl Into<String>, lhs: LinearExpr, relation: Relation, rhs: f64) -> Self {
        Constraint {
            name: name.into(),
            lhs,
            relation,
            rhs,
        }
    }

    /// Whether `values` satisfy this relation within `tolerance`.
    pub fn holds(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self.lhs.eval(values);
        match self.relation {
            Relation::Leq => lhs <= self.rhs + tolerance,
            Relation::Geq => lhs >= self.rhs - tolerance,
            Relation::Eq => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

/// One constraint per id of `set`, each named `name[id]`.
pub fn indexed<F>(name: &str, set: &IndexSet, mut row: F) -> Result<Vec<Constraint>, ModelError>
where
    F: FnMut(u32, String) -> Result<Constraint, ModelError>,
{
    set.iter()
        .map(|id| row(id, instance_name(name, Index::One(id))))
        .collect()
}

/// Aggregate capacity: `Σ cost · var <= capacity`.
pub fn capacity(
    name: impl Into<String>,
    weighted: impl IntoIterator<Item = (VarId, f64)>,
    capacity: f64,
) -> Constraint {
    Constraint::new(name, weighted.into_iter().collect(), Relation::Leq, capacity)
}

/// Per-group capacity: for every group `g`, `Σ cost · var <= capacity[g]`.
///
/// `row` returns the weighted variables of a group and its capacity.
pub fn capacity_per<F>(
    name: &str,
    groups: &IndexSet,
    mut row: F,
) -> Result<Vec<Constraint>, ModelError>
where
    F: FnMut(u32) -> Result<(Vec<(VarId, f64)>, f64), ModelError>,
{
    indexed(name, groups, |g, instance| {
        let (weighted, cap) = row(g)?;
        Ok(capacity(instance, weighted, cap))
    })
}

/// Assignment: for every entity, at most one of its binaries is set.
pub fn at_most_one<F>(
    name: &str,
    entities: &IndexSet,
    mut members: F,
) -> Result<Vec<Constraint>, ModelError>
where
    F: FnMut(u32) -> Result<Vec<VarId>, ModelError>,
{
    indexed(name, entities, |e, instance| {
        let lhs = members(e)?.into_iter().map(|v| (v, 1.0)).collect();
        Ok(Constraint::new(instance, lhs, Relation::Leq, 1.0))
    })
}

/// Big-M linkage `x <= M · indicator`: a positive `x` forces the indicator
/// to 1. `m` must not be below the largest feasible value of `x`, or
/// feasible points are cut off.
pub fn big_m_link(
    name: impl Into<String>,
    x: VarId,
    indicator: VarId,
    m: f64,
) -> Result<Constraint, ModelError> {
    let name = name.into();
    if !(m.is_finite() && m > 0.0) {
        return Err(ModelError::structure(format!(
            "big-M constant of `{name}` must be positive and finite, got {m}"
        )));
    }
    let lhs = LinearExpr::new().term(x, 1.0).term(indicator, -m);
    Ok(Constraint::new(name, lhs, Relation::Leq, 0.0))
}

/// Mutual exclusion of two indicators: `a + b <= 1`.
pub fn mutually_exclusive(name: impl Into<String>, a: VarId, b: VarId) -> Constraint {
    let lhs = LinearExpr::new().term(a, 1.0).term(b, 1.0);
    Constraint::new(name, lhs, Relation::Leq, 1.0)
}

/// Pins `var` to `value`.
pub fn fixed(name: impl Into<String>, var: VarId, value: f64) -> Constraint {
    Constraint::new(name, LinearExpr::new().term(var, 1.0), Relation::Eq, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::ModelId;

    fn var(slot: usize) -> VarId {
        VarId {
            model: ModelId(0),
            slot,
        }
    }

    #[test]
    fn capacity_holds_up_to_bound() {
        let c = capacity("cap", [(var(0), 5.0), (var(1), 8.0)], 13.0);
        assert!(c.holds(&[1.0, 1.0], 1e-9));
        assert!(!c.holds(&[1.0, 1.1], 1e-9));
        assert_eq!(c.relation, Relation::Leq);
    }

    #[test]
    fn indexed_families_are_named_per_id() {
        let devs = IndexSet::range("D", 3);
        let rows =
            capacity_per("cap_dev", &devs, |d| Ok((vec![(var(d as usize), 1.0)], 15.0))).unwrap();
        let names: Vec<_> = rows.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["cap_dev[1]", "cap_dev[2]", "cap_dev[3]"]);
    }

    #[test]
    fn at_most_one_sums_members() {
        let tasks = IndexSet::range("T", 1);
        let rows = at_most_one("unique", &tasks, |_| Ok(vec![var(0), var(1)])).unwrap();
        assert!(rows[0].holds(&[1.0, 0.0], 1e-9));
        assert!(!rows[0].holds(&[1.0, 1.0], 1e-9));
    }

    #[test]
    fn big_m_forces_indicator() {
        let link = big_m_link("link", var(0), var(1), 20.0).unwrap();
        assert!(link.holds(&[0.0, 0.0], 1e-9));
        assert!(!link.holds(&[3.0, 0.0], 1e-9));
        assert!(link.holds(&[20.0, 1.0], 1e-9));
        assert!(matches!(
            big_m_link("bad", var(0), var(1), 0.0),
            Err(ModelError::ModelStructure(_))
        ));
        assert!(big_m_link("bad", var(0), var(1), f64::INFINITY).is_err());
    }

    #[test]
    fn exclusion_and_fixed_values() {
        let excl = mutually_exclusive("incompat", var(0), var(1));
        assert!(!excl.holds(&[1.0, 1.0], 1e-9));
        let pin = fixed("security", var(0), 0.0);
        assert!(pin.holds(&[0.0], 1e-9));
        assert!(!pin.holds(&[0.5], 1e-9));
    }

    #[test]
    fn row_errors_propagate() {
        let set = IndexSet::range("T", 2);
        let res = at_most_one("u", &set, |t| {
            if t == 2 {
                Err(ModelError::structure("boom"))
            } else {
                Ok(vec![var(0)])
            }
        });
        assert!(res.is_err());
    }
}
