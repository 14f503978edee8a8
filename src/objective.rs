use serde::{Deserialize, Serialize};

use crate::constraint::LinearExpr;
use crate::error::ModelError;
use crate::params::Parameter;
use crate::vars::VarFamily;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sense {
    Maximize,
    Minimize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    pub sense: Sense,
    pub expr: LinearExpr,
}

/// `Σ weight[row] · var[index]` over every variable of `family`.
///
/// The weight is looked up by the family's first coordinate, so a
/// task-priority vector weighs every `y[t, d]` of task `t`.
pub fn weighted_by_row(family: &VarFamily, weight: &Parameter) -> Result<LinearExpr, ModelError> {
    family
        .iter()
        .map(|(index, var)| weight.get(index.first()).map(|w| (var, w)))
        .collect()
}

/// `Σ weight[col] · var[row, col]`, weighting by the second coordinate.
pub fn weighted_by_col(family: &VarFamily, weight: &Parameter) -> Result<LinearExpr, ModelError> {
    family
        .iter()
        .map(|(index, var)| match index.second() {
            Some(j) => weight.get(j).map(|w| (var, w)),
            None => Err(ModelError::structure(format!(
                "family `{}` has a single index; cannot weight by column",
                family.name()
            ))),
        })
        .collect()
}
