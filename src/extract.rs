//! Read-only projections over an optimal [`SolveResult`].

use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{ExtractError, ModelError};
use crate::model::Model;
use crate::params::Parameter;
use crate::sets::Index;
use crate::solve::SolveResult;
use crate::vars::{Domain, VarFamily, VarId};

/// A binary counts as set above this value; solvers return 0.999999 or 1e-7.
pub const BINARY_THRESHOLD: f64 = 0.5;

/// A continuous quantity counts as assigned above this value.
pub const POSITIVE_EPSILON: f64 = 1e-9;

/// Which coordinate of a two-index family to group by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Row,
    Col,
}

impl Axis {
    fn split(self, index: Index) -> Option<(u32, u32)> {
        let (i, j) = (index.first(), index.second()?);
        Some(match self {
            Axis::Row => (i, j),
            Axis::Col => (j, i),
        })
    }
}

pub struct Extractor<'a> {
    model: &'a Model,
    values: &'a [f64],
}

impl<'a> Extractor<'a> {
    /// Fails unless `result` is an optimal solve of `model`.
    pub fn new(model: &'a Model, result: &'a SolveResult) -> Result<Self, ExtractError> {
        let not_optimal = || ExtractError::NotOptimal {
            model: model.name().to_owned(),
            termination: result.termination().to_string(),
        };
        if result.model_id() != model.id() {
            return Err(ExtractError::Model(ModelError::structure(format!(
                "result of `{}` does not belong to model `{}`",
                result.model_name(),
                model.name()
            ))));
        }
        if !result.is_optimal() {
            return Err(not_optimal());
        }
        let values = result.values().ok_or_else(not_optimal)?;
        Ok(Extractor { model, values })
    }

    fn check(&self, family: &VarFamily) -> Result<(), ExtractError> {
        if family.model != self.model.id() {
            return Err(ExtractError::ForeignFamily {
                family: family.name().to_owned(),
                model: self.model.name().to_owned(),
            });
        }
        Ok(())
    }

    pub fn value(&self, var: VarId) -> Option<f64> {
        if !self.model.owns(var) {
            return None;
        }
        self.values.get(var.slot).copied()
    }

    fn is_selected(value: f64, domain: Domain) -> bool {
        match domain {
            Domain::Binary => value > BINARY_THRESHOLD,
            Domain::NonNegativeReal => value > POSITIVE_EPSILON,
        }
    }

    /// Indices whose variable is set (binary) or positive (continuous).
    pub fn selected(&self, family: &VarFamily) -> Result<Vec<Index>, ExtractError> {
        Ok(self
            .positive(family)?
            .into_iter()
            .map(|(index, _)| index)
            .collect())
    }

    /// `(index, value)` for every selected variable of `family`.
    pub fn positive(&self, family: &VarFamily) -> Result<Vec<(Index, f64)>, ExtractError> {
        self.check(family)?;
        Ok(family
            .iter()
            .map(|(index, var)| (index, self.values[var.slot]))
            .filter(|&(_, value)| Self::is_selected(value, family.domain()))
            .collect())
    }

    /// Selected `(row, col)` pairs of a two-index family.
    pub fn assignments(&self, family: &VarFamily) -> Result<Vec<(u32, u32)>, ExtractError> {
        Ok(self
            .selected(family)?
            .into_iter()
            .filter_map(|index| Some((index.first(), index.second()?)))
            .collect())
    }

    /// Per-group totals of a two-index family, one entry per id of the
    /// grouping set, zero for groups with nothing selected.
    ///
    /// With a `metric`, each selected entry contributes `metric[other]`
    /// (binary) or `metric[other] · value` (continuous), where `other` is
    /// the coordinate not grouped on. Without one it contributes its value.
    pub fn aggregate(
        &self,
        family: &VarFamily,
        by: Axis,
        metric: Option<&Parameter>,
    ) -> Result<BTreeMap<u32, f64>, ExtractError> {
        self.check(family)?;
        let cols = family.cols().ok_or_else(|| {
            ModelError::structure(format!("family `{}` has no second index", family.name()))
        })?;
        let groups = match by {
            Axis::Row => family.rows(),
            Axis::Col => cols,
        };

        let mut totals: BTreeMap<u32, f64> = groups.iter().map(|g| (g, 0.0)).collect();
        for (index, value) in self.positive(family)? {
            let Some((group, other)) = by.split(index) else {
                continue;
            };
            let amount = match (metric, family.domain()) {
                (Some(m), Domain::Binary) => m.get(other)?,
                (Some(m), Domain::NonNegativeReal) => m.get(other)? * value,
                (None, Domain::Binary) => 1.0,
                (None, Domain::NonNegativeReal) => value,
            };
            *totals.entry(group).or_insert(0.0) += amount;
        }
        debug!(family = family.name(), groups = totals.len(), "aggregated");
        Ok(totals)
    }

    /// Dense `rows × cols` matrix of solved values, for heat maps.
    pub fn value_matrix(&self, family: &VarFamily) -> Result<Vec<Vec<f64>>, ExtractError> {
        self.check(family)?;
        let rows = family.rows();
        let width = family.cols().map_or(1, |c| c.len());
        let mut matrix = vec![vec![0.0; width]; rows.len()];
        for (index, var) in family.iter() {
            let r = rows.position(index.first());
            let c = match index.second() {
                Some(j) => family.cols().and_then(|cols| cols.position(j)),
                None => Some(0),
            };
            if let (Some(r), Some(c)) = (r, c) {
                matrix[r][c] = self.values[var.slot];
            }
        }
        Ok(matrix)
    }
}
