//! Humanitarian airlift: load tons of each resource onto aircraft to
//! maximize delivered value under stock, weight and volume limits.
//!
//! With `safetyRules` on, some (resource, aircraft) placements are banned
//! and pairs of incompatible resources may not share an aircraft. The
//! incompatibility is linearized with presence indicators and big-M links.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::constraint::{big_m_link, capacity_per, fixed, indexed, mutually_exclusive};
use crate::error::{ExtractError, ModelError, RunError};
use crate::extract::{Axis, Extractor};
use crate::model::Model;
use crate::objective::{Sense, weighted_by_row};
use crate::params::Parameter;
use crate::sets::IndexSet;
use crate::solve::{SolveResult, SolverSettings, solve_with};
use crate::vars::{Domain, VarFamily};

use super::Outcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub resource: u32,
    pub aircraft: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logistics {
    pub resources: u32,
    pub aircraft: u32,
    #[serde(rename = "resourceNames", default)]
    pub resource_names: BTreeMap<u32, String>,
    /// Value per ton.
    pub value: BTreeMap<u32, f64>,
    /// Tons available.
    pub stock: BTreeMap<u32, f64>,
    /// Cubic meters per ton.
    pub volume: BTreeMap<u32, f64>,
    #[serde(rename = "weightCapacity")]
    pub weight_capacity: BTreeMap<u32, f64>,
    #[serde(rename = "volumeCapacity")]
    pub volume_capacity: BTreeMap<u32, f64>,
    #[serde(rename = "safetyRules", default = "default_safety_rules")]
    pub safety_rules: bool,
    #[serde(default = "default_forbidden")]
    pub forbidden: Vec<Placement>,
    #[serde(default = "default_incompatible")]
    pub incompatible: Vec<[u32; 2]>,
}

fn default_safety_rules() -> bool {
    true
}

/// Medicines (2) never fly on aircraft 1.
fn default_forbidden() -> Vec<Placement> {
    vec![Placement {
        resource: 2,
        aircraft: 1,
    }]
}

/// Medical equipment (3) and drinking water (4) never share an aircraft.
fn default_incompatible() -> Vec<[u32; 2]> {
    vec![[3, 4]]
}

pub struct LogisticsModel {
    pub model: Model,
    pub resources: IndexSet,
    pub aircraft: IndexSet,
    pub value: Parameter,
    pub volume: Parameter,
    pub weight_capacity: Parameter,
    pub volume_capacity: Parameter,
    /// `x[r, a]`: tons of resource `r` on aircraft `a`.
    pub x: VarFamily,
    /// `present[r, a] = 1` when resource `r` is on aircraft `a`; only for
    /// resources named in an incompatible pair.
    pub present: Option<VarFamily>,
    /// Big-M used for each `(r, a)` link.
    pub big_m: BTreeMap<(u32, u32), f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Load {
    pub resource: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub aircraft: u32,
    pub tons: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AircraftLine {
    pub aircraft: u32,
    pub tons: f64,
    #[serde(rename = "weightCapacity")]
    pub weight_capacity: f64,
    pub volume: f64,
    #[serde(rename = "volumeCapacity")]
    pub volume_capacity: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogisticsReport {
    #[serde(flatten)]
    pub outcome: Outcome,
    pub loads: Vec<Load>,
    pub aircraft: Vec<AircraftLine>,
    /// Resources × aircraft tons, for the loading heat map.
    pub matrix: Vec<Vec<f64>>,
}

impl Logistics {
    /// Smallest big-M that can never cut off a feasible load: `x[r, a]` is
    /// bounded by both the stock of `r` and the weight limit of `a`.
    pub fn big_m(
        stock: &Parameter,
        weight_capacity: &Parameter,
        r: u32,
        a: u32,
    ) -> Result<f64, ModelError> {
        Ok(stock.get(r)?.min(weight_capacity.get(a)?))
    }

    /// Every constraint, no objective.
    fn declare(&self) -> Result<LogisticsModel, ModelError> {
        let name = if self.safety_rules { "logistics_b" } else { "logistics_a" };
        let mut model = Model::new(name);
        let resources = model.add_set(IndexSet::range("R", self.resources))?;
        let aircraft = model.add_set(IndexSet::range("A", self.aircraft))?;

        let value = model.add_param(Parameter::declare("v", &resources, &self.value)?)?;
        let stock = model.add_param(
            Parameter::declare("s", &resources, &self.stock)?.require_non_negative()?,
        )?;
        let volume = model.add_param(
            Parameter::declare("u", &resources, &self.volume)?.require_non_negative()?,
        )?;
        let weight_capacity = model.add_param(
            Parameter::declare("W", &aircraft, &self.weight_capacity)?.require_non_negative()?,
        )?;
        let volume_capacity = model.add_param(
            Parameter::declare("U", &aircraft, &self.volume_capacity)?.require_non_negative()?,
        )?;

        let x = model.add_var2("x", Domain::NonNegativeReal, &resources, &aircraft)?;

        model.add_constraints(capacity_per("stock", &resources, |r| {
            let row = aircraft
                .iter()
                .map(|a| Ok((x.at((r, a))?, 1.0)))
                .collect::<Result<Vec<_>, ModelError>>()?;
            Ok((row, stock.get(r)?))
        })?)?;

        model.add_constraints(capacity_per("weight", &aircraft, |a| {
            let row = resources
                .iter()
                .map(|r| Ok((x.at((r, a))?, 1.0)))
                .collect::<Result<Vec<_>, ModelError>>()?;
            Ok((row, weight_capacity.get(a)?))
        })?)?;

        model.add_constraints(capacity_per("volume", &aircraft, |a| {
            let row = resources
                .iter()
                .map(|r| Ok((x.at((r, a))?, volume.get(r)?)))
                .collect::<Result<Vec<_>, ModelError>>()?;
            Ok((row, volume_capacity.get(a)?))
        })?)?;

        let mut big_m = BTreeMap::new();
        let mut present = None;
        if self.safety_rules {
            for p in &self.forbidden {
                let var = x.at((p.resource, p.aircraft))?;
                model.add_constraint(fixed(
                    format!("security[{},{}]", p.resource, p.aircraft),
                    var,
                    0.0,
                ))?;
            }

            if !self.incompatible.is_empty() {
                let involved: BTreeSet<u32> = self.incompatible.iter().flatten().copied().collect();
                let linked = model.add_set(IndexSet::from_ids("R_inc", involved)?)?;
                let y = model.add_var2("present", Domain::Binary, &linked, &aircraft)?;

                for (r, a) in linked.product(&aircraft) {
                    let m = Self::big_m(&stock, &weight_capacity, r, a)?;
                    if m <= 0.0 {
                        // Nothing of `r` can be on `a`; the indicator is free.
                        debug!(resource = r, aircraft = a, "skipping big-M link with zero bound");
                        continue;
                    }
                    model.add_constraint(big_m_link(
                        format!("link[{r},{a}]"),
                        x.at((r, a))?,
                        y.at((r, a))?,
                        m,
                    )?)?;
                    big_m.insert((r, a), m);
                }

                for &[first, second] in &self.incompatible {
                    let family = format!("incompat_{first}_{second}");
                    model.add_constraints(indexed(&family, &aircraft, |a, name| {
                        Ok(mutually_exclusive(name, y.at((first, a))?, y.at((second, a))?))
                    })?)?;
                }
                present = Some(y);
            }
        }

        Ok(LogisticsModel {
            model,
            resources,
            aircraft,
            value,
            volume,
            weight_capacity,
            volume_capacity,
            x,
            present,
            big_m,
        })
    }

    /// `max Σ v[r]·x[r,a]` under every constraint.
    pub fn build(&self) -> Result<LogisticsModel, ModelError> {
        let mut built = self.declare()?;
        let objective = weighted_by_row(&built.x, &built.value)?;
        built.model.set_objective(Sense::Maximize, objective)?;
        Ok(built)
    }

    pub fn run(&self, settings: &SolverSettings) -> Result<LogisticsReport, RunError> {
        let backend = settings.backend()?;
        let built = self.build()?;
        let result = solve_with(&built.model, backend.as_ref(), settings)?;
        let report = built.report(&result, &self.resource_names)?;
        info!(loads = report.loads.len(), "logistics done");
        Ok(report)
    }
}

impl LogisticsModel {
    pub fn report(
        &self,
        result: &SolveResult,
        names: &BTreeMap<u32, String>,
    ) -> Result<LogisticsReport, ExtractError> {
        let outcome = Outcome::from(result);
        if !result.is_optimal() {
            return Ok(LogisticsReport {
                outcome,
                loads: Vec::new(),
                aircraft: Vec::new(),
                matrix: Vec::new(),
            });
        }
        let ex = Extractor::new(&self.model, result)?;
        let loads = ex
            .positive(&self.x)?
            .into_iter()
            .filter_map(|(index, tons)| {
                let (resource, aircraft) = (index.first(), index.second()?);
                Some(Load {
                    resource,
                    name: names.get(&resource).cloned(),
                    aircraft,
                    tons,
                })
            })
            .collect();

        let tons = ex.aggregate(&self.x, Axis::Col, None)?;
        let volume = ex.aggregate(&self.x, Axis::Col, Some(&self.volume))?;
        let value = ex.aggregate(&self.x, Axis::Col, Some(&self.value))?;
        let aircraft = self
            .aircraft
            .iter()
            .map(|a| {
                Ok(AircraftLine {
                    aircraft: a,
                    tons: tons.get(&a).copied().unwrap_or(0.0),
                    weight_capacity: self.weight_capacity.get(a)?,
                    volume: volume.get(&a).copied().unwrap_or(0.0),
                    volume_capacity: self.volume_capacity.get(a)?,
                    value: value.get(&a).copied().unwrap_or(0.0),
                })
            })
            .collect::<Result<Vec<_>, ModelError>>()?;

        Ok(LogisticsReport {
            outcome,
            loads,
            aircraft,
            matrix: ex.value_matrix(&self.x)?,
        })
    }
}
