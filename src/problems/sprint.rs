//! Agile sprint planning.
//!
//! Part A picks the subset of tasks with the highest total priority whose
//! story points fit the team capacity. Part B assigns each picked task to
//! one developer, under per-developer and team capacities.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::constraint::{at_most_one, capacity, capacity_per};
use crate::error::{ExtractError, ModelError, RunError};
use crate::extract::{Axis, Extractor};
use crate::model::Model;
use crate::objective::{Sense, weighted_by_row};
use crate::params::Parameter;
use crate::sets::IndexSet;
use crate::solve::{SolveResult, SolverSettings, solve_with};
use crate::vars::{Domain, VarFamily};

use super::Outcome;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sprint {
    /// Number of tasks; ids are `1..=tasks`.
    pub tasks: u32,
    pub points: BTreeMap<u32, f64>,
    pub priority: BTreeMap<u32, f64>,
    #[serde(rename = "teamCapacity")]
    pub team_capacity: f64,
    /// Per-developer capacity; enables Part B when present.
    #[serde(rename = "developerCapacity", default)]
    pub developer_capacity: Option<BTreeMap<u32, f64>>,
}

/// Part A model and the handles needed to read it back.
pub struct Selection {
    pub model: Model,
    pub tasks: IndexSet,
    pub points: Parameter,
    pub priority: Parameter,
    /// `x[t] = 1` when task `t` is in the sprint.
    pub x: VarFamily,
}

/// Part B model.
pub struct Assignment {
    pub model: Model,
    pub developers: IndexSet,
    pub points: Parameter,
    pub priority: Parameter,
    pub capacity: Parameter,
    /// `y[t, d] = 1` when task `t` goes to developer `d`.
    pub y: VarFamily,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskLine {
    pub task: u32,
    pub points: f64,
    pub priority: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentLine {
    pub task: u32,
    pub developer: u32,
    pub points: f64,
    pub priority: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeveloperLoad {
    pub developer: u32,
    pub points: f64,
    pub capacity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionReport {
    #[serde(flatten)]
    pub outcome: Outcome,
    pub selected: Vec<TaskLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentReport {
    #[serde(flatten)]
    pub outcome: Outcome,
    pub assignments: Vec<AssignmentLine>,
    pub loads: Vec<DeveloperLoad>,
    /// Tasks × developers, for the assignment heat map.
    pub matrix: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SprintReport {
    pub selection: SelectionReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment: Option<AssignmentReport>,
}

impl Sprint {
    fn task_params(
        &self,
        model: &mut Model,
    ) -> Result<(IndexSet, Parameter, Parameter), ModelError> {
        let tasks = model.add_set(IndexSet::range("T", self.tasks))?;
        let points = model.add_param(
            Parameter::declare("p", &tasks, &self.points)?.require_non_negative()?,
        )?;
        let priority = model.add_param(Parameter::declare("w", &tasks, &self.priority)?)?;
        Ok((tasks, points, priority))
    }

    /// Part A: `max Σ w[t]·x[t]` subject to `Σ p[t]·x[t] <= C`.
    pub fn build_selection(&self) -> Result<Selection, ModelError> {
        let mut model = Model::new("sprint_a");
        let (tasks, points, priority) = self.task_params(&mut model)?;
        let x = model.add_var("x", Domain::Binary, &tasks)?;

        model.set_objective(Sense::Maximize, weighted_by_row(&x, &priority)?)?;

        let weighted = tasks
            .iter()
            .map(|t| Ok((x.at(t)?, points.get(t)?)))
            .collect::<Result<Vec<_>, ModelError>>()?;
        model.add_constraint(capacity("cap", weighted, self.team_capacity))?;

        Ok(Selection {
            model,
            tasks,
            points,
            priority,
            x,
        })
    }

    /// Part B: `max Σ w[t]·y[t,d]` with team capacity, developer
    /// capacity and at most one developer per task.
    pub fn build_assignment(&self) -> Result<Option<Assignment>, ModelError> {
        let Some(developer_capacity) = &self.developer_capacity else {
            return Ok(None);
        };
        let mut model = Model::new("sprint_b");
        let (tasks, points, priority) = self.task_params(&mut model)?;
        let ids = developer_capacity.keys().copied();
        let developers = model.add_set(IndexSet::from_ids("D", ids)?)?;
        let capacity_k = model.add_param(
            Parameter::declare("K", &developers, developer_capacity)?.require_non_negative()?,
        )?;
        let y = model.add_var2("y", Domain::Binary, &tasks, &developers)?;

        model.set_objective(Sense::Maximize, weighted_by_row(&y, &priority)?)?;

        let team = y
            .iter()
            .map(|(index, var)| Ok((var, points.get(index.first())?)))
            .collect::<Result<Vec<_>, ModelError>>()?;
        model.add_constraint(capacity("cap_global", team, self.team_capacity))?;

        model.add_constraints(capacity_per("cap_dev", &developers, |d| {
            let row = tasks
                .iter()
                .map(|t| Ok((y.at((t, d))?, points.get(t)?)))
                .collect::<Result<Vec<_>, ModelError>>()?;
            Ok((row, capacity_k.get(d)?))
        })?)?;

        model.add_constraints(at_most_one("unique_dev", &tasks, |t| {
            developers.iter().map(|d| y.at((t, d))).collect()
        })?)?;

        Ok(Some(Assignment {
            model,
            developers,
            points,
            priority,
            capacity: capacity_k,
            y,
        }))
    }

    pub fn run(&self, settings: &SolverSettings) -> Result<SprintReport, RunError> {
        let backend = settings.backend()?;

        let part_a = self.build_selection()?;
        let result_a = solve_with(&part_a.model, backend.as_ref(), settings)?;
        let selection = part_a.report(&result_a)?;
        info!(selected = selection.selected.len(), "sprint part A done");

        let assignment = match self.build_assignment()? {
            Some(part_b) => {
                let result_b = solve_with(&part_b.model, backend.as_ref(), settings)?;
                let report = part_b.report(&result_b)?;
                info!(assigned = report.assignments.len(), "sprint part B done");
                Some(report)
            }
            None => None,
        };

        Ok(SprintReport {
            selection,
            assignment,
        })
    }
}

impl Selection {
    pub fn report(&self, result: &SolveResult) -> Result<SelectionReport, ExtractError> {
        let outcome = Outcome::from(result);
        if !result.is_optimal() {
            return Ok(SelectionReport {
                outcome,
                selected: Vec::new(),
            });
        }
        let ex = Extractor::new(&self.model, result)?;
        let selected = ex
            .selected(&self.x)?
            .into_iter()
            .map(|index| {
                let task = index.first();
                Ok(TaskLine {
                    task,
                    points: self.points.get(task)?,
                    priority: self.priority.get(task)?,
                })
            })
            .collect::<Result<Vec<_>, ModelError>>()?;
        Ok(SelectionReport { outcome, selected })
    }
}

impl Assignment {
    pub fn report(&self, result: &SolveResult) -> Result<AssignmentReport, ExtractError> {
        let outcome = Outcome::from(result);
        if !result.is_optimal() {
            return Ok(AssignmentReport {
                outcome,
                assignments: Vec::new(),
                loads: Vec::new(),
                matrix: Vec::new(),
            });
        }
        let ex = Extractor::new(&self.model, result)?;
        let assignments = ex
            .assignments(&self.y)?
            .into_iter()
            .map(|(task, developer)| {
                Ok(AssignmentLine {
                    task,
                    developer,
                    points: self.points.get(task)?,
                    priority: self.priority.get(task)?,
                })
            })
            .collect::<Result<Vec<_>, ModelError>>()?;
        let loads = ex
            .aggregate(&self.y, Axis::Col, Some(&self.points))?
            .into_iter()
            .map(|(developer, points)| {
                Ok(DeveloperLoad {
                    developer,
                    points,
                    capacity: self.capacity.get(developer)?,
                })
            })
            .collect::<Result<Vec<_>, ModelError>>()?;
        Ok(AssignmentReport {
            outcome,
            assignments,
            loads,
            matrix: ex.value_matrix(&self.y)?,
        })
    }
}
