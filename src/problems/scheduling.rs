//! Worker-task scheduling: give each task to at most one worker, within
//! every worker's available hours, maximizing the profit of the tasks done.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::constraint::{at_most_one, capacity_per};
use crate::error::{ExtractError, ModelError, RunError};
use crate::extract::{Axis, Extractor};
use crate::model::Model;
use crate::objective::{Sense, weighted_by_col};
use crate::params::Parameter;
use crate::sets::IndexSet;
use crate::solve::{SolveResult, SolverSettings, solve_with};
use crate::vars::{Domain, VarFamily};

use super::Outcome;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scheduling {
    pub tasks: Vec<u32>,
    pub workers: Vec<u32>,
    /// Profit of completing each task.
    pub profit: BTreeMap<u32, f64>,
    /// Hours each task takes.
    pub hours: BTreeMap<u32, f64>,
    #[serde(rename = "availableHours")]
    pub available_hours: BTreeMap<u32, f64>,
}

pub struct SchedulingModel {
    pub model: Model,
    pub workers: IndexSet,
    pub profit: Parameter,
    pub hours: Parameter,
    pub available: Parameter,
    /// `x[e, t] = 1` when worker `e` does task `t`.
    pub x: VarFamily,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerLine {
    pub worker: u32,
    pub tasks: Vec<u32>,
    #[serde(rename = "hoursUsed")]
    pub hours_used: f64,
    pub capacity: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulingReport {
    #[serde(flatten)]
    pub outcome: Outcome,
    pub workers: Vec<WorkerLine>,
    /// Workers × tasks, for the assignment heat map.
    pub matrix: Vec<Vec<f64>>,
}

impl Scheduling {
    pub fn build(&self) -> Result<SchedulingModel, ModelError> {
        let mut model = Model::new("scheduling");
        let tasks = model.add_set(IndexSet::from_ids("T", self.tasks.iter().copied())?)?;
        let workers = model.add_set(IndexSet::from_ids("E", self.workers.iter().copied())?)?;

        let profit = model.add_param(Parameter::declare("G", &tasks, &self.profit)?)?;
        let hours = model.add_param(
            Parameter::declare("h", &tasks, &self.hours)?.require_non_negative()?,
        )?;
        let available = model.add_param(
            Parameter::declare("Te", &workers, &self.available_hours)?.require_non_negative()?,
        )?;

        let x = model.add_var2("x", Domain::Binary, &workers, &tasks)?;
        model.set_objective(Sense::Maximize, weighted_by_col(&x, &profit)?)?;

        model.add_constraints(capacity_per("availability", &workers, |e| {
            let row = tasks
                .iter()
                .map(|t| Ok((x.at((e, t))?, hours.get(t)?)))
                .collect::<Result<Vec<_>, ModelError>>()?;
            Ok((row, available.get(e)?))
        })?)?;

        model.add_constraints(at_most_one("one_worker_per_task", &tasks, |t| {
            workers.iter().map(|e| x.at((e, t))).collect()
        })?)?;

        Ok(SchedulingModel {
            model,
            workers,
            profit,
            hours,
            available,
            x,
        })
    }

    pub fn run(&self, settings: &SolverSettings) -> Result<SchedulingReport, RunError> {
        let backend = settings.backend()?;
        let built = self.build()?;
        let result = solve_with(&built.model, backend.as_ref(), settings)?;
        let report = built.report(&result)?;
        info!(workers = report.workers.len(), "scheduling done");
        Ok(report)
    }
}

impl SchedulingModel {
    /// Tasks, hours used and profit per worker. Idle workers are listed
    /// with no tasks.
    pub fn report(&self, result: &SolveResult) -> Result<SchedulingReport, ExtractError> {
        let outcome = Outcome::from(result);
        if !result.is_optimal() {
            return Ok(SchedulingReport {
                outcome,
                workers: Vec::new(),
                matrix: Vec::new(),
            });
        }
        let ex = Extractor::new(&self.model, result)?;
        let hours_used = ex.aggregate(&self.x, Axis::Row, Some(&self.hours))?;
        let profit = ex.aggregate(&self.x, Axis::Row, Some(&self.profit))?;

        let mut tasks_of: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        for (worker, task) in ex.assignments(&self.x)? {
            tasks_of.entry(worker).or_default().push(task);
        }

        let workers = self
            .workers
            .iter()
            .map(|worker| {
                Ok(WorkerLine {
                    worker,
                    tasks: tasks_of.remove(&worker).unwrap_or_default(),
                    hours_used: hours_used.get(&worker).copied().unwrap_or(0.0),
                    capacity: self.available.get(worker)?,
                    profit: profit.get(&worker).copied().unwrap_or(0.0),
                })
            })
            .collect::<Result<Vec<_>, ModelError>>()?;

        Ok(SchedulingReport {
            outcome,
            workers,
            matrix: ex.value_matrix(&self.x)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solve::{MicrolpBackend, solve};

    fn scheduling() -> Scheduling {
        Scheduling {
            tasks: vec![1, 2, 3, 4, 5],
            workers: vec![1, 2, 3],
            profit: BTreeMap::from([(1, 50.), (2, 60.), (3, 40.), (4, 70.), (5, 30.)]),
            hours: BTreeMap::from([(1, 4.), (2, 5.), (3, 3.), (4, 6.), (5, 2.)]),
            available_hours: BTreeMap::from([(1, 8.), (2, 10.), (3, 6.)]),
        }
    }

    /// Best profit over every way of leaving each task undone or giving it
    /// to one worker.
    fn brute_force(s: &Scheduling) -> f64 {
        let choices = s.workers.len() as u32 + 1;
        (0..choices.pow(s.tasks.len() as u32))
            .filter_map(|mut code| {
                let mut used = vec![0.0; s.workers.len()];
                let mut profit = 0.0;
                for t in &s.tasks {
                    let pick = (code % choices) as usize;
                    code /= choices;
                    if pick > 0 {
                        used[pick - 1] += s.hours[t];
                        profit += s.profit[t];
                    }
                }
                let fits = s
                    .workers
                    .iter()
                    .zip(&used)
                    .all(|(e, &h)| h <= s.available_hours[e]);
                fits.then_some(profit)
            })
            .fold(0.0, f64::max)
    }

    /// Five tasks and three workers, with data that varies by `seed`.
    fn generated(seed: u32) -> Scheduling {
        let tasks: Vec<u32> = (1..=5).collect();
        let workers: Vec<u32> = (1..=3).collect();
        Scheduling {
            profit: tasks
                .iter()
                .map(|&t| (t, f64::from(10 + (seed * 7 + t * 13) % 50)))
                .collect(),
            hours: tasks
                .iter()
                .map(|&t| (t, f64::from(1 + (seed * 5 + t * 3) % 6)))
                .collect(),
            available_hours: workers
                .iter()
                .map(|&e| (e, f64::from(2 + (seed * 11 + e * 4) % 9)))
                .collect(),
            tasks,
            workers,
        }
    }

    #[test]
    fn optimum_matches_brute_force() {
        assert_eq!(brute_force(&scheduling()), 250.0);
        for seed in 0..12 {
            let s = generated(seed);
            let built = s.build().unwrap();
            let result = solve(&built.model, &MicrolpBackend).unwrap();
            let best = brute_force(&s);
            assert!(
                (result.objective().unwrap() - best).abs() < 1e-6,
                "seed {seed}: expected {best}, got {:?}",
                result.objective()
            );
        }
    }

    #[test]
    fn every_task_fits_and_is_done_once() {
        let s = scheduling();
        let built = s.build().unwrap();
        let result = solve(&built.model, &MicrolpBackend).unwrap();
        let report = built.report(&result).unwrap();

        // 20 hours of work against 24 available: everything gets done.
        assert!((result.objective().unwrap() - 250.0).abs() < 1e-6);

        let mut done: Vec<u32> = report.workers.iter().flat_map(|w| w.tasks.clone()).collect();
        done.sort();
        assert_eq!(done, vec![1, 2, 3, 4, 5]);

        for w in &report.workers {
            assert!(w.hours_used <= w.capacity + 1e-9, "{w:?}");
        }
        let profit: f64 = report.workers.iter().map(|w| w.profit).sum();
        assert!((profit - 250.0).abs() < 1e-6);
    }

    #[test]
    fn idle_worker_is_still_reported() {
        let mut s = scheduling();
        s.workers.push(4);
        s.available_hours.insert(4, 0.0);
        let built = s.build().unwrap();
        let result = solve(&built.model, &MicrolpBackend).unwrap();
        let report = built.report(&result).unwrap();

        let idle = report.workers.iter().find(|w| w.worker == 4).unwrap();
        assert!(idle.tasks.is_empty());
        assert_eq!(idle.hours_used, 0.0);
        assert_eq!(report.matrix.len(), 4);
    }

    #[test]
    fn tight_hours_drop_the_least_profitable_work() {
        let mut s = scheduling();
        s.available_hours = BTreeMap::from([(1, 4.), (2, 5.), (3, 2.)]);
        let built = s.build().unwrap();
        let result = solve(&built.model, &MicrolpBackend).unwrap();
        let report = built.report(&result).unwrap();

        for w in &report.workers {
            assert!(w.hours_used <= w.capacity + 1e-9, "{w:?}");
        }
        // Best fit: 1 → task 1 (50), 2 → task 2 (60), 3 → task 5 (30).
        assert_eq!(brute_force(&s), 140.0);
        assert!((result.objective().unwrap() - 140.0).abs() < 1e-6);
    }

    #[test]
    fn missing_worker_hours_fail_the_build() {
        let mut s = scheduling();
        s.available_hours.remove(&2);
        assert!(matches!(s.build(), Err(ModelError::MissingParameter { .. })));
    }

    #[test]
    fn report_is_idempotent() {
        let built = scheduling().build().unwrap();
        let result = solve(&built.model, &MicrolpBackend).unwrap();
        assert_eq!(built.report(&result).unwrap(), built.report(&result).unwrap());
    }
}
