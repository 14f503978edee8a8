//! The three allocation problems built on the model layer.

pub mod logistics;
pub mod scheduling;
pub mod sprint;

use serde::{Deserialize, Serialize};

use crate::error::RunError;
use crate::solve::{SolveResult, SolverSettings, SolverStatus, TerminationCondition};

pub use logistics::{Logistics, LogisticsReport};
pub use scheduling::{Scheduling, SchedulingReport};
pub use sprint::{Sprint, SprintReport};

/// Status line of one solved model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub model: String,
    pub status: SolverStatus,
    pub termination: TerminationCondition,
    pub objective: Option<f64>,
}

impl From<&SolveResult> for Outcome {
    fn from(result: &SolveResult) -> Self {
        Outcome {
            model: result.model_name().to_owned(),
            status: result.status(),
            termination: result.termination(),
            objective: result.objective(),
        }
    }
}

/// A problem instance as read from a YAML document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Instance {
    Sprint(Sprint),
    Scheduling(Scheduling),
    Logistics(Logistics),
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Report {
    Sprint(SprintReport),
    Scheduling(SchedulingReport),
    Logistics(LogisticsReport),
}

impl Instance {
    pub fn run(&self, settings: &SolverSettings) -> Result<Report, RunError> {
        Ok(match self {
            Instance::Sprint(p) => Report::Sprint(p.run(settings)?),
            Instance::Scheduling(p) => Report::Scheduling(p.run(settings)?),
            Instance::Logistics(p) => Report::Logistics(p.run(settings)?),
        })
    }
}

impl Report {
    /// Every model solved for this report.
    pub fn outcomes(&self) -> Vec<&Outcome> {
        match self {
            Report::Sprint(r) => std::iter::once(&r.selection.outcome)
                .chain(r.assignment.as_ref().map(|a| &a.outcome))
                .collect(),
            Report::Scheduling(r) => vec![&r.outcome],
            Report::Logistics(r) => vec![&r.outcome],
        }
    }
}
