//! Small mixed-integer linear programs for resource allocation: declare
//! index sets and parameters, add capacity, assignment and big-M rows, solve
//! through `good_lp`, then read the answer back as per-entity metrics.

pub mod config;
pub mod constraint;
pub mod error;
pub mod extract;
pub mod logging;
pub mod model;
pub mod objective;
pub mod params;
pub mod problems;
pub mod sets;
pub mod solve;
pub mod vars;

pub use config::InstanceFile;
pub use constraint::{Constraint, LinearExpr, Relation};
pub use error::{ConfigError, ExtractError, ModelError, RunError, SolveError};
pub use extract::{Axis, Extractor};
pub use model::{Model, Violation};
pub use objective::{Objective, Sense};
pub use params::Parameter;
pub use problems::{Instance, Report};
pub use sets::{Index, IndexSet};
pub use solve::{
    MicrolpBackend, RawOutcome, SolveResult, SolverBackend, SolverSettings, SolverStatus,
    TerminationCondition, solve, solve_with,
};
pub use vars::{Capabilities, Domain, VarFamily, VarId};
