use thiserror::Error;

use crate::sets::Index;
use crate::vars::Domain;

/// Errors raised while a model is being built. They are fatal to that model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("parameter `{param}` has no value for index {index}")]
    MissingParameter { param: String, index: Index },

    #[error("variable `{variable}`: domain {domain} is not supported by backend `{backend}`")]
    InvalidDomain {
        variable: String,
        domain: Domain,
        backend: String,
    },

    #[error("model structure: {0}")]
    ModelStructure(String),
}

impl ModelError {
    pub(crate) fn structure(message: impl Into<String>) -> Self {
        ModelError::ModelStructure(message.into())
    }
}

/// Errors raised by a solve attempt. Infeasible and unbounded models are
/// not errors; they are reported through [`crate::SolveResult`].
#[derive(Error, Debug)]
pub enum SolveError {
    #[error("solver `{backend}` unavailable: {reason}")]
    SolverUnavailable { backend: String, reason: String },

    #[error("solver `{backend}` failed: {reason}")]
    Solver { backend: String, reason: String },

    #[error(transparent)]
    Model(#[from] ModelError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    #[error("solve of model `{model}` ended with {termination}; no values to extract")]
    NotOptimal { model: String, termination: String },

    #[error("family `{family}` does not belong to model `{model}`")]
    ForeignFamily { family: String, model: String },

    #[error(transparent)]
    Model(#[from] ModelError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse instance: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Any failure of a build → solve → extract run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Solve(#[from] SolveError),

    #[error(transparent)]
    Extract(#[from] ExtractError),
}
