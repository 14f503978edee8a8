use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::read_to_string;
use std::path::Path;

use crate::error::ConfigError;
use crate::problems::Instance;
use crate::solve::SolverSettings;

/// One YAML instance file: the problem data, optional solver settings and,
/// for fixtures, the expected optimal objective per model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceFile {
    pub problem: Instance,
    #[serde(default)]
    pub solver: SolverSettings,
    #[serde(rename = "expectedObjective", default)]
    pub expected_objective: BTreeMap<String, f64>,
}

impl InstanceFile {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let buf = read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&buf)
    }
}
