use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ModelError;
use crate::sets::{Index, IndexSet};

/// Value domain of a decision variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Domain {
    /// 0 or 1: inclusion, assignment, indicators.
    Binary,
    /// `[0, ∞)`: continuous quantities such as tonnage.
    NonNegativeReal,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Binary => f.write_str("Binary"),
            Domain::NonNegativeReal => f.write_str("NonNegativeReal"),
        }
    }
}

/// Domains a solver backend can handle. A model is built against one of
/// these so that unsupported declarations fail before any solve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub backend: String,
    pub binary: bool,
    pub continuous: bool,
}

impl Capabilities {
    pub fn milp(backend: impl Into<String>) -> Self {
        Capabilities {
            backend: backend.into(),
            binary: true,
            continuous: true,
        }
    }

    pub fn lp_only(backend: impl Into<String>) -> Self {
        Capabilities {
            backend: backend.into(),
            binary: false,
            continuous: true,
        }
    }

    pub fn supports(&self, domain: Domain) -> bool {
        match domain {
            Domain::Binary => self.binary,
            Domain::NonNegativeReal => self.continuous,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct ModelId(pub(crate) u64);

/// Handle to one scalar variable of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId {
    pub(crate) model: ModelId,
    pub(crate) slot: usize,
}

impl VarId {
    pub fn slot(&self) -> usize {
        self.slot
    }
}

/// Metadata of a scalar variable, e.g. `y[3,2]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub domain: Domain,
}

/// A variable declared over one or two index sets.
#[derive(Debug, Clone)]
pub struct VarFamily {
    pub(crate) model: ModelId,
    name: String,
    domain: Domain,
    rows: IndexSet,
    cols: Option<IndexSet>,
    slots: BTreeMap<Index, usize>,
}

impl VarFamily {
    pub(crate) fn new(
        model: ModelId,
        name: String,
        domain: Domain,
        rows: IndexSet,
        cols: Option<IndexSet>,
        slots: BTreeMap<Index, usize>,
    ) -> Self {
        VarFamily {
            model,
            name,
            domain,
            rows,
            cols,
            slots,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn rows(&self) -> &IndexSet {
        &self.rows
    }

    pub fn cols(&self) -> Option<&IndexSet> {
        self.cols.as_ref()
    }

    /// The variable at `index`; `x.at(3)` or `y.at((3, 2))`.
    pub fn at(&self, index: impl Into<Index>) -> Result<VarId, ModelError> {
        let index = index.into();
        self.slots
            .get(&index)
            .map(|&slot| VarId {
                model: self.model,
                slot,
            })
            .ok_or_else(|| {
                ModelError::structure(format!(
                    "variable `{}` has no index [{index}]",
                    self.name
                ))
            })
    }

    /// Every `(index, variable)` pair in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (Index, VarId)> + '_ {
        self.slots.iter().map(|(&index, &slot)| {
            (
                index,
                VarId {
                    model: self.model,
                    slot,
                },
            )
        })
    }
}

pub(crate) fn instance_name(family: &str, index: Index) -> String {
    format!("{family}[{index}]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lp_only_backend_rejects_binaries() {
        let caps = Capabilities::lp_only("simplex");
        assert!(!caps.supports(Domain::Binary));
        assert!(caps.supports(Domain::NonNegativeReal));
        assert!(Capabilities::milp("microlp").supports(Domain::Binary));
    }

    #[test]
    fn instance_names_follow_index_shape() {
        assert_eq!(instance_name("x", Index::One(3)), "x[3]");
        assert_eq!(instance_name("y", Index::Two(3, 2)), "y[3,2]");
    }
}
