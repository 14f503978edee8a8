use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::ModelError;

/// Position inside one index set, or inside the product of two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Index {
    One(u32),
    Two(u32, u32),
}

impl Index {
    /// Id in the first set.
    pub fn first(&self) -> u32 {
        match *self {
            Index::One(i) | Index::Two(i, _) => i,
        }
    }

    /// Id in the second set, if any.
    pub fn second(&self) -> Option<u32> {
        match *self {
            Index::One(_) => None,
            Index::Two(_, j) => Some(j),
        }
    }
}

impl From<u32> for Index {
    fn from(i: u32) -> Self {
        Index::One(i)
    }
}

impl From<(u32, u32)> for Index {
    fn from((i, j): (u32, u32)) -> Self {
        Index::Two(i, j)
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Index::One(i) => write!(f, "{i}"),
            Index::Two(i, j) => write!(f, "{i},{j}"),
        }
    }
}

/// Ordered sequence of unique, positive entity identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSet {
    name: String,
    ids: Vec<u32>,
}

impl IndexSet {
    /// The set `{1, ..., n}`.
    pub fn range(name: impl Into<String>, n: u32) -> Self {
        IndexSet {
            name: name.into(),
            ids: (1..=n).collect(),
        }
    }

    /// A set from explicit ids, kept in the given order.
    pub fn from_ids(
        name: impl Into<String>,
        ids: impl IntoIterator<Item = u32>,
    ) -> Result<Self, ModelError> {
        let name = name.into();
        let ids: Vec<u32> = ids.into_iter().collect();
        let mut seen = BTreeSet::new();
        for &id in &ids {
            if id == 0 {
                return Err(ModelError::structure(format!(
                    "set `{name}` contains id 0; ids must be positive"
                )));
            }
            if !seen.insert(id) {
                return Err(ModelError::structure(format!(
                    "set `{name}` contains duplicate id {id}"
                )));
            }
        }
        Ok(IndexSet { name, ids })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.ids.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.ids.contains(&id)
    }

    /// Zero-based position of `id`, used for dense matrices.
    pub fn position(&self, id: u32) -> Option<usize> {
        self.ids.iter().position(|&x| x == id)
    }

    /// Every `(i, j)` of `self × other`, row-major.
    pub fn product<'a>(&'a self, other: &'a IndexSet) -> impl Iterator<Item = (u32, u32)> + 'a {
        self.iter().flat_map(move |i| other.iter().map(move |j| (i, j)))
    }
}
