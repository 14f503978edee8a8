use std::collections::BTreeMap;

use crate::error::ModelError;
use crate::sets::{Index, IndexSet};

/// Immutable numeric attribute over one index set or the product of two.
///
/// A parameter is only constructed once every index of its domain carries
/// a value, so lookups inside the domain cannot fail.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    values: BTreeMap<Index, f64>,
}

impl Parameter {
    /// Declare a parameter over `set`. Every id needs an explicit value.
    pub fn declare(
        name: impl Into<String>,
        set: &IndexSet,
        values: &BTreeMap<u32, f64>,
    ) -> Result<Self, ModelError> {
        let name = name.into();
        let domain: Vec<Index> = set.iter().map(Index::from).collect();
        let given = values.iter().map(|(&k, &v)| (Index::from(k), v));
        Self::validated(name, &domain, given, None)
    }

    /// Declare a complete matrix over `rows × cols`. No implicit zero fill.
    pub fn declare_matrix(
        name: impl Into<String>,
        rows: &IndexSet,
        cols: &IndexSet,
        values: &BTreeMap<(u32, u32), f64>,
    ) -> Result<Self, ModelError> {
        let name = name.into();
        let domain: Vec<Index> = rows.product(cols).map(Index::from).collect();
        let given = values.iter().map(|(&k, &v)| (Index::from(k), v));
        Self::validated(name, &domain, given, None)
    }

    /// Declare a matrix whose absent entries are zero.
    pub fn declare_sparse_matrix(
        name: impl Into<String>,
        rows: &IndexSet,
        cols: &IndexSet,
        values: &BTreeMap<(u32, u32), f64>,
    ) -> Result<Self, ModelError> {
        let name = name.into();
        let domain: Vec<Index> = rows.product(cols).map(Index::from).collect();
        let given = values.iter().map(|(&k, &v)| (Index::from(k), v));
        Self::validated(name, &domain, given, Some(0.0))
    }

    fn validated(
        name: String,
        domain: &[Index],
        given: impl Iterator<Item = (Index, f64)>,
        fill: Option<f64>,
    ) -> Result<Self, ModelError> {
        let mut values = BTreeMap::new();
        for (index, value) in given {
            if !domain.contains(&index) {
                return Err(ModelError::structure(format!(
                    "parameter `{name}` has a value for index {index} outside its domain"
                )));
            }
            if !value.is_finite() {
                return Err(ModelError::structure(format!(
                    "parameter `{name}[{index}]` is not finite"
                )));
            }
            values.insert(index, value);
        }
        for &index in domain {
            if values.contains_key(&index) {
                continue;
            }
            match fill {
                Some(default) => {
                    values.insert(index, default);
                }
                None => return Err(ModelError::MissingParameter { param: name, index }),
            }
        }
        Ok(Parameter { name, values })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, index: impl Into<Index>) -> Result<f64, ModelError> {
        let index = index.into();
        self.values
            .get(&index)
            .copied()
            .ok_or_else(|| ModelError::MissingParameter {
                param: self.name.clone(),
                index,
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (Index, f64)> + '_ {
        self.values.iter().map(|(&k, &v)| (k, v))
    }

    /// Capacities and stocks cannot be negative.
    pub fn require_non_negative(self) -> Result<Self, ModelError> {
        if let Some((index, value)) = self.iter().find(|&(_, v)| v < 0.0) {
            return Err(ModelError::structure(format!(
                "parameter `{}[{index}]` is {value}; it must not be negative",
                self.name
            )));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points() -> BTreeMap<u32, f64> {
        BTreeMap::from([(1, 5.0), (2, 8.0), (3, 13.0)])
    }

    #[test]
    fn declared_parameter_answers_every_index() {
        let tasks = IndexSet::range("T", 3);
        let p = Parameter::declare("p", &tasks, &points()).unwrap();
        assert_eq!(p.get(2).unwrap(), 8.0);
    }

    #[test]
    fn missing_value_names_the_index() {
        let tasks = IndexSet::range("T", 4);
        let err = Parameter::declare("p", &tasks, &points()).unwrap_err();
        assert_eq!(
            err,
            ModelError::MissingParameter {
                param: "p".into(),
                index: Index::One(4)
            }
        );
    }

    #[test]
    fn lookup_outside_domain_is_missing_parameter() {
        let tasks = IndexSet::range("T", 3);
        let p = Parameter::declare("p", &tasks, &points()).unwrap();
        assert!(matches!(
            p.get(7),
            Err(ModelError::MissingParameter { index: Index::One(7), .. })
        ));
    }

    #[test]
    fn value_outside_domain_is_rejected() {
        let tasks = IndexSet::range("T", 2);
        assert!(matches!(
            Parameter::declare("p", &tasks, &points()),
            Err(ModelError::ModelStructure(_))
        ));
    }

    #[test]
    fn matrix_must_be_complete_unless_sparse() {
        let rows = IndexSet::range("R", 2);
        let cols = IndexSet::range("A", 2);
        let partial = BTreeMap::from([((1, 1), 1.0), ((2, 2), 3.0)]);

        let err = Parameter::declare_matrix("c", &rows, &cols, &partial).unwrap_err();
        assert!(matches!(
            err,
            ModelError::MissingParameter { index: Index::Two(1, 2), .. }
        ));

        let sparse = Parameter::declare_sparse_matrix("c", &rows, &cols, &partial).unwrap();
        assert_eq!(sparse.get((2, 1)).unwrap(), 0.0);
        assert_eq!(sparse.get((2, 2)).unwrap(), 3.0);
    }

    #[test]
    fn negative_capacity_is_a_structure_error() {
        let set = IndexSet::range("R", 2);
        let stock = BTreeMap::from([(1, 15.0), (2, -1.0)]);
        let p = Parameter::declare("s", &set, &stock).unwrap();
        assert!(matches!(
            p.require_non_negative(),
            Err(ModelError::ModelStructure(_))
        ));
    }
}
