use crate::core::error::CubeResult;
use crate::core::hierarchy::DimensionHierarchy;
use crate::core::matrix::Matrix;
use crate::engine::kernels;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Anything that maps a matrix to a new matrix
pub trait Transform: fmt::Debug + Send + Sync {
    fn transform(&self, input: &Matrix) -> CubeResult<Matrix>;
}

/// Condición sobre una columna
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// value == literal
    Equals(f64),
    /// value ∈ literals (dice)
    OneOf(Vec<f64>),
}

impl Condition {
    pub fn matches(&self, value: f64) -> bool {
        match self {
            Condition::Equals(v) => value == *v,
            Condition::OneOf(values) => values.iter().any(|v| value == *v),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Equals(v) => write!(f, "= {}", v),
            Condition::OneOf(values) => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "IN [{}]", parts.join(", "))
            }
        }
    }
}

/// Filter / dice: rows failing any condition are zeroed in place, so row
/// count and alignment never change.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    conditions: BTreeMap<usize, Condition>,
}

impl Filter {
    pub fn new(conditions: BTreeMap<usize, Condition>) -> Self {
        Self { conditions }
    }

    pub fn with_condition(mut self, column: usize, condition: Condition) -> Self {
        self.conditions.insert(column, condition);
        self
    }

    /// true for every row satisfying all conditions
    pub fn row_mask(&self, input: &Matrix) -> CubeResult<Vec<bool>> {
        for &col in self.conditions.keys() {
            kernels::ensure_column(input, col)?;
        }
        Ok(input
            .rows()
            .map(|row| {
                self.conditions
                    .iter()
                    .all(|(&col, cond)| cond.matches(row[col]))
            })
            .collect())
    }
}

impl Transform for Filter {
    fn transform(&self, input: &Matrix) -> CubeResult<Matrix> {
        let mask = self.row_mask(input)?;
        kernels::zero_rows(input, &mask)
    }
}

/// Removes a set of columns, keeping row count and row order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Slice {
    /// ascending, no duplicates
    remove: Vec<usize>,
}

impl Slice {
    pub fn new(remove: impl IntoIterator<Item = usize>) -> Self {
        let remove: BTreeSet<usize> = remove.into_iter().collect();
        Self {
            remove: remove.into_iter().collect(),
        }
    }

    pub fn removed(&self) -> &[usize] {
        &self.remove
    }

    /// Indices that survive the slice, in original order.
    pub fn kept_columns(&self, column_count: usize) -> Vec<usize> {
        kernels::kept_ranges(column_count, &self.remove)
            .into_iter()
            .flat_map(|(s, e)| s..e)
            .collect()
    }
}

impl Transform for Slice {
    fn transform(&self, input: &Matrix) -> CubeResult<Matrix> {
        if let Some(&last) = self.remove.last() {
            kernels::ensure_column(input, last)?;
        } else {
            return Ok(input.clone());
        }
        let ranges = kernels::kept_ranges(input.column_count(), &self.remove);
        kernels::concat_column_ranges(input, &ranges)
    }
}

/// Operaciones OLAP. Roll-up no es un tipo propio: se resuelve contra la
/// jerarquía de dimensiones y produce un `Slice`.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Filter(Filter),
    Slice(Slice),
}

impl Operation {
    pub fn filter(conditions: BTreeMap<usize, Condition>) -> Self {
        Operation::Filter(Filter::new(conditions))
    }

    pub fn slice(remove: impl IntoIterator<Item = usize>) -> Self {
        Operation::Slice(Slice::new(remove))
    }

    /// Slice removing every level of the named hierarchies
    pub fn slice_by_hierarchy<S: AsRef<str>>(
        hierarchy: &DimensionHierarchy,
        names: &[S],
    ) -> CubeResult<Self> {
        Ok(Self::slice(hierarchy.slice_by_hierarchy(names)?))
    }

    /// Slice removing the levels below each `(hierarchy, level)` target
    pub fn roll_up<S: AsRef<str>>(
        hierarchy: &DimensionHierarchy,
        pairs: &[(S, S)],
    ) -> CubeResult<Self> {
        Ok(Self::slice(hierarchy.roll_up_to_level(pairs)?))
    }
}

impl Transform for Operation {
    fn transform(&self, input: &Matrix) -> CubeResult<Matrix> {
        match self {
            Operation::Filter(op) => op.transform(input),
            Operation::Slice(op) => op.transform(input),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Filter(op) => {
                let parts: Vec<String> = op
                    .conditions
                    .iter()
                    .map(|(col, cond)| format!("col{} {}", col, cond))
                    .collect();
                write!(f, "FILTER({})", parts.join(" AND "))
            }
            Operation::Slice(op) => write!(f, "SLICE(remove={:?})", op.remove),
        }
    }
}
