use crate::core::error::{CubeError, CubeResult};
use crate::core::table::TableSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Static dimension metadata: which columns make up each logical dimension
/// (coarse to fine) and where every column sits in the matrix.
///
/// Loaded once per session and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionHierarchy {
    #[serde(rename = "dim_hierarchy")]
    hierarchies: BTreeMap<String, Vec<String>>,
    #[serde(rename = "dim_index")]
    index: BTreeMap<String, usize>,
}

impl DimensionHierarchy {
    pub fn new(
        hierarchies: BTreeMap<String, Vec<String>>,
        index: BTreeMap<String, usize>,
    ) -> CubeResult<Self> {
        let hierarchy = Self { hierarchies, index };
        hierarchy.validate()?;
        Ok(hierarchy)
    }

    pub fn from_json(json: &str) -> CubeResult<Self> {
        let hierarchy: Self = serde_json::from_str(json)?;
        hierarchy.validate()?;
        Ok(hierarchy)
    }

    pub fn load(path: impl AsRef<Path>) -> CubeResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    fn validate(&self) -> CubeResult<()> {
        for (name, levels) in &self.hierarchies {
            if self.index.contains_key(name) {
                return Err(CubeError::InvalidHierarchy(format!(
                    "Hierarchy name '{}' is also a column name",
                    name
                )));
            }
            for level in levels {
                if !self.index.contains_key(level) {
                    return Err(CubeError::InvalidHierarchy(format!(
                        "Level '{}' of hierarchy '{}' has no column index",
                        level, name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Checks that every indexed column names the schema column at that
    /// position.
    pub fn validate_against(&self, schema: &TableSchema) -> CubeResult<()> {
        for (name, &idx) in &self.index {
            match schema.columns.get(idx) {
                Some(col) if col.name == *name => {}
                Some(col) => {
                    return Err(CubeError::InvalidHierarchy(format!(
                        "Column '{}' is indexed at {}, but the table has '{}' there",
                        name, idx, col.name
                    )))
                }
                None => {
                    return Err(CubeError::Index {
                        index: idx,
                        columns: schema.len(),
                    })
                }
            }
        }
        Ok(())
    }

    pub fn levels(&self, hierarchy: &str) -> CubeResult<&[String]> {
        self.hierarchies
            .get(hierarchy)
            .map(|l| l.as_slice())
            .ok_or_else(|| CubeError::UnknownHierarchy(hierarchy.to_string()))
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    /// Indices of every level of the named hierarchies.
    pub fn slice_by_hierarchy<S: AsRef<str>>(&self, names: &[S]) -> CubeResult<Vec<usize>> {
        let mut columns = Vec::new();
        for name in names {
            columns.extend(self.levels(name.as_ref())?.iter().map(|l| l.as_str()));
        }
        let indices = self.resolve_columns(&columns)?;
        debug!(?indices, "resolved slice columns");
        Ok(indices)
    }

    /// Indices of the levels finer than the target level of each
    /// `(hierarchy, level)` pair. Rolling `Date` up to `Year` yields the
    /// indices of `Month` and `Day`.
    pub fn roll_up_to_level<S: AsRef<str>>(&self, pairs: &[(S, S)]) -> CubeResult<Vec<usize>> {
        let mut columns = Vec::new();
        for (hierarchy, level) in pairs {
            let (hierarchy, level) = (hierarchy.as_ref(), level.as_ref());
            let levels = self.levels(hierarchy)?;
            let pos = levels
                .iter()
                .position(|l| l == level)
                .ok_or_else(|| CubeError::UnknownLevel {
                    hierarchy: hierarchy.to_string(),
                    level: level.to_string(),
                })?;
            columns.extend(levels[pos + 1..].iter().map(|l| l.as_str()));
        }
        let indices = self.resolve_columns(&columns)?;
        debug!(?indices, "resolved roll-up columns");
        Ok(indices)
    }

    fn resolve_columns(&self, columns: &[&str]) -> CubeResult<Vec<usize>> {
        let mut seen = HashSet::new();
        columns
            .iter()
            .filter(|c| seen.insert(**c))
            .map(|c| {
                self.column_index(c).ok_or_else(|| {
                    CubeError::InvalidHierarchy(format!("Column '{}' has no index", c))
                })
            })
            .collect()
    }
}

/// Unions removal sets, dropping duplicates and keeping first-seen order.
pub fn union_indices<I>(sets: I) -> Vec<usize>
where
    I: IntoIterator,
    I::Item: IntoIterator<Item = usize>,
{
    let mut seen = HashSet::new();
    sets.into_iter()
        .flatten()
        .filter(|i| seen.insert(*i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTOR: &str = r#"{
        "dim_hierarchy": {
            "Date": ["Year", "Month", "Day"],
            "Clothes Type": ["Category", "Product Name"]
        },
        "dim_index": {
            "Year": 0, "Month": 1, "Day": 2,
            "Category": 3, "Product Name": 4, "Price": 5
        }
    }"#;

    fn hierarchy() -> DimensionHierarchy {
        DimensionHierarchy::from_json(DESCRIPTOR).unwrap()
    }

    #[test]
    fn test_slice_collects_every_level() {
        let h = hierarchy();
        assert_eq!(h.slice_by_hierarchy(&["Clothes Type"]).unwrap(), vec![3, 4]);
        assert_eq!(
            h.slice_by_hierarchy(&["Date", "Date"]).unwrap(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_slice_is_deterministic() {
        let h = hierarchy();
        let first = h.slice_by_hierarchy(&["Date"]).unwrap();
        let second = h.slice_by_hierarchy(&["Date"]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_hierarchy() {
        let h = hierarchy();
        assert!(matches!(
            h.slice_by_hierarchy(&["Region"]),
            Err(CubeError::UnknownHierarchy(name)) if name == "Region"
        ));
        assert!(matches!(
            h.roll_up_to_level(&[("Region", "City")]),
            Err(CubeError::UnknownHierarchy(_))
        ));
    }

    #[test]
    fn test_roll_up_drops_finer_levels() {
        let h = hierarchy();
        assert_eq!(h.roll_up_to_level(&[("Date", "Year")]).unwrap(), vec![1, 2]);
        assert_eq!(h.roll_up_to_level(&[("Date", "Month")]).unwrap(), vec![2]);
        assert!(h.roll_up_to_level(&[("Date", "Day")]).unwrap().is_empty());
        assert_eq!(
            h.roll_up_to_level(&[("Date", "Year"), ("Clothes Type", "Category")])
                .unwrap(),
            vec![1, 2, 4]
        );
    }

    #[test]
    fn test_roll_up_to_missing_level_fails() {
        let h = hierarchy();
        let err = h.roll_up_to_level(&[("Date", "Week")]).unwrap_err();
        assert!(matches!(
            err,
            CubeError::UnknownLevel { ref hierarchy, ref level } if hierarchy == "Date" && level == "Week"
        ));
    }

    #[test]
    fn test_invalid_descriptors_rejected() {
        let missing_level = r#"{"dim_hierarchy": {"Date": ["Year"]}, "dim_index": {}}"#;
        assert!(matches!(
            DimensionHierarchy::from_json(missing_level),
            Err(CubeError::InvalidHierarchy(_))
        ));

        let clashing = r#"{"dim_hierarchy": {"Year": ["Year"]}, "dim_index": {"Year": 0}}"#;
        assert!(matches!(
            DimensionHierarchy::from_json(clashing),
            Err(CubeError::InvalidHierarchy(_))
        ));
    }

    #[test]
    fn test_union_keeps_first_seen_order() {
        assert_eq!(union_indices(vec![vec![3, 4], vec![1, 2, 4]]), vec![3, 4, 1, 2]);
    }
}
