use crate::core::error::{CubeError, CubeResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Literal compared against a matrix cell: either a raw number (a code or a
/// numeric value) or a category label resolved through the cube's mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Number(f64),
    Label(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionSpec {
    One(Literal),
    Many(Vec<Literal>),
}

/// One step of a query as supplied by the caller.
///
/// Column indices refer to the original table column order, the same
/// index space as the hierarchy's `dim_index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PipelineStep {
    Filter {
        /// column index (as a string key) → literal(s)
        conditions: BTreeMap<String, ConditionSpec>,
    },
    Slice {
        hierarchies: Vec<String>,
    },
    Rollup {
        /// `[hierarchy, level]` pairs
        levels: Vec<(String, String)>,
    },
}

/// Ordered list of steps; serialized as a plain JSON array.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineSpec {
    steps: Vec<PipelineStep>,
}

impl PipelineSpec {
    pub fn new(steps: Vec<PipelineStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    pub fn from_json(json: &str) -> CubeResult<Self> {
        serde_json::from_str(json).map_err(|e| CubeError::InvalidPipeline(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> CubeResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

/// Parses a filter condition key into a column index.
pub(crate) fn parse_column_key(key: &str) -> CubeResult<usize> {
    key.trim().parse().map_err(|_| {
        CubeError::InvalidPipeline(format!("Filter column '{}' is not a column index", key))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pipeline() {
        let json = r#"[
            {"kind": "filter", "conditions": {"2": 0, "4": ["Cotton", 3]}},
            {"kind": "slice", "hierarchies": ["Clothes Type"]},
            {"kind": "rollup", "levels": [["Date", "Year"]]}
        ]"#;
        let spec = PipelineSpec::from_json(json).unwrap();
        assert_eq!(spec.steps().len(), 3);

        match &spec.steps()[0] {
            PipelineStep::Filter { conditions } => {
                assert_eq!(conditions["2"], ConditionSpec::One(Literal::Number(0.0)));
                assert_eq!(
                    conditions["4"],
                    ConditionSpec::Many(vec![
                        Literal::Label("Cotton".to_string()),
                        Literal::Number(3.0)
                    ])
                );
            }
            other => panic!("Expected filter step, got {:?}", other),
        }
        assert_eq!(
            spec.steps()[2],
            PipelineStep::Rollup {
                levels: vec![("Date".to_string(), "Year".to_string())]
            }
        );
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let json = r#"[{"kind": "pivot", "axis": 1}]"#;
        assert!(matches!(
            PipelineSpec::from_json(json),
            Err(CubeError::InvalidPipeline(_))
        ));
    }

    #[test]
    fn test_column_key() {
        assert_eq!(parse_column_key("12").unwrap(), 12);
        assert!(parse_column_key("Price").is_err());
    }
}
