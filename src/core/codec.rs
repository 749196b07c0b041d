//! Categorical encoding.
//!
//! Each categorical column is encoded independently: its distinct labels
//! are sorted ascending and label *i* receives code *i*. The resulting
//! [`CategoryMapping`] is an immutable value; nothing here keeps encoder
//! state between columns.

use crate::core::error::{CubeError, CubeResult};
use crate::core::matrix::Matrix;
use crate::core::table::{ColumnSchema, Table, TableSchema};
use crate::core::value::{Value, ValueType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Label to code assignment for one column
pub type LabelCodes = BTreeMap<String, u32>;

/// Per-column bijection between labels and integer codes.
///
/// Serializes as the flat JSON object `{column: {label: code}}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryMapping {
    columns: BTreeMap<String, LabelCodes>,
}

impl CategoryMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the codes of one column, rejecting non-unique codes.
    pub fn insert(&mut self, column: impl Into<String>, codes: LabelCodes) -> CubeResult<()> {
        let column = column.into();
        let distinct: BTreeSet<u32> = codes.values().copied().collect();
        if distinct.len() != codes.len() {
            return Err(CubeError::Encoding(format!(
                "Mapping for column '{}' assigns the same code to several labels",
                column
            )));
        }
        self.columns.insert(column, codes);
        Ok(())
    }

    pub fn get(&self, column: &str) -> Option<&LabelCodes> {
        self.columns.get(column)
    }

    pub fn contains_column(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn code(&self, column: &str, label: &str) -> Option<u32> {
        self.columns.get(column).and_then(|m| m.get(label)).copied()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Subset of the mapping covering only `names`. Names without an entry
    /// are skipped.
    pub fn restrict<S: AsRef<str>>(&self, names: &[S]) -> CategoryMapping {
        let columns = names
            .iter()
            .filter_map(|n| {
                self.columns
                    .get_key_value(n.as_ref())
                    .map(|(k, v)| (k.clone(), v.clone()))
            })
            .collect();
        CategoryMapping { columns }
    }

    /// Code to label lookup for one column.
    pub fn inverse(&self, column: &str) -> Option<HashMap<u32, &str>> {
        self.columns
            .get(column)
            .map(|m| m.iter().map(|(label, code)| (*code, label.as_str())).collect())
    }

    pub fn to_json(&self) -> CubeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> CubeResult<Self> {
        let raw: BTreeMap<String, LabelCodes> = serde_json::from_str(json)?;
        let mut mapping = CategoryMapping::new();
        for (column, codes) in raw {
            mapping.insert(column, codes)?;
        }
        Ok(mapping)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> CubeResult<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> CubeResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

/// Assigns codes to the distinct labels of a column in ascending order.
pub fn label_codes<'a>(labels: impl IntoIterator<Item = &'a str>) -> LabelCodes {
    let distinct: BTreeSet<&str> = labels.into_iter().collect();
    distinct
        .into_iter()
        .enumerate()
        .map(|(code, label)| (label.to_string(), code as u32))
        .collect()
}

/// Collects the label of every cell of a categorical column.
fn column_labels(column: &ColumnSchema, values: &[Value]) -> CubeResult<Vec<String>> {
    values
        .iter()
        .enumerate()
        .map(|(row, v)| {
            v.to_label().ok_or_else(|| {
                CubeError::Encoding(format!(
                    "Null value in column '{}' at row {}",
                    column.name, row
                ))
            })
        })
        .collect()
}

/// Encodes one categorical column, returning its codes and mapping.
pub fn encode_column(column: &ColumnSchema, values: &[Value]) -> CubeResult<(Vec<f64>, LabelCodes)> {
    let labels = column_labels(column, values)?;
    let codes = label_codes(labels.iter().map(|s| s.as_str()));
    let encoded = labels.iter().map(|l| codes[l.as_str()] as f64).collect();
    Ok((encoded, codes))
}

/// Numeric column passthrough. A string cell here means the column mixes
/// types and cannot be represented in the matrix.
pub fn numeric_column(column: &ColumnSchema, values: &[Value]) -> CubeResult<Vec<f64>> {
    values
        .iter()
        .enumerate()
        .map(|(row, v)| match v {
            Value::Null => Err(CubeError::Encoding(format!(
                "Null value in column '{}' at row {}",
                column.name, row
            ))),
            other => other.as_f64().ok_or_else(|| {
                CubeError::Encoding(format!(
                    "Column '{}' is declared {:?} but row {} holds '{}'",
                    column.name, column.value_type, row, other
                ))
            }),
        })
        .collect()
}

/// Stateless categorical codec
pub struct CategoricalCodec;

impl CategoricalCodec {
    /// Encodes every categorical column and stacks the table into a matrix.
    pub fn encode(table: &Table) -> CubeResult<(Matrix, CategoryMapping)> {
        let schema = table.schema();
        let mut mapping = CategoryMapping::new();
        let mut encoded_columns = Vec::with_capacity(schema.len());

        for (column, values) in schema.columns.iter().zip(table.columns()) {
            if column.is_categorical() {
                let (codes, labels) = encode_column(column, values)?;
                debug!(column = %column.name, labels = labels.len(), "encoded categorical column");
                mapping.insert(column.name.clone(), labels)?;
                encoded_columns.push(codes);
            } else {
                encoded_columns.push(numeric_column(column, values)?);
            }
        }

        let matrix = stack_columns(table.row_count(), &encoded_columns)?;
        Ok((matrix, mapping))
    }

    /// Decodes a matrix whose columns are described by `columns`.
    ///
    /// Only columns with an entry in `mapping` are translated back to
    /// labels; the others are restored as numbers using their declared type.
    pub fn decode(matrix: &Matrix, columns: &[ColumnSchema], mapping: &CategoryMapping) -> CubeResult<Table> {
        if matrix.column_count() != columns.len() {
            return Err(CubeError::Shape(format!(
                "Matrix has {} columns but {} column names were given",
                matrix.column_count(),
                columns.len()
            )));
        }

        let mut out_schema = Vec::with_capacity(columns.len());
        let mut out_columns = Vec::with_capacity(columns.len());

        for (idx, column) in columns.iter().enumerate() {
            let raw = matrix.column(idx).unwrap_or_default();
            match mapping.inverse(&column.name) {
                Some(inverse) => {
                    let labels = raw
                        .iter()
                        .map(|&code| decode_code(&column.name, code, &inverse))
                        .collect::<CubeResult<Vec<_>>>()?;
                    out_schema.push(ColumnSchema::new(column.name.clone(), ValueType::String));
                    out_columns.push(labels);
                }
                None => {
                    let values = raw
                        .iter()
                        .map(|&v| restore_numeric(column.value_type, v))
                        .collect();
                    let value_type = match column.value_type {
                        ValueType::String => ValueType::Float,
                        t => t,
                    };
                    out_schema.push(ColumnSchema::new(column.name.clone(), value_type));
                    out_columns.push(values);
                }
            }
        }

        Table::new(TableSchema::new(out_schema), out_columns)
    }
}

fn decode_code(column: &str, code: f64, inverse: &HashMap<u32, &str>) -> CubeResult<Value> {
    let err = || CubeError::Decode {
        column: column.to_string(),
        code,
    };
    if code < 0.0 || code.fract() != 0.0 || code > u32::MAX as f64 {
        return Err(err());
    }
    inverse
        .get(&(code as u32))
        .map(|label| Value::String((*label).to_string()))
        .ok_or_else(err)
}

fn restore_numeric(value_type: ValueType, v: f64) -> Value {
    if value_type == ValueType::Int && v.fract() == 0.0 {
        Value::Int(v as i64)
    } else {
        Value::Float(v)
    }
}

/// Interleaves per-column vectors into a row-major matrix.
pub(crate) fn stack_columns(rows: usize, columns: &[Vec<f64>]) -> CubeResult<Matrix> {
    let cols = columns.len();
    let mut data = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        for col in columns {
            data.push(col[r]);
        }
    }
    Matrix::new(rows, cols, data)
}
