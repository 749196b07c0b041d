use crate::core::codec::{self, CategoricalCodec, CategoryMapping};
use crate::core::error::{CubeError, CubeResult};
use crate::core::matrix::Matrix;
use crate::core::table::{ColumnSchema, Table, TableSchema};
use crate::core::value::{Value, ValueType};
use crate::engine::operations::{Operation, Transform};
use std::collections::HashSet;
use tracing::debug;

/// An encoded table plus the category mapping that encodes it, viewed as
/// a numeric matrix.
///
/// A cube is built per query and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Cube {
    schema: TableSchema,
    columns: Vec<Vec<Value>>,
    mapping: CategoryMapping,
}

impl Cube {
    /// Encodes every categorical column with a freshly computed mapping.
    /// Cells of a categorical column are labels whatever their type, so a
    /// column mixing `"M"` and `1` encodes the same way as in
    /// [`CategoricalCodec::encode`].
    pub fn new(table: Table) -> CubeResult<Self> {
        let (schema, mut columns) = table.into_parts();
        let mut mapping = CategoryMapping::new();

        for (column, values) in schema.columns.iter().zip(columns.iter_mut()) {
            if column.is_categorical() {
                let (encoded, codes) = codec::encode_column(column, values)?;
                *values = encoded.into_iter().map(|c| Value::Int(c as i64)).collect();
                mapping.insert(column.name.clone(), codes)?;
            }
        }

        debug!(columns = schema.len(), mapped = mapping.len(), "built cube");
        Ok(Self {
            schema,
            columns,
            mapping,
        })
    }

    /// Applies an existing mapping without recomputing it.
    ///
    /// In a categorical column every cell is a label and must have a code.
    /// A mapped column read back as numbers (an encoded table) must already
    /// hold valid codes. Categorical columns without a mapping entry are
    /// left as they are and make [`Cube::to_matrix`] fail.
    pub fn with_mapping(table: Table, mapping: CategoryMapping) -> CubeResult<Self> {
        let (schema, mut columns) = table.into_parts();

        for (column, values) in schema.columns.iter().zip(columns.iter_mut()) {
            let Some(codes) = mapping.get(&column.name) else {
                continue;
            };
            let known: HashSet<u32> = codes.values().copied().collect();

            for (row, value) in values.iter_mut().enumerate() {
                let code = if column.is_categorical() {
                    let label = value.to_label().ok_or_else(|| {
                        CubeError::Encoding(format!(
                            "Null value in column '{}' at row {}",
                            column.name, row
                        ))
                    })?;
                    codes.get(&label).copied().ok_or_else(|| {
                        CubeError::Encoding(format!(
                            "Label '{}' in column '{}' (row {}) has no code",
                            label, column.name, row
                        ))
                    })?
                } else {
                    match value.as_f64() {
                        Some(v) if v >= 0.0 && v.fract() == 0.0 && known.contains(&(v as u32)) => {
                            v as u32
                        }
                        _ => {
                            return Err(CubeError::Encoding(format!(
                                "Value {} in column '{}' (row {}) is not a code of its mapping",
                                value, column.name, row
                            )))
                        }
                    }
                };
                *value = Value::Int(code as i64);
            }
        }

        debug!(
            columns = schema.len(),
            mapped = mapping.len(),
            "built cube"
        );
        Ok(Self {
            schema,
            columns,
            mapping,
        })
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn mapping(&self) -> &CategoryMapping {
        &self.mapping
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.schema.names()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn column_count(&self) -> usize {
        self.schema.len()
    }

    /// Dense matrix view; every cell must be numeric by now.
    pub fn to_matrix(&self) -> CubeResult<Matrix> {
        let mut numeric = Vec::with_capacity(self.columns.len());
        for (column, values) in self.schema.columns.iter().zip(self.columns.iter()) {
            let col = values
                .iter()
                .enumerate()
                .map(|(row, v)| {
                    v.as_f64().ok_or_else(|| {
                        CubeError::Shape(format!(
                            "Column '{}' holds non-numeric value '{}' at row {}",
                            column.name, v, row
                        ))
                    })
                })
                .collect::<CubeResult<Vec<f64>>>()?;
            numeric.push(col);
        }
        codec::stack_columns(self.row_count(), &numeric)
    }

    /// The table as stored in the cube: categorical columns hold their
    /// integer codes.
    pub fn encoded_table(&self) -> CubeResult<Table> {
        let schema = TableSchema::new(
            self.schema
                .columns
                .iter()
                .map(|c| {
                    if self.mapping.contains_column(&c.name) {
                        ColumnSchema::new(c.name.clone(), ValueType::Int)
                    } else {
                        c.clone()
                    }
                })
                .collect(),
        );
        Table::new(schema, self.columns.clone())
    }

    pub fn apply(&self, operation: &Operation, matrix: &Matrix) -> CubeResult<Matrix> {
        operation.transform(matrix)
    }

    /// Decodes `matrix`, whose columns are `kept` (a subset of this cube's
    /// columns). The result follows the cube's original column order.
    pub fn decode_columns<S: AsRef<str>>(&self, kept: &[S], matrix: &Matrix) -> CubeResult<Table> {
        let mut columns: Vec<(usize, ColumnSchema)> = Vec::with_capacity(kept.len());
        for name in kept {
            let name = name.as_ref();
            let idx = self.schema.index_of(name).ok_or_else(|| {
                CubeError::Shape(format!("Column '{}' is not part of the cube", name))
            })?;
            columns.push((idx, self.schema.columns[idx].clone()));
        }

        if columns.windows(2).any(|w| w[0].0 >= w[1].0) {
            return Err(CubeError::Shape(
                "Kept columns must follow the original column order".to_string(),
            ));
        }

        let columns: Vec<ColumnSchema> = columns.into_iter().map(|(_, c)| c).collect();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        let mapping = self.mapping.restrict(&names);
        CategoricalCodec::decode(matrix, &columns, &mapping)
    }

    /// Decodes a matrix that still has every column of the cube.
    pub fn decode(&self, matrix: &Matrix) -> CubeResult<Table> {
        let names = self.column_names();
        self.decode_columns(&names, matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::label_codes;

    fn table() -> Table {
        let schema = TableSchema::new(vec![
            ColumnSchema::new("Category", ValueType::String),
            ColumnSchema::new("Material", ValueType::String),
            ColumnSchema::new("Quantity", ValueType::Int),
        ]);
        Table::from_rows(
            schema,
            vec![
                vec![Value::from("Jeans"), Value::from("Denim"), Value::Int(4)],
                vec![Value::from("Jacket"), Value::from("Wool"), Value::Int(1)],
                vec![Value::from("Jeans"), Value::from("Cotton"), Value::Int(2)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_new_encodes_and_decodes() {
        let cube = Cube::new(table()).unwrap();
        let matrix = cube.to_matrix().unwrap();
        assert_eq!(
            matrix.to_rows(),
            vec![vec![1.0, 1.0, 4.0], vec![0.0, 2.0, 1.0], vec![1.0, 0.0, 2.0]]
        );
        assert_eq!(cube.decode(&matrix).unwrap(), table());
    }

    #[test]
    fn test_supplied_mapping_is_applied_not_recomputed() {
        let mut mapping = CategoryMapping::new();
        mapping.insert("Category", label_codes(["Jacket", "Jeans", "Shoes"])).unwrap();
        mapping
            .insert("Material", label_codes(["Cotton", "Denim", "Linen", "Wool"]))
            .unwrap();

        let cube = Cube::with_mapping(table(), mapping.clone()).unwrap();
        assert_eq!(cube.mapping(), &mapping);
        assert_eq!(cube.to_matrix().unwrap().column(1), Some(vec![1.0, 3.0, 0.0]));
    }

    #[test]
    fn test_encoded_table_holds_codes() {
        let cube = Cube::new(table()).unwrap();
        let encoded = cube.encoded_table().unwrap();
        assert_eq!(encoded.schema().columns[0].value_type, ValueType::Int);
        assert_eq!(
            encoded.column("Material").unwrap(),
            &[Value::Int(1), Value::Int(2), Value::Int(0)]
        );

        let reloaded = Cube::with_mapping(encoded, cube.mapping().clone()).unwrap();
        assert_eq!(reloaded.decode(&reloaded.to_matrix().unwrap()).unwrap(), table());
    }

    #[test]
    fn test_unmapped_label_fails_fast() {
        let mut mapping = CategoryMapping::new();
        mapping.insert("Category", label_codes(["Jeans"])).unwrap();
        mapping.insert("Material", label_codes(["Cotton", "Denim", "Wool"])).unwrap();
        let err = Cube::with_mapping(table(), mapping).unwrap_err();
        assert!(matches!(err, CubeError::Encoding(msg) if msg.contains("Jacket")));
    }

    #[test]
    fn test_mixed_categorical_column_matches_codec() {
        let schema = TableSchema::new(vec![
            ColumnSchema::new("Size", ValueType::String),
            ColumnSchema::new("Quantity", ValueType::Int),
        ]);
        let table = Table::from_rows(
            schema,
            vec![
                vec![Value::from("M"), Value::Int(3)],
                vec![Value::Int(1), Value::Int(5)],
            ],
        )
        .unwrap();

        let (codec_matrix, codec_mapping) = CategoricalCodec::encode(&table).unwrap();
        let cube = Cube::new(table).unwrap();
        let matrix = cube.to_matrix().unwrap();

        assert_eq!(matrix.column(0), Some(vec![1.0, 0.0]));
        assert_eq!(matrix.to_rows(), codec_matrix.to_rows());
        assert_eq!(cube.mapping(), &codec_mapping);
        assert_eq!(
            cube.decode(&matrix).unwrap().column("Size").unwrap(),
            &[Value::from("M"), Value::from("1")]
        );

        // the same table with the saved mapping encodes identically
        let again = Cube::with_mapping(cube.decode(&matrix).unwrap(), codec_mapping).unwrap();
        assert_eq!(again.to_matrix().unwrap().to_rows(), matrix.to_rows());
    }

    #[test]
    fn test_encoded_column_rejects_unknown_code() {
        let cube = Cube::new(table()).unwrap();
        let mut encoded = cube.encoded_table().unwrap().into_parts();
        encoded.1[1][2] = Value::Int(9);
        let encoded = Table::new(encoded.0, encoded.1).unwrap();

        let err = Cube::with_mapping(encoded, cube.mapping().clone()).unwrap_err();
        assert!(matches!(err, CubeError::Encoding(msg) if msg.contains("not a code")));
    }

    #[test]
    fn test_unencoded_column_fails_matrix_conversion() {
        let mut mapping = CategoryMapping::new();
        mapping.insert("Category", label_codes(["Jacket", "Jeans"])).unwrap();
        let cube = Cube::with_mapping(table(), mapping).unwrap();
        assert!(matches!(cube.to_matrix(), Err(CubeError::Shape(_))));
    }

    #[test]
    fn test_decode_subset_of_columns() {
        let cube = Cube::new(table()).unwrap();
        let matrix = cube.to_matrix().unwrap();
        let sliced = cube
            .apply(&Operation::slice([1]), &matrix)
            .unwrap();
        let decoded = cube.decode_columns(&["Category", "Quantity"], &sliced).unwrap();
        assert_eq!(decoded.schema().names(), vec!["Category", "Quantity"]);
        assert_eq!(
            decoded.column("Category").unwrap(),
            &[Value::from("Jeans"), Value::from("Jacket"), Value::from("Jeans")]
        );

        assert!(cube.decode_columns(&["Quantity", "Category"], &sliced).is_err());
    }
}
