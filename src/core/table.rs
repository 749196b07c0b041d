use crate::core::error::{CubeError, CubeResult};
use crate::core::value::{Value, ValueType};
use serde::{Deserialize, Serialize};

/// Metadata about a single column in a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub value_type: ValueType,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into().trim().to_string(),
            value_type,
        }
    }

    pub fn is_categorical(&self) -> bool {
        self.value_type == ValueType::String
    }
}

/// Ordered column layout of a table. Position in `columns` is the column
/// index used by matrices and hierarchy descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TableSchema {
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(columns: Vec<ColumnSchema>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Column-oriented table. All columns have the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    schema: TableSchema,
    columns: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(schema: TableSchema, columns: Vec<Vec<Value>>) -> CubeResult<Self> {
        if schema.len() != columns.len() {
            return Err(CubeError::Shape(format!(
                "Schema declares {} columns but {} were supplied",
                schema.len(),
                columns.len()
            )));
        }

        if let Some(first) = columns.first() {
            let rows = first.len();
            for (col, values) in schema.columns.iter().zip(columns.iter()) {
                if values.len() != rows {
                    return Err(CubeError::Shape(format!(
                        "Column '{}' has {} rows, but table has {} rows",
                        col.name,
                        values.len(),
                        rows
                    )));
                }
            }
        }

        // Names are used as mapping and hierarchy keys
        let schema = TableSchema::new(
            schema
                .columns
                .into_iter()
                .map(|c| ColumnSchema::new(c.name, c.value_type))
                .collect(),
        );

        Ok(Self { schema, columns })
    }

    /// Builds a table from row tuples; mostly handy in tests and demos.
    pub fn from_rows(schema: TableSchema, rows: Vec<Vec<Value>>) -> CubeResult<Self> {
        let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(rows.len()); schema.len()];
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != schema.len() {
                return Err(CubeError::Shape(format!(
                    "Row {} has {} values, expected {}",
                    i,
                    row.len(),
                    schema.len()
                )));
            }
            for (col, value) in columns.iter_mut().zip(row) {
                col.push(value);
            }
        }
        Self::new(schema, columns)
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn columns(&self) -> &[Vec<Value>] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.schema
            .index_of(name)
            .map(|idx| self.columns[idx].as_slice())
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn row(&self, index: usize) -> Option<Vec<&Value>> {
        if index >= self.row_count() {
            return None;
        }
        Some(self.columns.iter().map(|c| &c[index]).collect())
    }

    /// Removes every row holding at least one null. Returns the number of
    /// rows dropped.
    pub fn drop_null_rows(&mut self) -> usize {
        let rows = self.row_count();
        let keep: Vec<bool> = (0..rows)
            .map(|r| !self.columns.iter().any(|c| c[r].is_null()))
            .collect();
        let dropped = keep.iter().filter(|k| !**k).count();
        if dropped == 0 {
            return 0;
        }

        for col in self.columns.iter_mut() {
            let mut r = 0;
            col.retain(|_| {
                let k = keep[r];
                r += 1;
                k
            });
        }
        dropped
    }

    pub fn into_parts(self) -> (TableSchema, Vec<Vec<Value>>) {
        (self.schema, self.columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> TableSchema {
        TableSchema::new(vec![
            ColumnSchema::new(" Material ", ValueType::String),
            ColumnSchema::new("Quantity", ValueType::Int),
        ])
    }

    #[test]
    fn test_names_are_trimmed() {
        let table = Table::new(schema(), vec![vec![], vec![]]).unwrap();
        assert_eq!(table.schema().names(), vec!["Material", "Quantity"]);
        assert!(table.column("Material").is_some());
    }

    #[test]
    fn test_misaligned_columns_rejected() {
        let result = Table::new(
            schema(),
            vec![vec![Value::from("Denim")], vec![Value::Int(1), Value::Int(2)]],
        );
        assert!(matches!(result, Err(CubeError::Shape(_))));
    }

    #[test]
    fn test_drop_null_rows() {
        let mut table = Table::from_rows(
            schema(),
            vec![
                vec![Value::from("Denim"), Value::Int(1)],
                vec![Value::Null, Value::Int(2)],
                vec![Value::from("Wool"), Value::Null],
                vec![Value::from("Linen"), Value::Int(4)],
            ],
        )
        .unwrap();

        assert_eq!(table.drop_null_rows(), 2);
        assert_eq!(table.row_count(), 2);
        assert_eq!(
            table.column("Material").unwrap(),
            &[Value::from("Denim"), Value::from("Linen")]
        );
    }
}
