use crate::core::connectors::{Connector, ConnectorError};
use crate::core::table::{ColumnSchema, Table, TableSchema};
use crate::core::value::{Value, ValueType};
use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::compute::{cast, concat_batches};
use arrow::csv;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// CSV files with a header row.
///
/// Column types are inferred by arrow: integer columns become `Int`,
/// floating point columns `Float`, and everything else (text, booleans,
/// dates) is read as a categorical `String` column. Empty fields are nulls.
pub struct CsvConnector {
    /// Records sampled for type inference; 0 reads the whole file
    infer_rows: usize,
}

impl CsvConnector {
    pub fn new() -> Self {
        Self { infer_rows: 100 }
    }

    pub fn with_infer_rows(infer_rows: usize) -> Self {
        Self { infer_rows }
    }
}

impl Default for CsvConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for CsvConnector {
    fn name(&self) -> &str {
        "csv"
    }

    fn can_handle(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false)
    }

    fn read_table(&self, path: &Path) -> Result<Table, ConnectorError> {
        let file = fs::File::open(path)?;
        let format = csv::reader::Format::default().with_header(true);
        let max_records = (self.infer_rows > 0).then_some(self.infer_rows);
        let (arrow_schema, _) = format.infer_schema(file, max_records)?;
        let arrow_schema = Arc::new(arrow_schema);

        let file = fs::File::open(path)?;
        let reader = csv::ReaderBuilder::new(arrow_schema.clone())
            .with_header(true)
            .build(file)?;

        let mut batches = Vec::new();
        for batch in reader {
            batches.push(batch?);
        }
        let batch = concat_batches(&arrow_schema, batches.iter())?;

        let mut columns = Vec::with_capacity(batch.num_columns());
        let mut values = Vec::with_capacity(batch.num_columns());
        for (field, array) in arrow_schema.fields().iter().zip(batch.columns()) {
            let (value_type, column) = column_values(field.data_type(), array)?;
            columns.push(ColumnSchema::new(field.name().as_str(), value_type));
            values.push(column);
        }

        debug!(
            path = %path.display(),
            rows = batch.num_rows(),
            columns = columns.len(),
            "read csv table"
        );
        Ok(Table::new(TableSchema::new(columns), values)?)
    }

    fn write_table(&self, path: &Path, table: &Table) -> Result<(), ConnectorError> {
        let schema = table.schema();
        let fields: Vec<Field> = schema
            .columns
            .iter()
            .map(|c| Field::new(c.name.as_str(), arrow_type(c.value_type), true))
            .collect();

        let arrays = schema
            .columns
            .iter()
            .zip(table.columns())
            .map(|(c, values)| column_array(c, values))
            .collect::<Result<Vec<_>, _>>()?;

        let options = RecordBatchOptions::new().with_row_count(Some(table.row_count()));
        let batch = RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), arrays, &options)?;

        let file = fs::File::create(path)?;
        let mut writer = csv::WriterBuilder::new().with_header(true).build(file);
        writer.write(&batch)?;
        Ok(())
    }
}

fn column_values(data_type: &DataType, array: &ArrayRef) -> Result<(ValueType, Vec<Value>), ConnectorError> {
    if data_type.is_integer() {
        let array = cast(array, &DataType::Int64)?;
        let array = downcast::<Int64Array>(&array)?;
        let values = (0..array.len())
            .map(|i| {
                if array.is_null(i) {
                    Value::Null
                } else {
                    Value::Int(array.value(i))
                }
            })
            .collect();
        Ok((ValueType::Int, values))
    } else if data_type.is_floating() {
        let array = cast(array, &DataType::Float64)?;
        let array = downcast::<Float64Array>(&array)?;
        let values = (0..array.len())
            .map(|i| {
                if array.is_null(i) {
                    Value::Null
                } else {
                    Value::Float(array.value(i))
                }
            })
            .collect();
        Ok((ValueType::Float, values))
    } else {
        let array = cast(array, &DataType::Utf8)?;
        let array = downcast::<StringArray>(&array)?;
        let values = (0..array.len())
            .map(|i| {
                if array.is_null(i) {
                    Value::Null
                } else {
                    Value::String(array.value(i).to_string())
                }
            })
            .collect();
        Ok((ValueType::String, values))
    }
}

fn downcast<T: 'static>(array: &ArrayRef) -> Result<&T, ConnectorError> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| ConnectorError::Parse(format!("Unexpected array type {:?}", array.data_type())))
}

fn arrow_type(value_type: ValueType) -> DataType {
    match value_type {
        ValueType::Int => DataType::Int64,
        ValueType::Float => DataType::Float64,
        ValueType::String => DataType::Utf8,
    }
}

fn column_array(column: &ColumnSchema, values: &[Value]) -> Result<ArrayRef, ConnectorError> {
    let mismatch = |v: &Value| {
        ConnectorError::Parse(format!(
            "Column '{}' is declared {:?} but holds '{}'",
            column.name, column.value_type, v
        ))
    };

    let array: ArrayRef = match column.value_type {
        ValueType::Int => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    Value::Int(i) => Ok(Some(*i)),
                    Value::Null => Ok(None),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<Int64Array, _>>()?,
        ),
        ValueType::Float => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    Value::Null => Ok(None),
                    other => other.as_f64().map(Some).ok_or_else(|| mismatch(other)),
                })
                .collect::<Result<Float64Array, _>>()?,
        ),
        ValueType::String => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    Value::Null => None,
                    other => other.to_label(),
                })
                .collect::<StringArray>(),
        ),
    };
    Ok(array)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("olapcube_{}_{}", uuid::Uuid::new_v4(), name))
    }

    #[test]
    fn test_can_handle_by_extension() {
        let c = CsvConnector::new();
        assert!(c.can_handle(Path::new("data/GHGe1.CSV")));
        assert!(!c.can_handle(Path::new("data/GHGe1.json")));
    }

    #[test]
    fn test_read_infers_types_and_trims_headers() {
        let path = temp_path("read.csv");
        fs::write(
            &path,
            "Material , Quantity,Price\nCotton,3,9.99\nWool,,5.5\nDenim,7,1.25\n",
        )
        .unwrap();

        let table = CsvConnector::new().read_table(&path).unwrap();
        assert_eq!(table.schema().names(), vec!["Material", "Quantity", "Price"]);
        assert_eq!(table.schema().columns[0].value_type, ValueType::String);
        assert_eq!(table.schema().columns[1].value_type, ValueType::Int);
        assert_eq!(table.schema().columns[2].value_type, ValueType::Float);
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.column("Quantity").unwrap()[1], Value::Null);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_write_then_read() {
        let path = temp_path("write.csv");
        let schema = TableSchema::new(vec![
            ColumnSchema::new("Material", ValueType::String),
            ColumnSchema::new("Quantity", ValueType::Int),
        ]);
        let table = Table::from_rows(
            schema,
            vec![
                vec![Value::from("Cotton"), Value::Int(3)],
                vec![Value::from("Wool"), Value::Int(4)],
            ],
        )
        .unwrap();

        let connector = CsvConnector::new();
        connector.write_table(&path, &table).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("Material,Quantity\n"));
        assert_eq!(connector.read_table(&path).unwrap(), table);

        let _ = fs::remove_file(&path);
    }
}
