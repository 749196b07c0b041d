// src/lib.rs

pub mod core;
pub mod engine;
pub mod query;

// Re-exports para tener una API limpia desde fuera del crate
pub use crate::core::codec::{CategoricalCodec, CategoryMapping};
pub use crate::core::config::CubeConfig;
pub use crate::core::connectors::{Connector, ConnectorError, ConnectorRegistry, CsvConnector};
pub use crate::core::error::{CubeError, CubeResult};
pub use crate::core::hierarchy::{union_indices, DimensionHierarchy};
pub use crate::core::matrix::{ExecutionId, Lineage, Matrix, MatrixId};
pub use crate::core::table::{ColumnSchema, Table, TableSchema};
pub use crate::core::value::{Value, ValueType};
pub use crate::core::witness::ProofInput;
pub use engine::{Condition, Cube, Filter, Operation, Pipeline, PipelineRun, Slice, Transform};
pub use query::{execute_query, PipelineSpec, PipelineStep, QueryOptions, QueryResult};
