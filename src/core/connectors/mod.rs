pub mod csv_connector;

pub use csv_connector::CsvConnector;

use crate::core::error::CubeError;
use crate::core::table::Table;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Feature not supported: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Cube(#[from] CubeError),
}

/// Reads and writes tables in some tabular file format.
pub trait Connector: Send + Sync {
    /// Unique name of the connector (e.g., "csv")
    fn name(&self) -> &str;

    /// Check if this connector can handle the given path
    fn can_handle(&self, path: &Path) -> bool;

    fn read_table(&self, path: &Path) -> Result<Table, ConnectorError>;

    fn write_table(&self, path: &Path, table: &Table) -> Result<(), ConnectorError>;
}

/// Registry for managing available connectors
pub struct ConnectorRegistry {
    connectors: Vec<Box<dyn Connector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self {
            connectors: Vec::new(),
        }
    }

    /// Registry with the built-in CSV connector
    pub fn with_defaults(infer_rows: usize) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(CsvConnector::with_infer_rows(infer_rows)));
        registry
    }

    pub fn register(&mut self, connector: Box<dyn Connector>) {
        self.connectors.push(connector);
    }

    pub fn find_connector(&self, path: &Path) -> Result<&dyn Connector, ConnectorError> {
        self.connectors
            .iter()
            .find(|c| c.can_handle(path))
            .map(|c| c.as_ref())
            .ok_or_else(|| {
                ConnectorError::Unsupported(format!("No connector for '{}'", path.display()))
            })
    }
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
