use thiserror::Error;

/// Errors raised by the cube engine. Every variant is fail-fast: a query
/// that hits one of these produces no partial result.
#[derive(Error, Debug)]
pub enum CubeError {
    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Decode error: code {code} has no label in column '{column}'")]
    Decode { column: String, code: f64 },

    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Unknown hierarchy: '{0}'")]
    UnknownHierarchy(String),

    #[error("Unknown level '{level}' in hierarchy '{hierarchy}'")]
    UnknownLevel { hierarchy: String, level: String },

    #[error("Column index {index} out of range for matrix with {columns} columns")]
    Index { index: usize, columns: usize },

    #[error("Invalid hierarchy descriptor: {0}")]
    InvalidHierarchy(String),

    #[error("Invalid pipeline specification: {0}")]
    InvalidPipeline(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CubeResult<T> = Result<T, CubeError>;
