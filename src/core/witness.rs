use crate::core::error::CubeResult;
use crate::core::matrix::Matrix;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Input/output pair handed to the external proof generator: the shape of
/// the input matrix plus both matrices flattened row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofInput {
    pub input_shapes: Vec<[usize; 2]>,
    pub input_data: Vec<Vec<f64>>,
    pub output_data: Vec<Vec<f64>>,
}

impl ProofInput {
    pub fn new(input: &Matrix, output: &Matrix) -> Self {
        Self {
            input_shapes: vec![input.shape()],
            input_data: vec![input.data().to_vec()],
            output_data: vec![output.data().to_vec()],
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> CubeResult<()> {
        fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> CubeResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
