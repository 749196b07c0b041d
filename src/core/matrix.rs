use crate::core::digest;
use crate::core::error::{CubeError, CubeResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

/// Unique identifier for a matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatrixId(pub Uuid);

impl Default for MatrixId {
    fn default() -> Self {
        Self::new()
    }
}

impl MatrixId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Unique identifier for one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub Uuid);

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Information about how a matrix was derived
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lineage {
    pub execution_id: ExecutionId,
    pub operation: String,
    pub input: MatrixId,
}

#[derive(Debug, Clone)]
pub struct MatrixMetadata {
    pub id: MatrixId,
    pub created_at: DateTime<Utc>,
    pub lineage: Option<Lineage>,
    data_hash: OnceLock<String>,
}

impl MatrixMetadata {
    pub fn new() -> Self {
        Self {
            id: MatrixId::new(),
            created_at: Utc::now(),
            lineage: None,
            data_hash: OnceLock::new(),
        }
    }
}

impl Default for MatrixMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// Dense row-major matrix of `f64`.
///
/// Row and column counts are stored explicitly so that a matrix whose
/// columns were all sliced away still reports its original row count.
#[derive(Debug, Clone)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
    metadata: MatrixMetadata,
}

impl Matrix {
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> CubeResult<Self> {
        let expected = rows * cols;
        if data.len() != expected {
            return Err(CubeError::Shape(format!(
                "Data length {} does not match shape [{}, {}] (expected {})",
                data.len(),
                rows,
                cols,
                expected
            )));
        }
        Ok(Self {
            rows,
            cols,
            data,
            metadata: MatrixMetadata::new(),
        })
    }

    /// Builds a matrix from row vectors. An empty slice yields a 0x0 matrix.
    pub fn from_rows(rows: &[Vec<f64>]) -> CubeResult<Self> {
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(CubeError::Shape(format!(
                    "Row {} has {} columns, expected {}",
                    i,
                    row.len(),
                    cols
                )));
            }
            data.extend_from_slice(row);
        }
        Self::new(rows.len(), cols, data)
    }

    pub fn with_lineage(mut self, lineage: Lineage) -> Self {
        self.metadata.lineage = Some(lineage);
        self
    }

    pub fn id(&self) -> MatrixId {
        self.metadata.id
    }

    pub fn metadata(&self) -> &MatrixMetadata {
        &self.metadata
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> [usize; 2] {
        [self.rows, self.cols]
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows && col < self.cols {
            Some(self.data[row * self.cols + col])
        } else {
            None
        }
    }

    pub fn row(&self, index: usize) -> Option<&[f64]> {
        if index >= self.rows {
            return None;
        }
        let start = index * self.cols;
        Some(&self.data[start..start + self.cols])
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.rows).map(move |r| &self.data[r * self.cols..(r + 1) * self.cols])
    }

    pub fn column(&self, index: usize) -> Option<Vec<f64>> {
        if index >= self.cols {
            return None;
        }
        Some(self.rows().map(|r| r[index]).collect())
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.rows().map(|r| r.to_vec()).collect()
    }

    pub fn is_zero_row(&self, index: usize) -> bool {
        self.row(index)
            .map(|r| r.iter().all(|v| *v == 0.0))
            .unwrap_or(false)
    }

    /// Copy of the matrix holding only the rows whose `keep` flag is set.
    pub fn select_rows(&self, keep: &[bool]) -> CubeResult<Matrix> {
        if keep.len() != self.rows {
            return Err(CubeError::Shape(format!(
                "Row selection has {} entries for a matrix with {} rows",
                keep.len(),
                self.rows
            )));
        }
        let mut data = Vec::with_capacity(self.data.len());
        let mut rows = 0;
        for (row, _) in self.rows().zip(keep).filter(|(_, &k)| k) {
            data.extend_from_slice(row);
            rows += 1;
        }
        Self::new(rows, self.cols, data)
    }

    /// Hex SHA-256 of the matrix contents, computed on first use.
    pub fn data_hash(&self) -> &str {
        self.metadata
            .data_hash
            .get_or_init(|| digest::matrix_sha256(self.rows, self.cols, &self.data))
    }
}
