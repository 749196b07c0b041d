// src/engine/kernels.rs

use crate::core::error::{CubeError, CubeResult};
use crate::core::matrix::Matrix;

/// Verifica que un índice de columna exista en la matriz
pub fn ensure_column(matrix: &Matrix, index: usize) -> CubeResult<()> {
    if index >= matrix.column_count() {
        Err(CubeError::Index {
            index,
            columns: matrix.column_count(),
        })
    } else {
        Ok(())
    }
}

/// Devuelve una copia con ceros en cada fila cuyo valor en `mask` sea false.
/// El número de filas y columnas no cambia.
pub fn zero_rows(matrix: &Matrix, mask: &[bool]) -> CubeResult<Matrix> {
    if mask.len() != matrix.row_count() {
        return Err(CubeError::Shape(format!(
            "Row mask has {} entries for a matrix with {} rows",
            mask.len(),
            matrix.row_count()
        )));
    }

    let mut data = Vec::with_capacity(matrix.data().len());
    for (row, &keep) in matrix.rows().zip(mask.iter()) {
        if keep {
            data.extend_from_slice(row);
        } else {
            data.extend(std::iter::repeat(0.0).take(row.len()));
        }
    }
    Matrix::new(matrix.row_count(), matrix.column_count(), data)
}

/// Rangos contiguos `[start, end)` de columnas que NO están en `remove`.
/// `remove` debe venir ordenado y sin duplicados.
pub fn kept_ranges(column_count: usize, remove: &[usize]) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start = 0;
    for &col in remove {
        if col > start {
            ranges.push((start, col));
        }
        start = col + 1;
    }
    if start < column_count {
        ranges.push((start, column_count));
    }
    ranges
}

/// Concatena, fila a fila, los rangos de columnas conservados en orden
/// ascendente. El orden resultante es siempre el orden original de las
/// columnas.
pub fn concat_column_ranges(matrix: &Matrix, ranges: &[(usize, usize)]) -> CubeResult<Matrix> {
    let cols: usize = ranges.iter().map(|(s, e)| e - s).sum();
    let mut data = Vec::with_capacity(matrix.row_count() * cols);
    for row in matrix.rows() {
        for &(s, e) in ranges {
            data.extend_from_slice(&row[s..e]);
        }
    }
    Matrix::new(matrix.row_count(), cols, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kept_ranges() {
        assert_eq!(kept_ranges(4, &[]), vec![(0, 4)]);
        assert_eq!(kept_ranges(4, &[1, 2]), vec![(0, 1), (3, 4)]);
        assert_eq!(kept_ranges(4, &[0, 3]), vec![(1, 3)]);
        assert!(kept_ranges(2, &[0, 1]).is_empty());
    }

    #[test]
    fn test_zero_rows() {
        let m = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let out = zero_rows(&m, &[false, true]).unwrap();
        assert_eq!(out.to_rows(), vec![vec![0.0, 0.0], vec![3.0, 4.0]]);
        assert!(zero_rows(&m, &[true]).is_err());
    }

    #[test]
    fn test_concat_ranges_preserves_rows() {
        let m = Matrix::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        let out = concat_column_ranges(&m, &[(0, 1), (2, 3)]).unwrap();
        assert_eq!(out.to_rows(), vec![vec![1.0, 3.0], vec![4.0, 6.0]]);

        let empty = concat_column_ranges(&m, &[]).unwrap();
        assert_eq!(empty.shape(), [2, 0]);
    }
}
