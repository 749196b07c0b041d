use crate::core::error::{CubeError, CubeResult};
use crate::core::matrix::{ExecutionId, Lineage, Matrix};
use crate::engine::kernels;
use crate::engine::operations::{Operation, Transform};
use tracing::debug;

/// Ordered list of operations applied left to right, each consuming the
/// previous output. A failing step aborts the whole run.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    operations: Vec<Operation>,
}

impl Pipeline {
    pub fn new(operations: Vec<Operation>) -> Self {
        Self { operations }
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn run(&self, input: &Matrix) -> CubeResult<Matrix> {
        self.run_tracked(input).map(|run| run.output)
    }

    /// Runs the pipeline and records which rows passed every filter.
    pub fn run_tracked(&self, input: &Matrix) -> CubeResult<PipelineRun> {
        let execution_id = ExecutionId::new();
        let mut current = input.clone();
        let mut passed = vec![true; input.row_count()];

        for (step, operation) in self.operations.iter().enumerate() {
            let output = match operation {
                Operation::Filter(filter) => {
                    let mask = filter.row_mask(&current)?;
                    for (p, keep) in passed.iter_mut().zip(&mask) {
                        *p &= *keep;
                    }
                    kernels::zero_rows(&current, &mask)?
                }
                Operation::Slice(_) => operation.transform(&current)?,
            };
            check_shape(operation, &current, &output)?;
            debug!(
                step,
                operation = %operation,
                rows = output.row_count(),
                columns = output.column_count(),
                "applied operation"
            );
            current = output.with_lineage(Lineage {
                execution_id,
                operation: operation.to_string(),
                input: current.id(),
            });
        }

        Ok(PipelineRun {
            output: current,
            passed,
        })
    }
}

/// Output of a pipeline run. `passed[i]` is false when some filter zeroed
/// row `i`.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub output: Matrix,
    pub passed: Vec<bool>,
}

fn check_shape(operation: &Operation, input: &Matrix, output: &Matrix) -> CubeResult<()> {
    let expected_cols = match operation {
        Operation::Filter(_) => input.column_count(),
        Operation::Slice(slice) => input.column_count() - slice.removed().len(),
    };
    if output.row_count() != input.row_count() || output.column_count() != expected_cols {
        return Err(CubeError::Shape(format!(
            "{} turned [{}, {}] into [{}, {}], expected [{}, {}]",
            operation,
            input.row_count(),
            input.column_count(),
            output.row_count(),
            output.column_count(),
            input.row_count(),
            expected_cols
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::operations::Condition;
    use std::collections::BTreeMap;

    fn sample() -> Matrix {
        Matrix::from_rows(&[vec![2020.0, 1.0, 15.0, 9.99], vec![2021.0, 6.0, 1.0, 5.00]]).unwrap()
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let out = Pipeline::default().run(&sample()).unwrap();
        assert_eq!(out.to_rows(), sample().to_rows());
    }

    #[test]
    fn test_operations_apply_in_order() {
        let pipeline = Pipeline::new(vec![
            Operation::filter(BTreeMap::from([(0, Condition::Equals(2020.0))])),
            Operation::slice([1, 2]),
        ]);
        let out = pipeline.run(&sample()).unwrap();
        assert_eq!(out.to_rows(), vec![vec![2020.0, 9.99], vec![0.0, 0.0]]);

        let lineage = out.metadata().lineage.as_ref().unwrap();
        assert_eq!(lineage.operation, "SLICE(remove=[1, 2])");
    }

    #[test]
    fn test_tracked_run_marks_filtered_rows() {
        let pipeline = Pipeline::new(vec![
            Operation::filter(BTreeMap::from([(3, Condition::OneOf(vec![9.99, 5.0]))])),
            Operation::slice([0]),
            Operation::filter(BTreeMap::from([(0, Condition::Equals(6.0))])),
        ]);
        let run = pipeline.run_tracked(&sample()).unwrap();
        assert_eq!(run.passed, vec![false, true]);
        assert_eq!(run.output.to_rows(), vec![vec![0.0, 0.0, 0.0], vec![6.0, 1.0, 5.0]]);

        // a zeroed row stays filtered even if a later condition matches zero
        let zero_match = Pipeline::new(vec![
            Operation::filter(BTreeMap::from([(0, Condition::Equals(2021.0))])),
            Operation::filter(BTreeMap::from([(1, Condition::OneOf(vec![0.0, 6.0]))])),
        ]);
        assert_eq!(zero_match.run_tracked(&sample()).unwrap().passed, vec![false, true]);

        let slice_only = Pipeline::new(vec![Operation::slice([0, 1, 2, 3])]);
        assert_eq!(slice_only.run_tracked(&sample()).unwrap().passed, vec![true, true]);
    }

    #[test]
    fn test_failure_aborts_run() {
        let pipeline = Pipeline::new(vec![
            Operation::slice([1, 2]),
            // column 3 no longer exists after the slice
            Operation::filter(BTreeMap::from([(3, Condition::Equals(1.0))])),
        ]);
        assert!(matches!(
            pipeline.run(&sample()),
            Err(CubeError::Index { index: 3, columns: 2 })
        ));
    }
}
