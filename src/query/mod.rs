pub mod planner;
pub mod spec;

pub use planner::{QueryPlan, QueryPlanner};
pub use spec::{ConditionSpec, Literal, PipelineSpec, PipelineStep};

use crate::core::config::QueryConfig;
use crate::core::error::CubeResult;
use crate::core::hierarchy::DimensionHierarchy;
use crate::core::matrix::Matrix;
use crate::core::table::Table;
use crate::engine::cube::Cube;
use crate::engine::pipeline::Pipeline;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Remove rows that failed a filter before decoding
    pub drop_zero_rows: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            drop_zero_rows: true,
        }
    }
}

impl From<&QueryConfig> for QueryOptions {
    fn from(config: &QueryConfig) -> Self {
        Self {
            drop_zero_rows: config.drop_zero_rows,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryResult {
    /// Matrix the pipeline started from
    pub input: Matrix,
    /// Pipeline output, zeroed rows included
    pub output: Matrix,
    /// false for every row some filter zeroed
    pub passed_filters: Vec<bool>,
    /// Decoded result in the original relative column order
    pub table: Table,
    pub plan: QueryPlan,
}

impl QueryResult {
    pub fn kept_column_names(&self) -> Vec<&str> {
        self.table.schema().names()
    }
}

/// Runs one query against a cube: plan, execute, decode.
///
/// Nothing is returned unless every step succeeds.
pub fn execute_query(
    cube: &Cube,
    hierarchy: &DimensionHierarchy,
    spec: &PipelineSpec,
    options: &QueryOptions,
) -> CubeResult<QueryResult> {
    hierarchy.validate_against(cube.schema())?;

    let input = cube.to_matrix()?;
    let plan = QueryPlanner::new(hierarchy, cube).plan(spec.steps())?;
    info!(
        steps = spec.steps().len(),
        operations = plan.operations.len(),
        rows = input.row_count(),
        columns = input.column_count(),
        "executing query"
    );

    let run = Pipeline::new(plan.operations.clone()).run_tracked(&input)?;

    let visible = if options.drop_zero_rows {
        run.output.select_rows(&run.passed)?
    } else {
        run.output.clone()
    };

    let kept: Vec<&str> = plan
        .kept_columns
        .iter()
        .map(|&i| cube.schema().columns[i].name.as_str())
        .collect();
    let table = cube.decode_columns(&kept, &visible)?;

    info!(
        rows = table.row_count(),
        columns = table.column_count(),
        "query finished"
    );
    Ok(QueryResult {
        input,
        output: run.output,
        passed_filters: run.passed,
        table,
        plan,
    })
}
