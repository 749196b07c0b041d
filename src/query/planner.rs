use crate::core::error::{CubeError, CubeResult};
use crate::core::hierarchy::{union_indices, DimensionHierarchy};
use crate::engine::cube::Cube;
use crate::engine::operations::{Condition, Operation};
use crate::query::spec::{parse_column_key, ConditionSpec, Literal, PipelineStep};
use std::collections::BTreeMap;
use tracing::debug;

/// Operations ready to run, plus the original indices of the columns that
/// survive them (in original order).
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub operations: Vec<Operation>,
    pub kept_columns: Vec<usize>,
}

/// Turns pipeline steps into operations.
///
/// Steps address columns by their original index. The planner tracks
/// which original column sits at each matrix position after every slice,
/// so later steps still hit the right column. Consecutive slice and
/// roll-up steps are unioned into one `Slice`.
pub struct QueryPlanner<'a> {
    hierarchy: &'a DimensionHierarchy,
    cube: &'a Cube,
}

struct PlanState {
    /// original index of the column at each current position
    surviving: Vec<usize>,
    pending: Vec<Vec<usize>>,
    operations: Vec<Operation>,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(hierarchy: &'a DimensionHierarchy, cube: &'a Cube) -> Self {
        Self { hierarchy, cube }
    }

    pub fn plan(&self, steps: &[PipelineStep]) -> CubeResult<QueryPlan> {
        let mut state = PlanState {
            surviving: (0..self.cube.column_count()).collect(),
            pending: Vec::new(),
            operations: Vec::new(),
        };

        for step in steps {
            match step {
                PipelineStep::Filter { conditions } => {
                    self.flush_removals(&mut state)?;
                    let filter = self.build_filter(conditions, &state.surviving)?;
                    state.operations.push(filter);
                }
                PipelineStep::Slice { hierarchies } => {
                    state.pending.push(self.hierarchy.slice_by_hierarchy(hierarchies)?);
                }
                PipelineStep::Rollup { levels } => {
                    state.pending.push(self.hierarchy.roll_up_to_level(levels)?);
                }
            }
        }
        self.flush_removals(&mut state)?;

        Ok(QueryPlan {
            operations: state.operations,
            kept_columns: state.surviving,
        })
    }

    fn flush_removals(&self, state: &mut PlanState) -> CubeResult<()> {
        if state.pending.is_empty() {
            return Ok(());
        }
        let removal = union_indices(state.pending.drain(..));
        let total = self.cube.column_count();

        let mut positions = Vec::with_capacity(removal.len());
        for &idx in &removal {
            if idx >= total {
                return Err(CubeError::Index {
                    index: idx,
                    columns: total,
                });
            }
            match state.surviving.iter().position(|&s| s == idx) {
                Some(pos) => positions.push(pos),
                None => debug!(column = idx, "column already removed"),
            }
        }

        if !positions.is_empty() {
            state.operations.push(Operation::slice(positions));
            state.surviving.retain(|s| !removal.contains(s));
        }
        Ok(())
    }

    fn build_filter(
        &self,
        conditions: &BTreeMap<String, ConditionSpec>,
        surviving: &[usize],
    ) -> CubeResult<Operation> {
        let mut resolved = BTreeMap::new();
        for (key, spec) in conditions {
            let original = parse_column_key(key)?;
            if original >= self.cube.column_count() {
                return Err(CubeError::Index {
                    index: original,
                    columns: self.cube.column_count(),
                });
            }
            let position = surviving
                .iter()
                .position(|&s| s == original)
                .ok_or(CubeError::Index {
                    index: original,
                    columns: surviving.len(),
                })?;

            let condition = match spec {
                ConditionSpec::One(lit) => Condition::Equals(self.literal_value(original, lit)?),
                ConditionSpec::Many(lits) => Condition::OneOf(
                    lits.iter()
                        .map(|lit| self.literal_value(original, lit))
                        .collect::<CubeResult<Vec<_>>>()?,
                ),
            };
            resolved.insert(position, condition);
        }
        Ok(Operation::filter(resolved))
    }

    fn literal_value(&self, column: usize, literal: &Literal) -> CubeResult<f64> {
        match literal {
            Literal::Number(v) => Ok(*v),
            Literal::Label(label) => {
                let name = &self.cube.schema().columns[column].name;
                self.cube
                    .mapping()
                    .code(name, label)
                    .map(|c| c as f64)
                    .ok_or_else(|| {
                        CubeError::Encoding(format!(
                            "Label '{}' is not a category of column '{}'",
                            label, name
                        ))
                    })
            }
        }
    }
}
