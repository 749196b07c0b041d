pub mod cube;
pub mod kernels;
pub mod operations;
pub mod pipeline;

pub use cube::Cube;
pub use operations::{Condition, Filter, Operation, Slice, Transform};
pub use pipeline::{Pipeline, PipelineRun};
