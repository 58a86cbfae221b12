// file: src/pipeline/mod.rs
// description: batch identification pipeline exports
// reference: pipeline orchestration

mod batch;
mod progress;

pub use batch::{BatchReport, BatchRunner, QueryOutcome, QuerySpec};
pub use progress::{BatchStats, ProgressTracker};
