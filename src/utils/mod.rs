// file: src/utils/mod.rs
// description: utility functions module exports
// reference: internal module structure

pub mod logging;
pub mod step;
pub mod telemetry;
pub mod validation;

pub use step::{Entry, Step};
pub use telemetry::{OperationTimer, PerformanceMetrics, SimplificationStats};
pub use validation::{GraphFormat, Validator};
