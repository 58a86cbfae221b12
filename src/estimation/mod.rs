// file: src/estimation/mod.rs
// description: numeric estimation module exports
// reference: internal module structure

pub mod dataset;
pub mod distribution;
pub mod domain;
pub mod estimator;
pub mod evaluate;

pub use dataset::Dataset;
pub use distribution::{Domain, JointDistribution, Record, load_records, parse_records};
pub use domain::VariableDomain;
pub use estimator::{DistributionEstimate, EffectEstimate, MultinomialEstimator};
pub use evaluate::{Evaluator, evaluate};
