// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/readme.md"))]

pub mod causal;
pub mod config;
pub mod error;
pub mod estimation;
pub mod exporter;
pub mod expression;
pub mod graph;
pub mod identification;
pub mod mcp;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod utils;

pub use causal::{BidirectedEdge, CausalGraph, DirectedEdge, Edge, GraphSpec, GraphSummary, IdResult, Variable};
pub use config::{Config, OutputFormat};
pub use error::{PqpError, Result};
pub use estimation::{Dataset, EffectEstimate, JointDistribution, MultinomialEstimator, VariableDomain};
pub use exporter::{ExportManifest, JsonExporter};
pub use expression::{Expression, Form, parse_json, simplify};
pub use identification::{CausalEstimand, IdentificationOptions, IdentifiedEstimand, id, idc};
pub use model::{Model, ModelBuilder};
pub use parser::{GraphParser, Query, QueryParser};
pub use pipeline::{BatchRunner, BatchStats, QuerySpec};
pub use utils::{OperationTimer, PerformanceMetrics, Validator};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let _config = Config::default_config();
        let graph = GraphParser::new().parse("x -> y").unwrap();
        let result = graph.idc(&["y"], &["x"], &[]).unwrap();
        assert!(result.identifiable);
        assert_eq!(result.estimand, Expression::cond_prob(["y".to_string()], ["x".to_string()]));
    }
}
