// file: src/causal/mod.rs
// description: named-variable causal graph API module exports
// reference: internal module structure

pub mod edge;
pub mod graph;
pub mod variable;

pub use edge::{BidirectedEdge, DirectedEdge, Edge};
pub use graph::{CausalGraph, CompiledGraph, GraphSpec, GraphSummary, IdResult, VariableIndex, render_query};
pub use variable::Variable;
