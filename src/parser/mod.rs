// file: src/parser/mod.rs
// description: graph and query parsing module exports
// reference: internal module structure

pub mod graph_dsl;
pub mod query;

pub use graph_dsl::{GraphParser, to_dsl};
pub use query::{Query, QueryParser};
