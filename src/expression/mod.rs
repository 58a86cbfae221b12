// file: src/expression/mod.rs
// description: probability expression algebra module exports
// reference: internal module structure

pub mod form;
pub mod json;
pub mod render;
pub mod simplify;

pub use form::{Expression, Form};
pub use json::{from_json_value, parse_json};
pub use simplify::{DEFAULT_MAX_PASSES, simplify, simplify_with_passes};
