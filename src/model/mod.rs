// file: src/model/mod.rs
// description: causal model module exports
// reference: internal module structure

pub mod causal_model;
pub mod examples;
pub mod separation;

pub use causal_model::{Model, ModelBuilder};
