// file: src/error.rs
// description: Custom error types and result type aliases
// reference: https://docs.rs/thiserror

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PqpError>;

#[derive(Error, Debug)]
pub enum PqpError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Variable {0} not found in graph")]
    UnknownVariable(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Graph contains a directed cycle through: {0}")]
    Cycle(String),

    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Estimation error: {0}")]
    Estimation(String),

    #[error("Query is not identifiable: {0}")]
    NotIdentifiable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Value {value} of {variable} is not in domain {domain}")]
    DomainValidation {
        variable: String,
        value: String,
        domain: String,
    },

    #[error("File operation failed for {path}: {source}")]
    FileOperation {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for PqpError {
    fn from(err: serde_json::Error) -> Self {
        PqpError::Json(err.to_string())
    }
}
