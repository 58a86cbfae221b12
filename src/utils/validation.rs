// file: src/utils/validation.rs
// description: input validation for variable names, graph files and settings
// reference: input validation patterns

use crate::error::{PqpError, Result};
use std::fs;
use std::path::Path;

/// Words that cannot name a variable because the query syntax reserves them.
const RESERVED: &[&str] = &["do", "P", "HEDGE"];

/// Supported graph file formats, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    Dsl,
    Json,
}

pub struct Validator;

impl Validator {
    /// Letters, digits, `_` and `'`; must not start with a digit or `'`.
    pub fn validate_variable_name(name: &str) -> Result<()> {
        let mut chars = name.chars();
        let Some(first) = chars.next() else {
            return Err(PqpError::Validation("Variable name is empty".to_string()));
        };

        if !(first.is_alphabetic() || first == '_') {
            return Err(PqpError::Validation(format!(
                "Variable name must start with a letter or underscore: {}",
                name
            )));
        }

        if let Some(bad) = chars.find(|c| !(c.is_alphanumeric() || *c == '_' || *c == '\'')) {
            return Err(PqpError::Validation(format!(
                "Invalid character {:?} in variable name: {}",
                bad, name
            )));
        }

        if RESERVED.contains(&name) {
            return Err(PqpError::Validation(format!(
                "Variable name is reserved: {}",
                name
            )));
        }

        Ok(())
    }

    pub fn validate_file_path(path: &Path) -> Result<()> {
        let canonical = fs::canonicalize(path).map_err(|e| {
            PqpError::Validation(format!(
                "Cannot canonicalize path {}: {}",
                path.display(),
                e
            ))
        })?;

        if !canonical.is_file() {
            return Err(PqpError::Validation(format!(
                "Path is not a file: {}",
                canonical.display()
            )));
        }

        Ok(())
    }

    pub fn graph_format(path: &Path) -> Result<GraphFormat> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(GraphFormat::Json),
            Some("pqp") | Some("graph") | Some("txt") | None => Ok(GraphFormat::Dsl),
            Some(other) => Err(PqpError::Validation(format!(
                "Unsupported graph file extension .{}: {}",
                other,
                path.display()
            ))),
        }
    }

    pub fn validate_content_not_empty(content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(PqpError::Validation("Content is empty".to_string()));
        }
        Ok(())
    }

    pub fn validate_worker_count(workers: usize) -> Result<()> {
        if workers == 0 {
            return Err(PqpError::Validation(
                "Worker count must be greater than 0".to_string(),
            ));
        }

        if workers > 1024 {
            return Err(PqpError::Validation(
                "Worker count too large (max 1024)".to_string(),
            ));
        }

        Ok(())
    }

    pub fn validate_smoothing(smoothing: f64) -> Result<()> {
        if !smoothing.is_finite() || smoothing < 0.0 {
            return Err(PqpError::Validation(format!(
                "Smoothing must be a finite non-negative number, got {}",
                smoothing
            )));
        }
        Ok(())
    }

    pub fn truncate_text(text: &str, max_chars: usize) -> String {
        if text.chars().count() <= max_chars {
            text.to_string()
        } else {
            let cut: String = text.chars().take(max_chars).collect();
            format!("{}...", cut)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_validate_variable_name() {
        assert!(Validator::validate_variable_name("x").is_ok());
        assert!(Validator::validate_variable_name("blood_pressure").is_ok());
        assert!(Validator::validate_variable_name("x'").is_ok());
        assert!(Validator::validate_variable_name("").is_err());
        assert!(Validator::validate_variable_name("1x").is_err());
        assert!(Validator::validate_variable_name("a-b").is_err());
        assert!(Validator::validate_variable_name("do").is_err());
    }

    #[test]
    fn test_validate_file_path() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("graph.pqp");
        fs::write(&file_path, "x -> y").unwrap();

        assert!(Validator::validate_file_path(&file_path).is_ok());
        assert!(Validator::validate_file_path(temp.path()).is_err());
        assert!(Validator::validate_file_path(Path::new("/nonexistent")).is_err());
    }

    #[test]
    fn test_graph_format() {
        assert_eq!(
            Validator::graph_format(Path::new("g.json")).unwrap(),
            GraphFormat::Json
        );
        assert_eq!(
            Validator::graph_format(Path::new("g.pqp")).unwrap(),
            GraphFormat::Dsl
        );
        assert!(Validator::graph_format(Path::new("g.png")).is_err());
    }

    #[test]
    fn test_validate_settings() {
        assert!(Validator::validate_worker_count(4).is_ok());
        assert!(Validator::validate_worker_count(0).is_err());
        assert!(Validator::validate_smoothing(0.0).is_ok());
        assert!(Validator::validate_smoothing(-1.0).is_err());
        assert!(Validator::validate_smoothing(f64::NAN).is_err());
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(Validator::truncate_text("short", 10), "short");
        assert_eq!(Validator::truncate_text("Σ_{a} [ P(a) ]", 3), "Σ_{...");
    }
}
