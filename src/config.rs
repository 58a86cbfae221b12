// file: src/config.rs
// description: application configuration management with toml support
// reference: https://docs.rs/config

use crate::error::{PqpError, Result};
use crate::expression::{DEFAULT_MAX_PASSES, Expression};
use crate::identification::IdentificationOptions;
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub identification: IdentificationConfig,
    pub output: OutputConfig,
    pub batch: BatchConfig,
    pub export: ExportConfig,
    pub estimation: EstimationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IdentificationConfig {
    pub simplify: bool,
    pub max_simplify_passes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Latex,
    Json,
}

impl OutputFormat {
    pub fn render<T: Ord + Serialize + std::fmt::Display>(&self, expr: &Expression<T>, pretty: bool) -> Result<String> {
        match self {
            OutputFormat::Text => Ok(expr.to_string()),
            OutputFormat::Latex => Ok(expr.to_latex()),
            OutputFormat::Json if pretty => expr.to_json_pretty(),
            OutputFormat::Json => expr.to_json(),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = PqpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "latex" => Ok(OutputFormat::Latex),
            "json" => Ok(OutputFormat::Json),
            other => Err(PqpError::Config(format!("unknown output format {}", other))),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub pretty: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
    pub parallel_workers: usize,
    pub show_progress: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportConfig {
    pub output_dir: PathBuf,
    pub pretty: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EstimationConfig {
    /// Virtual observations spread over the joint domain.
    pub smoothing: f64,
    /// Bins used when a real-valued column has to be made discrete.
    pub quantize_bins: usize,
}

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    /// Built-in defaults, then `path` (or the optional default file), then
    /// `PQP__SECTION__KEY` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_layers(path, Path::new(DEFAULT_CONFIG_PATH))
    }

    fn load_layers(path: Option<&Path>, default_file: &Path) -> Result<Self> {
        dotenv().ok();

        let defaults = config::Config::try_from(&Self::default_config())
            .map_err(|e| PqpError::Config(e.to_string()))?;
        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder.add_source(config::File::from(default_file).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("PQP")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| PqpError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| PqpError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            identification: IdentificationConfig {
                simplify: true,
                max_simplify_passes: DEFAULT_MAX_PASSES,
            },
            output: OutputConfig {
                format: OutputFormat::Text,
                pretty: true,
            },
            batch: BatchConfig {
                parallel_workers: 4,
                show_progress: true,
            },
            export: ExportConfig {
                output_dir: PathBuf::from("./exports"),
                pretty: true,
            },
            estimation: EstimationConfig {
                smoothing: 1.0,
                quantize_bins: 2,
            },
        }
    }

    pub fn identification_options(&self) -> IdentificationOptions {
        IdentificationOptions {
            simplify: self.identification.simplify,
            max_passes: self.identification.max_simplify_passes,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch.parallel_workers == 0 {
            return Err(PqpError::Config(
                "parallel_workers must be greater than 0".to_string(),
            ));
        }

        if self.identification.max_simplify_passes == 0 {
            return Err(PqpError::Config(
                "max_simplify_passes must be greater than 0".to_string(),
            ));
        }

        if !self.estimation.smoothing.is_finite() || self.estimation.smoothing < 0.0 {
            return Err(PqpError::Config(
                "smoothing must be a non-negative number".to_string(),
            ));
        }

        if self.estimation.quantize_bins == 0 {
            return Err(PqpError::Config(
                "quantize_bins must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.identification_options(), IdentificationOptions::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default_config();
        config.batch.parallel_workers = 0;
        assert!(matches!(config.validate(), Err(PqpError::Config(_))));

        let mut config = Config::default_config();
        config.identification.max_simplify_passes = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default_config();
        config.estimation.smoothing = -0.5;
        assert!(config.validate().is_err());

        let mut config = Config::default_config();
        config.estimation.quantize_bins = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_output_formats() {
        let expr: Expression<String> = Expression::cond_prob(["y".to_string()], ["x".to_string()]);
        assert_eq!(OutputFormat::Text.render(&expr, false).unwrap(), "P(y | x)");
        assert_eq!(OutputFormat::Latex.render(&expr, false).unwrap(), "P(y \\mid x)");
        assert_eq!(
            OutputFormat::Json.render(&expr, false).unwrap(),
            r#"{"type":"P","vars":["y"],"given":["x"]}"#
        );
        assert_eq!("LaTeX".parse::<OutputFormat>().unwrap(), OutputFormat::Latex);
        assert!("html".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pqp.toml");
        fs::write(
            &path,
            r#"
[identification]
simplify = false
max_simplify_passes = 8

[output]
format = "latex"
pretty = false

[batch]
parallel_workers = 2
show_progress = false

[export]
output_dir = "out"
pretty = true

[estimation]
smoothing = 0.5
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert!(!config.identification.simplify);
        assert_eq!(config.output.format, OutputFormat::Latex);
        assert_eq!(config.batch.parallel_workers, 2);
        assert_eq!(config.estimation.smoothing, 0.5);
        assert_eq!(
            config.identification_options(),
            IdentificationOptions {
                simplify: false,
                max_passes: 8,
            }
        );
    }

    #[test]
    fn test_missing_default_file_falls_back_to_builtins() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_layers(None, &temp.path().join("default.toml")).unwrap();
        assert_eq!(config.output.format, OutputFormat::Text);
        assert_eq!(config.batch.parallel_workers, 4);
        assert_eq!(config.estimation.quantize_bins, 2);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pqp.toml");
        fs::write(&path, "[output]\nformat = \"json\"\npretty = false\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(!config.output.pretty);
        assert_eq!(config.estimation.smoothing, 1.0);
        assert!(config.identification.simplify);
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.toml");
        assert!(matches!(Config::load(Some(&missing)), Err(PqpError::Config(_))));
    }
}
