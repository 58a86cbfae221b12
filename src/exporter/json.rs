// file: src/exporter/json.rs
// description: json export of batch identification results

use crate::error::{PqpError, Result};
use crate::pipeline::{BatchReport, BatchStats, QueryOutcome};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct JsonExporter {
    output_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportManifest {
    pub exported_at: String,
    pub total_queries: usize,
    pub stats: BatchStats,
    pub files: Vec<String>,
}

pub const MANIFEST_FILE: &str = "manifest.json";

impl JsonExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir).map_err(|source| PqpError::FileOperation {
            path: output_dir.clone(),
            source,
        })?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// One `<id>.json` per outcome plus `manifest.json` listing them.
    pub fn export_report(&self, report: &BatchReport, pretty: bool) -> Result<ExportManifest> {
        info!("Starting JSON export to {:?}", self.output_dir);

        let mut files = Vec::with_capacity(report.outcomes.len());
        for outcome in &report.outcomes {
            files.push(self.export_outcome(outcome, pretty)?);
        }

        let manifest = ExportManifest {
            exported_at: Utc::now().to_rfc3339(),
            total_queries: report.outcomes.len(),
            stats: report.stats.clone(),
            files,
        };
        self.write(MANIFEST_FILE, &manifest, pretty)?;

        info!("Export complete: {} results exported", manifest.total_queries);
        Ok(manifest)
    }

    pub fn export_outcome(&self, outcome: &QueryOutcome, pretty: bool) -> Result<String> {
        let file_name = format!("{}.json", sanitize(&outcome.id));
        self.write(&file_name, outcome, pretty)?;
        Ok(file_name)
    }

    fn write<T: Serialize>(&self, file_name: &str, value: &T, pretty: bool) -> Result<()> {
        let path = self.output_dir.join(file_name);
        let json = if pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        fs::write(&path, json).map_err(|source| PqpError::FileOperation {
            path: path.clone(),
            source,
        })?;
        debug!("Wrote {}", path.display());
        Ok(())
    }
}

/// Keep ids usable as file names.
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
