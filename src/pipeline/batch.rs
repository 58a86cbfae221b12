// file: src/pipeline/batch.rs
// description: runs many identification queries against one graph concurrently
// reference: bounded concurrency with buffer_unordered over blocking tasks

use crate::causal::{CausalGraph, CompiledGraph, IdResult};
use crate::error::{PqpError, Result};
use crate::identification::IdentificationOptions;
use crate::parser::{Query, QueryParser};
use crate::pipeline::progress::{BatchStats, ProgressTracker};
use crate::utils::Validator;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// A query with a stable identifier used for reporting and export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub id: String,
    pub query: Query,
}

impl QuerySpec {
    /// Number queries `q001`, `q002`, ... in input order.
    pub fn numbered(queries: Vec<Query>) -> Vec<Self> {
        let width = queries.len().to_string().len().max(3);
        queries
            .into_iter()
            .enumerate()
            .map(|(i, query)| Self {
                id: format!("q{:0width$}", i + 1, width = width),
                query,
            })
            .collect()
    }

    /// Read queries from a `.json` array of [`Query`] objects, or from a text
    /// file with one query per line.
    pub fn load(path: &Path) -> Result<Vec<Self>> {
        Validator::validate_file_path(path)?;
        let content = fs::read_to_string(path).map_err(|source| PqpError::FileOperation {
            path: path.to_path_buf(),
            source,
        })?;
        Validator::validate_content_not_empty(&content)?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let queries = if is_json {
            serde_json::from_str::<Vec<Query>>(&content)?
        } else {
            QueryParser::new().parse_lines(&content)?
        };
        Ok(Self::numbered(queries))
    }
}

/// Result of one query in a batch; exactly one of `result` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub id: String,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<IdResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl QueryOutcome {
    pub fn is_identifiable(&self) -> bool {
        self.result.as_ref().is_some_and(|r| r.identifiable)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcomes: Vec<QueryOutcome>,
    pub stats: BatchStats,
}

pub struct BatchRunner {
    graph: Arc<CompiledGraph>,
    options: IdentificationOptions,
    max_concurrent_tasks: usize,
    show_progress: bool,
    colored: bool,
}

impl BatchRunner {
    pub fn new(graph: &CausalGraph, parallel_workers: usize) -> Result<Self> {
        Validator::validate_worker_count(parallel_workers)?;
        Ok(Self {
            graph: Arc::new(graph.compile()?),
            options: *graph.options(),
            max_concurrent_tasks: parallel_workers,
            show_progress: false,
            colored: true,
        })
    }

    pub fn with_options(mut self, options: IdentificationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_progress(mut self, show_progress: bool, colored: bool) -> Self {
        self.show_progress = show_progress;
        self.colored = colored;
        self
    }

    /// Identify every query. Failures are recorded per query and do not stop
    /// the batch; outcomes come back in input order.
    pub async fn run(&self, specs: Vec<QuerySpec>) -> Result<BatchReport> {
        if specs.is_empty() {
            warn!("No queries to run");
            return Ok(BatchReport {
                outcomes: Vec::new(),
                stats: BatchStats::new(),
            });
        }

        info!(
            "Running {} queries with {} concurrent tasks",
            specs.len(),
            self.max_concurrent_tasks
        );

        let progress = Arc::new(if self.show_progress {
            ProgressTracker::with_color(specs.len(), self.colored)
        } else {
            ProgressTracker::hidden(specs.len())
        });

        let tasks = specs.into_iter().enumerate().map(|(position, spec)| {
            let graph = Arc::clone(&self.graph);
            let progress = Arc::clone(&progress);
            let options = self.options;

            async move {
                let query = spec.query.to_string();
                let started = Instant::now();
                let identified = tokio::task::spawn_blocking(move || {
                    graph.idc(
                        &spec.query.outcome_refs(),
                        &spec.query.intervention_refs(),
                        &spec.query.condition_refs(),
                        &options,
                    )
                })
                .await;
                let elapsed_ms = started.elapsed().as_millis() as u64;

                let (result, error) = match identified {
                    Ok(Ok(result)) => {
                        if result.identifiable {
                            progress.inc_identified();
                        } else {
                            progress.inc_hedged();
                        }
                        (Some(result), None)
                    }
                    Ok(Err(e)) => {
                        progress.inc_failed();
                        warn!("Query {} failed: {}", spec.id, e);
                        (None, Some(e.to_string()))
                    }
                    Err(e) => {
                        progress.inc_failed();
                        error!("Identification task for {} panicked: {}", spec.id, e);
                        (None, Some(format!("identification task failed: {}", e)))
                    }
                };

                (
                    position,
                    QueryOutcome {
                        id: spec.id,
                        query,
                        result,
                        error,
                        elapsed_ms,
                    },
                )
            }
        });

        let mut outcomes: Vec<(usize, QueryOutcome)> = stream::iter(tasks)
            .buffer_unordered(self.max_concurrent_tasks)
            .collect()
            .await;
        outcomes.sort_by_key(|(position, _)| *position);

        let stats = progress.get_stats();
        progress.finish();
        info!("Batch finished: {}", stats.summary());

        Ok(BatchReport {
            outcomes: outcomes.into_iter().map(|(_, outcome)| outcome).collect(),
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::GraphParser;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn frontdoor() -> CausalGraph {
        GraphParser::new().parse("x -> m -> y\nx <-> y").unwrap()
    }

    fn specs(lines: &str) -> Vec<QuerySpec> {
        QuerySpec::numbered(QueryParser::new().parse_lines(lines).unwrap())
    }

    #[test]
    fn test_numbered_ids() {
        let numbered = specs("y\ny | do(x)");
        assert_eq!(numbered[0].id, "q001");
        assert_eq!(numbered[1].id, "q002");
    }

    #[tokio::test]
    async fn test_batch_outcomes_in_order() {
        let runner = BatchRunner::new(&frontdoor(), 3).unwrap();
        let report = runner
            .run(specs("y | do(x)\nm | do(x)\nx | do(y)\ny | do(m)\nq | do(x)"))
            .await
            .unwrap();

        let ids: Vec<&str> = report.outcomes.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["q001", "q002", "q003", "q004", "q005"]);
        assert!(report.outcomes.iter().take(4).all(|o| o.is_identifiable()));
        assert!(report.outcomes[4].error.is_some());

        assert_eq!(report.stats.identified, 4);
        assert_eq!(report.stats.failed, 1);
    }

    #[tokio::test]
    async fn test_batch_counts_hedges() {
        let bow = GraphParser::new().parse("x -> y\nx <-> y").unwrap();
        let runner = BatchRunner::new(&bow, 2).unwrap();
        let report = runner.run(specs("y | do(x)\nx")).await.unwrap();

        assert_eq!(report.stats.hedged, 1);
        assert_eq!(report.stats.identified, 1);
        assert!(!report.outcomes[0].is_identifiable());
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let runner = BatchRunner::new(&frontdoor(), 1).unwrap();
        let report = runner.run(Vec::new()).await.unwrap();
        assert!(report.outcomes.is_empty());
        assert_eq!(report.stats.total(), 0);
    }

    #[test]
    fn test_invalid_worker_count() {
        assert!(BatchRunner::new(&frontdoor(), 0).is_err());
    }

    #[test]
    fn test_load_query_files() {
        let temp = TempDir::new().unwrap();
        let text = temp.path().join("queries.txt");
        fs::write(&text, "# frontdoor\ny | do(x)\nm | do(x)\n").unwrap();
        let json = temp.path().join("queries.json");
        fs::write(&json, r#"[{"outcome": ["y"], "intervention": ["x"]}]"#).unwrap();

        assert_eq!(QuerySpec::load(&text).unwrap().len(), 2);
        let loaded = QuerySpec::load(&json).unwrap();
        assert_eq!(loaded[0].query, Query::new(&["y"], &["x"], &[]));
    }
}
