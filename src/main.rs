// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use anyhow::{Context, Result, anyhow};
use clap::{ArgAction, Parser, Subcommand};
use pqp::config::OutputFormat;
use pqp::expression::simplify_with_passes;
use pqp::identification::Assignment;
use pqp::mcp::PqpMcp;
use pqp::utils::logging::{
    format_error, format_identified, format_info, format_step, format_success, format_warning,
};
use pqp::utils::{OperationTimer, SimplificationStats};
use pqp::{
    BatchRunner, CausalGraph, Config, Dataset, Expression, GraphParser, JsonExporter, MultinomialEstimator, Query,
    QuerySpec, parse_json,
};
use rmcp::{ServiceExt, transport::stdio};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

/// Identification or fitting slower than this is reported.
const SLOW_OPERATION: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "pqp")]
#[command(version)]
#[command(about = "Causal effect identification and estimation over acyclic directed mixed graphs", long_about = None)]
struct Cli {
    /// Configuration file; config/default.toml is read when present
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Identify an interventional query such as "y | do(x), z"
    Identify {
        #[arg(short, long, value_name = "FILE")]
        graph: PathBuf,

        query: String,

        /// text, latex or json; defaults to the configured format
        #[arg(short, long)]
        format: Option<OutputFormat>,

        /// Print the estimand exactly as the algorithm builds it
        #[arg(long)]
        raw: bool,

        /// Also print the rules that produced the estimand
        #[arg(long)]
        explain: bool,
    },

    /// Simplify an expression given in the JSON wire format
    Simplify {
        /// Expression JSON, or @path to read it from a file
        expression: String,

        #[arg(short, long)]
        format: Option<OutputFormat>,
    },

    /// Validate a graph and print its structure
    Check {
        #[arg(short, long, value_name = "FILE")]
        graph: PathBuf,
    },

    /// Identify every query of a file and export the results
    Batch {
        #[arg(short, long, value_name = "FILE")]
        graph: PathBuf,

        /// One query per line, or a JSON array of queries
        #[arg(short, long, value_name = "FILE")]
        queries: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long, value_name = "NUM")]
        workers: Option<usize>,
    },

    /// Estimate an identified quantity from categorical records
    Estimate {
        #[arg(short, long, value_name = "FILE")]
        graph: PathBuf,

        /// JSON array of records
        #[arg(short, long, value_name = "FILE")]
        data: PathBuf,

        /// Interventional query with values, e.g. "y | do(x=1)"
        #[arg(short, long, conflicts_with = "outcome")]
        query: Option<String>,

        /// Outcome of an average treatment effect
        #[arg(long, requires = "treatment")]
        outcome: Option<String>,

        /// Treated arm, e.g. x=1; a bare binary variable means x=1 against x=0
        #[arg(long, value_delimiter = ',')]
        treatment: Vec<String>,

        /// Control arm, e.g. x=0
        #[arg(long, value_delimiter = ',')]
        control: Vec<String>,

        /// Subpopulation for a conditional effect, e.g. z=1
        #[arg(long, value_delimiter = ',')]
        given: Vec<String>,

        #[arg(long)]
        smoothing: Option<f64>,

        /// Variables that were measured; defaults to every graph variable
        #[arg(long, value_delimiter = ',')]
        observed: Vec<String>,

        /// Quantize a numeric column before fitting, e.g. age=4
        #[arg(long, value_delimiter = ',')]
        quantize: Vec<String>,

        /// Bins for real-valued columns not named in --quantize
        #[arg(long)]
        bins: Option<usize>,

        /// Also print the steps and assumptions behind the estimate
        #[arg(long)]
        explain: bool,
    },

    /// Start MCP (Model Context Protocol) server for agentic tool integration
    Mcp {
        #[arg(long, default_value = "stdio")]
        transport: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    pqp::utils::logging::init_logger(cli.color, cli.verbose);
    colored::control::set_override(cli.color);

    if let Some(path) = &cli.config {
        info!("Loading configuration from: {}", path.display());
    }
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Identify {
            graph,
            query,
            format,
            raw,
            explain,
        } => cmd_identify(&config, &graph, &query, format, raw, explain)?,
        Commands::Simplify { expression, format } => cmd_simplify(&config, &expression, format)?,
        Commands::Check { graph } => cmd_check(&graph)?,
        Commands::Batch {
            graph,
            queries,
            output,
            workers,
        } => cmd_batch(&config, &graph, &queries, output, workers, cli.color).await?,
        Commands::Estimate {
            graph,
            data,
            query,
            outcome,
            treatment,
            control,
            given,
            smoothing,
            observed,
            quantize,
            bins,
            explain,
        } => {
            let target = match (query, outcome) {
                (Some(query), _) => EstimateTarget::Query(query),
                (None, Some(outcome)) => EstimateTarget::Effect {
                    outcome,
                    treatment,
                    control,
                    given,
                },
                (None, None) => return Err(anyhow!("pass either --query or --outcome with --treatment")),
            };
            let fit = FitArgs {
                smoothing,
                observed,
                quantize,
                bins,
            };
            cmd_estimate(&config, &graph, &data, target, fit, explain)?
        }
        Commands::Mcp { transport } => cmd_mcp(&config, &transport).await?,
    }

    Ok(())
}

fn load_graph(config: &Config, path: &Path) -> Result<CausalGraph> {
    let graph = GraphParser::new()
        .parse_file(path)
        .with_context(|| format!("Failed to read graph from {}", path.display()))?;
    Ok(graph.with_options(config.identification_options()))
}

fn cmd_identify(
    config: &Config,
    graph: &Path,
    query: &str,
    format: Option<OutputFormat>,
    raw: bool,
    explain: bool,
) -> Result<()> {
    let mut graph = load_graph(config, graph)?;
    if raw {
        graph = graph.with_options(pqp::IdentificationOptions::raw());
    }
    let query: Query = query.parse().context("Failed to parse query")?;

    let timer = OperationTimer::new("identification");
    let result = graph.idc(
        &query.outcome_refs(),
        &query.intervention_refs(),
        &query.condition_refs(),
    )?;
    timer.warn_if_slow(SLOW_OPERATION, "identifying the query");
    timer.finish();

    let format = format.unwrap_or(config.output.format);
    if format == OutputFormat::Json {
        let json = if config.output.pretty {
            serde_json::to_string_pretty(&result)?
        } else {
            serde_json::to_string(&result)?
        };
        println!("{}", json);
    } else {
        let rendered = format.render(&result.estimand, config.output.pretty)?;
        println!("{}", format_identified(&result.query, &rendered, result.identifiable));
    }
    if explain && format != OutputFormat::Json {
        print!("{}", result.explain());
    }
    Ok(())
}

fn cmd_simplify(config: &Config, expression: &str, format: Option<OutputFormat>) -> Result<()> {
    let input = match expression.strip_prefix('@') {
        Some(path) => fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?,
        None => expression.to_string(),
    };
    let raw: Expression<String> = parse_json(&input).context("Failed to parse expression")?;
    let simplified = simplify_with_passes(&raw, config.identification.max_simplify_passes);

    let stats = SimplificationStats::measure(&raw, &simplified);
    info!(
        "Simplified {} nodes to {} ({:.0}% smaller)",
        stats.raw_size,
        stats.simplified_size,
        stats.reduction() * 100.0
    );

    let format = format.unwrap_or(config.output.format);
    println!("{}", format.render(&simplified, config.output.pretty)?);
    Ok(())
}

fn cmd_check(path: &Path) -> Result<()> {
    let graph = GraphParser::new()
        .parse_file(path)
        .with_context(|| format!("Failed to read graph from {}", path.display()))?;

    match graph.describe() {
        Ok(summary) => {
            println!("{}", format_success(&format!("{} is a valid causal graph", path.display())));
            println!(
                "{}",
                format_info(&format!(
                    "{} variables, {} directed edges, {} bidirected edges",
                    summary.variables.len(),
                    summary.directed_edges,
                    summary.bidirected_edges
                ))
            );
            println!("{}", format_info(&format!("order: {}", summary.topological_order.join(", "))));
            for component in &summary.c_components {
                println!("{}", format_info(&format!("c-component: {{{}}}", component.join(", "))));
            }
            Ok(())
        }
        Err(e) => {
            println!("{}", format_error(&e.to_string()));
            Err(anyhow!("{} is not a valid causal graph", path.display()))
        }
    }
}

async fn cmd_batch(
    config: &Config,
    graph: &Path,
    queries: &Path,
    output: Option<PathBuf>,
    workers: Option<usize>,
    color: bool,
) -> Result<()> {
    println!("{}", format_step(1, 3, "Loading graph and queries"));
    let graph = load_graph(config, graph)?;
    let specs = QuerySpec::load(queries)
        .with_context(|| format!("Failed to read queries from {}", queries.display()))?;
    info!("Loaded {} queries", specs.len());

    println!("{}", format_step(2, 3, "Identifying"));
    let timer = OperationTimer::new("batch identification");
    let runner = BatchRunner::new(&graph, workers.unwrap_or(config.batch.parallel_workers))?
        .with_progress(config.batch.show_progress, color);
    let report = runner.run(specs).await?;
    let metrics = timer.finish_with_count(report.outcomes.len());

    for outcome in &report.outcomes {
        match (&outcome.result, &outcome.error) {
            (Some(result), _) => {
                let rendered = config.output.format.render(&result.estimand, false)?;
                println!("{}", format_identified(&result.query, &rendered, result.identifiable));
            }
            (None, Some(err)) => println!("{}", format_error(&format!("{}: {}", outcome.query, err))),
            (None, None) => error!("Query {} produced no result", outcome.id),
        }
    }

    println!("{}", format_step(3, 3, "Exporting"));
    let output_dir = output.unwrap_or_else(|| config.export.output_dir.clone());
    let exporter = JsonExporter::new(&output_dir)?;
    let manifest = exporter.export_report(&report, config.export.pretty)?;

    println!(
        "{}",
        format_success(&format!(
            "{} ({:.1} queries/sec); {} files written to {}",
            report.stats.summary(),
            metrics.queries_per_sec,
            manifest.files.len() + 1,
            exporter.output_dir().display()
        ))
    );
    Ok(())
}

enum EstimateTarget {
    Query(String),
    Effect {
        outcome: String,
        treatment: Vec<String>,
        control: Vec<String>,
        given: Vec<String>,
    },
}

struct FitArgs {
    smoothing: Option<f64>,
    observed: Vec<String>,
    quantize: Vec<String>,
    bins: Option<usize>,
}

fn parse_assignment(pairs: &[String]) -> Result<Assignment<String>> {
    pairs
        .iter()
        .map(|pair| {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("expected name=value, got {}", pair))?;
            Ok((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

fn fit_estimator(config: &Config, graph: &CausalGraph, data: &Path, args: FitArgs) -> Result<MultinomialEstimator> {
    let mut dataset = Dataset::load(data).with_context(|| format!("Failed to read records from {}", data.display()))?;
    for spec in &args.quantize {
        let (name, bins) = spec
            .split_once('=')
            .ok_or_else(|| anyhow!("expected name=bins, got {}", spec))?;
        let bins: usize = bins.trim().parse().with_context(|| format!("invalid bin count in {}", spec))?;
        dataset.quantize(name.trim(), bins)?;
    }

    let bins = args.bins.unwrap_or(config.estimation.quantize_bins);
    let in_graph = graph.variables();
    for (name, domain) in dataset.domains() {
        let fitted = args.observed.is_empty() || args.observed.contains(name);
        if fitted && !domain.is_discrete() && in_graph.contains(name.as_str()) {
            println!(
                "{}",
                format_warning(&format!(
                    "{} is real-valued ({}); quantizing into {} bins, pass --quantize {}=N to choose",
                    name, domain, bins, name
                ))
            );
        }
    }

    let mut estimator = MultinomialEstimator::new(args.smoothing.unwrap_or(config.estimation.smoothing))?.with_bins(bins)?;
    if !args.observed.is_empty() {
        estimator = estimator.with_observed(args.observed);
    }

    let timer = OperationTimer::new("fitting");
    estimator
        .fit_dataset(graph, dataset)
        .context("Failed to fit the joint distribution")?;
    timer.warn_if_slow(SLOW_OPERATION, "counting records");
    timer.finish();
    Ok(estimator)
}

fn cmd_estimate(
    config: &Config,
    graph: &Path,
    data: &Path,
    target: EstimateTarget,
    fit: FitArgs,
    explain: bool,
) -> Result<()> {
    let graph = load_graph(config, graph)?;
    let estimator = fit_estimator(config, &graph, data, fit)?;
    let json = config.output.format == OutputFormat::Json;

    match target {
        EstimateTarget::Query(query) => {
            let query: Query = query.parse().context("Failed to parse query")?;
            let estimate = estimator.interventional_distribution(&graph, &query)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&estimate)?);
            } else {
                println!("{}", format_info(&estimate.query));
                for (values, p) in &estimate.rows {
                    let cell: Vec<String> = values.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                    println!("  {}: {:.6}", cell.join(", "), p);
                }
                if explain {
                    print!("{}", estimate.derivation);
                }
            }
        }
        EstimateTarget::Effect {
            outcome,
            treatment,
            control,
            given,
        } => {
            let estimate = match (treatment.as_slice(), control.is_empty(), given.is_empty()) {
                ([variable], true, true) if !variable.contains('=') => {
                    estimator.estimate_binary_ate(&graph, &outcome, variable.trim())?
                }
                (_, true, _) => return Err(anyhow!("--control is required unless --treatment names one binary variable")),
                (_, false, true) => {
                    estimator.estimate_ate(&graph, &outcome, parse_assignment(&treatment)?, parse_assignment(&control)?)?
                }
                (_, false, false) => estimator.estimate_cate(
                    &graph,
                    &outcome,
                    parse_assignment(&treatment)?,
                    parse_assignment(&control)?,
                    parse_assignment(&given)?,
                )?,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&estimate)?);
            } else {
                println!(
                    "{}",
                    format_success(&format!(
                        "{} = {:.6} (treated {:.6}, control {:.6})",
                        estimate.estimand, estimate.effect, estimate.treated_mean, estimate.control_mean
                    ))
                );
                if explain {
                    print!("{}", estimate.derivation);
                }
            }
        }
    }
    Ok(())
}

async fn cmd_mcp(config: &Config, transport: &str) -> Result<()> {
    info!("Starting MCP server (transport: {})", transport);

    if transport != "stdio" {
        error!("Only stdio transport is currently supported");
        return Err(anyhow!("Unsupported transport: {}", transport));
    }

    let server = PqpMcp::new(config);

    info!("MCP server ready. Available tools:");
    for tool in server.get_tool_router().list_all() {
        info!(
            "  - {}: {}",
            tool.name,
            tool.description.as_deref().unwrap_or("No description")
        );
    }

    let service = server
        .serve(stdio())
        .await
        .inspect_err(|e| error!("MCP server failed to start: {:?}", e))?;
    service.waiting().await?;

    Ok(())
}
