// file: src/parser/graph_dsl.rs
// description: line oriented text format for causal graphs
// reference: dagitty / pqp edge notation

use crate::causal::{CausalGraph, GraphSpec, Variable};
use crate::error::{PqpError, Result};
use crate::utils::validation::{GraphFormat, Validator};
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    /// left causes right
    Causes,
    /// right causes left
    CausedBy,
    Confounded,
}

impl Operator {
    /// Longest spellings first so `<->` is not read as `<-`.
    const SPELLINGS: [(&'static str, Operator); 5] = [
        ("<->", Operator::Confounded),
        ("->", Operator::Causes),
        ("<-", Operator::CausedBy),
        ("<=", Operator::CausedBy),
        ("&", Operator::Confounded),
    ];
}

/// Parses graphs written one statement per line:
///
/// ```text
/// # comments run to the end of the line
/// z -> x, y        # z causes x and y
/// x -> m -> y      # chains
/// y <- w           # reverse arrow, also written y <= w
/// x <-> y          # confounding, also written x & y
/// u                # isolated variable
/// ```
pub struct GraphParser;

impl GraphParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, content: &str) -> Result<CausalGraph> {
        let mut graph = CausalGraph::new();

        for (i, raw) in content.lines().enumerate() {
            let line_no = i + 1;
            let line = raw.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            self.parse_statement(line, line_no, &mut graph)?;
        }

        debug!(
            "Parsed graph with {} variables and {} edges",
            graph.variables().len(),
            graph.edges().len()
        );
        Ok(graph)
    }

    /// Read a graph file; `.json` files hold a [`GraphSpec`], anything else is
    /// the text format.
    pub fn parse_file(&self, path: &Path) -> Result<CausalGraph> {
        let format = Validator::graph_format(path)?;
        let content = fs::read_to_string(path).map_err(|source| PqpError::FileOperation {
            path: path.to_path_buf(),
            source,
        })?;
        Validator::validate_content_not_empty(&content)?;

        match format {
            GraphFormat::Json => {
                let spec: GraphSpec = serde_json::from_str(&content)?;
                CausalGraph::from_spec(&spec)
            }
            GraphFormat::Dsl => self.parse(&content),
        }
    }

    fn parse_statement(&self, line: &str, line_no: usize, graph: &mut CausalGraph) -> Result<()> {
        let (segments, operators) = split_operators(line);
        let groups = segments
            .iter()
            .map(|s| parse_group(s, line_no))
            .collect::<Result<Vec<_>>>()?;

        if operators.is_empty() {
            for var in &groups[0] {
                graph.add_variable(var.name())?;
            }
            return Ok(());
        }

        for (k, op) in operators.iter().enumerate() {
            let (left, right) = (&groups[k], &groups[k + 1]);
            for l in left {
                for r in right {
                    match op {
                        Operator::Causes => graph.add_edge(l.causes(r)),
                        Operator::CausedBy => graph.add_edge(r.causes(l)),
                        Operator::Confounded if l == r => {
                            return Err(PqpError::Parse {
                                line: line_no,
                                message: format!("{} cannot be confounded with itself", l),
                            });
                        }
                        Operator::Confounded => graph.add_edge(l.confounded_with(r)),
                    }
                }
            }
        }

        Ok(())
    }
}

impl Default for GraphParser {
    fn default() -> Self {
        Self::new()
    }
}

fn split_operators(line: &str) -> (Vec<&str>, Vec<Operator>) {
    let mut segments = Vec::new();
    let mut operators = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < line.len() {
        let rest = &line[i..];
        if let Some((spelling, op)) = Operator::SPELLINGS.iter().find(|(s, _)| rest.starts_with(*s)) {
            segments.push(&line[start..i]);
            operators.push(*op);
            i += spelling.len();
            start = i;
        } else {
            i += rest.chars().next().map(char::len_utf8).unwrap_or(1);
        }
    }
    segments.push(&line[start..]);

    (segments, operators)
}

fn parse_group(segment: &str, line_no: usize) -> Result<Vec<Variable>> {
    let segment = segment.trim();
    if segment.is_empty() {
        return Err(PqpError::Parse {
            line: line_no,
            message: "expected a variable name".to_string(),
        });
    }

    segment
        .split(',')
        .map(|name| {
            Variable::new(name.trim()).map_err(|e| PqpError::Parse {
                line: line_no,
                message: e.to_string(),
            })
        })
        .collect()
}

/// Write `graph` in the text format accepted by [`GraphParser::parse`].
pub fn to_dsl(graph: &CausalGraph) -> String {
    let spec = graph.to_spec();
    let mut lines = Vec::new();
    for (cause, effect) in &spec.directed {
        lines.push(format!("{} -> {}", cause, effect));
    }
    for (a, b) in &spec.bidirected {
        lines.push(format!("{} <-> {}", a, b));
    }
    lines.extend(spec.variables.iter().cloned());
    lines.join("\n")
}
