// file: src/mcp/server.rs
// description: MCP server exposing causal identification as agent tools
// reference: https://docs.rs/rmcp

use crate::config::{Config, OutputFormat};
use crate::error::PqpError;
use crate::expression::{Expression, parse_json, simplify_with_passes};
use crate::identification::IdentificationOptions;
use crate::parser::{GraphParser, Query};
use crate::utils::SimplificationStats;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler, schemars, tool, tool_handler, tool_router};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct IdentifyRequest {
    /// Causal graph, one statement per line, e.g. "x -> m -> y" and "x <-> y".
    pub graph: String,
    /// Query such as "y | do(x), z".
    pub query: String,
    /// Rendering of the estimand: text, latex or json (default text).
    pub format: Option<String>,
    /// Indent JSON output (default from the server configuration).
    pub pretty: Option<bool>,
    /// Append the ID/IDC derivation of the estimand (default false).
    pub explain: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SimplifyRequest {
    /// Expression in the JSON wire format, e.g. {"type":"P","vars":["y"],"given":[]}.
    pub expression: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DescribeRequest {
    /// Causal graph, one statement per line.
    pub graph: String,
}

#[derive(Clone)]
pub struct PqpMcp {
    options: IdentificationOptions,
    format: OutputFormat,
    pretty: bool,
    tool_router: ToolRouter<Self>,
}

fn invalid(err: PqpError) -> McpError {
    McpError::invalid_params(err.to_string(), None)
}

#[tool_router]
impl PqpMcp {
    pub fn new(config: &Config) -> Self {
        Self {
            options: config.identification_options(),
            format: config.output.format,
            pretty: config.output.pretty,
            tool_router: Self::tool_router(),
        }
    }

    pub fn get_tool_router(&self) -> &ToolRouter<Self> {
        &self.tool_router
    }

    #[tool(description = "Identify P(y | do(x), z) in a causal graph. Returns the estimand over the observational distribution, or reports that the query is not identifiable.")]
    async fn identify(
        &self,
        Parameters(IdentifyRequest {
            graph,
            query,
            format,
            pretty,
            explain,
        }): Parameters<IdentifyRequest>,
    ) -> Result<CallToolResult, McpError> {
        info!("MCP: identifying {}", query);

        let graph = GraphParser::new()
            .parse(&graph)
            .map_err(invalid)?
            .with_options(self.options);
        let query: Query = query.parse().map_err(invalid)?;
        let format = match format {
            Some(f) => f.parse::<OutputFormat>().map_err(invalid)?,
            None => self.format,
        };

        let result = graph
            .idc(
                &query.outcome_refs(),
                &query.intervention_refs(),
                &query.condition_refs(),
            )
            .map_err(invalid)?;
        let rendered = format
            .render(&result.estimand, pretty.unwrap_or(self.pretty))
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;

        let text = if result.identifiable {
            format!("{} = {}", result.query, rendered)
        } else {
            format!("{} is not identifiable", result.query)
        };
        let mut content = vec![Content::text(text)];
        if explain.unwrap_or(false) {
            content.push(Content::text(result.explain().explain()));
        }
        Ok(CallToolResult::success(content))
    }

    #[tool(description = "Simplify a probability expression given in the JSON wire format. Returns the simplified expression as JSON and as text.")]
    async fn simplify_expression(
        &self,
        Parameters(SimplifyRequest { expression }): Parameters<SimplifyRequest>,
    ) -> Result<CallToolResult, McpError> {
        let raw: Expression<String> = parse_json(&expression).map_err(invalid)?;
        let simplified = simplify_with_passes(&raw, self.options.max_passes);
        let stats = SimplificationStats::measure(&raw, &simplified);
        info!(
            "MCP: simplified expression from {} to {} nodes",
            stats.raw_size, stats.simplified_size
        );

        let payload = json!({
            "expression": simplified,
            "text": simplified.to_string(),
            "stats": stats,
        });
        Ok(CallToolResult::success(vec![Content::text(payload.to_string())]))
    }

    #[tool(description = "Describe a causal graph: variables, edge counts, confounded components and a topological order.")]
    async fn describe_graph(
        &self,
        Parameters(DescribeRequest { graph }): Parameters<DescribeRequest>,
    ) -> Result<CallToolResult, McpError> {
        let summary = GraphParser::new()
            .parse(&graph)
            .and_then(|g| g.describe())
            .map_err(invalid)?;
        info!("MCP: described graph with {} variables", summary.variables.len());

        let text = serde_json::to_string_pretty(&summary)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}

#[tool_handler]
impl ServerHandler for PqpMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Causal effect identification. Graphs use one statement per line: \
                 'a -> b' for a direct cause, 'a <-> b' for a latent confounder. \
                 Queries look like 'y | do(x), z'."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> PqpMcp {
        PqpMcp::new(&Config::default_config())
    }

    fn text(result: &CallToolResult) -> String {
        result
            .content
            .iter()
            .filter_map(|c| c.as_text().map(|t| t.text.clone()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_tools_are_registered() {
        let names: Vec<String> = server()
            .get_tool_router()
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        assert!(names.contains(&"identify".to_string()));
        assert!(names.contains(&"simplify_expression".to_string()));
        assert!(names.contains(&"describe_graph".to_string()));
    }

    #[tokio::test]
    async fn test_identify_tool() {
        let request = IdentifyRequest {
            graph: "x -> m -> y\nx <-> y".to_string(),
            query: "y | do(x)".to_string(),
            format: None,
            pretty: None,
            explain: None,
        };
        let result = server().identify(Parameters(request)).await.unwrap();
        assert!(text(&result).starts_with("P(y | do(x)) = "));

        let bow = IdentifyRequest {
            graph: "x -> y\nx <-> y".to_string(),
            query: "y | do(x)".to_string(),
            format: Some("latex".to_string()),
            pretty: None,
            explain: None,
        };
        let result = server().identify(Parameters(bow)).await.unwrap();
        assert!(text(&result).ends_with("is not identifiable"));
    }

    #[tokio::test]
    async fn test_identify_pretty_flag() {
        let request = |pretty| IdentifyRequest {
            graph: "x -> y".to_string(),
            query: "y | do(x)".to_string(),
            format: Some("json".to_string()),
            pretty,
            explain: None,
        };
        let compact = text(&server().identify(Parameters(request(Some(false)))).await.unwrap());
        assert!(!compact.contains('\n'));

        let indented = text(&server().identify(Parameters(request(Some(true)))).await.unwrap());
        assert!(indented.contains('\n'));

        let mut config = Config::default_config();
        config.output.pretty = false;
        let default = text(&PqpMcp::new(&config).identify(Parameters(request(None))).await.unwrap());
        assert_eq!(default, compact);
    }

    #[tokio::test]
    async fn test_identify_explain() {
        let request = IdentifyRequest {
            graph: "z -> x -> y\nz -> y".to_string(),
            query: "y | do(x)".to_string(),
            format: None,
            pretty: None,
            explain: Some(true),
        };
        let result = server().identify(Parameters(request)).await.unwrap();
        assert_eq!(result.content.len(), 2);
        assert!(text(&result).contains("Input: P(y | do(x))"));
    }

    #[tokio::test]
    async fn test_identify_rejects_bad_input() {
        let request = IdentifyRequest {
            graph: "x -> y".to_string(),
            query: "w | do(x)".to_string(),
            format: None,
            pretty: None,
            explain: None,
        };
        assert!(server().identify(Parameters(request)).await.is_err());
    }

    #[tokio::test]
    async fn test_simplify_tool() {
        let expression = r#"{"type":"Marginal","sub":[],"exp":{"type":"P","vars":["y"],"given":[]}}"#;
        let result = server()
            .simplify_expression(Parameters(SimplifyRequest {
                expression: expression.to_string(),
            }))
            .await
            .unwrap();
        let payload: serde_json::Value = serde_json::from_str(&text(&result)).unwrap();
        assert_eq!(payload["text"], "P(y)");
        assert_eq!(payload["stats"]["simplified_size"], 1);
    }

    #[tokio::test]
    async fn test_describe_tool() {
        let result = server()
            .describe_graph(Parameters(DescribeRequest {
                graph: "z -> x -> y\nz -> y".to_string(),
            }))
            .await
            .unwrap();
        let summary: serde_json::Value = serde_json::from_str(&text(&result)).unwrap();
        assert_eq!(summary["directed_edges"], 3);
    }
}
