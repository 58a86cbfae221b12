// file: src/parser/query.rs
// description: parsing of interventional queries such as "y | do(x), z"
// reference: do-calculus notation

use crate::causal::render_query;
use crate::error::{PqpError, Result};
use crate::identification::{Assignment, CausalEstimand};
use crate::utils::Validator;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// `P(outcome | do(intervention), condition)` plus optional variable values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub outcome: Vec<String>,
    #[serde(default)]
    pub intervention: Vec<String>,
    #[serde(default)]
    pub condition: Vec<String>,
    /// Values given as `name=value`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: Assignment<String>,
}

impl Query {
    pub fn new(outcome: &[&str], intervention: &[&str], condition: &[&str]) -> Self {
        let owned = |names: &[&str]| names.iter().map(|n| n.to_string()).collect();
        Self {
            outcome: owned(outcome),
            intervention: owned(intervention),
            condition: owned(condition),
            values: Assignment::new(),
        }
    }

    pub fn outcome_refs(&self) -> Vec<&str> {
        self.outcome.iter().map(String::as_str).collect()
    }

    pub fn intervention_refs(&self) -> Vec<&str> {
        self.intervention.iter().map(String::as_str).collect()
    }

    pub fn condition_refs(&self) -> Vec<&str> {
        self.condition.iter().map(String::as_str).collect()
    }

    pub fn to_estimand(&self) -> CausalEstimand<String> {
        CausalEstimand::Interventional {
            outcome: self.outcome.iter().cloned().collect(),
            intervention: self.intervention.iter().cloned().collect(),
            condition: self.condition.iter().cloned().collect(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.outcome.is_empty() {
            return Err(PqpError::InvalidQuery("query has no outcome variable".into()));
        }
        let mut seen = BTreeSet::new();
        for name in self.outcome.iter().chain(&self.intervention).chain(&self.condition) {
            Validator::validate_variable_name(name)
                .map_err(|e| PqpError::InvalidQuery(e.to_string()))?;
            if !seen.insert(name) {
                return Err(PqpError::InvalidQuery(format!(
                    "variable {} appears more than once",
                    name
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_query(
            &self.outcome_refs(),
            &self.intervention_refs(),
            &self.condition_refs(),
        ))
    }
}

impl FromStr for Query {
    type Err = PqpError;

    fn from_str(s: &str) -> Result<Self> {
        QueryParser::new().parse(s)
    }
}

/// Accepts `y1, y2 | do(x1), do(x2, x3), z`, optionally wrapped in `P( )`.
/// Any variable may carry a value as `name=value`.
pub struct QueryParser;

impl QueryParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, input: &str) -> Result<Query> {
        let body = unwrap_probability(input.trim())?;

        let sides = split_top_level(body, '|')?;
        let (left, right) = match sides.as_slice() {
            [left] => (*left, None),
            [left, right] => (*left, Some(*right)),
            _ => {
                return Err(PqpError::InvalidQuery(format!("more than one '|' in {}", input)));
            }
        };

        let mut query = Query::default();
        for term in split_top_level(left, ',')? {
            let name = take_value(term, &mut query.values)?;
            query.outcome.push(name);
        }

        if let Some(right) = right {
            for item in split_top_level(right, ',')? {
                if let Some(inner) = item.strip_prefix("do(").and_then(|i| i.strip_suffix(')')) {
                    for term in split_top_level(inner, ',')? {
                        let name = take_value(term, &mut query.values)?;
                        query.intervention.push(name);
                    }
                } else {
                    let name = take_value(item, &mut query.values)?;
                    query.condition.push(name);
                }
            }
        }

        query.validate()?;
        Ok(query)
    }

    /// One query per line; blank lines and `#` comments are skipped.
    pub fn parse_lines(&self, content: &str) -> Result<Vec<Query>> {
        content
            .lines()
            .enumerate()
            .filter_map(|(i, raw)| {
                let line = raw.split('#').next().unwrap_or_default().trim();
                (!line.is_empty()).then_some((i + 1, line))
            })
            .map(|(line_no, line)| {
                self.parse(line).map_err(|e| PqpError::Parse {
                    line: line_no,
                    message: e.to_string(),
                })
            })
            .collect()
    }
}

impl Default for QueryParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip a `P( )` wrapper. It must enclose the whole query, so `P(y) | do(x)`
/// is rejected rather than read as `y) | do(x`.
fn unwrap_probability(body: &str) -> Result<&str> {
    let Some(rest) = body.strip_prefix("P(") else {
        return Ok(body);
    };

    let mut depth = 1usize;
    for (i, c) in rest.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    if !rest[i + 1..].trim().is_empty() {
                        return Err(PqpError::InvalidQuery(format!(
                            "P( ) must enclose the whole query, as in P(y | do(x)): {}",
                            body
                        )));
                    }
                    return Ok(rest[..i].trim());
                }
            }
            _ => {}
        }
    }
    Err(PqpError::InvalidQuery(format!("unbalanced '(' in {}", body)))
}

/// Split on `sep` where it is not inside parentheses.
fn split_top_level(s: &str, sep: char) -> Result<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| PqpError::InvalidQuery(format!("unbalanced ')' in {}", s)))?;
            }
            c if c == sep && depth == 0 => {
                parts.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(PqpError::InvalidQuery(format!("unbalanced '(' in {}", s)));
    }
    parts.push(s[start..].trim());

    if parts.iter().any(|p| p.is_empty()) {
        return Err(PqpError::InvalidQuery(format!("empty term in {}", s.trim())));
    }
    Ok(parts)
}

/// `name=value` records the value and returns the name.
fn take_value(term: &str, values: &mut Assignment<String>) -> Result<String> {
    match term.split_once('=') {
        Some((name, value)) => {
            let (name, value) = (name.trim(), value.trim());
            if value.is_empty() {
                return Err(PqpError::InvalidQuery(format!("missing value for {}", name)));
            }
            values.insert(name.to_string(), value.to_string());
            Ok(name.to_string())
        }
        None => Ok(term.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full_query() {
        let query: Query = "y1, y2 | do(x1), do(x2, x3), z".parse().unwrap();
        assert_eq!(query.outcome, vec!["y1", "y2"]);
        assert_eq!(query.intervention, vec!["x1", "x2", "x3"]);
        assert_eq!(query.condition, vec!["z"]);
        assert_eq!(query.to_string(), "P(y1, y2 | do(x1), do(x2), do(x3), z)");
    }

    #[test]
    fn test_parse_wrapped_and_bare() {
        let wrapped: Query = "P(y | do(x))".parse().unwrap();
        assert_eq!(wrapped, Query::new(&["y"], &["x"], &[]));

        let bare: Query = "y".parse().unwrap();
        assert_eq!(bare, Query::new(&["y"], &[], &[]));
    }

    #[test]
    fn test_parse_values() {
        let query: Query = "y=1 | do(x=treated), z=0".parse().unwrap();
        assert_eq!(query.outcome, vec!["y"]);
        assert_eq!(query.values.get("x").map(String::as_str), Some("treated"));
        assert_eq!(query.values.get("z").map(String::as_str), Some("0"));
        assert_eq!(query.values.len(), 3);
    }

    #[test]
    fn test_invalid_queries() {
        let parser = QueryParser::new();
        assert!(parser.parse("").is_err());
        assert!(parser.parse("| do(x)").is_err());
        assert!(parser.parse("y | do(x").is_err());
        assert!(parser.parse("y | x | z").is_err());
        assert!(parser.parse("y | do(y)").is_err());
        assert!(parser.parse("y | x=").is_err());
        assert!(parser.parse("y,, z").is_err());
        assert!(parser.parse("y |").is_err());
    }

    #[test]
    fn test_probability_wrapper_must_enclose_query() {
        let parser = QueryParser::new();
        let err = parser.parse("P(y) | do(x)").unwrap_err();
        assert!(matches!(&err, PqpError::InvalidQuery(msg) if msg.contains("enclose the whole query")));

        let nested: Query = "P(y | do(x), z)".parse().unwrap();
        assert_eq!(nested, Query::new(&["y"], &["x"], &["z"]));
        assert!(parser.parse("P(y | do(x)").is_err());
    }

    #[test]
    fn test_bar_inside_do_is_not_a_separator() {
        let err = QueryParser::new().parse("y | do(x | z)").unwrap_err();
        assert!(matches!(err, PqpError::InvalidQuery(_)));
    }

    #[test]
    fn test_parse_lines() {
        let content = "# queries\ny | do(x)\n\ny | do(x), z\n";
        let queries = QueryParser::new().parse_lines(content).unwrap();
        assert_eq!(queries.len(), 2);

        let err = QueryParser::new().parse_lines("y | do(x)\ny | do(").unwrap_err();
        assert!(matches!(err, PqpError::Parse { line: 2, .. }));
    }
}
