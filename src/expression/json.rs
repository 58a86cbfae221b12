// file: src/expression/json.rs
// description: JSON wire format for expressions exchanged with front ends
// reference: https://docs.rs/serde_json

use super::form::Expression;
use crate::error::{PqpError, Result};
use serde::{Serialize, de::DeserializeOwned};

impl<T: Ord + Serialize> Expression<T> {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_json_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Parse an expression previously written by [`Expression::to_json`].
pub fn parse_json<T: Ord + DeserializeOwned>(input: &str) -> Result<Expression<T>> {
    serde_json::from_str(input).map_err(|e| PqpError::Json(format!("invalid expression: {}", e)))
}

pub fn from_json_value<T: Ord + DeserializeOwned>(value: serde_json::Value) -> Result<Expression<T>> {
    serde_json::from_value(value).map_err(|e| PqpError::Json(format!("invalid expression: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn s(v: &str) -> String {
        v.to_string()
    }

    #[test]
    fn test_wire_format() {
        let f: Expression<String> = Expression::marginal(
            [s("m")],
            Expression::product(vec![
                Expression::cond_prob([s("m")], [s("x")]),
                Expression::Hedge,
            ]),
        );
        let value = f.to_json_value().unwrap();
        assert_eq!(
            value,
            json!({
                "type": "Marginal",
                "sub": ["m"],
                "exp": {
                    "type": "Product",
                    "exprs": [
                        {"type": "P", "vars": ["m"], "given": ["x"]},
                        {"type": "Hedge"}
                    ]
                }
            })
        );
    }

    #[test]
    fn test_parse_quotient() {
        let input = r#"{"type": "Quotient",
            "numer": {"type": "P", "vars": ["x", "y"], "given": []},
            "denom": {"type": "P", "vars": ["x"], "given": []}}"#;
        let parsed: Expression<String> = parse_json(input).unwrap();
        assert_eq!(
            parsed,
            Expression::quotient(Expression::prob([s("x"), s("y")]), Expression::prob([s("x")]))
        );
        assert_eq!(parse_json::<String>(&parsed.to_json().unwrap()).unwrap(), parsed);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result = parse_json::<String>(r#"{"type": "Integral", "exp": {"type": "Hedge"}}"#);
        assert!(matches!(result, Err(PqpError::Json(_))));
    }
}
