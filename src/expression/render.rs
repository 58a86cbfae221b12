// file: src/expression/render.rs
// description: plain text and LaTeX rendering of expressions

use super::form::Expression;
use std::collections::BTreeSet;
use std::fmt::{self, Display};

fn join<T: Display>(set: &BTreeSet<T>) -> String {
    set.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl<T: Ord + Display> Display for Expression<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::P { vars, .. } if vars.is_empty() => write!(f, "1"),
            Expression::P { vars, given } if given.is_empty() => write!(f, "P({})", join(vars)),
            Expression::P { vars, given } => write!(f, "P({} | {})", join(vars), join(given)),
            Expression::Marginal { sub, exp } => write!(f, "Σ_{{{}}} [ {} ]", join(sub), exp),
            Expression::Product { exprs } if exprs.is_empty() => write!(f, "1"),
            Expression::Product { exprs } => {
                let parts: Vec<String> = exprs.iter().map(|e| e.to_string()).collect();
                write!(f, "{}", parts.join(" * "))
            }
            Expression::Quotient { numer, denom } => write!(f, "[{} / {}]", numer, denom),
            Expression::Hedge => write!(f, "HEDGE"),
        }
    }
}

impl<T: Ord + Display> Expression<T> {
    pub fn to_latex(&self) -> String {
        match self {
            Expression::P { vars, .. } if vars.is_empty() => "1".to_string(),
            Expression::P { vars, given } if given.is_empty() => format!("P({})", join(vars)),
            Expression::P { vars, given } => format!("P({} \\mid {})", join(vars), join(given)),
            Expression::Marginal { sub, exp } => {
                let body = match exp.as_ref() {
                    Expression::Product { .. } => format!("\\left[{}\\right]", exp.to_latex()),
                    _ => exp.to_latex(),
                };
                format!("\\sum_{{{}}} {}", join(sub), body)
            }
            Expression::Product { exprs } if exprs.is_empty() => "1".to_string(),
            Expression::Product { exprs } => exprs
                .iter()
                .map(|e| match e {
                    Expression::Marginal { .. } => format!("\\left({}\\right)", e.to_latex()),
                    _ => e.to_latex(),
                })
                .collect::<Vec<_>>()
                .join(" "),
            Expression::Quotient { numer, denom } => {
                format!("\\frac{{{}}}{{{}}}", numer.to_latex(), denom.to_latex())
            }
            Expression::Hedge => "\\text{HEDGE}".to_string(),
        }
    }
}
