// file: src/estimation/evaluate.rs
// description: numeric evaluation of probability expressions on a joint table
// reference: plug-in estimation of identified causal estimands

use super::distribution::{JointDistribution, Record};
use crate::error::{PqpError, Result};
use crate::expression::Expression;
use std::collections::{BTreeMap, BTreeSet};

/// Value of `expr` with every free variable fixed by `assignment`.
pub fn evaluate(expr: &Expression<String>, dist: &JointDistribution, assignment: &Record) -> Result<f64> {
    Evaluator::new(dist).evaluate(expr, assignment)
}

/// Evaluates expressions against one distribution.
///
/// Variables are resolved to table columns once; probability lookups go
/// through the distribution's marginal cache.
pub struct Evaluator<'a> {
    dist: &'a JointDistribution,
}

type Fixed = BTreeMap<usize, usize>;

impl<'a> Evaluator<'a> {
    pub fn new(dist: &'a JointDistribution) -> Self {
        Self { dist }
    }

    pub fn evaluate(&self, expr: &Expression<String>, assignment: &Record) -> Result<f64> {
        if expr.contains_hedge() {
            return Err(PqpError::NotIdentifiable(
                "expression contains a hedge".to_string(),
            ));
        }

        let mut fixed = Fixed::new();
        for (name, value) in assignment {
            let col = self.column(name)?;
            let val = self.dist.domain_at(col).index_of(value).ok_or_else(|| {
                PqpError::Estimation(format!("{} is not a value of {}", value, name))
            })?;
            fixed.insert(col, val);
        }

        let missing: Vec<String> = expr
            .free()
            .into_iter()
            .filter(|v| !assignment.contains_key(v))
            .collect();
        if !missing.is_empty() {
            return Err(PqpError::Estimation(format!(
                "no value given for {}",
                missing.join(", ")
            )));
        }

        self.eval(expr, &mut fixed)
    }

    fn column(&self, name: &str) -> Result<usize> {
        self.dist
            .column(name)
            .ok_or_else(|| PqpError::UnknownVariable(name.to_string()))
    }

    fn columns(&self, names: &BTreeSet<String>) -> Result<Vec<usize>> {
        names.iter().map(|n| self.column(n)).collect()
    }

    fn eval(&self, expr: &Expression<String>, fixed: &mut Fixed) -> Result<f64> {
        match expr {
            Expression::P { vars, given } => self.conditional(vars, given, fixed),
            Expression::Product { exprs } => {
                let mut acc = 1.0;
                for e in exprs {
                    acc *= self.eval(e, fixed)?;
                }
                Ok(acc)
            }
            Expression::Quotient { numer, denom } => {
                let d = self.eval(denom, fixed)?;
                if d == 0.0 {
                    return Err(PqpError::Estimation(
                        "division by a zero probability; consider smoothing".to_string(),
                    ));
                }
                Ok(self.eval(numer, fixed)? / d)
            }
            Expression::Marginal { sub, exp } => {
                // Σ_S P(V) = P(V \ S) when S ⊆ V
                if let Expression::P { vars, given } = exp.as_ref()
                    && given.is_empty()
                    && sub.is_subset(vars)
                {
                    let rest = vars.difference(sub).cloned().collect();
                    return self.conditional(&rest, given, fixed);
                }

                let cols = self.columns(sub)?;
                let saved: Vec<Option<usize>> = cols.iter().map(|c| fixed.get(c).copied()).collect();
                let total = self.sum_over(&cols, 0, exp, fixed);
                for (col, old) in cols.iter().zip(saved) {
                    match old {
                        Some(v) => fixed.insert(*col, v),
                        None => fixed.remove(col),
                    };
                }
                total
            }
            Expression::Hedge => Err(PqpError::NotIdentifiable(
                "expression contains a hedge".to_string(),
            )),
        }
    }

    fn sum_over(&self, cols: &[usize], k: usize, exp: &Expression<String>, fixed: &mut Fixed) -> Result<f64> {
        let Some(col) = cols.get(k) else {
            return self.eval(exp, fixed);
        };
        let mut total = 0.0;
        for val in 0..self.dist.domain_at(*col).cardinality() {
            fixed.insert(*col, val);
            total += self.sum_over(cols, k + 1, exp, fixed)?;
        }
        Ok(total)
    }

    /// `P(vars | given)` at the current values.
    fn conditional(&self, vars: &BTreeSet<String>, given: &BTreeSet<String>, fixed: &Fixed) -> Result<f64> {
        if vars.is_empty() {
            return Ok(1.0);
        }
        let pick = |names: &BTreeSet<String>| -> Result<Vec<(usize, usize)>> {
            names
                .iter()
                .map(|n| {
                    let col = self.column(n)?;
                    let val = fixed
                        .get(&col)
                        .copied()
                        .ok_or_else(|| PqpError::Estimation(format!("no value given for {}", n)))?;
                    Ok((col, val))
                })
                .collect()
        };

        let cond = pick(given)?;
        let mut joint = pick(vars)?;
        joint.extend(cond.iter().copied());

        let numer = self.dist.marginal(&joint);
        if given.is_empty() {
            return Ok(numer);
        }
        let denom = self.dist.marginal(&cond);
        if denom == 0.0 {
            return Err(PqpError::Estimation(format!(
                "conditioning on a zero probability event over {}",
                given.iter().cloned().collect::<Vec<_>>().join(", ")
            )));
        }
        Ok(numer / denom)
    }
}
