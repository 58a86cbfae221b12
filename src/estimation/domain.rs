// file: src/estimation/domain.rs
// description: typed variable domains inferred from data and checked against it
// reference: binary, integer, real and categorical measurement scales

use super::distribution::{Domain, MAX_CELLS};
use crate::error::{PqpError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Categorical domains with more values than this print their size only.
const MAX_LISTED_VALUES: usize = 6;

/// The set of values a variable may take.
///
/// Inference picks the narrowest kind that admits every value, in the order
/// binary, integer, real, categorical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VariableDomain {
    /// `0` or `1`.
    Binary,
    /// Every integer in `[min, max]`.
    Integer { min: i64, max: i64 },
    /// Any number in `[min, max]`.
    Real { min: f64, max: f64 },
    Categorical { values: BTreeSet<String> },
}

impl VariableDomain {
    pub fn infer<S: AsRef<str>>(values: &[S]) -> Self {
        let texts: Vec<&str> = values.iter().map(AsRef::as_ref).collect();

        if texts.iter().all(|v| matches!(*v, "0" | "1")) {
            return VariableDomain::Binary;
        }
        if let Some(ints) = texts.iter().map(|v| as_integer(v)).collect::<Option<Vec<i64>>>() {
            let min = ints.iter().copied().min().unwrap_or(0);
            let max = ints.iter().copied().max().unwrap_or(0);
            if min >= 0 && max <= 1 {
                return VariableDomain::Binary;
            }
            return VariableDomain::Integer { min, max };
        }
        if let Some(reals) = texts.iter().map(|v| as_real(v)).collect::<Option<Vec<f64>>>() {
            let min = reals.iter().copied().fold(f64::INFINITY, f64::min);
            let max = reals.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            return VariableDomain::Real { min, max };
        }
        VariableDomain::Categorical {
            values: texts.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn categorical<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        VariableDomain::Categorical {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// The spelling `value` takes in this domain: integral numbers lose any
    /// fractional part, so `1.0` and `1` count as one value.
    pub fn canonical(&self, value: &str) -> String {
        match self {
            VariableDomain::Binary | VariableDomain::Integer { .. } => {
                as_integer(value).map(|n| n.to_string()).unwrap_or_else(|| value.to_string())
            }
            _ => value.to_string(),
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        match self {
            VariableDomain::Binary => matches!(as_integer(value), Some(0 | 1)),
            VariableDomain::Integer { min, max } => as_integer(value).is_some_and(|n| *min <= n && n <= *max),
            VariableDomain::Real { min, max } => as_real(value).is_some_and(|x| *min <= x && x <= *max),
            VariableDomain::Categorical { values } => values.contains(value),
        }
    }

    pub fn validate<S: AsRef<str>>(&self, values: &[S]) -> bool {
        values.iter().all(|v| self.contains(v.as_ref()))
    }

    /// Fails on the first value of `variable` outside the domain.
    pub fn validate_or_err<S: AsRef<str>>(&self, variable: &str, values: &[S]) -> Result<()> {
        match values.iter().find(|v| !self.contains(v.as_ref())) {
            Some(value) => Err(PqpError::DomainValidation {
                variable: variable.to_string(),
                value: value.as_ref().to_string(),
                domain: self.to_string(),
            }),
            None => Ok(()),
        }
    }

    pub fn is_discrete(&self) -> bool {
        !matches!(self, VariableDomain::Real { .. })
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, VariableDomain::Categorical { .. })
    }

    /// Number of values, `None` for real domains.
    pub fn cardinality(&self) -> Option<usize> {
        match self {
            VariableDomain::Binary => Some(2),
            VariableDomain::Integer { min, max } => usize::try_from(max.abs_diff(*min)).ok().and_then(|n| n.checked_add(1)),
            VariableDomain::Real { .. } => None,
            VariableDomain::Categorical { values } => Some(values.len()),
        }
    }

    /// The value table a joint distribution is laid out over.
    pub fn to_discrete(&self, variable: &str) -> Result<Domain> {
        match self {
            VariableDomain::Binary => Ok(Domain::new(["0", "1"])),
            VariableDomain::Integer { min, max } => {
                if self.cardinality().is_none_or(|n| n > MAX_CELLS) {
                    return Err(PqpError::Estimation(format!(
                        "{} spans too many integers to tabulate ({})",
                        variable, self
                    )));
                }
                Ok(Domain::new((*min..=*max).map(|n| n.to_string())))
            }
            VariableDomain::Real { .. } => Err(PqpError::Estimation(format!(
                "{} is real-valued ({}); quantize it first",
                variable, self
            ))),
            VariableDomain::Categorical { values } => Ok(Domain::new(values.iter().cloned())),
        }
    }
}

impl fmt::Display for VariableDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableDomain::Binary => write!(f, "Binary"),
            VariableDomain::Integer { min, max } => write!(f, "Integer[{}, {}]", min, max),
            VariableDomain::Real { min, max } => write!(f, "Real[{}, {}]", min, max),
            VariableDomain::Categorical { values } if values.len() > MAX_LISTED_VALUES => {
                write!(f, "Categorical(cardinality={})", values.len())
            }
            VariableDomain::Categorical { values } => {
                let listed: Vec<&str> = values.iter().map(String::as_str).collect();
                write!(f, "Categorical{{{}}}", listed.join(", "))
            }
        }
    }
}

fn as_real(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|x| x.is_finite())
}

fn as_integer(value: &str) -> Option<i64> {
    let x = as_real(value)?;
    if x.fract() != 0.0 || x < i64::MIN as f64 || x > i64::MAX as f64 {
        return None;
    }
    Some(x as i64)
}
