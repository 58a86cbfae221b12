// file: src/estimation/distribution.rs
// description: categorical domains and dense joint probability tables
// reference: multinomial likelihood with a symmetric dirichlet prior

use super::dataset::Dataset;
use crate::error::{PqpError, Result};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// One observation: variable name to categorical value.
pub type Record = BTreeMap<String, String>;

/// Largest joint table that will be materialized.
pub(crate) const MAX_CELLS: usize = 1 << 22;

/// Ordered set of values a categorical variable takes.
///
/// Values that all parse as numbers are ordered numerically, anything else
/// lexicographically.
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    values: Vec<String>,
}

impl Domain {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let unique: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        let mut values: Vec<String> = unique.into_iter().collect();
        if values.iter().all(|v| v.parse::<f64>().is_ok()) {
            values.sort_by(|a, b| {
                let (a, b) = (a.parse::<f64>().unwrap_or(0.0), b.parse::<f64>().unwrap_or(0.0));
                a.total_cmp(&b)
            });
        }
        Self { values }
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn cardinality(&self) -> usize {
        self.values.len()
    }

    pub fn index_of(&self, value: &str) -> Option<usize> {
        self.values.iter().position(|v| v == value)
    }

    pub fn contains(&self, value: &str) -> bool {
        self.index_of(value).is_some()
    }

    /// Every value as a number, or `None` when some value is not numeric.
    pub fn numeric_values(&self) -> Option<Vec<f64>> {
        self.values.iter().map(|v| v.parse::<f64>().ok()).collect()
    }
}

/// A probability for every joint assignment of a fixed list of variables.
///
/// Cells are laid out row-major in variable order. Marginal lookups are
/// memoized, so repeated evaluation of one expression stays cheap.
#[derive(Debug)]
pub struct JointDistribution {
    variables: Vec<String>,
    domains: Vec<Domain>,
    probs: Vec<f64>,
    strides: Vec<usize>,
    marginals: Mutex<HashMap<Vec<(usize, usize)>, f64>>,
}

impl Clone for JointDistribution {
    fn clone(&self) -> Self {
        Self {
            variables: self.variables.clone(),
            domains: self.domains.clone(),
            probs: self.probs.clone(),
            strides: self.strides.clone(),
            marginals: Mutex::new(HashMap::new()),
        }
    }
}

impl JointDistribution {
    /// Build from explicit cell probabilities, which must sum to one.
    pub fn from_table(variables: Vec<String>, domains: Vec<Domain>, probs: Vec<f64>) -> Result<Self> {
        if variables.len() != domains.len() {
            return Err(PqpError::Estimation(format!(
                "{} variables but {} domains",
                variables.len(),
                domains.len()
            )));
        }
        let cells = cell_count(&domains)?;
        if probs.len() != cells {
            return Err(PqpError::Estimation(format!(
                "expected {} cells, got {}",
                cells,
                probs.len()
            )));
        }
        if probs.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(PqpError::Estimation("probabilities must be finite and non-negative".into()));
        }
        let total: f64 = probs.iter().sum();
        if (total - 1.0).abs() > 1e-9 {
            return Err(PqpError::Estimation(format!("probabilities sum to {}", total)));
        }

        let strides = strides(&domains);
        Ok(Self {
            variables,
            domains,
            probs,
            strides,
            marginals: Mutex::new(HashMap::new()),
        })
    }

    /// Maximum a posteriori estimate from records, with a domain inferred
    /// for every column. See [`JointDistribution::from_dataset`].
    pub fn from_records(records: &[Record], variables: &[String], smoothing: f64) -> Result<Self> {
        Self::from_dataset(&Dataset::new(records.to_vec())?, variables, smoothing)
    }

    /// Maximum a posteriori estimate: observed counts plus `smoothing`
    /// virtual observations spread evenly over every cell of the joint
    /// domain of `variables`.
    ///
    /// Every variable needs a discrete domain in `data`.
    pub fn from_dataset(data: &Dataset, variables: &[String], smoothing: f64) -> Result<Self> {
        if data.is_empty() {
            return Err(PqpError::Estimation("no records to estimate from".into()));
        }
        if variables.is_empty() {
            return Err(PqpError::Estimation("no variables to estimate".into()));
        }

        let domains = variables
            .iter()
            .map(|var| data.domain(var)?.to_discrete(var))
            .collect::<Result<Vec<Domain>>>()?;

        let cells = cell_count(&domains)?;
        let strides = strides(&domains);
        let mut counts = vec![0.0; cells];
        for record in data.records() {
            let mut cell = 0;
            for (i, var) in variables.iter().enumerate() {
                let idx = record
                    .get(var)
                    .and_then(|v| domains[i].index_of(v))
                    .ok_or_else(|| PqpError::Estimation(format!("unexpected value for {}", var)))?;
                cell += idx * strides[i];
            }
            counts[cell] += 1.0;
        }

        let prior = smoothing / cells as f64;
        let total = data.len() as f64 + smoothing;
        let probs = counts.into_iter().map(|c| (c + prior) / total).collect();

        debug!(
            "Estimated joint distribution over {} variables ({} cells) from {} records",
            variables.len(),
            cells,
            data.len()
        );

        Ok(Self {
            variables: variables.to_vec(),
            domains,
            probs,
            strides,
            marginals: Mutex::new(HashMap::new()),
        })
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v == name)
    }

    pub fn domain(&self, name: &str) -> Option<&Domain> {
        self.column(name).map(|i| &self.domains[i])
    }

    pub fn domain_at(&self, column: usize) -> &Domain {
        &self.domains[column]
    }

    pub fn cells(&self) -> usize {
        self.probs.len()
    }

    /// Probability of a partial assignment given as `(column, value index)`.
    pub fn marginal(&self, fixed: &[(usize, usize)]) -> f64 {
        if fixed.is_empty() {
            return 1.0;
        }
        let mut key = fixed.to_vec();
        key.sort_unstable();
        key.dedup();

        if let Ok(cache) = self.marginals.lock()
            && let Some(p) = cache.get(&key)
        {
            return *p;
        }

        let p = self
            .probs
            .iter()
            .enumerate()
            .filter(|(cell, _)| {
                key.iter()
                    .all(|(col, val)| (cell / self.strides[*col]) % self.domains[*col].cardinality() == *val)
            })
            .map(|(_, p)| p)
            .sum();

        if let Ok(mut cache) = self.marginals.lock() {
            cache.insert(key, p);
        }
        p
    }

    /// Probability of a partial assignment by name.
    pub fn probability(&self, assignment: &Record) -> Result<f64> {
        let fixed = assignment
            .iter()
            .map(|(name, value)| {
                let col = self
                    .column(name)
                    .ok_or_else(|| PqpError::UnknownVariable(name.clone()))?;
                let val = self.domains[col].index_of(value).ok_or_else(|| {
                    PqpError::Estimation(format!("{} is not a value of {}", value, name))
                })?;
                Ok((col, val))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self.marginal(&fixed))
    }
}

fn cell_count(domains: &[Domain]) -> Result<usize> {
    domains.iter().try_fold(1usize, |acc, d| {
        if d.cardinality() == 0 {
            return Err(PqpError::Estimation("empty domain".into()));
        }
        acc.checked_mul(d.cardinality())
            .filter(|n| *n <= MAX_CELLS)
            .ok_or_else(|| PqpError::Estimation(format!("joint table larger than {} cells", MAX_CELLS)))
    })
}

/// Row-major strides: the last variable varies fastest.
fn strides(domains: &[Domain]) -> Vec<usize> {
    let mut strides = vec![1; domains.len()];
    for i in (0..domains.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * domains[i + 1].cardinality();
    }
    strides
}

/// Read records from a JSON array of flat objects. Numbers and booleans are
/// kept as their JSON text.
pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    let content = fs::read_to_string(path).map_err(|source| PqpError::FileOperation {
        path: path.to_path_buf(),
        source,
    })?;
    parse_records(&content)
}

pub fn parse_records(content: &str) -> Result<Vec<Record>> {
    let value: Value = serde_json::from_str(content)?;
    let Value::Array(rows) = value else {
        return Err(PqpError::Json("records must be a JSON array".into()));
    };

    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            let Value::Object(fields) = row else {
                return Err(PqpError::Json(format!("record {} is not an object", i)));
            };
            fields
                .into_iter()
                .map(|(k, v)| {
                    let value = match v {
                        Value::String(s) => s,
                        Value::Number(n) => n.to_string(),
                        Value::Bool(b) => b.to_string(),
                        other => {
                            return Err(PqpError::Json(format!(
                                "record {} field {} has unsupported value {}",
                                i, k, other
                            )));
                        }
                    };
                    Ok((k, value))
                })
                .collect()
        })
        .collect()
}
