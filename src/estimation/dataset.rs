// file: src/estimation/dataset.rs
// description: records with one typed domain per column and binning of real columns
// reference: equal-width right-closed binning of continuous measurements

use super::distribution::{Record, load_records};
use super::domain::VariableDomain;
use crate::error::{PqpError, Result};
use crate::utils::Step;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, warn};

/// Share of the value range the lowest bin edge is pushed down by, so the
/// minimum falls inside the first right-closed bin.
const EDGE_ADJUSTMENT: f64 = 0.001;

/// Observations whose every column carries a domain the values conform to.
///
/// Processing applied to the data is logged on a "Data Processing" step.
#[derive(Debug, Clone)]
pub struct Dataset {
    records: Vec<Record>,
    domains: BTreeMap<String, VariableDomain>,
    step: Step,
}

impl Dataset {
    /// Infer a domain for every column. Every record must carry every column.
    pub fn new(records: Vec<Record>) -> Result<Self> {
        let columns: BTreeSet<String> = records.iter().flat_map(|r| r.keys().cloned()).collect();
        for (i, record) in records.iter().enumerate() {
            if let Some(missing) = columns.iter().find(|c| !record.contains_key(*c)) {
                return Err(PqpError::Validation(format!("record {} is missing variable {}", i, missing)));
            }
        }

        let mut dataset = Self {
            records,
            domains: BTreeMap::new(),
            step: Step::new("Data Processing"),
        };
        for column in &columns {
            dataset.booleans_to_binary(column);
            let domain = VariableDomain::infer(&dataset.column(column));
            if domain.cardinality().is_some_and(|n| n <= 1) {
                warn!("Variable {} takes a single value in the data", column);
            }
            dataset.set_domain(column, domain);
        }
        Ok(dataset)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::new(load_records(path)?)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn domains(&self) -> &BTreeMap<String, VariableDomain> {
        &self.domains
    }

    pub fn domain(&self, variable: &str) -> Result<&VariableDomain> {
        self.domains
            .get(variable)
            .ok_or_else(|| PqpError::UnknownVariable(variable.to_string()))
    }

    pub fn step(&self) -> &Step {
        &self.step
    }

    /// Replace the inferred domain of `variable`; every value must be in it.
    pub fn with_domain(mut self, variable: &str, domain: VariableDomain) -> Result<Self> {
        self.domain(variable)?;
        domain.validate_or_err(variable, &self.column(variable))?;
        self.set_domain(variable, domain);
        Ok(self)
    }

    /// Check every column against its domain.
    pub fn validate(&self) -> Result<()> {
        for (variable, domain) in &self.domains {
            domain.validate_or_err(variable, &self.column(variable))?;
        }
        Ok(())
    }

    /// Replace each value of a numeric column by the midpoint of its bin
    /// among `bins` equal-width, right-closed bins spanning the data.
    ///
    /// The column becomes categorical over the midpoints that occur.
    pub fn quantize(&mut self, variable: &str, bins: usize) -> Result<()> {
        if bins == 0 {
            return Err(PqpError::Validation("quantize needs at least one bin".into()));
        }
        let domain = self.domain(variable)?;
        if !domain.is_numeric() {
            return Err(PqpError::Validation(format!(
                "{} is {}, only numeric columns can be quantized",
                variable, domain
            )));
        }

        let numbers = self
            .column(variable)
            .iter()
            .map(|v| {
                v.trim()
                    .parse::<f64>()
                    .map_err(|_| PqpError::Validation(format!("{} is not a number in {}", v, variable)))
            })
            .collect::<Result<Vec<f64>>>()?;
        let edges = bin_edges(&numbers, bins);

        let mut used = BTreeMap::new();
        for (record, x) in self.records.iter_mut().zip(&numbers) {
            let bin = edges[1..].iter().position(|right| x <= right).unwrap_or(bins - 1);
            let mid = format_number((edges[bin] + edges[bin + 1]) / 2.0);
            used.insert(bin, mid.clone());
            record.insert(variable.to_string(), mid);
        }

        self.step.substep(format!("Quantizing {} into {} bins", variable, bins), |step| {
            for (bin, mid) in &used {
                let note = format!(
                    "Mapping elements on ({}, {}] to {}",
                    format_number(edges[*bin]),
                    format_number(edges[*bin + 1]),
                    mid
                );
                debug!("{}: {}", variable, note);
                step.write(note);
            }
        });
        self.set_domain(variable, VariableDomain::categorical(used.into_values()));
        Ok(())
    }

    /// Quantize every real-valued column among `variables` into `bins` bins.
    /// Returns the columns that were quantized.
    pub fn discretize(&mut self, variables: &[String], bins: usize) -> Result<Vec<String>> {
        let real: Vec<String> = variables
            .iter()
            .filter(|v| self.domains.get(*v).is_some_and(|d| !d.is_discrete()))
            .cloned()
            .collect();
        for variable in &real {
            self.quantize(variable, bins)?;
        }
        Ok(real)
    }

    fn column(&self, variable: &str) -> Vec<String> {
        self.records
            .iter()
            .filter_map(|r| r.get(variable).cloned())
            .collect()
    }

    /// `true`/`false` columns are stored as `1`/`0`.
    fn booleans_to_binary(&mut self, variable: &str) {
        let column = self.column(variable);
        if column.is_empty() || !column.iter().all(|v| v == "true" || v == "false") {
            return;
        }
        for record in &mut self.records {
            if let Some(value) = record.get_mut(variable) {
                *value = if value == "true" { "1".into() } else { "0".into() };
            }
        }
    }

    fn set_domain(&mut self, variable: &str, domain: VariableDomain) {
        for record in &mut self.records {
            if let Some(value) = record.get_mut(variable) {
                *value = domain.canonical(value);
            }
        }
        self.step.assume(format!("{} is on {}", variable, domain));
        self.domains.insert(variable.to_string(), domain);
    }
}

/// `bins + 1` ascending edges. The lowest is moved down by a sliver of the
/// range; a constant column is widened around its value first.
fn bin_edges(numbers: &[f64], bins: usize) -> Vec<f64> {
    let mut lo = numbers.iter().copied().fold(f64::INFINITY, f64::min);
    let mut hi = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !lo.is_finite() || !hi.is_finite() {
        lo = 0.0;
        hi = 0.0;
    }

    if lo == hi {
        let pad = if lo == 0.0 { EDGE_ADJUSTMENT } else { lo.abs() * EDGE_ADJUSTMENT };
        lo -= pad;
        hi += pad;
        return (0..=bins).map(|i| lo + (hi - lo) * i as f64 / bins as f64).collect();
    }

    let mut edges: Vec<f64> = (0..=bins).map(|i| lo + (hi - lo) * i as f64 / bins as f64).collect();
    edges[0] -= (hi - lo) * EDGE_ADJUSTMENT;
    edges
}

/// At most three decimals, without trailing zeros.
fn format_number(x: f64) -> String {
    let rounded = format!("{:.3}", x);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}
