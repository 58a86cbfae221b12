// file: tests/common/mod.rs
// description: binary structural causal models for numeric identification checks
// reference: truncated factorization of interventional distributions

#![allow(dead_code)]

use pqp::estimation::{Domain, JointDistribution, Record, evaluate};
use pqp::{CausalGraph, Expression};
use std::collections::BTreeMap;

pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed ^ 0x9e37_79b9_7f4a_7c15)
    }

    /// Uniform in [0, 1).
    pub fn next(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) as f64 / (1u64 << 31) as f64
    }
}

/// Binary variables in topological order; latent ones are summed out of the
/// observational distribution.
pub struct Scm {
    names: Vec<String>,
    parents: Vec<Vec<usize>>,
    /// P(v = 1 | parent configuration), indexed by the parents' bits.
    cpt: Vec<Vec<f64>>,
    latent: Vec<bool>,
}

impl Scm {
    pub fn new() -> Self {
        Self {
            names: Vec::new(),
            parents: Vec::new(),
            cpt: Vec::new(),
            latent: Vec::new(),
        }
    }

    fn add(&mut self, name: &str, parents: &[&str], latent: bool, rng: &mut Lcg) -> &mut Self {
        let parents: Vec<usize> = parents
            .iter()
            .map(|p| self.names.iter().position(|n| n == p).expect("parent declared first"))
            .collect();
        let cpt = (0..1usize << parents.len()).map(|_| 0.15 + 0.7 * rng.next()).collect();
        self.names.push(name.to_string());
        self.parents.push(parents);
        self.cpt.push(cpt);
        self.latent.push(latent);
        self
    }

    pub fn observed(&mut self, name: &str, parents: &[&str], rng: &mut Lcg) -> &mut Self {
        self.add(name, parents, false, rng)
    }

    /// A root variable that is summed out of the observational distribution.
    pub fn latent(&mut self, name: &str, rng: &mut Lcg) -> &mut Self {
        self.add(name, &[], true, rng)
    }

    fn index(&self, name: &str) -> usize {
        self.names.iter().position(|n| n == name).expect("known variable")
    }

    /// Probability of one full configuration with `interventions` forced.
    fn config_probability(&self, bits: &[usize], interventions: &BTreeMap<usize, usize>) -> f64 {
        let mut p = 1.0;
        for (i, parents) in self.parents.iter().enumerate() {
            if let Some(forced) = interventions.get(&i) {
                if bits[i] != *forced {
                    return 0.0;
                }
                continue;
            }
            let row = parents.iter().fold(0, |acc, &q| (acc << 1) | bits[q]);
            let p1 = self.cpt[i][row];
            p *= if bits[i] == 1 { p1 } else { 1.0 - p1 };
        }
        p
    }

    fn configurations(&self) -> impl Iterator<Item = Vec<usize>> + '_ {
        let n = self.names.len();
        (0..1usize << n).map(move |code| (0..n).map(|i| (code >> (n - 1 - i)) & 1).collect())
    }

    /// Observational joint over the observed variables, in declaration order.
    pub fn observational(&self) -> JointDistribution {
        let observed: Vec<usize> = (0..self.names.len()).filter(|i| !self.latent[*i]).collect();
        let mut probs = vec![0.0; 1 << observed.len()];
        for bits in self.configurations() {
            let cell = observed.iter().fold(0, |acc, &i| (acc << 1) | bits[i]);
            probs[cell] += self.config_probability(&bits, &BTreeMap::new());
        }
        JointDistribution::from_table(
            observed.iter().map(|i| self.names[*i].clone()).collect(),
            observed.iter().map(|_| Domain::new(["0", "1"])).collect(),
            probs,
        )
        .expect("valid table")
    }

    /// P(outcome = value | do(interventions)) by truncated factorization.
    pub fn interventional(&self, outcome: &str, value: usize, interventions: &[(&str, usize)]) -> f64 {
        self.probability(&[(outcome, value)], interventions)
    }

    /// P(outcome = value | do(interventions), condition).
    pub fn conditional_interventional(
        &self,
        outcome: &str,
        value: usize,
        interventions: &[(&str, usize)],
        condition: &[(&str, usize)],
    ) -> f64 {
        let mut joint = condition.to_vec();
        joint.push((outcome, value));
        self.probability(&joint, interventions) / self.probability(condition, interventions)
    }

    /// Probability that every `(variable, value)` of `event` holds under
    /// `interventions`.
    pub fn probability(&self, event: &[(&str, usize)], interventions: &[(&str, usize)]) -> f64 {
        let forced: BTreeMap<usize, usize> = interventions.iter().map(|(n, v)| (self.index(n), *v)).collect();
        let event: Vec<(usize, usize)> = event.iter().map(|(n, v)| (self.index(n), *v)).collect();
        self.configurations()
            .filter(|bits| event.iter().all(|(i, v)| bits[*i] == *v))
            .map(|bits| self.config_probability(&bits, &forced))
            .sum()
    }
}

pub fn record(pairs: &[(&str, &str)]) -> Record {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// Evaluate with every free variable not in `values` set to `fill`.
pub fn evaluate_filled(expr: &Expression<String>, dist: &JointDistribution, values: &Record, fill: &str) -> f64 {
    let mut assignment = values.clone();
    for var in expr.free() {
        assignment.entry(var).or_insert_with(|| fill.to_string());
    }
    evaluate(expr, dist, &assignment).expect("evaluable expression")
}

pub fn identify(graph: &CausalGraph, y: &str, x: &[&str]) -> Expression<String> {
    let result = graph.idc(&[y], x, &[]).expect("valid query");
    assert!(result.identifiable, "{} should be identifiable", result.query);
    result.estimand
}
