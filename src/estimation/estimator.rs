// file: src/estimation/estimator.rs
// description: multinomial plug-in estimation of identified causal quantities
// reference: categorical likelihood with dirichlet prior

use super::dataset::Dataset;
use super::distribution::{JointDistribution, Record};
use super::evaluate::Evaluator;
use crate::causal::CausalGraph;
use crate::error::{PqpError, Result};
use crate::expression::Expression;
use crate::identification::{Assignment, CausalEstimand, IdentifiedEstimand, Term};
use crate::parser::Query;
use crate::utils::{Step, Validator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// How far the outcome probabilities of one arm may drift from summing to one.
const MASS_TOLERANCE: f64 = 0.1;

/// Bins a real-valued column is cut into unless told otherwise.
pub const DEFAULT_BINS: usize = 2;

/// Probability of every joint value of the outcome variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionEstimate {
    pub query: String,
    pub outcome: Vec<String>,
    pub rows: Vec<(Assignment<String>, f64)>,
    #[serde(default, skip_serializing_if = "Step::is_empty")]
    pub derivation: Step,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectEstimate {
    pub estimand: String,
    pub outcome: String,
    /// `E[outcome | do(treatment)]`
    pub treated_mean: f64,
    /// `E[outcome | do(control)]`
    pub control_mean: f64,
    pub effect: f64,
    #[serde(default, skip_serializing_if = "Step::is_empty")]
    pub derivation: Step,
}

/// Estimates identified quantities from categorical records.
///
/// `smoothing` virtual observations are spread evenly over the joint domain
/// of the observed variables before any data is seen, which keeps every
/// cell positive. Real-valued columns are quantized into `bins` bins.
#[derive(Debug, Clone)]
pub struct MultinomialEstimator {
    smoothing: f64,
    bins: usize,
    observed: Option<BTreeSet<String>>,
    distribution: Option<JointDistribution>,
    data_step: Step,
}

impl MultinomialEstimator {
    pub fn new(smoothing: f64) -> Result<Self> {
        Validator::validate_smoothing(smoothing)?;
        Ok(Self {
            smoothing,
            bins: DEFAULT_BINS,
            observed: None,
            distribution: None,
            data_step: Step::default(),
        })
    }

    pub fn from_distribution(distribution: JointDistribution) -> Self {
        Self {
            smoothing: 0.0,
            bins: DEFAULT_BINS,
            observed: None,
            distribution: Some(distribution),
            data_step: Step::default(),
        }
    }

    pub fn with_bins(mut self, bins: usize) -> Result<Self> {
        if bins == 0 {
            return Err(PqpError::Validation("bins must be greater than 0".into()));
        }
        self.bins = bins;
        Ok(self)
    }

    /// Fit over these variables only; the rest of the graph is treated as
    /// unmeasured. Defaults to every variable of the graph.
    pub fn with_observed<I, S>(mut self, observed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.observed = Some(observed.into_iter().map(Into::into).collect());
        self
    }

    pub fn smoothing(&self) -> f64 {
        self.smoothing
    }

    pub fn distribution(&self) -> Option<&JointDistribution> {
        self.distribution.as_ref()
    }

    /// Processing applied to the data of the last fit.
    pub fn data_step(&self) -> &Step {
        &self.data_step
    }

    pub fn fit(&mut self, graph: &CausalGraph, records: &[Record]) -> Result<&JointDistribution> {
        self.fit_dataset(graph, Dataset::new(records.to_vec())?)
    }

    /// Estimate the joint distribution over the observed variables of
    /// `graph`, quantizing real-valued ones first.
    pub fn fit_dataset(&mut self, graph: &CausalGraph, mut data: Dataset) -> Result<&JointDistribution> {
        let in_graph: BTreeSet<String> = graph.variables().iter().map(|v| v.name().to_string()).collect();
        let observed = self.observed.clone().unwrap_or_else(|| in_graph.clone());
        let outside: Vec<&str> = observed.difference(&in_graph).map(String::as_str).collect();
        if !outside.is_empty() {
            return Err(PqpError::Validation(format!(
                "observed variables must be a subset of the graph variables, {} are not",
                outside.join(", ")
            )));
        }
        if observed.is_empty() {
            return Err(PqpError::Validation("no observed variables to fit".into()));
        }

        let variables: Vec<String> = observed.into_iter().collect();
        info!(
            "Fitting multinomial model over {} of {} variables from {} records",
            variables.len(),
            in_graph.len(),
            data.len()
        );
        let quantized = data.discretize(&variables, self.bins)?;
        if !quantized.is_empty() {
            info!("Quantized {} into {} bins", quantized.join(", "), self.bins);
        }

        let dist = JointDistribution::from_dataset(&data, &variables, self.smoothing)?;
        self.data_step = data.step().clone();
        Ok(self.distribution.insert(dist))
    }

    fn fitted(&self) -> Result<&JointDistribution> {
        self.distribution
            .as_ref()
            .ok_or_else(|| PqpError::Estimation("estimator has not been fitted".to_string()))
    }

    /// The "Estimation" step: data processing, identification, then the
    /// estimation assumptions.
    fn derivation(&self, identification: Step) -> Step {
        let mut step = Step::new("Estimation");
        step.push(self.data_step.clone());
        step.push(identification);
        step.write("Performing brute force estimation using a multinomial likelihood and dirichlet prior.");
        step.assume("Multinomial likelihood");
        step.assume("Dirichlet prior");
        step
    }

    /// Identify `query` in `graph` and evaluate it for every outcome value.
    /// Intervention and condition variables take their values from
    /// `query.values`.
    pub fn interventional_distribution(&self, graph: &CausalGraph, query: &Query) -> Result<DistributionEstimate> {
        let dist = self.fitted()?;
        let identified = graph.identify(&query.to_estimand())?;
        let IdentifiedEstimand::Distribution { mut term } = identified else {
            return Err(PqpError::InvalidQuery(format!("{} is not a distribution", query)));
        };
        if term.expression.contains_hedge() {
            return Err(PqpError::NotIdentifiable(query.to_string()));
        }
        require_observed(&term.expression, dist)?;

        for name in term.intervention.iter().chain(&term.condition) {
            let value = query
                .values
                .get(name)
                .ok_or_else(|| PqpError::InvalidQuery(format!("no value given for {}", name)))?;
            term.values.insert(name.clone(), value.clone());
        }

        let evaluator = Evaluator::new(dist);
        let outcome: Vec<String> = term.outcome.iter().cloned().collect();
        let base = fill_free(&term.expression, &term.values, &outcome, dist)?;

        let mut derivation = self.derivation(term.explain());
        let mut rows = Vec::new();
        for values in outcome_grid(&outcome, dist)? {
            let mut assignment = base.clone();
            assignment.extend(values.clone());
            let p = evaluator.evaluate(&term.expression, &assignment)?;
            let cell: Vec<String> = values.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            derivation.result(format!("P({})", cell.join(", ")), p);
            rows.push((values, p));
        }

        debug!("Evaluated {} over {} outcome values", query, rows.len());
        Ok(DistributionEstimate {
            query: query.to_string(),
            outcome,
            rows,
            derivation,
        })
    }

    /// Difference in expected outcome between the treated and control arms.
    pub fn estimate_effect(&self, graph: &CausalGraph, estimand: &CausalEstimand<String>) -> Result<EffectEstimate> {
        let dist = self.fitted()?;
        let identified = graph.identify(estimand)?;
        let identification = identified.explain();
        let IdentifiedEstimand::Effect {
            outcome,
            treated,
            control,
        } = identified
        else {
            return Err(PqpError::InvalidQuery(format!("{} is not an effect", estimand)));
        };
        let treated_mean = expectation(&outcome, &treated, dist)?;
        let control_mean = expectation(&outcome, &control, dist)?;
        let effect = treated_mean - control_mean;

        let mut derivation = self.derivation(identification);
        derivation.result("treated_mean", treated_mean);
        derivation.result("control_mean", control_mean);
        derivation.result("effect", effect);

        let estimate = EffectEstimate {
            estimand: estimand.to_string(),
            outcome,
            treated_mean,
            control_mean,
            effect,
            derivation,
        };
        info!("{} = {:.6}", estimate.estimand, estimate.effect);
        Ok(estimate)
    }

    pub fn estimate_ate(
        &self,
        graph: &CausalGraph,
        outcome: &str,
        treatment: Assignment<String>,
        control: Assignment<String>,
    ) -> Result<EffectEstimate> {
        self.estimate_effect(
            graph,
            &CausalEstimand::Ate {
                outcome: outcome.to_string(),
                treatment,
                control,
            },
        )
    }

    /// ATE of `treatment = 1` against `treatment = 0`; the fitted domain of
    /// `treatment` must be exactly `{0, 1}`.
    pub fn estimate_binary_ate(&self, graph: &CausalGraph, outcome: &str, treatment: &str) -> Result<EffectEstimate> {
        let domain = self
            .fitted()?
            .domain(treatment)
            .ok_or_else(|| PqpError::UnknownVariable(treatment.to_string()))?;
        if domain.values() != ["0", "1"] {
            return Err(PqpError::Estimation(format!(
                "binary treatment {} must take values {{0, 1}}, found {{{}}}",
                treatment,
                domain.values().join(", ")
            )));
        }
        self.estimate_effect(graph, &CausalEstimand::binary_ate(outcome.to_string(), treatment.to_string()))
    }

    pub fn estimate_cate(
        &self,
        graph: &CausalGraph,
        outcome: &str,
        treatment: Assignment<String>,
        control: Assignment<String>,
        subpopulation: Assignment<String>,
    ) -> Result<EffectEstimate> {
        self.estimate_effect(
            graph,
            &CausalEstimand::Cate {
                outcome: outcome.to_string(),
                treatment,
                control,
                subpopulation,
            },
        )
    }
}

/// Every variable of `expr` must be a column of the fitted table.
fn require_observed(expr: &Expression<String>, dist: &JointDistribution) -> Result<()> {
    let missing: Vec<String> = expr
        .variables()
        .into_iter()
        .filter(|v| dist.column(v).is_none())
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(PqpError::Estimation(format!(
        "estimand needs unobserved variables {}",
        missing.join(", ")
    )))
}

/// `Σ_y y · P(y | ...)` for one arm of an effect.
fn expectation(outcome: &str, term: &Term<String>, dist: &JointDistribution) -> Result<f64> {
    if term.expression.contains_hedge() {
        return Err(PqpError::NotIdentifiable(format!(
            "P({} | do({}))",
            outcome,
            term.intervention.iter().cloned().collect::<Vec<_>>().join(", ")
        )));
    }
    require_observed(&term.expression, dist)?;
    let domain = dist
        .domain(outcome)
        .ok_or_else(|| PqpError::UnknownVariable(outcome.to_string()))?;
    let numbers = domain.numeric_values().ok_or_else(|| {
        PqpError::Estimation(format!("outcome {} has non-numeric values", outcome))
    })?;

    if !term.expression.free().contains(outcome) {
        return Err(PqpError::Estimation(format!("estimand does not depend on {}", outcome)));
    }

    let evaluator = Evaluator::new(dist);
    let mut assignment = fill_free(&term.expression, &term.values, &[outcome.to_string()], dist)?;
    let mut mean = 0.0;
    let mut mass = 0.0;
    for (value, number) in domain.values().iter().zip(numbers) {
        assignment.insert(outcome.to_string(), value.clone());
        let p = evaluator.evaluate(&term.expression, &assignment)?;
        mean += number * p;
        mass += p;
    }

    if (mass - 1.0).abs() > MASS_TOLERANCE {
        return Err(PqpError::Estimation(format!(
            "probabilities of {} sum to {:.4}",
            outcome, mass
        )));
    }
    Ok(mean)
}

/// Extend `values` with the first domain value of every free variable that
/// is neither assigned nor in `skip`.
///
/// Identification can leave context variables free when the result holds
/// for any of their values.
fn fill_free(
    expr: &Expression<String>,
    values: &Assignment<String>,
    skip: &[String],
    dist: &JointDistribution,
) -> Result<Record> {
    let mut assignment = values.clone();
    for var in expr.free() {
        if assignment.contains_key(&var) || skip.contains(&var) {
            continue;
        }
        let first = dist
            .domain(&var)
            .and_then(|d| d.values().first())
            .ok_or_else(|| PqpError::UnknownVariable(var.clone()))?;
        debug!("Fixing free variable {} to {}", var, first);
        assignment.insert(var, first.clone());
    }
    Ok(assignment)
}

/// Every joint value of `vars`, in domain order.
fn outcome_grid(vars: &[String], dist: &JointDistribution) -> Result<Vec<Assignment<String>>> {
    let mut grid = vec![Assignment::new()];
    for var in vars {
        let domain = dist
            .domain(var)
            .ok_or_else(|| PqpError::UnknownVariable(var.clone()))?;
        grid = grid
            .into_iter()
            .flat_map(|partial| {
                domain.values().iter().map(move |value| {
                    let mut next = partial.clone();
                    next.insert(var.clone(), value.clone());
                    next
                })
            })
            .collect();
    }
    Ok(grid)
}
