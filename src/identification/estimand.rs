// file: src/identification/estimand.rs
// description: causal estimands and their identification through cached IDC calls
// reference: average and conditional average treatment effects

use super::derivation::Derivation;
use super::{IdentificationOptions, idc_traced};
use crate::error::{PqpError, Result};
use crate::expression::{Expression, Form};
use crate::graph::{Node, NodeSet};
use crate::model::Model;
use crate::utils::Step;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display};
use tracing::debug;

/// Values of a set of variables, keyed by variable.
pub type Assignment<T> = BTreeMap<T, String>;

/// A causal quantity to identify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CausalEstimand<T: Ord> {
    /// `P(outcome | do(intervention), condition)`.
    Interventional {
        outcome: BTreeSet<T>,
        intervention: BTreeSet<T>,
        #[serde(default = "BTreeSet::new")]
        condition: BTreeSet<T>,
    },
    /// `E[outcome | do(treatment)] - E[outcome | do(control)]`.
    Ate {
        outcome: T,
        treatment: Assignment<T>,
        control: Assignment<T>,
    },
    /// The average treatment effect within `subpopulation`.
    Cate {
        outcome: T,
        treatment: Assignment<T>,
        control: Assignment<T>,
        subpopulation: Assignment<T>,
    },
}

/// One identified interventional distribution together with the values its
/// variables take in the estimand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term<T: Ord> {
    pub outcome: BTreeSet<T>,
    pub intervention: BTreeSet<T>,
    pub condition: BTreeSet<T>,
    pub values: Assignment<T>,
    pub expression: Expression<T>,
    #[serde(default = "Derivation::default", skip_serializing_if = "Derivation::is_empty")]
    pub derivation: Derivation<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdentifiedEstimand<T: Ord> {
    Distribution { term: Term<T> },
    Effect { outcome: T, treated: Term<T>, control: Term<T> },
}

impl<T: Ord + Clone> CausalEstimand<T> {
    /// ATE of a binary treatment: `treatment = 1` against `treatment = 0`.
    pub fn binary_ate(outcome: T, treatment: T) -> Self {
        CausalEstimand::Ate {
            outcome,
            treatment: [(treatment.clone(), "1".to_string())].into(),
            control: [(treatment, "0".to_string())].into(),
        }
    }

    /// The treatment variable when this is the ATE of a single variable set
    /// to `1` against `0`.
    pub fn binary_treatment(&self) -> Option<&T> {
        let CausalEstimand::Ate { treatment, control, .. } = self else {
            return None;
        };
        match (treatment.iter().next(), control.iter().next()) {
            (Some((t, on)), Some((c, off)))
                if treatment.len() == 1 && control.len() == 1 && t == c && on == "1" && off == "0" =>
            {
                Some(t)
            }
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CausalEstimand::Interventional { .. } => "interventional distribution",
            CausalEstimand::Ate { .. } => "average treatment effect",
            CausalEstimand::Cate { .. } => "conditional average treatment effect",
        }
    }

    /// Every variable the estimand mentions.
    pub fn variables(&self) -> BTreeSet<T> {
        match self {
            CausalEstimand::Interventional {
                outcome,
                intervention,
                condition,
            } => outcome
                .iter()
                .chain(intervention)
                .chain(condition)
                .cloned()
                .collect(),
            CausalEstimand::Ate {
                outcome,
                treatment,
                control,
            } => std::iter::once(outcome)
                .chain(treatment.keys())
                .chain(control.keys())
                .cloned()
                .collect(),
            CausalEstimand::Cate {
                outcome,
                treatment,
                control,
                subpopulation,
            } => std::iter::once(outcome)
                .chain(treatment.keys())
                .chain(control.keys())
                .chain(subpopulation.keys())
                .cloned()
                .collect(),
        }
    }

    /// Rename every variable, stopping at the first failed lookup.
    pub fn try_map_vars<U: Ord + Clone>(&self, f: &impl Fn(&T) -> Result<U>) -> Result<CausalEstimand<U>> {
        let set = |s: &BTreeSet<T>| s.iter().map(f).collect::<Result<BTreeSet<U>>>();
        let assignment = |a: &Assignment<T>| {
            a.iter()
                .map(|(k, v)| Ok((f(k)?, v.clone())))
                .collect::<Result<Assignment<U>>>()
        };
        Ok(match self {
            CausalEstimand::Interventional {
                outcome,
                intervention,
                condition,
            } => CausalEstimand::Interventional {
                outcome: set(outcome)?,
                intervention: set(intervention)?,
                condition: set(condition)?,
            },
            CausalEstimand::Ate {
                outcome,
                treatment,
                control,
            } => CausalEstimand::Ate {
                outcome: f(outcome)?,
                treatment: assignment(treatment)?,
                control: assignment(control)?,
            },
            CausalEstimand::Cate {
                outcome,
                treatment,
                control,
                subpopulation,
            } => CausalEstimand::Cate {
                outcome: f(outcome)?,
                treatment: assignment(treatment)?,
                control: assignment(control)?,
                subpopulation: assignment(subpopulation)?,
            },
        })
    }

    fn validate(&self) -> Result<()> {
        let (outcome, treatment, control, subpopulation) = match self {
            CausalEstimand::Interventional { .. } => return Ok(()),
            CausalEstimand::Ate {
                outcome,
                treatment,
                control,
            } => (outcome, treatment, control, None),
            CausalEstimand::Cate {
                outcome,
                treatment,
                control,
                subpopulation,
            } => (outcome, treatment, control, Some(subpopulation)),
        };

        if treatment.is_empty() || control.is_empty() {
            return Err(PqpError::InvalidQuery(
                "treatment and control conditions must not be empty".into(),
            ));
        }
        if treatment.contains_key(outcome) || control.contains_key(outcome) {
            return Err(PqpError::InvalidQuery("outcome cannot be a treatment variable".into()));
        }
        if let Some(sub) = subpopulation
            && (sub.contains_key(outcome)
                || sub.keys().any(|k| treatment.contains_key(k) || control.contains_key(k)))
        {
            return Err(PqpError::InvalidQuery(
                "subpopulation overlaps outcome or treatment".into(),
            ));
        }
        Ok(())
    }
}

impl<T: Ord + Display> Display for CausalEstimand<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<'a, V: Display + 'a>(items: impl Iterator<Item = &'a V>) -> String {
            items.map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
        }

        match self {
            CausalEstimand::Interventional {
                outcome,
                intervention,
                condition,
            } => {
                let mut given: Vec<String> = intervention.iter().map(|v| format!("do({})", v)).collect();
                given.extend(condition.iter().map(|v| v.to_string()));
                if given.is_empty() {
                    write!(f, "P({})", list(outcome.iter()))
                } else {
                    write!(f, "P({} | {})", list(outcome.iter()), given.join(", "))
                }
            }
            CausalEstimand::Ate {
                outcome,
                treatment,
                control,
            } => {
                let vars: BTreeSet<&T> = treatment.keys().chain(control.keys()).collect();
                write!(f, "ATE({} | {})", outcome, list(vars.into_iter()))
            }
            CausalEstimand::Cate {
                outcome,
                treatment,
                control,
                subpopulation,
            } => {
                let vars: BTreeSet<&T> = treatment.keys().chain(control.keys()).collect();
                write!(
                    f,
                    "CATE({} | {} | {})",
                    outcome,
                    list(vars.into_iter()),
                    list(subpopulation.keys())
                )
            }
        }
    }
}

impl<T: Ord + Clone> Term<T> {
    pub fn map_vars<U: Ord + Clone>(&self, f: &impl Fn(&T) -> U) -> Term<U> {
        Term {
            outcome: self.outcome.iter().map(f).collect(),
            intervention: self.intervention.iter().map(f).collect(),
            condition: self.condition.iter().map(f).collect(),
            values: self.values.iter().map(|(k, v)| (f(k), v.clone())).collect(),
            expression: self.expression.map_vars(f),
            derivation: self.derivation.map_vars(f),
        }
    }
}

impl<T: Ord + Clone + Display> Term<T> {
    /// `P(outcome | do(intervention), condition)`.
    pub fn query(&self) -> String {
        CausalEstimand::Interventional {
            outcome: self.outcome.clone(),
            intervention: self.intervention.clone(),
            condition: self.condition.clone(),
        }
        .to_string()
    }

    pub fn explain(&self) -> Step {
        self.derivation.to_step(&self.query(), &self.expression.to_string())
    }
}

impl<T: Ord + Clone> IdentifiedEstimand<T> {
    pub fn is_identifiable(&self) -> bool {
        self.terms().iter().all(|t| !t.expression.contains_hedge())
    }

    pub fn terms(&self) -> Vec<&Term<T>> {
        match self {
            IdentifiedEstimand::Distribution { term } => vec![term],
            IdentifiedEstimand::Effect { treated, control, .. } => vec![treated, control],
        }
    }

    pub fn map_vars<U: Ord + Clone>(&self, f: &impl Fn(&T) -> U) -> IdentifiedEstimand<U> {
        match self {
            IdentifiedEstimand::Distribution { term } => IdentifiedEstimand::Distribution {
                term: term.map_vars(f),
            },
            IdentifiedEstimand::Effect {
                outcome,
                treated,
                control,
            } => IdentifiedEstimand::Effect {
                outcome: f(outcome),
                treated: treated.map_vars(f),
                control: control.map_vars(f),
            },
        }
    }
}

impl<T: Ord + Clone + Display> IdentifiedEstimand<T> {
    /// One `IDC` step per distinct term.
    pub fn explain(&self) -> Step {
        let mut step = Step::new("Identification");
        let mut seen = BTreeSet::new();
        for term in self.terms() {
            if seen.insert(term.query()) {
                step.push(term.explain());
            }
        }
        step
    }
}

/// Memoizes IDC results by `(y, x, z)`; the treated and control arms of an
/// effect usually share one identification.
#[derive(Debug, Default)]
pub struct IdcCache {
    entries: BTreeMap<(NodeSet, NodeSet, NodeSet), (Form, Derivation<Node>)>,
    hits: usize,
}

impl IdcCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn idc(
        &mut self,
        model: &Model,
        y: &NodeSet,
        x: &NodeSet,
        z: &NodeSet,
        options: &IdentificationOptions,
    ) -> Result<(Form, Derivation<Node>)> {
        let key = (y.clone(), x.clone(), z.clone());
        if let Some(found) = self.entries.get(&key) {
            self.hits += 1;
            return Ok(found.clone());
        }
        let (form, derivation) = idc_traced(model, y, x, z)?;
        let identified = (options.finish(form), derivation);
        self.entries.insert(key, identified.clone());
        Ok(identified)
    }
}

/// Identify every interventional distribution the estimand is built from.
pub fn identify_estimand(
    model: &Model,
    estimand: &CausalEstimand<Node>,
    options: &IdentificationOptions,
    cache: &mut IdcCache,
) -> Result<IdentifiedEstimand<Node>> {
    estimand.validate()?;
    debug!("Identifying the {} {:?}", estimand.name(), estimand);

    match estimand {
        CausalEstimand::Interventional {
            outcome,
            intervention,
            condition,
        } => {
            let (expression, derivation) = cache.idc(model, outcome, intervention, condition, options)?;
            Ok(IdentifiedEstimand::Distribution {
                term: Term {
                    outcome: outcome.clone(),
                    intervention: intervention.clone(),
                    condition: condition.clone(),
                    values: Assignment::new(),
                    expression,
                    derivation,
                },
            })
        }
        CausalEstimand::Ate {
            outcome,
            treatment,
            control,
        } => {
            let y: NodeSet = [*outcome].into();
            let none = Assignment::new();
            Ok(IdentifiedEstimand::Effect {
                outcome: *outcome,
                treated: identify_arm(model, &y, treatment, &none, options, cache)?,
                control: identify_arm(model, &y, control, &none, options, cache)?,
            })
        }
        CausalEstimand::Cate {
            outcome,
            treatment,
            control,
            subpopulation,
        } => {
            let y: NodeSet = [*outcome].into();
            Ok(IdentifiedEstimand::Effect {
                outcome: *outcome,
                treated: identify_arm(model, &y, treatment, subpopulation, options, cache)?,
                control: identify_arm(model, &y, control, subpopulation, options, cache)?,
            })
        }
    }
}

fn identify_arm(
    model: &Model,
    outcome: &NodeSet,
    treatment: &Assignment<Node>,
    given: &Assignment<Node>,
    options: &IdentificationOptions,
    cache: &mut IdcCache,
) -> Result<Term<Node>> {
    let intervention: NodeSet = treatment.keys().copied().collect();
    let condition: NodeSet = given.keys().copied().collect();
    let (expression, derivation) = cache.idc(model, outcome, &intervention, &condition, options)?;
    let values: Assignment<Node> = treatment
        .iter()
        .chain(given.iter())
        .map(|(k, v)| (*k, v.clone()))
        .collect();
    Ok(Term {
        outcome: outcome.clone(),
        intervention,
        condition,
        values,
        expression,
        derivation,
    })
}
