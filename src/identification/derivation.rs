// file: src/identification/derivation.rs
// description: record of the ID and IDC branches taken while identifying a query
// reference: Shpitser & Pearl (2006), lines of algorithms ID and IDC

use crate::utils::Step;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Display;

/// A branch of ID or IDC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// ID line 1: nothing is intervened on.
    Marginalize,
    /// ID line 2: drop non-ancestors of the outcome.
    Ancestors,
    /// ID line 3: intervene on variables that cannot reach the outcome.
    ExtendIntervention,
    /// ID line 4: split into c-components.
    Factorize,
    /// ID line 5: the graph is one c-component.
    Hedge,
    /// ID line 6: the remaining district is a c-component of the graph.
    District,
    /// ID line 7: the district sits inside a larger c-component.
    Subdistrict,
    /// IDC: a conditioning variable becomes an intervention.
    ConditionToAction,
    /// IDC: normalize `P(y, z | do(x))` over `y`.
    Normalize,
}

impl Rule {
    pub fn label(&self) -> &'static str {
        match self {
            Rule::Marginalize => "ID line 1",
            Rule::Ancestors => "ID line 2",
            Rule::ExtendIntervention => "ID line 3",
            Rule::Factorize => "ID line 4",
            Rule::Hedge => "ID line 5",
            Rule::District => "ID line 6",
            Rule::Subdistrict => "ID line 7",
            Rule::ConditionToAction => "IDC rule 2",
            Rule::Normalize => "IDC",
        }
    }
}

/// One applied rule. `subject` is the set of variables the rule acts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationStep<T: Ord> {
    pub rule: Rule,
    pub depth: usize,
    pub outcome: BTreeSet<T>,
    pub intervention: BTreeSet<T>,
    pub subject: BTreeSet<T>,
}

/// Rules applied while identifying one query, in the order they fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Derivation<T: Ord> {
    steps: Vec<DerivationStep<T>>,
}

impl<T: Ord> Default for Derivation<T> {
    fn default() -> Self {
        Self { steps: Vec::new() }
    }
}

impl<T: Ord> Derivation<T> {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl<T: Ord + Clone> Derivation<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        rule: Rule,
        depth: usize,
        outcome: &BTreeSet<T>,
        intervention: &BTreeSet<T>,
        subject: &BTreeSet<T>,
    ) {
        self.steps.push(DerivationStep {
            rule,
            depth,
            outcome: outcome.clone(),
            intervention: intervention.clone(),
            subject: subject.clone(),
        });
    }

    pub fn steps(&self) -> &[DerivationStep<T>] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn rules(&self) -> Vec<Rule> {
        self.steps.iter().map(|s| s.rule).collect()
    }

    pub fn reached_hedge(&self) -> bool {
        self.steps.iter().any(|s| s.rule == Rule::Hedge)
    }

    pub fn map_vars<U: Ord + Clone>(&self, f: &impl Fn(&T) -> U) -> Derivation<U> {
        let set = |s: &BTreeSet<T>| s.iter().map(f).collect::<BTreeSet<U>>();
        Derivation {
            steps: self
                .steps
                .iter()
                .map(|s| DerivationStep {
                    rule: s.rule,
                    depth: s.depth,
                    outcome: set(&s.outcome),
                    intervention: set(&s.intervention),
                    subject: set(&s.subject),
                })
                .collect(),
        }
    }
}

impl<T: Ord + Clone + Display> Derivation<T> {
    /// The `IDC` step of an explanation: input query, the standing
    /// assumptions, every applied rule and the identified expression.
    pub fn to_step(&self, query: &str, estimand: &str) -> Step {
        let mut step = Step::new("IDC");
        step.write(format!("Input: {}", query));
        step.assume("Noncontradictory evidence");
        step.assume("Acyclicity");
        step.assume("Positivity");
        for applied in &self.steps {
            step.write(format!(
                "{}{}: {}",
                "  ".repeat(applied.depth),
                applied.rule.label(),
                applied.describe()
            ));
        }
        step.write(format!("Output: {}", estimand));
        step.result("identified_estimand", estimand);
        step
    }
}

impl<T: Ord + Display> DerivationStep<T> {
    pub fn describe(&self) -> String {
        let list = |s: &BTreeSet<T>| {
            let names: Vec<String> = s.iter().map(|v| v.to_string()).collect();
            format!("{{{}}}", names.join(", "))
        };
        let (y, x, subject) = (list(&self.outcome), list(&self.intervention), list(&self.subject));

        match self.rule {
            Rule::Marginalize => format!("no intervention left, sum {} out of P", subject),
            Rule::Ancestors => format!("keep the ancestors of {}, sum out {}", y, subject),
            Rule::ExtendIntervention => format!(
                "{} cannot affect {} once {} is fixed, add it to the intervention",
                subject, y, x
            ),
            Rule::Factorize => format!("{} spans several c-components, identify each", subject),
            Rule::Hedge => format!("hedge, {} shares one c-component with {}", subject, x),
            Rule::District => format!("{} is a c-component, factorize along the order", subject),
            Rule::Subdistrict => format!("recurse into the enclosing c-component {}", subject),
            Rule::ConditionToAction => format!(
                "{} is independent of {} given the rest once its effects are cut, replace it by do({})",
                subject, y, subject
            ),
            Rule::Normalize => format!("identify P({}, {} | do({})) and normalize over {}", y, subject, x, y),
        }
    }
}
