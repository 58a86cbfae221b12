// file: src/expression/form.rs
// description: symbolic probability expressions produced by identification
// reference: Shpitser & Pearl, ID algorithm output language

use crate::graph::Node;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops;

/// A probability expression over variables of type `T`.
///
/// The serde representation is the JSON wire format consumed by front ends:
/// every object carries a `type` tag plus the variant's fields.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expression<T: Ord> {
    /// Sum of `exp` over every value of the variables in `sub`.
    Marginal {
        sub: BTreeSet<T>,
        exp: Box<Expression<T>>,
    },
    Product {
        exprs: Vec<Expression<T>>,
    },
    Quotient {
        numer: Box<Expression<T>>,
        denom: Box<Expression<T>>,
    },
    /// `P(vars | given)`; an empty `vars` is the constant one.
    P {
        vars: BTreeSet<T>,
        given: BTreeSet<T>,
    },
    /// The query is not identifiable.
    Hedge,
}

/// Expression over dense node ids, as used inside the identification engine.
pub type Form = Expression<Node>;

impl<T: Ord + Clone> Expression<T> {
    pub fn marginal(over: impl IntoIterator<Item = T>, exp: Expression<T>) -> Self {
        Expression::Marginal {
            sub: over.into_iter().collect(),
            exp: Box::new(exp),
        }
    }

    pub fn product(exprs: Vec<Expression<T>>) -> Self {
        Expression::Product { exprs }
    }

    pub fn quotient(numer: Expression<T>, denom: Expression<T>) -> Self {
        Expression::Quotient {
            numer: Box::new(numer),
            denom: Box::new(denom),
        }
    }

    pub fn prob(vars: impl IntoIterator<Item = T>) -> Self {
        Expression::P {
            vars: vars.into_iter().collect(),
            given: BTreeSet::new(),
        }
    }

    pub fn cond_prob(vars: impl IntoIterator<Item = T>, given: impl IntoIterator<Item = T>) -> Self {
        Expression::P {
            vars: vars.into_iter().collect(),
            given: given.into_iter().collect(),
        }
    }

    /// The empty probability, representing the constant one.
    pub fn one() -> Self {
        Expression::P {
            vars: BTreeSet::new(),
            given: BTreeSet::new(),
        }
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Expression::P { vars, .. } if vars.is_empty())
    }

    pub fn is_hedge(&self) -> bool {
        matches!(self, Expression::Hedge)
    }

    /// Variables the value of the expression depends on.
    pub fn free(&self) -> BTreeSet<T> {
        match self {
            Expression::Marginal { sub, exp } => exp.free().difference(sub).cloned().collect(),
            Expression::Product { exprs } => exprs.iter().flat_map(|e| e.free()).collect(),
            Expression::Quotient { numer, denom } => {
                let mut free = numer.free();
                free.extend(denom.free());
                free
            }
            Expression::P { vars, given } => vars.union(given).cloned().collect(),
            Expression::Hedge => BTreeSet::new(),
        }
    }

    /// Every variable mentioned, summed out or not.
    pub fn variables(&self) -> BTreeSet<T> {
        match self {
            Expression::Marginal { sub, exp } => exp.variables().union(sub).cloned().collect(),
            Expression::Product { exprs } => exprs.iter().flat_map(|e| e.variables()).collect(),
            Expression::Quotient { numer, denom } => {
                let mut vars = numer.variables();
                vars.extend(denom.variables());
                vars
            }
            Expression::P { vars, given } => vars.union(given).cloned().collect(),
            Expression::Hedge => BTreeSet::new(),
        }
    }

    pub fn contains_hedge(&self) -> bool {
        match self {
            Expression::Marginal { exp, .. } => exp.contains_hedge(),
            Expression::Product { exprs } => exprs.iter().any(|e| e.contains_hedge()),
            Expression::Quotient { numer, denom } => numer.contains_hedge() || denom.contains_hedge(),
            Expression::P { .. } => false,
            Expression::Hedge => true,
        }
    }

    /// Number of nodes in the expression tree.
    pub fn size(&self) -> usize {
        match self {
            Expression::Marginal { exp, .. } => 1 + exp.size(),
            Expression::Product { exprs } => 1 + exprs.iter().map(|e| e.size()).sum::<usize>(),
            Expression::Quotient { numer, denom } => 1 + numer.size() + denom.size(),
            Expression::P { .. } | Expression::Hedge => 1,
        }
    }

    /// `P(v_i | v^{(i-1)})` for every `v_i` of `subset`, written in terms of `p`.
    ///
    /// `order` is a topological order of the variables `p` is a distribution
    /// over; `v^{(i)}` is its prefix up to and including position `i`. Each
    /// conditional becomes `Σ_{V \ V^{(i)}} p / Σ_{V \ V^{(i-1)}} p`.
    pub fn factorize_subset(order: &[T], p: &Expression<T>, subset: &BTreeSet<T>) -> Self {
        let mut terms = Vec::new();

        for (i, v_i) in order.iter().enumerate() {
            if !subset.contains(v_i) {
                continue;
            }
            let after_i: BTreeSet<T> = order[i + 1..].iter().cloned().collect();
            let mut from_i = after_i.clone();
            from_i.insert(v_i.clone());

            terms.push(Expression::quotient(
                Expression::marginal(after_i, p.clone()),
                Expression::marginal(from_i, p.clone()),
            ));
        }

        Expression::product(terms)
    }

    /// Chain-rule factorization of `p` along `order`.
    pub fn factorize(order: &[T], p: &Expression<T>) -> Self {
        let subset = order.iter().cloned().collect();
        Expression::factorize_subset(order, p, &subset)
    }

    /// Apply `func` bottom-up: children first, then the rebuilt node.
    pub fn map(&self, func: &impl Fn(Expression<T>) -> Expression<T>) -> Self {
        let mapped = match self {
            Expression::Marginal { sub, exp } => Expression::Marginal {
                sub: sub.clone(),
                exp: Box::new(exp.map(func)),
            },
            Expression::Product { exprs } => {
                Expression::product(exprs.iter().map(|e| e.map(func)).collect())
            }
            Expression::Quotient { numer, denom } => {
                Expression::quotient(numer.map(func), denom.map(func))
            }
            other => other.clone(),
        };
        func(mapped)
    }

    /// Rename every variable.
    pub fn map_vars<U: Ord + Clone>(&self, f: &impl Fn(&T) -> U) -> Expression<U> {
        let rename = |set: &BTreeSet<T>| set.iter().map(f).collect::<BTreeSet<U>>();
        match self {
            Expression::Marginal { sub, exp } => Expression::Marginal {
                sub: rename(sub),
                exp: Box::new(exp.map_vars(f)),
            },
            Expression::Product { exprs } => Expression::Product {
                exprs: exprs.iter().map(|e| e.map_vars(f)).collect(),
            },
            Expression::Quotient { numer, denom } => Expression::Quotient {
                numer: Box::new(numer.map_vars(f)),
                denom: Box::new(denom.map_vars(f)),
            },
            Expression::P { vars, given } => Expression::P {
                vars: rename(vars),
                given: rename(given),
            },
            Expression::Hedge => Expression::Hedge,
        }
    }

    /// Recursively sort product factors into canonical order.
    pub fn sorted(&self) -> Self {
        match self {
            Expression::Marginal { sub, exp } => Expression::Marginal {
                sub: sub.clone(),
                exp: Box::new(exp.sorted()),
            },
            Expression::Product { exprs } => {
                let mut exprs: Vec<Expression<T>> = exprs.iter().map(|e| e.sorted()).collect();
                exprs.sort();
                Expression::product(exprs)
            }
            Expression::Quotient { numer, denom } => {
                Expression::quotient(numer.sorted(), denom.sorted())
            }
            other => other.clone(),
        }
    }

    /// Rewrite every conditional probability as a quotient of joints.
    pub fn cond_expand(&self) -> Self {
        self.map(&|f| match f {
            Expression::P { vars, given } if !given.is_empty() => {
                let joint: BTreeSet<T> = vars.union(&given).cloned().collect();
                Expression::quotient(Expression::prob(joint), Expression::prob(given))
            }
            other => other,
        })
    }

    /// Equality up to the order of product factors.
    pub fn structural_eq(&self, other: &Expression<T>) -> bool {
        self.sorted() == other.sorted()
    }
}

impl<T: Ord + Clone> ops::Mul for Expression<T> {
    type Output = Expression<T>;

    fn mul(self, rhs: Expression<T>) -> Expression<T> {
        let mut exprs = Vec::new();
        for side in [self, rhs] {
            match side {
                Expression::Product { exprs: inner } => exprs.extend(inner),
                other => exprs.push(other),
            }
        }
        Expression::product(exprs)
    }
}

impl<T: Ord + Clone> ops::Div for Expression<T> {
    type Output = Expression<T>;

    fn div(self, rhs: Expression<T>) -> Expression<T> {
        Expression::quotient(self, rhs)
    }
}
