// file: src/expression/simplify.rs
// description: value preserving rewrites that shrink identified expressions
// reference: rewrite-to-fixpoint over the expression tree

use super::form::Expression;
use std::collections::BTreeSet;

pub const DEFAULT_MAX_PASSES: usize = 32;

/// Sorts and simplifies an expression. Suitable for structural equality checks.
pub fn simplify<T: Ord + Clone>(f: &Expression<T>) -> Expression<T> {
    simplify_with_passes(f, DEFAULT_MAX_PASSES)
}

/// Apply the local rewrites bottom-up until nothing changes or `max_passes`
/// passes have run. A hedge anywhere makes the whole expression a hedge.
pub fn simplify_with_passes<T: Ord + Clone>(f: &Expression<T>, max_passes: usize) -> Expression<T> {
    if f.contains_hedge() {
        return Expression::Hedge;
    }

    let mut current = f.sorted();
    for _ in 0..max_passes {
        let next = current.map(&simplify_node).sorted();
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn simplify_node<T: Ord + Clone>(f: Expression<T>) -> Expression<T> {
    match f {
        Expression::Marginal { sub, exp } => simplify_marginal(sub, *exp),
        Expression::Product { exprs } => simplify_product(exprs),
        Expression::Quotient { numer, denom } => simplify_quotient(*numer, *denom),
        other => other,
    }
}

fn simplify_marginal<T: Ord + Clone>(sub: BTreeSet<T>, exp: Expression<T>) -> Expression<T> {
    if sub.is_empty() {
        return exp;
    }

    match exp {
        Expression::Marginal {
            sub: inner_sub,
            exp: inner,
        } if inner_sub.is_disjoint(&sub) => {
            let merged: BTreeSet<T> = sub.union(&inner_sub).cloned().collect();
            Expression::Marginal {
                sub: merged,
                exp: inner,
            }
        }
        Expression::P { vars, given } if given.is_disjoint(&sub) => {
            let kept: BTreeSet<T> = vars.difference(&sub).cloned().collect();
            let rest: BTreeSet<T> = sub.difference(&vars).cloned().collect();
            let p = if kept.is_empty() {
                Expression::one()
            } else {
                Expression::P { vars: kept, given }
            };
            if rest.is_empty() {
                p
            } else {
                Expression::Marginal {
                    sub: rest,
                    exp: Box::new(p),
                }
            }
        }
        Expression::Product { exprs } => {
            let (constant, dependent): (Vec<_>, Vec<_>) =
                exprs.into_iter().partition(|e| e.free().is_disjoint(&sub));
            if constant.is_empty() || dependent.is_empty() {
                let mut exprs = constant;
                exprs.extend(dependent);
                return Expression::Marginal {
                    sub,
                    exp: Box::new(Expression::product(exprs)),
                };
            }
            let mut exprs = constant;
            exprs.push(Expression::Marginal {
                sub,
                exp: Box::new(product_of(dependent)),
            });
            Expression::product(exprs)
        }
        Expression::Quotient { numer, denom }
            if !denom.is_one() && denom.free().is_disjoint(&sub) =>
        {
            Expression::Quotient {
                numer: Box::new(Expression::Marginal { sub, exp: numer }),
                denom,
            }
        }
        other => Expression::Marginal {
            sub,
            exp: Box::new(other),
        },
    }
}

/// After simplification a product contains no product, quotient or one.
fn simplify_product<T: Ord + Clone>(exprs: Vec<Expression<T>>) -> Expression<T> {
    let mut numer = Vec::new();
    let mut denom = Vec::new();
    for e in exprs {
        split_factor(e, &mut numer, &mut denom);
    }

    if denom.is_empty() {
        product_of(numer)
    } else {
        reduce_fraction(numer, denom)
    }
}

fn simplify_quotient<T: Ord + Clone>(numer: Expression<T>, denom: Expression<T>) -> Expression<T> {
    let mut top = Vec::new();
    let mut bottom = Vec::new();
    split_factor(numer, &mut top, &mut bottom);
    // (a / b) / (c / d) = (a * d) / (b * c)
    split_factor(denom, &mut bottom, &mut top);
    reduce_fraction(top, bottom)
}

/// Push the multiplicative factors of `f` into `numer` and `denom`.
fn split_factor<T: Ord + Clone>(
    f: Expression<T>,
    numer: &mut Vec<Expression<T>>,
    denom: &mut Vec<Expression<T>>,
) {
    match f {
        Expression::Product { exprs } => {
            for e in exprs {
                split_factor(e, numer, denom);
            }
        }
        Expression::Quotient {
            numer: top,
            denom: bottom,
        } => {
            split_factor(*top, numer, denom);
            split_factor(*bottom, denom, numer);
        }
        f if f.is_one() => {}
        f => numer.push(f),
    }
}

fn reduce_fraction<T: Ord + Clone>(
    mut top: Vec<Expression<T>>,
    mut bottom: Vec<Expression<T>>,
) -> Expression<T> {
    // cancel identical factors
    let mut i = 0;
    while i < bottom.len() {
        if let Some(pos) = top.iter().position(|t| *t == bottom[i]) {
            top.remove(pos);
            bottom.remove(i);
        } else {
            i += 1;
        }
    }

    // P(N | G) / P(D | G) = P(N \ D | D, G) when D is a proper subset of N
    while let Some((t, b)) = find_conditional_pair(&top, &bottom) {
        if let (Expression::P { vars, given }, Expression::P { vars: d_vars, .. }) =
            (top[t].clone(), bottom.remove(b))
        {
            let kept: BTreeSet<T> = vars.difference(&d_vars).cloned().collect();
            let mut cond = given;
            cond.extend(d_vars);
            top[t] = Expression::P {
                vars: kept,
                given: cond,
            };
        }
    }

    if bottom.is_empty() {
        product_of(top)
    } else {
        Expression::quotient(product_of(top), product_of(bottom))
    }
}

fn find_conditional_pair<T: Ord + Clone>(
    top: &[Expression<T>],
    bottom: &[Expression<T>],
) -> Option<(usize, usize)> {
    for (t, numer) in top.iter().enumerate() {
        let Expression::P { vars, given } = numer else {
            continue;
        };
        for (b, denom) in bottom.iter().enumerate() {
            if let Expression::P {
                vars: d_vars,
                given: d_given,
            } = denom
                && d_given == given
                && !d_vars.is_empty()
                && d_vars.len() < vars.len()
                && d_vars.is_subset(vars)
            {
                return Some((t, b));
            }
        }
    }
    None
}

fn product_of<T: Ord + Clone>(mut exprs: Vec<Expression<T>>) -> Expression<T> {
    exprs.retain(|e| !e.is_one());
    match exprs.len() {
        0 => Expression::one(),
        1 => exprs.remove(0),
        _ => Expression::product(exprs),
    }
}

impl<T: Ord + Clone> Expression<T> {
    /// See [`simplify`].
    pub fn simplify(&self) -> Expression<T> {
        simplify(self)
    }
}
