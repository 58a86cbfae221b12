// file: src/identification/idc.rs
// description: identification of conditional interventional distributions
// reference: Shpitser & Pearl (2006), "Identification of Conditional Interventional
//            Distributions", algorithm IDC

use super::derivation::{Derivation, Rule};
use super::id::{identify, joint, validate_query};
use crate::error::Result;
use crate::expression::Form;
use crate::graph::{Graph, Node, NodeSet};
use crate::model::Model;
use crate::nodes;
use tracing::trace;

/// Identify `P(y | do(x), z)`.
///
/// Conditioning variables that are independent of `y` in `G_{x̄, z̲}` turn
/// into interventions (rule 2 of do-calculus). What remains is identified
/// as `P' / Σ_y P'` with `P' = P(y, z | do(x))`.
pub fn idc(model: &Model, y: &NodeSet, x: &NodeSet, z: &NodeSet) -> Result<Form> {
    idc_traced(model, y, x, z).map(|(form, _)| form)
}

/// [`idc`] together with the rules it applied.
pub fn idc_traced(
    model: &Model,
    y: &NodeSet,
    x: &NodeSet,
    z: &NodeSet,
) -> Result<(Form, Derivation<Node>)> {
    validate_query(model, y, x, z)?;
    let mut derivation = Derivation::new();
    let form = conditional(model, y, x, z, &mut derivation)?;
    Ok((form, derivation))
}

fn conditional(
    model: &Model,
    y: &NodeSet,
    x: &NodeSet,
    z: &NodeSet,
    trace: &mut Derivation<Node>,
) -> Result<Form> {
    for node in z.iter() {
        let rest: NodeSet = z.iter().filter(|n| *n != node).copied().collect();
        let given: NodeSet = x.union(&rest).copied().collect();
        let mutilated = model.intervene(x).cut_outgoing(&nodes![*node]);

        if mutilated.d_separated(y, &nodes![*node], &given) {
            trace!(node, "conditioning variable becomes an intervention");
            trace.record(Rule::ConditionToAction, 0, y, x, &nodes![*node]);
            let mut x_z = x.clone();
            x_z.insert(*node);
            return conditional(model, y, &x_z, &rest, trace);
        }
    }

    if z.is_empty() {
        return identify(model, y, x, joint(model), trace, 0);
    }

    trace.record(Rule::Normalize, 0, y, x, z);
    let y_z: NodeSet = y.union(z).copied().collect();
    let p_prime = identify(model, &y_z, x, joint(model), trace, 1)?;
    if p_prime.contains_hedge() {
        return Ok(Form::Hedge);
    }

    Ok(Form::quotient(
        p_prime.clone(),
        Form::marginal(y.iter().copied(), p_prime),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PqpError;
    use crate::identification::derivation::Rule;
    use crate::model::examples::{backdoor_model, bow_model, frontdoor_model};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unconditional_matches_id() {
        let model = frontdoor_model().unwrap();
        let via_idc = idc(&model, &nodes![2], &nodes![0], &nodes![]).unwrap();
        let via_id = crate::identification::id(&model, &nodes![2], &nodes![0]).unwrap();
        assert_eq!(via_idc, via_id);
    }

    #[test]
    fn test_observational_conditional() {
        // 0 -> 1, no intervention: P(1 | 0)
        let model = Model::from_parents(vec![(1, vec![0])], vec![]).unwrap();
        let estimand = idc(&model, &nodes![1], &nodes![], &nodes![0]).unwrap().simplify();
        assert_eq!(estimand, Form::cond_prob([1], [0]));
    }

    #[test]
    fn test_conditioning_on_confounder() {
        // backdoor graph: P(y | do(x), z) = P(y | x, z)
        let model = backdoor_model().unwrap();
        let estimand = idc(&model, &nodes![2], &nodes![1], &nodes![0]).unwrap().simplify();
        assert_eq!(estimand, Form::cond_prob([2], [0, 1]));
    }

    #[test]
    fn test_conditioning_on_mediator() {
        // frontdoor graph: P(y | do(x), m) = P(y | do(x, m)) = Σ_x' P(x') P(y | x', m)
        let model = frontdoor_model().unwrap();
        let estimand = idc(&model, &nodes![2], &nodes![0], &nodes![1]).unwrap().simplify();
        assert!(!estimand.is_hedge());
        assert_eq!(estimand.free(), nodes![1, 2]);
    }

    #[test]
    fn test_hedge_survives_conditioning() {
        // 0 -> 1 <-> 2, 0 <-> 1: P(2 | do(0), 1) needs P(1, 2 | do(0))
        let model = Model::from_parents(vec![(1, vec![0]), (2, vec![1])], vec![(0, 1), (1, 2)]).unwrap();
        let estimand = idc(&model, &nodes![2], &nodes![0], &nodes![1]).unwrap();
        assert!(estimand.is_hedge());

        let bow = bow_model().unwrap();
        assert!(idc(&bow, &nodes![1], &nodes![0], &nodes![]).unwrap().simplify().is_hedge());
    }

    #[test]
    fn test_trace_shows_condition_becoming_action() {
        let model = backdoor_model().unwrap();
        let (_, derivation) = idc_traced(&model, &nodes![2], &nodes![1], &nodes![0]).unwrap();
        assert_eq!(derivation.rules()[0], Rule::ConditionToAction);
        assert_eq!(derivation.steps()[0].subject, nodes![0]);

        let model = Model::from_parents(vec![(1, vec![0]), (2, vec![1])], vec![(0, 1), (1, 2)]).unwrap();
        let (form, derivation) = idc_traced(&model, &nodes![2], &nodes![0], &nodes![1]).unwrap();
        assert!(form.is_hedge());
        assert_eq!(derivation.rules()[0], Rule::Normalize);
        assert!(derivation.reached_hedge());
    }

    #[test]
    fn test_overlapping_conditioning_set_is_rejected() {
        let model = backdoor_model().unwrap();
        let result = idc(&model, &nodes![2], &nodes![1], &nodes![1]);
        assert!(matches!(result, Err(PqpError::InvalidQuery(_))));
    }
}
