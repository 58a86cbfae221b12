// file: src/identification/id.rs
// description: identification of interventional distributions in semi-Markovian models
// reference: Shpitser & Pearl (2006), "Identification of Joint Interventional Distributions
//            in Recursive Semi-Markovian Causal Models", algorithm ID

use super::derivation::{Derivation, Rule};
use crate::error::{PqpError, Result};
use crate::expression::Form;
use crate::graph::{Graph, Node, NodeSet};
use crate::model::Model;
use tracing::trace;

/// Identify `P(y | do(x))` in terms of the joint distribution over every
/// variable of `model`.
///
/// Returns [`Form::Hedge`] when the query is not identifiable.
pub fn id(model: &Model, y: &NodeSet, x: &NodeSet) -> Result<Form> {
    id_traced(model, y, x).map(|(form, _)| form)
}

/// [`id`] together with the rules it applied.
pub fn id_traced(model: &Model, y: &NodeSet, x: &NodeSet) -> Result<(Form, Derivation<Node>)> {
    validate_query(model, y, x, &NodeSet::new())?;
    let mut derivation = Derivation::new();
    let form = identify(model, y, x, joint(model), &mut derivation, 0)?;
    Ok((form, derivation))
}

/// `P(V)` over every variable of `model`.
pub(crate) fn joint(model: &Model) -> Form {
    Form::prob(model.vars().iter().copied())
}

pub(crate) fn validate_query(model: &Model, y: &NodeSet, x: &NodeSet, z: &NodeSet) -> Result<()> {
    if y.is_empty() {
        return Err(PqpError::InvalidQuery("outcome set is empty".into()));
    }
    for set in [y, x, z] {
        if let Some(node) = set.difference(model.vars()).next() {
            return Err(PqpError::UnknownVariable(node.to_string()));
        }
    }
    if !y.is_disjoint(x) {
        return Err(PqpError::InvalidQuery("outcome and intervention sets overlap".into()));
    }
    if !y.is_disjoint(z) || !x.is_disjoint(z) {
        return Err(PqpError::InvalidQuery("conditioning set overlaps outcome or intervention".into()));
    }
    Ok(())
}

/// The recursive body of ID. `p` is the distribution over `model.vars()` the
/// current call works with; variables outside the model are left free.
/// Every branch taken is recorded in `trace` at `depth`.
pub(crate) fn identify(
    model: &Model,
    y: &NodeSet,
    x: &NodeSet,
    p: Form,
    trace: &mut Derivation<Node>,
    depth: usize,
) -> Result<Form> {
    let v = model.vars();
    trace!(?y, ?x, ?v, "id");

    // line 1
    if x.is_empty() {
        let summed: NodeSet = v.difference(y).copied().collect();
        trace.record(Rule::Marginalize, depth, y, x, &summed);
        return Ok(Form::marginal(summed, p));
    }

    // line 2
    let an_y = model.ancestors(y);
    if an_y.len() != v.len() {
        let dropped: NodeSet = v.difference(&an_y).copied().collect();
        let x_an: NodeSet = x.intersection(&an_y).copied().collect();
        trace.record(Rule::Ancestors, depth, y, x, &dropped);
        return identify(
            &model.subgraph(&an_y),
            y,
            &x_an,
            Form::marginal(dropped, p),
            trace,
            depth + 1,
        );
    }

    // line 3
    let an_y_do_x = model.intervene(x).ancestors(y);
    let w: NodeSet = v
        .iter()
        .filter(|n| !x.contains(n) && !an_y_do_x.contains(n))
        .copied()
        .collect();
    if !w.is_empty() {
        let x_w: NodeSet = x.union(&w).copied().collect();
        trace.record(Rule::ExtendIntervention, depth, y, x, &w);
        return identify(model, y, &x_w, p, trace, depth + 1);
    }

    // line 4
    let without_x: NodeSet = v.difference(x).copied().collect();
    let mut components = model.subgraph(&without_x).c_components();
    if components.len() > 1 {
        trace.record(Rule::Factorize, depth, y, x, &without_x);
        let factors = components
            .iter()
            .map(|s_i| {
                let rest: NodeSet = v.difference(s_i).copied().collect();
                identify(model, s_i, &rest, p.clone(), trace, depth + 1)
            })
            .collect::<Result<Vec<_>>>()?;
        let summed: NodeSet = v.iter().filter(|n| !y.contains(n) && !x.contains(n)).copied().collect();
        return Ok(Form::marginal(summed, Form::product(factors)));
    }

    let s = components
        .pop()
        .ok_or_else(|| PqpError::InvalidQuery("no variables left outside the intervention".into()))?;

    // line 5
    let all_components = model.c_components();
    if all_components.len() == 1 {
        trace!(?s, "hedge");
        trace.record(Rule::Hedge, depth, y, x, &s);
        return Ok(Form::Hedge);
    }

    let order = model.order()?;

    // line 6
    if all_components.contains(&s) {
        trace.record(Rule::District, depth, y, x, &s);
        let summed: NodeSet = s.difference(y).copied().collect();
        return Ok(Form::marginal(summed, Form::factorize_subset(&order, &p, &s)));
    }

    // line 7
    if let Some(s_prime) = all_components.iter().find(|c| s.is_subset(c)) {
        trace.record(Rule::Subdistrict, depth, y, x, s_prime);
        let p_prime = Form::factorize_subset(&order, &p, s_prime);
        let x_s: NodeSet = x.intersection(s_prime).copied().collect();
        return identify(&model.subgraph(s_prime), y, &x_s, p_prime, trace, depth + 1);
    }

    Err(PqpError::Validation(format!(
        "district {:?} is not contained in any c-component",
        s
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identification::derivation::Rule;
    use crate::model::examples::{backdoor_model, bow_model, frontdoor_model, napkin_model};
    use crate::nodes;
    use pretty_assertions::assert_eq;

    fn hedge(model: &Model, y: NodeSet, x: NodeSet) -> bool {
        id(model, &y, &x).unwrap().simplify().is_hedge()
    }

    #[test]
    fn test_no_intervention_is_marginal() {
        let model = backdoor_model().unwrap();
        assert_eq!(id(&model, &nodes![2], &nodes![]).unwrap().simplify(), Form::prob([2]));
    }

    #[test]
    fn test_backdoor() {
        let model = backdoor_model().unwrap();
        let estimand = id(&model, &nodes![2], &nodes![1]).unwrap().simplify();
        let answer = Form::marginal(
            nodes![0],
            Form::product(vec![Form::prob([0]), Form::cond_prob([2], [0, 1])]),
        )
        .simplify();
        assert_eq!(estimand, answer);
    }

    #[test]
    fn test_frontdoor_is_identifiable() {
        let model = frontdoor_model().unwrap();
        let estimand = id(&model, &nodes![2], &nodes![0]).unwrap().simplify();
        assert!(!estimand.contains_hedge());
        assert_eq!(estimand.free(), nodes![0, 2]);
    }

    #[test]
    fn test_napkin_is_identifiable() {
        let model = napkin_model().unwrap();
        let estimand = id(&model, &nodes![3], &nodes![2]).unwrap().simplify();
        assert!(!estimand.is_hedge());
        // z stays free: the effect holds for every value of z
        assert!(estimand.free().is_superset(&nodes![2, 3]));
    }

    #[test]
    fn test_bow_is_hedge() {
        let model = bow_model().unwrap();
        assert!(hedge(&model, nodes![1], nodes![0]));
    }

    #[test]
    fn test_trace_records_branches() {
        let model = backdoor_model().unwrap();
        let (_, derivation) = id_traced(&model, &nodes![2], &nodes![1]).unwrap();
        assert_eq!(derivation.rules()[0], Rule::Factorize);
        assert!(derivation.rules().contains(&Rule::District));
        assert!(!derivation.reached_hedge());
        assert_eq!(derivation.steps()[1].depth, 1);

        let (form, derivation) = id_traced(&bow_model().unwrap(), &nodes![1], &nodes![0]).unwrap();
        assert!(form.is_hedge());
        assert_eq!(derivation.rules(), vec![Rule::Hedge]);
        assert_eq!(derivation.steps()[0].subject, nodes![1]);
    }

    #[test]
    fn test_shpitser_hedge() {
        let model = Model::from_parents(
            vec![(1, vec![0]), (2, vec![1]), (3, vec![0]), (4, vec![3])],
            vec![(0, 2), (0, 3), (0, 4), (1, 3)],
        )
        .unwrap();
        assert!(hedge(&model, nodes![2, 4], nodes![1]));
    }

    #[test]
    fn test_shpitser_identifiable() {
        let model = Model::from_parents(
            vec![(1, vec![0]), (2, vec![1]), (4, vec![3])],
            vec![(0, 2), (0, 3), (0, 4), (1, 3)],
        )
        .unwrap();
        assert!(!hedge(&model, nodes![2, 4], nodes![1]));
    }

    #[test]
    fn test_identifiable_graphs() {
        let cases = vec![
            (vec![(1, vec![0])], vec![]),
            (vec![(1, vec![0]), (2, vec![0, 1])], vec![(1, 2)]),
            (vec![(0, vec![1]), (2, vec![0, 1])], vec![(0, 1)]),
            (vec![(1, vec![0]), (2, vec![1])], vec![(0, 2)]),
            (
                vec![(1, vec![0]), (2, vec![1]), (3, vec![0, 1, 2])],
                vec![(0, 2), (1, 3)],
            ),
        ];
        for (i, (dag, confounded)) in cases.into_iter().enumerate() {
            let model = Model::from_parents(dag, confounded).unwrap();
            let y = nodes![*model.vars().last().unwrap()];
            assert!(!hedge(&model, y, nodes![0]), "case {}", i);
        }
    }

    #[test]
    fn test_non_identifiable_graphs() {
        let cases = vec![
            (vec![(1, vec![0])], vec![(0, 1)]),
            (vec![(1, vec![0]), (2, vec![1])], vec![(0, 1)]),
            (vec![(1, vec![0]), (2, vec![1, 0])], vec![(0, 1)]),
            (vec![(2, vec![1, 0])], vec![(0, 1), (1, 2)]),
            (vec![(0, vec![1]), (2, vec![0])], vec![(0, 1), (1, 2)]),
            (vec![(1, vec![0]), (2, vec![1])], vec![(0, 2), (1, 2)]),
            (vec![(1, vec![0]), (3, vec![1, 2])], vec![(0, 2), (1, 2)]),
            (
                vec![(0, vec![1]), (2, vec![0]), (3, vec![2])],
                vec![(1, 0), (1, 2), (1, 3), (0, 3)],
            ),
        ];
        for (i, (dag, confounded)) in cases.into_iter().enumerate() {
            let model = Model::from_parents(dag, confounded).unwrap();
            let y = nodes![*model.vars().last().unwrap()];
            assert!(hedge(&model, y, nodes![0]), "case {}", i);
        }
    }

    #[test]
    fn test_invalid_queries() {
        let model = backdoor_model().unwrap();
        assert!(matches!(
            id(&model, &nodes![], &nodes![1]),
            Err(PqpError::InvalidQuery(_))
        ));
        assert!(matches!(
            id(&model, &nodes![1], &nodes![1]),
            Err(PqpError::InvalidQuery(_))
        ));
        assert!(matches!(
            id(&model, &nodes![7], &nodes![1]),
            Err(PqpError::UnknownVariable(_))
        ));
    }
}
