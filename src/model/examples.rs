// file: src/model/examples.rs
// description: textbook causal models used in tests and demos
// reference: Pearl, Causality (2009); Shpitser & Pearl (2006)

use super::Model;
use crate::error::Result;

/// `z -> x -> y`, `z -> y` with `z = 0`, `x = 1`, `y = 2`.
pub fn backdoor_model() -> Result<Model> {
    Model::from_parents(vec![(1, vec![0]), (2, vec![0, 1])], vec![])
}

/// `x -> m -> y`, `x <-> y` with `x = 0`, `m = 1`, `y = 2`.
pub fn frontdoor_model() -> Result<Model> {
    Model::from_parents(vec![(1, vec![0]), (2, vec![1])], vec![(0, 2)])
}

/// `x -> y`, `x <-> y` with `x = 0`, `y = 1`. Not identifiable.
pub fn bow_model() -> Result<Model> {
    Model::from_parents(vec![(1, vec![0])], vec![(0, 1)])
}

/// `w -> z -> x -> y`, `w <-> x`, `w <-> y` with `w = 0`, `z = 1`, `x = 2`,
/// `y = 3`.
pub fn napkin_model() -> Result<Model> {
    Model::from_parents(
        vec![(1, vec![0]), (2, vec![1]), (3, vec![2])],
        vec![(0, 2), (0, 3)],
    )
}
