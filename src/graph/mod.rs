// file: src/graph/mod.rs
// description: directed and bidirected graph primitives over dense node ids
// reference: https://docs.rs/petgraph/latest/petgraph/graphmap/

pub mod bigraph;
pub mod builder;
pub mod digraph;

use std::collections::BTreeSet;

pub use bigraph::BiGraph;
pub use builder::GraphBuilder;
pub use digraph::DiGraph;

/// Dense variable identifier. Names live in the front end's `VariableIndex`.
pub type Node = usize;
pub type NodeSet = BTreeSet<Node>;

/// Operations shared by every graph view the identification algorithms walk.
pub trait Graph: Sized {
    fn nodes(&self) -> &NodeSet;

    /// Restrict the view to `nodes`, keeping only edges between them.
    fn subgraph(&self, nodes: &NodeSet) -> Self;

    /// Graph after the intervention `do(nodes)`.
    fn intervene(&self, nodes: &NodeSet) -> Self;
}

/// Build a `NodeSet` from a list of node ids.
#[macro_export]
macro_rules! nodes {
    () => { $crate::graph::NodeSet::new() };
    ( $( $x:expr ),+ $(,)? ) => {{
        let mut set = $crate::graph::NodeSet::new();
        $( set.insert($x); )+
        set
    }};
}
