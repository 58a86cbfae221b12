// file: src/model/separation.rs
// description: d-separation in acyclic directed mixed graphs
// reference: Lauritzen, moralized ancestral graph criterion

use super::Model;
use crate::graph::{Node, NodeSet};
use petgraph::Direction::Incoming;
use petgraph::graphmap::{DiGraphMap, UnGraphMap};
use petgraph::visit::{Dfs, Reversed};

impl Model {
    /// Whether `a` and `b` are d-separated given `given`.
    ///
    /// Each bidirected arc is replaced by an explicit latent parent of its two
    /// endpoints, then separation is checked in the moral graph of the
    /// ancestral set of `a ∪ b ∪ given`.
    pub fn d_separated(&self, a: &NodeSet, b: &NodeSet, given: &NodeSet) -> bool {
        if a.is_empty() || b.is_empty() {
            return true;
        }
        if !a.is_disjoint(b) {
            return false;
        }

        let projection = self.latent_projection();

        let reversed = Reversed(&projection);
        let mut dfs = Dfs::empty(reversed);
        let mut ancestral = NodeSet::new();
        for start in a.union(b).chain(given.iter()) {
            dfs.move_to(*start);
            while let Some(node) = dfs.next(reversed) {
                ancestral.insert(node);
            }
        }

        let mut moral: UnGraphMap<Node, ()> = UnGraphMap::new();
        for node in ancestral.iter() {
            moral.add_node(*node);
            let parents: Vec<Node> = projection.neighbors_directed(*node, Incoming).collect();
            for (i, p) in parents.iter().enumerate() {
                moral.add_edge(*node, *p, ());
                for q in parents[i + 1..].iter() {
                    moral.add_edge(*p, *q, ());
                }
            }
        }
        for node in given.iter() {
            moral.remove_node(*node);
        }

        let mut dfs = Dfs::empty(&moral);
        for start in a.difference(given) {
            dfs.move_to(*start);
            while let Some(node) = dfs.next(&moral) {
                if b.contains(&node) {
                    return false;
                }
            }
        }

        true
    }

    /// The causal DAG with every bidirected arc given its own latent parent,
    /// numbered after the largest observed node.
    fn latent_projection(&self) -> DiGraphMap<Node, ()> {
        let mut graph = DiGraphMap::new();
        for var in self.vars().iter() {
            graph.add_node(*var);
        }
        for (parent, child) in self.dag.edges() {
            graph.add_edge(parent, child, ());
        }

        let first_latent = self.vars().last().map(|n| n + 1).unwrap_or(0);
        for (k, (x, y)) in self.confounded.edges().into_iter().enumerate() {
            let latent = first_latent + k;
            graph.add_edge(latent, x, ());
            graph.add_edge(latent, y, ());
        }

        graph
    }
}
