// file: src/graph/builder.rs
// description: incremental construction of directed and bidirected graphs
// reference: builder pattern

use super::{BiGraph, DiGraph, Node, NodeSet};
use std::collections::BTreeSet;

/// Collects nodes and `from -> to` edges before freezing them into a graph.
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    nodes: NodeSet,
    edges: BTreeSet<(Node, Node)>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_edges(edges: impl IntoIterator<Item = (Node, Node)>) -> Self {
        let mut builder = Self::new();
        for (from, to) in edges {
            builder.add_edge(from, to);
        }
        builder
    }

    pub fn add_node(&mut self, node: Node) {
        self.nodes.insert(node);
    }

    pub fn add_edge(&mut self, from: Node, to: Node) {
        self.nodes.extend([from, to]);
        self.edges.insert((from, to));
    }

    pub fn nodes(&self) -> &NodeSet {
        &self.nodes
    }

    /// Recorded `(from, to)` pairs in ascending order.
    pub fn edges(&self) -> impl Iterator<Item = (Node, Node)> + '_ {
        self.edges.iter().copied()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Freeze as a directed graph where every recorded edge points cause to effect.
    pub fn into_digraph(self) -> DiGraph {
        DiGraph::from_edges(self.edges, self.nodes)
    }

    /// Freeze as a bidirected graph; edge direction is discarded.
    pub fn into_bigraph(self) -> BiGraph {
        BiGraph::from_edges(self.edges, self.nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes;

    #[test]
    fn test_graph_builder() {
        let mut builder = GraphBuilder::new();
        builder.add_edge(0, 1);
        builder.add_edge(0, 1);
        assert!(builder.nodes().contains(&0));
        assert!(!builder.nodes().contains(&2));

        builder.add_node(2);
        assert!(builder.nodes().contains(&2));
        assert_eq!(builder.edges().collect::<Vec<_>>(), vec![(0, 1)]);
        assert_eq!(builder.edge_count(), 1);
    }

    #[test]
    fn test_into_digraph() {
        let mut builder = GraphBuilder::from_edges([(0, 1)]);
        builder.add_node(2);
        let dag = builder.into_digraph();

        assert_eq!(dag.parents(1), nodes![0]);
        assert_eq!(dag.children(0), nodes![1]);
        assert_eq!(dag.roots(), vec![0, 2]);
    }

    #[test]
    fn test_into_bigraph() {
        let mut builder = GraphBuilder::from_edges([(0, 1)]);
        builder.add_node(2);
        let bigraph = builder.into_bigraph();

        assert_eq!(bigraph.c_components(), vec![nodes![0, 1], nodes![2]]);
    }
}
