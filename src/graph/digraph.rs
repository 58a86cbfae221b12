// file: src/graph/digraph.rs
// description: directed acyclic graph view backed by a petgraph graph map
// reference: Shpitser & Pearl, identification of conditional interventional distributions

use super::{Graph, Node, NodeSet};
use crate::error::{PqpError, Result};
use petgraph::Direction::{Incoming, Outgoing};
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::{Dfs, Reversed};
use std::collections::BTreeMap;

/// Directed graph over `nodes`. Every view owns its map, so subgraphs and
/// mutilated graphs only hold the edges between their own nodes.
#[derive(Debug, Clone)]
pub struct DiGraph {
    graph: DiGraphMap<Node, ()>,
    nodes: NodeSet,
}

impl DiGraph {
    /// Build from `(parent, child)` pairs; endpoints are added to `nodes`.
    pub fn from_edges(edges: impl IntoIterator<Item = (Node, Node)>, nodes: NodeSet) -> Self {
        let mut graph = DiGraphMap::new();
        let mut nodes = nodes;
        for node in nodes.iter() {
            graph.add_node(*node);
        }
        for (parent, child) in edges {
            nodes.extend([parent, child]);
            graph.add_edge(parent, child, ());
        }
        Self { graph, nodes }
    }

    /// Copy of this view keeping `nodes` and the edges `keep` accepts.
    fn filtered(&self, nodes: NodeSet, keep: impl Fn(Node, Node) -> bool) -> Self {
        let edges = self
            .graph
            .all_edges()
            .map(|(parent, child, _)| (parent, child))
            .filter(|(parent, child)| {
                nodes.contains(parent) && nodes.contains(child) && keep(*parent, *child)
            })
            .collect::<Vec<_>>();
        Self::from_edges(edges, nodes)
    }

    pub fn parents(&self, node: Node) -> NodeSet {
        self.graph.neighbors_directed(node, Incoming).collect()
    }

    pub fn children(&self, node: Node) -> NodeSet {
        self.graph.neighbors_directed(node, Outgoing).collect()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// `(parent, child)` pairs in ascending order.
    pub fn edges(&self) -> Vec<(Node, Node)> {
        let mut edges: Vec<(Node, Node)> = self
            .graph
            .all_edges()
            .map(|(parent, child, _)| (parent, child))
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Ancestors of `targets`, including the targets themselves.
    pub fn ancestors(&self, targets: &NodeSet) -> NodeSet {
        let reversed = Reversed(&self.graph);
        let mut dfs = Dfs::empty(reversed);
        let mut acc = NodeSet::new();

        for target in targets.intersection(&self.nodes) {
            dfs.move_to(*target);
            while let Some(node) = dfs.next(reversed) {
                acc.insert(node);
            }
        }

        acc
    }

    /// Nodes without parents, in ascending order.
    pub fn roots(&self) -> Vec<Node> {
        self.nodes
            .iter()
            .filter(|n| self.graph.neighbors_directed(**n, Incoming).next().is_none())
            .copied()
            .collect()
    }

    /// Topological order where ties go to the smallest ready node.
    ///
    /// `toposort` rejects cycles; its own order follows map insertion, so the
    /// canonical order is rebuilt from in-degrees to keep estimands stable.
    pub fn topological_order(&self) -> Result<Vec<Node>> {
        toposort(&self.graph, None)
            .map_err(|cycle| PqpError::Cycle(cycle.node_id().to_string()))?;

        let mut pending: BTreeMap<Node, usize> = self
            .nodes
            .iter()
            .map(|n| (*n, self.graph.neighbors_directed(*n, Incoming).count()))
            .collect();
        let mut ready: NodeSet = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(n, _)| *n)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(node) = ready.pop_first() {
            order.push(node);
            for child in self.graph.neighbors_directed(node, Outgoing) {
                if let Some(count) = pending.get_mut(&child) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(child);
                    }
                }
            }
        }

        Ok(order)
    }

    /// Remove every edge leaving `nodes` (the `G_{z̲}` operation).
    pub fn cut_outgoing(&self, nodes: &NodeSet) -> Self {
        self.filtered(self.nodes.clone(), |parent, _| !nodes.contains(&parent))
    }
}

impl Graph for DiGraph {
    fn nodes(&self) -> &NodeSet {
        &self.nodes
    }

    fn subgraph(&self, nodes: &NodeSet) -> Self {
        self.filtered(nodes.intersection(&self.nodes).copied().collect(), |_, _| true)
    }

    /// Remove every edge entering `nodes` (the `G_{x̄}` operation).
    fn intervene(&self, nodes: &NodeSet) -> Self {
        self.filtered(self.nodes.clone(), |_, child| !nodes.contains(&child))
    }
}

impl PartialEq for DiGraph {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes && self.edges() == other.edges()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use crate::nodes;

    // 0 -> 1 -> 2, 0 -> 2, 3 isolated
    fn chain() -> DiGraph {
        let mut builder = GraphBuilder::from_edges([(0, 1), (1, 2), (0, 2)]);
        builder.add_node(3);
        builder.into_digraph()
    }

    #[test]
    fn test_parents_and_children() {
        let g = chain();
        assert_eq!(g.parents(2), nodes![0, 1]);
        assert_eq!(g.children(0), nodes![1, 2]);
        assert_eq!(g.parents(3), nodes![]);
        assert_eq!(g.parents(9), nodes![]);
        assert_eq!(g.edge_count(), 3);
        assert_eq!(g.edges(), vec![(0, 1), (0, 2), (1, 2)]);
    }

    #[test]
    fn test_ancestors_are_inclusive() {
        let g = chain();
        assert_eq!(g.ancestors(&nodes![2]), nodes![0, 1, 2]);
        assert_eq!(g.ancestors(&nodes![0]), nodes![0]);
        assert_eq!(g.ancestors(&nodes![1, 3]), nodes![0, 1, 3]);
        assert_eq!(g.ancestors(&nodes![9]), nodes![]);
    }

    #[test]
    fn test_subgraph_hides_edges() {
        let g = chain().subgraph(&nodes![0, 2]);
        assert_eq!(g.parents(2), nodes![0]);
        assert_eq!(g.ancestors(&nodes![2]), nodes![0, 2]);
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn test_intervene_removes_incoming_edges() {
        let g = chain().intervene(&nodes![1]);
        assert_eq!(g.parents(1), nodes![]);
        assert_eq!(g.parents(2), nodes![0, 1]);
        assert_eq!(g.nodes(), &nodes![0, 1, 2, 3]);
    }

    #[test]
    fn test_cut_outgoing_removes_outgoing_edges() {
        let g = chain().cut_outgoing(&nodes![0]);
        assert_eq!(g.parents(1), nodes![]);
        assert_eq!(g.parents(2), nodes![1]);
    }

    #[test]
    fn test_topological_order() {
        let order = chain().topological_order().unwrap();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_topological_order_prefers_smallest_ready_node() {
        // 5 is inserted first; 1 and 5 are both roots
        let g = DiGraph::from_edges([(5, 2), (1, 2), (2, 0)], NodeSet::new());
        assert_eq!(g.topological_order().unwrap(), vec![1, 5, 2, 0]);
    }

    #[test]
    fn test_topological_order_detects_cycle() {
        let g = GraphBuilder::from_edges([(0, 1), (1, 0)]).into_digraph();
        assert!(matches!(g.topological_order(), Err(PqpError::Cycle(_))));
    }

    #[test]
    fn test_equality_ignores_hidden_edges() {
        let full = chain().subgraph(&nodes![0, 1]);
        let direct = GraphBuilder::from_edges([(0, 1)]).into_digraph();
        assert_eq!(full, direct);
    }
}
