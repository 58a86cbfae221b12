// file: src/graph/bigraph.rs
// description: bidirected confounding graph and its c-components
// reference: Tian & Pearl, c-component factorization

use super::{Graph, Node, NodeSet};
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::UnGraphMap;
use petgraph::visit::Dfs;

/// Symmetric confounding arcs over `nodes`.
#[derive(Debug, Clone)]
pub struct BiGraph {
    graph: UnGraphMap<Node, ()>,
    nodes: NodeSet,
}

impl BiGraph {
    /// Build from unordered pairs; endpoints are added to `nodes`.
    pub fn from_edges(edges: impl IntoIterator<Item = (Node, Node)>, nodes: NodeSet) -> Self {
        let mut graph = UnGraphMap::new();
        let mut nodes = nodes;
        for node in nodes.iter() {
            graph.add_node(*node);
        }
        for (a, b) in edges {
            nodes.extend([a, b]);
            graph.add_edge(a, b, ());
        }
        Self { graph, nodes }
    }

    pub fn empty(nodes: NodeSet) -> Self {
        Self::from_edges([], nodes)
    }

    fn filtered(&self, nodes: NodeSet, keep: impl Fn(Node, Node) -> bool) -> Self {
        let edges = self
            .edges()
            .into_iter()
            .filter(|(a, b)| nodes.contains(a) && nodes.contains(b) && keep(*a, *b))
            .collect::<Vec<_>>();
        Self::from_edges(edges, nodes)
    }

    pub fn siblings(&self, node: Node) -> NodeSet {
        self.graph.neighbors(node).collect()
    }

    /// Arcs as `(a, b)` with `a < b`, in ascending order.
    pub fn edges(&self) -> Vec<(Node, Node)> {
        let mut edges: Vec<(Node, Node)> = self
            .graph
            .all_edges()
            .map(|(a, b, _)| (a.min(b), a.max(b)))
            .collect();
        edges.sort_unstable();
        edges
    }

    /// The c-component containing `node`.
    pub fn component(&self, node: Node) -> NodeSet {
        if !self.graph.contains_node(node) {
            return NodeSet::new();
        }
        let mut dfs = Dfs::new(&self.graph, node);
        let mut acc = NodeSet::new();
        while let Some(next) = dfs.next(&self.graph) {
            acc.insert(next);
        }
        acc
    }

    /// Partition of the nodes into c-components, ordered by smallest member.
    pub fn c_components(&self) -> Vec<NodeSet> {
        let mut components: Vec<NodeSet> = tarjan_scc(&self.graph)
            .into_iter()
            .map(|scc| scc.into_iter().collect())
            .collect();
        components.sort_by_key(|c: &NodeSet| c.first().copied());
        components
    }

    /// Remove every arc touching `nodes`.
    pub fn cut_incident(&self, nodes: &NodeSet) -> Self {
        self.filtered(self.nodes.clone(), |a, b| {
            !nodes.contains(&a) && !nodes.contains(&b)
        })
    }
}

impl Graph for BiGraph {
    fn nodes(&self) -> &NodeSet {
        &self.nodes
    }

    fn subgraph(&self, nodes: &NodeSet) -> Self {
        self.filtered(nodes.intersection(&self.nodes).copied().collect(), |_, _| true)
    }

    /// A bidirected arc points into both endpoints, so intervening removes it.
    fn intervene(&self, nodes: &NodeSet) -> Self {
        self.cut_incident(nodes)
    }
}

impl PartialEq for BiGraph {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes && self.c_components() == other.c_components()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use crate::nodes;

    fn sample() -> BiGraph {
        let mut builder = GraphBuilder::from_edges([(0, 1), (2, 1), (3, 4)]);
        builder.add_node(5);
        builder.into_bigraph()
    }

    #[test]
    fn test_components() {
        let g = sample();
        assert_eq!(g.component(2), nodes![0, 1, 2]);
        assert_eq!(g.component(9), nodes![]);
        assert_eq!(
            g.c_components(),
            vec![nodes![0, 1, 2], nodes![3, 4], nodes![5]]
        );
    }

    #[test]
    fn test_siblings_are_symmetric() {
        let g = sample();
        assert_eq!(g.siblings(1), nodes![0, 2]);
        assert_eq!(g.siblings(0), nodes![1]);
        assert_eq!(g.siblings(9), nodes![]);
        assert_eq!(g.edges(), vec![(0, 1), (1, 2), (3, 4)]);
    }

    #[test]
    fn test_subgraph_splits_components() {
        let g = sample().subgraph(&nodes![0, 2, 3, 4]);
        assert_eq!(
            g.c_components(),
            vec![nodes![0], nodes![2], nodes![3, 4]]
        );
    }

    #[test]
    fn test_intervene_removes_incident_arcs() {
        let g = sample().intervene(&nodes![1]);
        assert_eq!(g.siblings(0), nodes![]);
        assert_eq!(g.c_components().len(), 5);
    }
}
