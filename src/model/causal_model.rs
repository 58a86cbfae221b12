// file: src/model/causal_model.rs
// description: acyclic directed mixed graph combining causal and confounding edges
// reference: semi-Markovian causal models

use crate::error::{PqpError, Result};
use crate::graph::{BiGraph, DiGraph, Graph, GraphBuilder, Node, NodeSet};
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

/// Collects directed (cause to effect) and confounded edges before validation.
#[derive(Debug, Clone, Default)]
pub struct ModelBuilder {
    dag: GraphBuilder,
    confounded: GraphBuilder,
    nodes: NodeSet,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Node) {
        self.nodes.insert(node);
    }

    pub fn add_directed_edge(&mut self, cause: Node, effect: Node) {
        self.nodes.extend([cause, effect]);
        self.dag.add_edge(cause, effect);
    }

    pub fn add_confounded_edge(&mut self, a: Node, b: Node) {
        self.nodes.extend([a, b]);
        self.confounded.add_edge(a, b);
    }

    pub fn nodes(&self) -> &NodeSet {
        &self.nodes
    }

    /// Rejects directed cycles, including self loops, and bidirected self loops.
    pub fn build(self) -> Result<Model> {
        let mut graph: DiGraphMap<Node, ()> = DiGraphMap::new();
        for node in self.nodes.iter() {
            graph.add_node(*node);
        }
        for (from, to) in self.dag.edges() {
            if from == to {
                return Err(PqpError::Cycle(from.to_string()));
            }
            graph.add_edge(from, to, ());
        }
        if let Some((a, _)) = self.confounded.edges().find(|(a, b)| a == b) {
            return Err(PqpError::Validation(format!(
                "node {a} cannot be confounded with itself"
            )));
        }

        if let Some(cycle) = tarjan_scc(&graph).into_iter().find(|scc| scc.len() > 1) {
            let mut members = cycle;
            members.sort_unstable();
            let members: Vec<String> = members.iter().map(|n| n.to_string()).collect();
            return Err(PqpError::Cycle(members.join(", ")));
        }

        let mut dag = self.dag;
        let mut confounded = self.confounded;
        for node in self.nodes.iter() {
            dag.add_node(*node);
            confounded.add_node(*node);
        }

        let model = Model {
            dag: dag.into_digraph(),
            confounded: confounded.into_bigraph(),
            vars: self.nodes,
        };
        debug!(
            "Built model with {} variables, {} directed and {} confounded edges",
            model.vars.len(),
            model.dag.edge_count(),
            model.confounded.edges().len()
        );
        Ok(model)
    }
}

/// A causal model: observed variables, the causal DAG between them, and
/// bidirected arcs standing for unobserved common causes.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub dag: DiGraph,
    pub confounded: BiGraph,
    vars: NodeSet,
}

impl Model {
    /// Build from `(child, parents)` lists and confounded pairs.
    pub fn from_parents(dag: Vec<(Node, Vec<Node>)>, confounded: Vec<(Node, Node)>) -> Result<Self> {
        let mut builder = ModelBuilder::new();
        for (child, parents) in dag {
            builder.add_node(child);
            for parent in parents {
                builder.add_directed_edge(parent, child);
            }
        }
        for (a, b) in confounded {
            builder.add_confounded_edge(a, b);
        }
        builder.build()
    }

    pub fn vars(&self) -> &NodeSet {
        &self.vars
    }

    /// Ancestors of `targets` in the causal DAG, targets included.
    pub fn ancestors(&self, targets: &NodeSet) -> NodeSet {
        self.dag.ancestors(targets)
    }

    /// Topological order of the variables.
    pub fn order(&self) -> Result<Vec<Node>> {
        self.dag.topological_order()
    }

    pub fn c_components(&self) -> Vec<NodeSet> {
        self.confounded.c_components()
    }

    /// Remove directed edges leaving `nodes`; confounding arcs are kept.
    pub fn cut_outgoing(&self, nodes: &NodeSet) -> Self {
        Self {
            dag: self.dag.cut_outgoing(nodes),
            confounded: self.confounded.clone(),
            vars: self.vars.clone(),
        }
    }
}

impl Graph for Model {
    fn nodes(&self) -> &NodeSet {
        &self.vars
    }

    fn subgraph(&self, nodes: &NodeSet) -> Self {
        Self {
            dag: self.dag.subgraph(nodes),
            confounded: self.confounded.subgraph(nodes),
            vars: nodes.intersection(&self.vars).copied().collect(),
        }
    }

    fn intervene(&self, nodes: &NodeSet) -> Self {
        Self {
            dag: self.dag.intervene(nodes),
            confounded: self.confounded.intervene(nodes),
            vars: self.vars.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes;

    #[test]
    fn test_subgraphing() {
        let (a, b, c, d) = (1, 2, 3, 4);
        let model = Model::from_parents(
            vec![(a, vec![b, c, d]), (b, vec![c, d]), (c, vec![d])],
            vec![(a, d)],
        )
        .unwrap();

        let abd = model.subgraph(&nodes![a, b, d]);
        assert_eq!(abd.vars(), &nodes![a, b, d]);
        assert_eq!(abd.ancestors(&nodes![d]), nodes![d]);
        assert_eq!(abd.ancestors(&nodes![a]), nodes![a, b, d]);
        assert_eq!(abd.c_components(), vec![nodes![a, d], nodes![b]]);
    }

    #[test]
    fn test_order_respects_edges() {
        let (a, b, c, d) = (1, 2, 3, 4);
        let model = Model::from_parents(vec![(a, vec![b, c]), (c, vec![d])], vec![]).unwrap();
        let order = model.order().unwrap();
        let position = |n: Node| order.iter().position(|x| *x == n).unwrap();

        assert_eq!(order.len(), 4);
        assert!(position(d) < position(c));
        assert!(position(c) < position(a));
        assert!(position(b) < position(a));
    }

    #[test]
    fn test_intervene_cuts_confounding() {
        let model = Model::from_parents(vec![(1, vec![0])], vec![(0, 1)]).unwrap();
        let cut = model.intervene(&nodes![0]);
        assert_eq!(cut.c_components(), vec![nodes![0], nodes![1]]);
        assert_eq!(cut.dag.parents(1), nodes![0]);
    }

    #[test]
    fn test_isolated_nodes_are_kept() {
        let mut builder = ModelBuilder::new();
        builder.add_node(7);
        builder.add_directed_edge(0, 1);
        let model = builder.build().unwrap();
        assert_eq!(model.vars(), &nodes![0, 1, 7]);
        assert_eq!(model.c_components().len(), 3);
    }

    #[test]
    fn test_cycles_are_rejected() {
        let cyclic = Model::from_parents(vec![(0, vec![1]), (1, vec![2]), (2, vec![0])], vec![]);
        assert!(matches!(cyclic, Err(PqpError::Cycle(_))));

        let self_loop = Model::from_parents(vec![(0, vec![0])], vec![]);
        assert!(matches!(self_loop, Err(PqpError::Cycle(_))));

        let self_confounded = Model::from_parents(vec![(1, vec![0])], vec![(1, 1)]);
        assert!(matches!(self_confounded, Err(PqpError::Validation(_))));
    }
}
