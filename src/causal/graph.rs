// file: src/causal/graph.rs
// description: named causal graph front end over the identification engine
// reference: Shpitser & Pearl, IDC over acyclic directed mixed graphs

use super::edge::{BidirectedEdge, DirectedEdge, Edge};
use super::variable::Variable;
use crate::error::{PqpError, Result};
use crate::expression::{Expression, Form};
use crate::graph::{Node, NodeSet};
use crate::identification::{
    Assignment, CausalEstimand, Derivation, IdcCache, IdentificationOptions, IdentifiedEstimand,
    idc_traced, identify_estimand,
};
use crate::utils::Step;
use crate::model::{Model, ModelBuilder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Bidirectional mapping between variable names and dense node ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableIndex {
    names: Vec<Variable>,
    ids: BTreeMap<Variable, Node>,
}

impl VariableIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids are handed out in order of first appearance.
    pub fn get_or_insert(&mut self, var: &Variable) -> Node {
        if let Some(id) = self.ids.get(var) {
            return *id;
        }
        let id = self.names.len();
        self.names.push(var.clone());
        self.ids.insert(var.clone(), id);
        id
    }

    pub fn id(&self, name: &str) -> Result<Node> {
        self.ids
            .get(name)
            .copied()
            .ok_or_else(|| PqpError::UnknownVariable(name.to_string()))
    }

    pub fn ids<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Result<NodeSet> {
        names.into_iter().map(|n| self.id(n)).collect()
    }

    pub fn name(&self, node: Node) -> Option<&Variable> {
        self.names.get(node)
    }

    /// Display name of `node`; unknown ids render as `#id`.
    pub fn label(&self, node: Node) -> String {
        self.name(node)
            .map(|v| v.name().to_string())
            .unwrap_or_else(|| format!("#{}", node))
    }

    pub fn variables(&self) -> &[Variable] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn rename(&self, form: &Form) -> Expression<String> {
        form.map_vars(&|n: &Node| self.label(*n))
    }

    pub fn assignment(&self, values: &Assignment<String>) -> Result<Assignment<Node>> {
        values
            .iter()
            .map(|(name, value)| Ok((self.id(name)?, value.clone())))
            .collect()
    }
}

/// Serialized form of a graph: directed pairs are `(cause, effect)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSpec {
    #[serde(default)]
    pub directed: Vec<(String, String)>,
    #[serde(default)]
    pub bidirected: Vec<(String, String)>,
    /// Variables without any edge.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<String>,
}

/// Outcome of one identification query, in the wire format front ends parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdResult {
    pub query: String,
    pub estimand: Expression<String>,
    pub identifiable: bool,
    /// Rules of ID and IDC applied to reach `estimand`.
    #[serde(default, skip_serializing_if = "Derivation::is_empty")]
    pub derivation: Derivation<String>,
}

impl IdResult {
    /// Human readable derivation of the estimand.
    pub fn explain(&self) -> Step {
        self.derivation.to_step(&self.query, &self.estimand.to_string())
    }
}

/// Structural facts about a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub variables: Vec<String>,
    pub directed_edges: usize,
    pub bidirected_edges: usize,
    pub c_components: Vec<Vec<String>>,
    pub topological_order: Vec<String>,
}

/// A causal graph over named variables.
#[derive(Debug, Clone, Default)]
pub struct CausalGraph {
    directed: Vec<DirectedEdge>,
    bidirected: Vec<BidirectedEdge>,
    isolated: BTreeSet<Variable>,
    options: IdentificationOptions,
}

/// A graph whose names are interned and whose structure has been validated.
#[derive(Debug, Clone)]
pub struct CompiledGraph {
    pub model: Model,
    pub index: VariableIndex,
}

impl CausalGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: IdentificationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &IdentificationOptions {
        &self.options
    }

    /// Duplicate edges are ignored.
    pub fn add_edge(&mut self, edge: impl Into<Edge>) {
        match edge.into() {
            Edge::Directed(e) => {
                if !self.directed.contains(&e) {
                    self.directed.push(e);
                }
            }
            Edge::Bidirected(e) => {
                if !self.bidirected.contains(&e) {
                    self.bidirected.push(e);
                }
            }
        }
    }

    pub fn add_edges(&mut self, edges: impl IntoIterator<Item = Edge>) {
        for edge in edges {
            self.add_edge(edge);
        }
    }

    pub fn add_directed(&mut self, cause: &str, effect: &str) -> Result<()> {
        self.add_edge(DirectedEdge::new(Variable::new(cause)?, Variable::new(effect)?));
        Ok(())
    }

    pub fn add_bidirected(&mut self, a: &str, b: &str) -> Result<()> {
        if a == b {
            return Err(PqpError::Validation(format!("{} cannot be confounded with itself", a)));
        }
        self.add_edge(BidirectedEdge::new(Variable::new(a)?, Variable::new(b)?));
        Ok(())
    }

    pub fn add_variable(&mut self, name: &str) -> Result<()> {
        self.isolated.insert(Variable::new(name)?);
        Ok(())
    }

    pub fn directed_edges(&self) -> &[DirectedEdge] {
        &self.directed
    }

    pub fn bidirected_edges(&self) -> &[BidirectedEdge] {
        &self.bidirected
    }

    pub fn edges(&self) -> Vec<Edge> {
        self.directed
            .iter()
            .cloned()
            .map(Edge::from)
            .chain(self.bidirected.iter().cloned().map(Edge::from))
            .collect()
    }

    /// Every variable, sorted by name.
    pub fn variables(&self) -> BTreeSet<Variable> {
        let mut vars = self.isolated.clone();
        for e in &self.directed {
            vars.insert(e.start.clone());
            vars.insert(e.end.clone());
        }
        for e in &self.bidirected {
            vars.insert(e.a.clone());
            vars.insert(e.b.clone());
        }
        vars
    }

    /// Intern names and build the validated model.
    pub fn compile(&self) -> Result<CompiledGraph> {
        let mut index = VariableIndex::new();
        let mut builder = ModelBuilder::new();

        for e in &self.directed {
            let cause = index.get_or_insert(&e.start);
            let effect = index.get_or_insert(&e.end);
            builder.add_directed_edge(cause, effect);
        }
        for e in &self.bidirected {
            let a = index.get_or_insert(&e.a);
            let b = index.get_or_insert(&e.b);
            builder.add_confounded_edge(a, b);
        }
        for v in &self.isolated {
            let id = index.get_or_insert(v);
            builder.add_node(id);
        }

        let model = builder.build().map_err(|e| match e {
            PqpError::Cycle(ids) => PqpError::Cycle(
                ids.split(", ")
                    .map(|id| id.parse().map(|n| index.label(n)).unwrap_or_else(|_| id.to_string()))
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            other => other,
        })?;

        debug!("Compiled graph with {} variables", index.len());
        Ok(CompiledGraph { model, index })
    }

    /// Identify `P(y | do(x), z)`.
    pub fn idc(&self, y: &[&str], x: &[&str], z: &[&str]) -> Result<IdResult> {
        let compiled = self.compile()?;
        compiled.idc(y, x, z, &self.options)
    }

    /// Identify every interventional distribution inside `estimand`.
    pub fn identify(&self, estimand: &CausalEstimand<String>) -> Result<IdentifiedEstimand<String>> {
        let compiled = self.compile()?;
        compiled.identify(estimand, &self.options)
    }

    pub fn identify_ate(
        &self,
        outcome: &str,
        treatment: Assignment<String>,
        control: Assignment<String>,
    ) -> Result<IdentifiedEstimand<String>> {
        self.identify(&CausalEstimand::Ate {
            outcome: outcome.to_string(),
            treatment,
            control,
        })
    }

    /// ATE of a binary treatment, `treatment = 1` against `treatment = 0`.
    pub fn identify_binary_ate(&self, outcome: &str, treatment: &str) -> Result<IdentifiedEstimand<String>> {
        self.identify(&CausalEstimand::binary_ate(outcome.to_string(), treatment.to_string()))
    }

    pub fn identify_cate(
        &self,
        outcome: &str,
        treatment: Assignment<String>,
        control: Assignment<String>,
        subpopulation: Assignment<String>,
    ) -> Result<IdentifiedEstimand<String>> {
        self.identify(&CausalEstimand::Cate {
            outcome: outcome.to_string(),
            treatment,
            control,
            subpopulation,
        })
    }

    pub fn describe(&self) -> Result<GraphSummary> {
        let compiled = self.compile()?;
        let names = |set: &NodeSet| -> Vec<String> { set.iter().map(|n| compiled.index.label(*n)).collect() };

        Ok(GraphSummary {
            variables: self.variables().iter().map(|v| v.name().to_string()).collect(),
            directed_edges: self.directed.len(),
            bidirected_edges: self.bidirected.len(),
            c_components: compiled.model.c_components().iter().map(names).collect(),
            topological_order: compiled
                .model
                .order()?
                .into_iter()
                .map(|n| compiled.index.label(n))
                .collect(),
        })
    }

    pub fn from_spec(spec: &GraphSpec) -> Result<Self> {
        let mut graph = Self::new();
        for (cause, effect) in &spec.directed {
            graph.add_directed(cause, effect)?;
        }
        for (a, b) in &spec.bidirected {
            graph.add_bidirected(a, b)?;
        }
        for name in &spec.variables {
            graph.add_variable(name)?;
        }
        Ok(graph)
    }

    pub fn to_spec(&self) -> GraphSpec {
        let mut connected = BTreeSet::new();
        let directed = self
            .directed
            .iter()
            .map(|e| {
                connected.extend([e.start.clone(), e.end.clone()]);
                (e.start.to_string(), e.end.to_string())
            })
            .collect();
        let bidirected = self
            .bidirected
            .iter()
            .map(|e| {
                connected.extend([e.a.clone(), e.b.clone()]);
                (e.a.to_string(), e.b.to_string())
            })
            .collect();
        let variables = self
            .isolated
            .iter()
            .filter(|v| !connected.contains(*v))
            .map(|v| v.to_string())
            .collect();

        GraphSpec {
            directed,
            bidirected,
            variables,
        }
    }
}

impl CompiledGraph {
    pub fn idc(&self, y: &[&str], x: &[&str], z: &[&str], options: &IdentificationOptions) -> Result<IdResult> {
        let ys = self.index.ids(y.iter().copied())?;
        let xs = self.index.ids(x.iter().copied())?;
        let zs = self.index.ids(z.iter().copied())?;

        let query = render_query(y, x, z);
        info!("Identifying {}", query);

        let (form, derivation) = idc_traced(&self.model, &ys, &xs, &zs)?;
        let form = options.finish(form);
        let identifiable = !form.contains_hedge();
        if !identifiable {
            info!("{} is not identifiable", query);
        }

        Ok(IdResult {
            query,
            estimand: self.index.rename(&form),
            identifiable,
            derivation: derivation.map_vars(&|n: &Node| self.index.label(*n)),
        })
    }

    pub fn identify(
        &self,
        estimand: &CausalEstimand<String>,
        options: &IdentificationOptions,
    ) -> Result<IdentifiedEstimand<String>> {
        let by_id = estimand.try_map_vars(&|name: &String| self.index.id(name))?;

        let mut cache = IdcCache::new();
        let identified = identify_estimand(&self.model, &by_id, options, &mut cache)?;
        debug!(
            "Identified {} with {} IDC calls ({} cached)",
            estimand,
            cache.len(),
            cache.hits()
        );
        Ok(identified.map_vars(&|n: &Node| self.index.label(*n)))
    }
}

/// `P(y | do(x), z)`.
pub fn render_query(y: &[&str], x: &[&str], z: &[&str]) -> String {
    let mut given: Vec<String> = x.iter().map(|v| format!("do({})", v)).collect();
    given.extend(z.iter().map(|v| v.to_string()));
    if given.is_empty() {
        format!("P({})", y.join(", "))
    } else {
        format!("P({} | {})", y.join(", "), given.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn frontdoor() -> CausalGraph {
        let mut g = CausalGraph::new();
        g.add_directed("x", "m").unwrap();
        g.add_directed("m", "y").unwrap();
        g.add_bidirected("x", "y").unwrap();
        g
    }

    fn values(pairs: &[(&str, &str)]) -> Assignment<String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_simple_effect() {
        let mut g = CausalGraph::new();
        g.add_directed("x", "y").unwrap();
        let result = g.idc(&["y"], &["x"], &[]).unwrap();

        assert_eq!(result.query, "P(y | do(x))");
        assert!(result.identifiable);
        assert_eq!(
            result.estimand,
            Expression::cond_prob(["y".to_string()], ["x".to_string()])
        );
    }

    #[test]
    fn test_frontdoor_names() {
        let result = frontdoor().idc(&["y"], &["x"], &[]).unwrap();
        assert!(result.identifiable);
        let free: BTreeSet<String> = result.estimand.free();
        assert_eq!(free, ["x".to_string(), "y".to_string()].into());
    }

    #[test]
    fn test_bow_is_reported_not_identifiable() {
        let mut g = CausalGraph::new();
        g.add_directed("x", "y").unwrap();
        g.add_bidirected("x", "y").unwrap();
        let result = g.idc(&["y"], &["x"], &[]).unwrap();
        assert!(!result.identifiable);
        assert_eq!(result.estimand, Expression::Hedge);
    }

    #[test]
    fn test_unknown_variable() {
        let err = frontdoor().idc(&["q"], &["x"], &[]).unwrap_err();
        assert!(matches!(err, PqpError::UnknownVariable(name) if name == "q"));
    }

    #[test]
    fn test_cycle_reports_names() {
        let mut g = CausalGraph::new();
        g.add_directed("a", "b").unwrap();
        g.add_directed("b", "a").unwrap();
        let err = g.compile().unwrap_err();
        assert!(matches!(err, PqpError::Cycle(names) if names == "a, b"));
    }

    #[test]
    fn test_duplicate_edges_are_ignored() {
        let mut g = frontdoor();
        g.add_bidirected("y", "x").unwrap();
        g.add_directed("x", "m").unwrap();
        assert_eq!(g.edges().len(), 3);
    }

    #[test]
    fn test_identify_ate() {
        let mut g = CausalGraph::new();
        g.add_directed("z", "x").unwrap();
        g.add_directed("z", "y").unwrap();
        g.add_directed("x", "y").unwrap();

        let identified = g
            .identify_ate("y", values(&[("x", "1")]), values(&[("x", "0")]))
            .unwrap();
        assert!(identified.is_identifiable());
        let IdentifiedEstimand::Effect { outcome, treated, control } = identified else {
            panic!("expected an effect");
        };
        assert_eq!(outcome, "y");
        assert_eq!(treated.values, values(&[("x", "1")]));
        assert_eq!(control.values, values(&[("x", "0")]));
        assert_eq!(treated.expression.free(), ["x".to_string(), "y".to_string()].into());
    }

    #[test]
    fn test_identify_cate() {
        let mut g = CausalGraph::new();
        g.add_directed("z", "x").unwrap();
        g.add_directed("z", "y").unwrap();
        g.add_directed("x", "y").unwrap();

        let identified = g
            .identify_cate(
                "y",
                values(&[("x", "1")]),
                values(&[("x", "0")]),
                values(&[("z", "1")]),
            )
            .unwrap();
        let IdentifiedEstimand::Effect { treated, .. } = identified else {
            panic!("expected an effect");
        };
        assert_eq!(
            treated.expression,
            Expression::cond_prob(["y".to_string()], ["x".to_string(), "z".to_string()])
        );
    }

    #[test]
    fn test_graph_spec_round_trip() {
        let mut g = frontdoor();
        g.add_variable("w").unwrap();
        let spec = g.to_spec();
        assert_eq!(
            spec.directed,
            vec![
                ("x".to_string(), "m".to_string()),
                ("m".to_string(), "y".to_string())
            ]
        );
        assert_eq!(spec.variables, vec!["w".to_string()]);

        let json = serde_json::to_string(&spec).unwrap();
        let back: GraphSpec = serde_json::from_str(&json).unwrap();
        let rebuilt = CausalGraph::from_spec(&back).unwrap();
        assert_eq!(rebuilt.variables(), g.variables());
        assert_eq!(rebuilt.edges(), g.edges());
    }

    #[test]
    fn test_describe() {
        let summary = frontdoor().describe().unwrap();
        assert_eq!(summary.variables, vec!["m", "x", "y"]);
        assert_eq!(summary.directed_edges, 2);
        assert_eq!(summary.bidirected_edges, 1);
        assert_eq!(
            summary.c_components,
            vec![vec!["x".to_string(), "y".to_string()], vec!["m".to_string()]]
        );
        assert_eq!(summary.topological_order, vec!["x", "m", "y"]);
    }

    #[test]
    fn test_bidirected_self_loop_is_rejected() {
        let mut g = CausalGraph::new();
        let err = g.add_bidirected("x", "x").unwrap_err();
        assert!(matches!(&err, PqpError::Validation(msg) if msg.contains("confounded with itself")));

        let spec: GraphSpec = serde_json::from_str(r#"{"directed": [["x", "y"]], "bidirected": [["y", "y"]]}"#).unwrap();
        assert!(matches!(CausalGraph::from_spec(&spec), Err(PqpError::Validation(_))));

        let x = Variable::new("x").unwrap();
        g.add_edge(x.confounded_with(&x));
        assert!(matches!(g.compile(), Err(PqpError::Validation(_))));
    }

    #[test]
    fn test_variable_index_lookup() {
        let mut index = VariableIndex::new();
        let y = index.get_or_insert(&Variable::new("y").unwrap());
        let x = index.get_or_insert(&Variable::new("x").unwrap());
        assert_eq!(index.get_or_insert(&Variable::new("y").unwrap()), y);

        assert_eq!(index.id("x").unwrap(), x);
        assert_eq!(index.ids(["y", "x"]).unwrap(), [x, y].into());
        assert!(matches!(index.id("q"), Err(PqpError::UnknownVariable(name)) if name == "q"));
        assert!(matches!(index.id("not a name"), Err(PqpError::UnknownVariable(_))));
    }

    #[test]
    fn test_identify_unknown_variable_is_an_error() {
        let err = frontdoor()
            .identify_ate("y", values(&[("q", "1")]), values(&[("q", "0")]))
            .unwrap_err();
        assert!(matches!(err, PqpError::UnknownVariable(name) if name == "q"));
    }

    #[test]
    fn test_result_carries_derivation() {
        let result = frontdoor().idc(&["y"], &["x"], &[]).unwrap();
        assert!(!result.derivation.is_empty());
        let text = result.explain().explain();
        assert!(text.starts_with("IDC\n\tInput: P(y | do(x))\n"));
        assert!(text.contains("Assume: Acyclicity"));
        assert!(text.contains(&format!("Derived: identified_estimand = {}", result.estimand)));

        let json = serde_json::to_value(&result).unwrap();
        assert!(json["derivation"].is_array());
        let back: IdResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_identify_binary_ate() {
        let mut g = CausalGraph::new();
        g.add_directed("x", "y").unwrap();
        let identified = g.identify_binary_ate("y", "x").unwrap();
        let IdentifiedEstimand::Effect { treated, control, .. } = identified else {
            panic!("expected an effect");
        };
        assert_eq!(treated.values, values(&[("x", "1")]));
        assert_eq!(control.values, values(&[("x", "0")]));
    }

    #[test]
    fn test_render_query() {
        assert_eq!(render_query(&["y"], &[], &[]), "P(y)");
        assert_eq!(render_query(&["y"], &["x"], &["z"]), "P(y | do(x), z)");
    }
}
