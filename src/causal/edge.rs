// file: src/causal/edge.rs
// description: directed (causal) and bidirected (confounding) edges between variables
// reference: acyclic directed mixed graph notation

use super::variable::Variable;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// `start` is a direct cause of `end`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectedEdge {
    pub start: Variable,
    pub end: Variable,
}

impl DirectedEdge {
    pub fn new(start: Variable, end: Variable) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for DirectedEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <= {}", self.end, self.start)
    }
}

/// An unobserved common cause of `a` and `b`. Equality ignores orientation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidirectedEdge {
    pub a: Variable,
    pub b: Variable,
}

impl BidirectedEdge {
    pub fn new(a: Variable, b: Variable) -> Self {
        Self { a, b }
    }

    fn ordered(&self) -> (&Variable, &Variable) {
        if self.a <= self.b {
            (&self.a, &self.b)
        } else {
            (&self.b, &self.a)
        }
    }
}

impl PartialEq for BidirectedEdge {
    fn eq(&self, other: &Self) -> bool {
        self.ordered() == other.ordered()
    }
}

impl Eq for BidirectedEdge {}

impl Hash for BidirectedEdge {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ordered().hash(state);
    }
}

impl fmt::Display for BidirectedEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} & {}", self.a, self.b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Edge {
    Directed(DirectedEdge),
    Bidirected(BidirectedEdge),
}

impl From<DirectedEdge> for Edge {
    fn from(edge: DirectedEdge) -> Self {
        Edge::Directed(edge)
    }
}

impl From<BidirectedEdge> for Edge {
    fn from(edge: BidirectedEdge) -> Self {
        Edge::Bidirected(edge)
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Directed(e) => e.fmt(f),
            Edge::Bidirected(e) => e.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn var(name: &str) -> Variable {
        Variable::new(name).unwrap()
    }

    #[test]
    fn test_bidirected_equality_is_unordered() {
        let ab = BidirectedEdge::new(var("a"), var("b"));
        let ba = BidirectedEdge::new(var("b"), var("a"));
        assert_eq!(ab, ba);

        let set: HashSet<BidirectedEdge> = [ab, ba].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_directed_equality_is_ordered() {
        assert_ne!(var("a").causes(&var("b")), var("b").causes(&var("a")));
    }

    #[test]
    fn test_display() {
        let e: Edge = var("x").causes(&var("y")).into();
        assert_eq!(e.to_string(), "y <= x");
        let c: Edge = var("x").confounded_with(&var("y")).into();
        assert_eq!(c.to_string(), "x & y");
    }
}
