// file: src/causal/variable.rs
// description: named measured variable of a causal graph
// reference: structural causal model notation

use super::edge::{BidirectedEdge, DirectedEdge};
use crate::error::Result;
use crate::utils::Validator;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// A measured variable, identified by its name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Variable(String);

impl Variable {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Validator::validate_variable_name(&name)?;
        Ok(Self(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// `self -> effect`.
    pub fn causes(&self, effect: &Variable) -> DirectedEdge {
        DirectedEdge::new(self.clone(), effect.clone())
    }

    /// `self <-> other`.
    pub fn confounded_with(&self, other: &Variable) -> BidirectedEdge {
        BidirectedEdge::new(self.clone(), other.clone())
    }
}

/// Lets name-keyed maps be queried with a plain `&str`.
impl Borrow<str> for Variable {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Variable {
    type Error = crate::error::PqpError;

    fn try_from(name: String) -> Result<Self> {
        Variable::new(name)
    }
}

impl TryFrom<&str> for Variable {
    type Error = crate::error::PqpError;

    fn try_from(name: &str) -> Result<Self> {
        Variable::new(name)
    }
}

impl From<Variable> for String {
    fn from(var: Variable) -> String {
        var.0
    }
}

impl AsRef<str> for Variable {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
