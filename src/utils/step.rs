// file: src/utils/step.rs
// description: nested log of the steps, assumptions and results behind an answer
// reference: derivation reports for identified and estimated quantities

use serde::{Deserialize, Serialize};
use std::fmt;

/// One line of a [`Step`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entry {
    Note { text: String },
    Assumption { text: String },
    Result { name: String, value: String },
    Step { step: Step },
}

/// A named block of notes, assumptions, derived results and substeps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<Entry>,
}

impl Step {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fill a nested step with `build` and attach it.
    pub fn substep(&mut self, name: impl Into<String>, build: impl FnOnce(&mut Step)) {
        let mut step = Step::new(name);
        build(&mut step);
        self.entries.push(Entry::Step { step });
    }

    /// Attach a finished step; empty steps are dropped.
    pub fn push(&mut self, step: Step) {
        if !step.is_empty() {
            self.entries.push(Entry::Step { step });
        }
    }

    pub fn write(&mut self, text: impl Into<String>) {
        self.entries.push(Entry::Note { text: text.into() });
    }

    pub fn assume(&mut self, text: impl Into<String>) {
        self.entries.push(Entry::Assumption { text: text.into() });
    }

    pub fn result(&mut self, name: impl Into<String>, value: impl fmt::Display) {
        self.entries.push(Entry::Result {
            name: name.into(),
            value: value.to_string(),
        });
    }

    /// Every assumption in this step and its substeps, depth first.
    pub fn assumptions(&self) -> Vec<&str> {
        let mut found = Vec::new();
        for entry in &self.entries {
            match entry {
                Entry::Assumption { text } => found.push(text.as_str()),
                Entry::Step { step } => found.extend(step.assumptions()),
                _ => {}
            }
        }
        found
    }

    /// Value of the first result called `name`, searching substeps too.
    pub fn find_result(&self, name: &str) -> Option<&str> {
        self.entries.iter().find_map(|entry| match entry {
            Entry::Result { name: n, value } if n == name => Some(value.as_str()),
            Entry::Step { step } => step.find_result(name),
            _ => None,
        })
    }

    /// The step name followed by its entries, one per line, each nesting
    /// level indented by a tab.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.render(0, &mut out);
        out
    }

    fn render(&self, depth: usize, out: &mut String) {
        let indent = "\t".repeat(depth);
        out.push_str(&format!("{}{}\n", indent, self.name));
        for entry in &self.entries {
            match entry {
                Entry::Note { text } => out.push_str(&format!("{}\t{}\n", indent, text)),
                Entry::Assumption { text } => out.push_str(&format!("{}\tAssume: {}\n", indent, text)),
                Entry::Result { name, value } => {
                    out.push_str(&format!("{}\tDerived: {} = {}\n", indent, name, value))
                }
                Entry::Step { step } => step.render(depth + 1, out),
            }
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.explain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explain_indents_substeps() {
        let mut step = Step::new("Estimation");
        step.assume("Multinomial likelihood");
        step.substep("Data Processing", |data| {
            data.write("Mapping elements on (0, 1] to 0.5");
        });
        step.result("effect", 0.25);

        assert_eq!(
            step.explain(),
            "Estimation\n\tAssume: Multinomial likelihood\n\tData Processing\n\t\tMapping elements on (0, 1] to 0.5\n\tDerived: effect = 0.25\n"
        );
    }

    #[test]
    fn test_assumptions_and_results_are_collected() {
        let mut step = Step::new("root");
        step.substep("IDC", |idc| idc.assume("Acyclicity"));
        step.assume("Positivity");
        step.substep("inner", |inner| inner.result("identified_estimand", "P(y)"));

        assert_eq!(step.assumptions(), vec!["Acyclicity", "Positivity"]);
        assert_eq!(step.find_result("identified_estimand"), Some("P(y)"));
        assert_eq!(step.find_result("missing"), None);
    }

    #[test]
    fn test_empty_steps_are_not_attached() {
        let mut step = Step::new("root");
        step.push(Step::new("empty"));
        assert!(step.is_empty());
    }
}
