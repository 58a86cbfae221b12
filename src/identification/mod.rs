// file: src/identification/mod.rs
// description: causal identification module exports and options
// reference: internal module structure

pub mod derivation;
pub mod estimand;
pub mod id;
pub mod idc;

pub use derivation::{Derivation, DerivationStep, Rule};
pub use estimand::{
    Assignment, CausalEstimand, IdcCache, IdentifiedEstimand, Term, identify_estimand,
};
pub use id::{id, id_traced};
pub use idc::{idc, idc_traced};

use crate::expression::{DEFAULT_MAX_PASSES, Form, simplify_with_passes};

/// Post-processing applied to every identified expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentificationOptions {
    pub simplify: bool,
    pub max_passes: usize,
}

impl Default for IdentificationOptions {
    fn default() -> Self {
        Self {
            simplify: true,
            max_passes: DEFAULT_MAX_PASSES,
        }
    }
}

impl IdentificationOptions {
    pub fn raw() -> Self {
        Self {
            simplify: false,
            ..Self::default()
        }
    }

    pub fn finish(&self, form: Form) -> Form {
        if self.simplify {
            simplify_with_passes(&form, self.max_passes)
        } else {
            form
        }
    }
}
