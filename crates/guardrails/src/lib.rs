//! Guardrails — declarative post-hoc checks on agent artifacts.
//!
//! A guardrail never throws: validation yields a [`Verdict`], and a failing
//! verdict carries a structured [`GuardrailReason`](coursecraft_core::GuardrailReason)
//! that the orchestrator folds into the next context payload. Rejection
//! blocks phase advancement; it never crashes a turn.

pub mod engine;
pub mod model;

pub use engine::{validate, Verdict};
pub use model::{AppliesTo, Rule, RuleKind, RuleSet};

use thiserror::Error;

/// Errors raised while loading or validating rule definitions.
#[derive(Debug, Error)]
pub enum GuardrailError {
    #[error("Invalid rule '{id}': {reason}")]
    InvalidRule { id: String, reason: String },

    #[error("Failed to parse rules: {0}")]
    Parse(#[from] toml::de::Error),
}
