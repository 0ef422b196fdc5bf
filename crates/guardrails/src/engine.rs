//! Rule evaluation.

use crate::model::{Rule, RuleKind, RuleSet};
use coursecraft_core::artifact::Artifact;
use coursecraft_core::protocol::GuardrailReason;
use tracing::debug;

/// The outcome of validating one artifact.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Pass,
    Fail(GuardrailReason),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    pub fn reason(&self) -> Option<&GuardrailReason> {
        match self {
            Verdict::Pass => None,
            Verdict::Fail(reason) => Some(reason),
        }
    }
}

/// Validate an artifact against a rule set.
///
/// Rules are evaluated highest priority first; the first failure wins.
pub fn validate(artifact: &Artifact, rules: &RuleSet) -> Verdict {
    for rule in rules.matching(artifact) {
        if let Some(reason) = check(rule, artifact) {
            debug!(rule_id = %reason.rule_id, "Guardrail rejected artifact");
            return Verdict::Fail(reason);
        }
    }
    Verdict::Pass
}

fn check(rule: &Rule, artifact: &Artifact) -> Option<GuardrailReason> {
    match (&rule.kind, artifact) {
        (RuleKind::ObjectivesTagged, Artifact::Objectives(objectives)) => objectives
            .iter()
            .find(|o| o.level.is_none())
            .map(|o| {
                GuardrailReason::new(
                    &rule.id,
                    format!("objective '{}' has no taxonomy level", o.text),
                )
            }),

        (RuleKind::MinObjectives { count }, Artifact::Objectives(objectives)) => {
            if objectives.len() < *count {
                Some(GuardrailReason::new(
                    &rule.id,
                    format!("{} objectives drafted, at least {count} required", objectives.len()),
                ))
            } else {
                None
            }
        }

        (RuleKind::BloomCoverage { min_levels }, Artifact::Objectives(objectives)) => {
            let covered: std::collections::HashSet<_> =
                objectives.iter().filter_map(|o| o.level).collect();
            if covered.len() < *min_levels {
                Some(GuardrailReason::new(
                    &rule.id,
                    format!(
                        "objectives cover {} taxonomy levels, at least {min_levels} required",
                        covered.len()
                    ),
                ))
            } else {
                None
            }
        }

        (RuleKind::ItemsReferenceObjectives, Artifact::Assessment(assessment)) => assessment
            .items
            .iter()
            .position(|i| i.objective.trim().is_empty())
            .map(|idx| {
                GuardrailReason::new(
                    &rule.id,
                    format!("assessment item {} references no learning objective", idx + 1),
                )
            }),

        (RuleKind::NonEmptyStructure, Artifact::Syllabus(structure)) => {
            if structure.modules.is_empty() {
                Some(GuardrailReason::new(&rule.id, "syllabus proposal has no modules"))
            } else {
                None
            }
        }

        // A rule reached through `Any` that does not inspect this artifact
        // kind has nothing to reject.
        _ => None,
    }
}
