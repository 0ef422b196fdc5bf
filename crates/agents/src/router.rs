//! Agent routing — a pure function of (phase, message).
//!
//! Structured flows pin their agent through the phase machine; the open
//! `NeedsAnalysis` phase classifies the message content against a small
//! labeled keyword set. Unclassifiable input never errors: it routes to the
//! generic agent. The router keeps no state of its own, so routing is unit
//! testable and replayable without any model call.

use coursecraft_core::invoke::AgentId;
use coursecraft_core::phase::SessionPhase;
use tracing::debug;

const OBJECTIVE_TERMS: &[&str] = &[
    "objective",
    "learning outcome",
    "outcomes",
    "goal",
    "bloom",
    "taxonomy",
];
const SYLLABUS_TERMS: &[&str] = &[
    "syllabus",
    "structure",
    "module",
    "outline",
    "schedule",
    "curriculum",
    "week",
];
const ASSESSMENT_TERMS: &[&str] = &[
    "assessment",
    "quiz",
    "exam",
    "test",
    "question",
    "rubric",
    "grading",
];
const RESOURCE_TERMS: &[&str] = &[
    "resource",
    "reading",
    "video",
    "book",
    "article",
    "material",
];

/// Select the agent for this turn.
pub fn route(phase: &SessionPhase, message: &str) -> AgentId {
    if phase.is_done() {
        // The orchestrator short-circuits before invocation; Generic is the
        // answer for anyone else asking.
        return AgentId::Generic;
    }

    if let Some(pinned) = phase.effective_phase().pinned_agent() {
        debug!(phase = %phase, agent = %pinned, "Phase pins agent");
        return pinned;
    }

    classify(message)
}

/// Classify ad hoc input against the labeled keyword sets.
///
/// Best match wins; ties and unmatched input fall back to `Generic`.
pub fn classify(message: &str) -> AgentId {
    let lower = message.to_lowercase();
    let score = |terms: &[&str]| -> usize {
        terms.iter().map(|t| lower.matches(t).count()).sum()
    };

    let scored = [
        (AgentId::Objectives, score(OBJECTIVE_TERMS)),
        (AgentId::Syllabus, score(SYLLABUS_TERMS)),
        (AgentId::Assessment, score(ASSESSMENT_TERMS)),
        (AgentId::Resources, score(RESOURCE_TERMS)),
    ];

    let best = scored.iter().map(|(_, s)| *s).max().unwrap_or(0);
    if best == 0 {
        return AgentId::Generic;
    }
    let mut winners = scored.iter().filter(|(_, s)| *s == best);
    let winner = winners.next().map(|(a, _)| *a).unwrap_or(AgentId::Generic);
    if winners.next().is_some() {
        // Ambiguous between two labels: let the generic agent sort it out.
        return AgentId::Generic;
    }
    winner
}
