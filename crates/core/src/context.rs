//! The assembled context payload handed to every agent invocation.
//!
//! The payload is a value object: assembling it reads the store and memory
//! index but never mutates them, and `render()` is deterministic, so two
//! assemblies with no intervening state change produce identical output.

use crate::memory::MemoryKind;
use crate::phase::SessionPhase;
use crate::protocol::GuardrailReason;
use crate::session::{SessionId, Turn, UserId};
use serde::{Deserialize, Serialize};

/// Marker inserted into the rendered context when the referenced course
/// cannot be resolved. Assembly degrades instead of failing the turn.
pub const COURSE_UNKNOWN_MARKER: &str = "Course: unknown";

/// Session-state key under which the orchestrator parks guardrail rejection
/// feedback for the next assembly.
pub const GUARDRAIL_FEEDBACK_KEY: &str = "guardrail.feedback";

/// A long-term memory excerpt included in the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryExcerpt {
    pub kind: MemoryKind,
    pub content: String,
}

/// Everything an agent invocation gets to see for one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextPayload {
    pub session_id: SessionId,
    pub user_id: UserId,

    /// The inbound message for this turn.
    pub message: String,

    pub phase: SessionPhase,

    /// The session-scoped state entries at assembly time.
    #[serde(default)]
    pub state: std::collections::BTreeMap<String, crate::state::StateValue>,

    /// Short-term memory: the last N turns, oldest first.
    #[serde(default)]
    pub recent_turns: Vec<Turn>,

    /// Long-term memory excerpts, most relevant first.
    #[serde(default)]
    pub memory: Vec<MemoryExcerpt>,

    /// Course attributes flattened to "Key: Value" lines.
    #[serde(default)]
    pub course_lines: Vec<String>,

    /// Structured course details kept verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_details: Option<serde_json::Value>,

    /// False when the referenced course could not be resolved.
    pub course_known: bool,

    /// Rejection feedback from the previous turn's guardrail check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardrail_feedback: Option<GuardrailReason>,
}

impl ContextPayload {
    /// Render the single consolidated context string.
    ///
    /// Section layout follows the consolidated context the frontend and
    /// agents were built against: most recent exchange first, then prior
    /// conversation, course context, verbatim course details, long-term
    /// memory, and any pending revision feedback.
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str(&format!("Most Recent User Query: {}\n", self.message));
        if let Some(last) = self.recent_turns.last() {
            out.push_str(&format!("Agent's Last Response: {}\n", last.agent_response));
        }

        if self.recent_turns.len() > 1 {
            out.push_str("\n=== PRIOR CONVERSATION ===\n");
            for turn in &self.recent_turns[..self.recent_turns.len() - 1] {
                out.push_str(&format!("User: {}\n", turn.user_message));
                out.push_str(&format!(
                    "Agent ({}): {}\n",
                    turn.agent_id, turn.agent_response
                ));
            }
        }

        out.push_str("\n=== CURRENT COURSE CONTEXT ===\n");
        if self.course_known {
            for line in &self.course_lines {
                out.push_str(line);
                out.push('\n');
            }
        } else {
            out.push_str(COURSE_UNKNOWN_MARKER);
            out.push('\n');
        }

        if let Some(details) = &self.course_details {
            out.push_str("\n=== DETAILED COURSE INFORMATION (JSON) ===\n");
            out.push_str(&details.to_string());
            out.push('\n');
        }

        if !self.memory.is_empty() {
            out.push_str("\n=== LONG-TERM MEMORY ===\n");
            for excerpt in &self.memory {
                out.push_str(&format!("- [{}] {}\n", excerpt.kind.as_str(), excerpt.content));
            }
        }

        if let Some(feedback) = &self.guardrail_feedback {
            out.push_str("\n=== REVISION FEEDBACK ===\n");
            out.push_str(&format!("{feedback}\n"));
        }

        out
    }
}
