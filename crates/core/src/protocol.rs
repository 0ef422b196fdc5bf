//! Agent-to-agent review protocol.
//!
//! An agent's artifact never reaches the user unreviewed: the producing
//! agent emits a `Proposal`, and a reviewer (the guardrail layer, or a
//! human through the UI) answers with an `Approval` (phase advances) or a
//! `RevisionRequest` (phase holds, feedback attached to the next context).

use crate::artifact::Artifact;
use crate::invoke::AgentId;
use crate::phase::WorkflowPhase;
use crate::session::SessionId;
use serde::{Deserialize, Serialize};

/// A reference to the turn that produced an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRef {
    pub session_id: SessionId,
    /// Index into the session's turn history.
    pub turn_index: usize,
}

/// Why a guardrail rejected an artifact.
///
/// Structured on purpose: the reason is re-injected into the next context
/// payload rather than raised as an exception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailReason {
    pub rule_id: String,
    pub message: String,
}

impl GuardrailReason {
    pub fn new(rule_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            message: message.into(),
        }
    }

    /// Encode for storage in a scoped state entry.
    pub fn to_state_value(&self) -> crate::state::StateValue {
        let mut map = std::collections::BTreeMap::new();
        map.insert(
            "rule_id".to_string(),
            crate::state::StateValue::Text(self.rule_id.clone()),
        );
        map.insert(
            "message".to_string(),
            crate::state::StateValue::Text(self.message.clone()),
        );
        crate::state::StateValue::Map(map)
    }

    /// Decode from a scoped state entry written by [`Self::to_state_value`].
    pub fn from_state_value(value: &crate::state::StateValue) -> Option<Self> {
        let crate::state::StateValue::Map(map) = value else {
            return None;
        };
        Some(Self {
            rule_id: map.get("rule_id")?.as_text()?.to_string(),
            message: map.get("message")?.as_text()?.to_string(),
        })
    }
}

impl std::fmt::Display for GuardrailReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.rule_id, self.message)
    }
}

/// An agent proposes an artifact for review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalMessage {
    pub artifact: Artifact,
    pub proposed_by: AgentId,
    /// The phase in which the artifact was produced — the revision target.
    pub produced_in: WorkflowPhase,
    pub turn: TurnRef,
}

/// The reviewer accepts the artifact; the phase advances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalMessage {
    pub turn: TurnRef,
}

/// The reviewer rejects the artifact with actionable feedback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionRequest {
    pub reason: GuardrailReason,
    pub turn: TurnRef,
}

/// The three messages of the review loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolMessage {
    Proposal(ProposalMessage),
    Approval(ApprovalMessage),
    RevisionRequest(RevisionRequest),
}
