//! The language-model invocation port.
//!
//! `AgentInvoker` is the single call contract between the orchestration
//! layer and whatever produces agent content. Implementations must not
//! retry or sleep internally: timeout and retry policy belong to the
//! workflow orchestrator, so they live in exactly one place.

use crate::artifact::Artifact;
use crate::context::ContextPayload;
use crate::error::AgentError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The specialized agents a turn can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentId {
    /// Drafts Bloom-aligned learning objectives.
    Objectives,
    /// Structures modules and sessions into a syllabus outline.
    Syllabus,
    /// Creates assessment items matched to objectives.
    Assessment,
    /// Recommends learning resources for course topics.
    Resources,
    /// Fallback orchestrator agent for unclassified requests.
    Generic,
}

impl AgentId {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentId::Objectives => "objectives",
            AgentId::Syllabus => "syllabus",
            AgentId::Assessment => "assessment",
            AgentId::Resources => "resources",
            AgentId::Generic => "generic",
        }
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured UI hints carried alongside the text response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UiUpdate {
    /// Task parameters the frontend mirrors into its form fields.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub task_parameters: serde_json::Map<String, serde_json::Value>,

    /// A generated assessment payload, when one was produced this turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_assessment: Option<serde_json::Value>,
}

/// What an agent invocation returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReply {
    /// The text shown to the user.
    pub text: String,

    /// A structured artifact for the review loop, if the agent produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,

    /// UI hints for the frontend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<UiUpdate>,
}

impl AgentReply {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            artifact: None,
            ui: None,
        }
    }
}

/// The single invocation contract for all agents.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    /// A human-readable name for this invoker (e.g. "drafting", "scripted").
    fn name(&self) -> &str;

    /// Produce a reply for the given agent and assembled context.
    async fn invoke(
        &self,
        agent: AgentId,
        payload: &ContextPayload,
    ) -> std::result::Result<AgentReply, AgentError>;
}
