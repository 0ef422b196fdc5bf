//! The workflow phase machine.
//!
//! A session moves monotonically forward through the drafting phases:
//!
//! ```text
//! NeedsAnalysis → ObjectivesCaptured → StructureProposed → DraftReady → Done
//!        │                │                    │               │
//!        └────────────────┴──────── RevisionRequested ─────────┘
//! ```
//!
//! `RevisionRequested` is a side state reachable from any active phase; it
//! remembers the phase that produced the artifact under revision and returns
//! there (or advances past it once the revised artifact is approved). `Done`
//! is terminal: nothing leaves it except an explicit revision replay.

use crate::invoke::AgentId;
use serde::{Deserialize, Serialize};

/// The main drafting phases, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    NeedsAnalysis,
    ObjectivesCaptured,
    StructureProposed,
    DraftReady,
    Done,
}

impl WorkflowPhase {
    /// The next phase in the forward direction, or `None` from `Done`.
    pub fn next(self) -> Option<Self> {
        match self {
            WorkflowPhase::NeedsAnalysis => Some(WorkflowPhase::ObjectivesCaptured),
            WorkflowPhase::ObjectivesCaptured => Some(WorkflowPhase::StructureProposed),
            WorkflowPhase::StructureProposed => Some(WorkflowPhase::DraftReady),
            WorkflowPhase::DraftReady => Some(WorkflowPhase::Done),
            WorkflowPhase::Done => None,
        }
    }

    /// The phase before this one, or `None` from the start.
    pub fn prev(self) -> Option<Self> {
        match self {
            WorkflowPhase::NeedsAnalysis => None,
            WorkflowPhase::ObjectivesCaptured => Some(WorkflowPhase::NeedsAnalysis),
            WorkflowPhase::StructureProposed => Some(WorkflowPhase::ObjectivesCaptured),
            WorkflowPhase::DraftReady => Some(WorkflowPhase::StructureProposed),
            WorkflowPhase::Done => Some(WorkflowPhase::DraftReady),
        }
    }

    pub fn is_terminal(self) -> bool {
        self == WorkflowPhase::Done
    }

    /// The agent pinned to this phase for structured flows.
    ///
    /// `NeedsAnalysis` is the open phase (content classification decides);
    /// `Done` invokes no agent at all.
    pub fn pinned_agent(self) -> Option<AgentId> {
        match self {
            WorkflowPhase::NeedsAnalysis => None,
            WorkflowPhase::ObjectivesCaptured => Some(AgentId::Syllabus),
            WorkflowPhase::StructureProposed => Some(AgentId::Assessment),
            WorkflowPhase::DraftReady => Some(AgentId::Assessment),
            WorkflowPhase::Done => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowPhase::NeedsAnalysis => "needs_analysis",
            WorkflowPhase::ObjectivesCaptured => "objectives_captured",
            WorkflowPhase::StructureProposed => "structure_proposed",
            WorkflowPhase::DraftReady => "draft_ready",
            WorkflowPhase::Done => "done",
        }
    }
}

impl std::fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The session's position in the phase machine, including the revision
/// side state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionPhase {
    /// In a main phase.
    Active { phase: WorkflowPhase },
    /// An artifact was rejected; `resume` is the phase that produced it.
    RevisionRequested { resume: WorkflowPhase },
}

impl SessionPhase {
    /// The starting position for a new session.
    pub fn start() -> Self {
        SessionPhase::Active {
            phase: WorkflowPhase::NeedsAnalysis,
        }
    }

    /// The phase governing routing and pinning: the active phase, or the
    /// resume target while a revision is pending.
    pub fn effective_phase(&self) -> WorkflowPhase {
        match self {
            SessionPhase::Active { phase } => *phase,
            SessionPhase::RevisionRequested { resume } => *resume,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(
            self,
            SessionPhase::Active {
                phase: WorkflowPhase::Done
            }
        )
    }

    pub fn is_revision(&self) -> bool {
        matches!(self, SessionPhase::RevisionRequested { .. })
    }

    /// Whether the machine permits moving from `self` to `next`.
    ///
    /// Permitted moves:
    /// - staying in place;
    /// - one forward step;
    /// - entering revision for the current phase, or for the phase whose
    ///   approval produced the current one (a replay after advancement);
    /// - leaving revision back to the resume phase or one step past it.
    pub fn permits(&self, next: &SessionPhase) -> bool {
        match (self, next) {
            (SessionPhase::Active { phase: a }, SessionPhase::Active { phase: b }) => {
                a == b || a.next() == Some(*b)
            }
            (SessionPhase::Active { phase: a }, SessionPhase::RevisionRequested { resume: r }) => {
                r == a || r.next() == Some(*a)
            }
            (SessionPhase::RevisionRequested { resume: r }, SessionPhase::Active { phase: b }) => {
                b == r || r.next() == Some(*b)
            }
            (
                SessionPhase::RevisionRequested { resume: a },
                SessionPhase::RevisionRequested { resume: b },
            ) => a == b,
        }
    }
}

impl Default for SessionPhase {
    fn default() -> Self {
        Self::start()
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionPhase::Active { phase } => write!(f, "{phase}"),
            SessionPhase::RevisionRequested { resume } => {
                write!(f, "revision_requested({resume})")
            }
        }
    }
}
