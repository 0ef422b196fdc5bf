//! # CourseCraft Core
//!
//! Domain types, traits, and error definitions for the CourseCraft agent
//! orchestration layer. This crate has **zero framework dependencies** — it
//! defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is defined as a trait here: the language
//! model behind `AgentInvoker`, the relational store behind
//! `CourseProvider`, the persistence layer behind `MemoryBackend`.
//! Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with scripted/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod artifact;
pub mod context;
pub mod course;
pub mod error;
pub mod invoke;
pub mod memory;
pub mod phase;
pub mod protocol;
pub mod session;
pub mod state;

// Re-export key types at crate root for ergonomics
pub use artifact::{
    Artifact, Assessment, AssessmentItem, BloomLevel, CourseStructure, ItemKind,
    LearningObjective, ModuleOutline, ResourceSuggestion,
};
pub use context::{ContextPayload, MemoryExcerpt, COURSE_UNKNOWN_MARKER, GUARDRAIL_FEEDBACK_KEY};
pub use course::{Course, CourseProvider, UserProfile};
pub use error::{AgentError, CourseError, Error, MemoryError, Result, StateError};
pub use invoke::{AgentId, AgentInvoker, AgentReply, UiUpdate};
pub use memory::{MemoryBackend, MemoryKind, MemoryQuery, MemoryRecord, ScoredRecord};
pub use phase::{SessionPhase, WorkflowPhase};
pub use protocol::{
    ApprovalMessage, GuardrailReason, ProposalMessage, ProtocolMessage, RevisionRequest, TurnRef,
};
pub use session::{CourseId, Session, SessionId, Turn, UserId};
pub use state::{Scope, StateValue};
