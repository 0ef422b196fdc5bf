//! Error types for the CourseCraft domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use crate::state::Scope;
use thiserror::Error;

/// The top-level error type for all CourseCraft operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Context store errors ---
    #[error("State error: {0}")]
    State(#[from] StateError),

    // --- Memory index errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Agent invocation errors ---
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    // --- Course data provider errors ---
    #[error("Course data error: {0}")]
    Course(#[from] CourseError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Contract violations and lookup failures in the context store.
///
/// `ScopeViolation` and `UnknownScope` are programming-contract errors and
/// fail fast to the caller. `LockTimeout` is returned when a second turn is
/// started for a session that already has one in flight.
#[derive(Debug, Clone, Error)]
pub enum StateError {
    #[error("Scope violation: actor '{actor}' may not write {scope} key '{key}'")]
    ScopeViolation {
        scope: Scope,
        key: String,
        actor: String,
    },

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("A turn is already in flight for session {session_id}")]
    LockTimeout { session_id: String },

    #[error("Unknown scope: {0}")]
    UnknownScope(String),

    #[error("Illegal phase transition: {from} → {to}")]
    IllegalPhaseTransition { from: String, to: String },
}

#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),
}

/// Failures of the language-model invocation port.
///
/// `Unavailable` is produced by the orchestrator once the retry budget is
/// exhausted; it is fatal for the current turn only and the session is left
/// in its pre-turn state.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    #[error("Agent '{agent_id}' timed out after {timeout_secs}s")]
    Timeout { agent_id: String, timeout_secs: u64 },

    #[error("Agent '{agent_id}' unavailable after {attempts} attempts")]
    Unavailable { agent_id: String, attempts: u32 },

    #[error("Agent invocation failed: {0}")]
    Invocation(String),
}

/// Failures of the external course/user data provider.
///
/// A course that simply does not exist is NOT an error: lookups return
/// `Option::None` and context assembly degrades with an explicit
/// "course unknown" marker.
#[derive(Debug, Clone, Error)]
pub enum CourseError {
    #[error("Course provider error: {0}")]
    Provider(String),
}
