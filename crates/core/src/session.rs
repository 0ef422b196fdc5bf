//! Session and turn-history domain types.
//!
//! A `Session` is the unit of conversational state for one user working on
//! one course. It exclusively owns its session-scoped state entries and its
//! turn history. Sessions are never hard-deleted; inactivity marks them
//! stale, after which bootstrap creates a fresh one.

use crate::invoke::AgentId;
use crate::phase::SessionPhase;
use crate::state::StateValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Unique identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a course.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CourseId(pub String);

impl CourseId {
    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for CourseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One completed exchange: user message in, agent response out.
///
/// Turns are append-only and used both for context assembly and for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub user_message: String,
    pub agent_response: String,
    pub agent_id: AgentId,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(
        user_message: impl Into<String>,
        agent_response: impl Into<String>,
        agent_id: AgentId,
    ) -> Self {
        Self {
            user_message: user_message.into(),
            agent_response: agent_response.into(),
            agent_id,
            timestamp: Utc::now(),
        }
    }
}

/// Conversational and workflow state for one user + course pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<CourseId>,
    pub phase: SessionPhase,

    /// Session-scoped state entries (key → value).
    #[serde(default)]
    pub state: BTreeMap<String, StateValue>,

    /// Ordered turn history, oldest first.
    #[serde(default)]
    pub turns: Vec<Turn>,

    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,

    /// Set once the inactivity threshold passes; stale sessions are not
    /// reused by bootstrap.
    #[serde(default)]
    pub stale: bool,
}

impl Session {
    pub fn new(user_id: UserId, course_id: Option<CourseId>) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            user_id,
            course_id,
            phase: SessionPhase::start(),
            state: BTreeMap::new(),
            turns: Vec::new(),
            created_at: now,
            last_activity: now,
            stale: false,
        }
    }

    /// Append a turn and refresh the activity timestamp.
    pub fn push_turn(&mut self, turn: Turn) {
        self.last_activity = Utc::now();
        self.turns.push(turn);
    }

    /// The last `n` turns, oldest first.
    pub fn recent_turns(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// Whether the session has been inactive for longer than `threshold`.
    pub fn inactive_for(&self, threshold: chrono::Duration) -> bool {
        Utc::now() - self.last_activity > threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_at_needs_analysis() {
        let session = Session::new(UserId::from("u1"), None);
        assert_eq!(session.phase, SessionPhase::start());
        assert!(session.turns.is_empty());
        assert!(!session.stale);
    }

    #[test]
    fn turn_history_is_ordered() {
        let mut session = Session::new(UserId::from("u1"), Some(CourseId::from("c1")));
        for i in 0..5 {
            session.push_turn(Turn::new(
                format!("question {i}"),
                format!("answer {i}"),
                AgentId::Generic,
            ));
        }
        assert_eq!(session.turns.len(), 5);
        for pair in session.turns.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn recent_turns_window() {
        let mut session = Session::new(UserId::from("u1"), None);
        for i in 0..4 {
            session.push_turn(Turn::new(format!("q{i}"), format!("a{i}"), AgentId::Generic));
        }
        let recent = session.recent_turns(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].user_message, "q2");
        assert_eq!(recent[1].user_message, "q3");

        // Asking for more than exist returns everything.
        assert_eq!(session.recent_turns(10).len(), 4);
    }

    #[test]
    fn push_turn_refreshes_activity() {
        let mut session = Session::new(UserId::from("u1"), None);
        let before = session.last_activity;
        session.push_turn(Turn::new("q", "a", AgentId::Objectives));
        assert!(session.last_activity >= before);
    }

    #[test]
    fn session_serialization_roundtrip() {
        let mut session = Session::new(UserId::from("u1"), Some(CourseId::from("c1")));
        session.state.insert("topic".into(), "cell biology".into());
        session.push_turn(Turn::new("q", "a", AgentId::Objectives));

        let json = serde_json::to_string(&session).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, session.id);
        assert_eq!(back.turns.len(), 1);
        assert_eq!(back.state.get("topic"), session.state.get("topic"));
    }
}
