//! Audit trail — every state write, attributed.
//!
//! The audit trail is what makes the context store replayable: the workflow
//! orchestrator reads back the recorded phase-key writes to verify that no
//! illegal transition ever reached the store.

use chrono::{DateTime, Utc};
use coursecraft_core::session::SessionId;
use coursecraft_core::state::{Scope, StateValue};
use serde::{Deserialize, Serialize};

/// Who performed a state write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub name: String,
    /// Privileged actors may write app-scope entries.
    pub privileged: bool,
}

impl Actor {
    pub fn system() -> Self {
        Self {
            name: "system".into(),
            privileged: true,
        }
    }

    pub fn orchestrator() -> Self {
        Self {
            name: "orchestrator".into(),
            privileged: true,
        }
    }

    /// An unprivileged actor acting on behalf of a session.
    pub fn session(id: &SessionId) -> Self {
        Self {
            name: format!("session:{id}"),
            privileged: false,
        }
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// One recorded state write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub scope: Scope,
    pub key: String,
    pub old: Option<StateValue>,
    pub new: StateValue,
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

/// Where audit entries are forwarded (besides the in-memory trail).
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditEntry);
}

/// A tracing-based sink that logs entries via `tracing::info!`.
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn record(&self, entry: &AuditEntry) {
        tracing::info!(
            scope = %entry.scope,
            key = %entry.key,
            actor = %entry.actor,
            session_id = ?entry.session_id,
            "AUDIT"
        );
    }
}

/// In-memory audit trail with optional forwarding sinks.
pub struct AuditLog {
    entries: std::sync::Mutex<Vec<AuditEntry>>,
    sinks: Vec<Box<dyn AuditSink>>,
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.entries.lock().unwrap().len();
        f.debug_struct("AuditLog")
            .field("entry_count", &count)
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            entries: std::sync::Mutex::new(Vec::new()),
            sinks: Vec::new(),
        }
    }

    pub fn with_sinks(sinks: Vec<Box<dyn AuditSink>>) -> Self {
        Self {
            entries: std::sync::Mutex::new(Vec::new()),
            sinks,
        }
    }

    /// Record a write. Called with the store's write lock held, so entries
    /// are ordered consistently with the writes they describe.
    pub fn record(
        &self,
        scope: Scope,
        key: &str,
        old: Option<StateValue>,
        new: StateValue,
        actor: &Actor,
        session_id: Option<&SessionId>,
    ) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            scope,
            key: key.to_string(),
            old,
            new,
            actor: actor.name.clone(),
            session_id: session_id.cloned(),
        };

        self.entries.lock().unwrap().push(entry.clone());
        for sink in &self.sinks {
            sink.record(&entry);
        }
    }

    /// All recorded entries.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// Entries attributed to one session.
    pub fn entries_for_session(&self, session_id: &SessionId) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.session_id.as_ref() == Some(session_id))
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}
