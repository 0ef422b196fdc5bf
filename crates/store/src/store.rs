//! The session repository and scoped state store.
//!
//! All conversational state lives behind this one type: sessions with their
//! turn history and session-scoped entries, per-user state, shared app
//! configuration, and the audit trail that records every write.
//!
//! Turn mutations are all-or-nothing. A turn begins with [`SessionStore::begin_turn`],
//! which enforces the single-writer discipline (at most one in-flight turn
//! per session), stages its writes on the returned [`TurnGuard`], and either
//! commits atomically or is dropped without any store mutation taking effect.

use crate::audit::{Actor, AuditEntry, AuditLog};
use chrono::Utc;
use coursecraft_core::error::StateError;
use coursecraft_core::phase::SessionPhase;
use coursecraft_core::session::{CourseId, Session, SessionId, Turn, UserId};
use coursecraft_core::state::{Scope, StateValue};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Audit key under which phase transitions are recorded.
pub const PHASE_KEY: &str = "workflow.phase";

#[derive(Debug)]
struct Inner {
    sessions: RwLock<HashMap<String, Session>>,
    /// (user id, course id or "-") → live session, for idempotent bootstrap.
    owner_index: RwLock<HashMap<String, SessionId>>,
    /// User-scope state, keyed by user id. Writes hold the lock for the
    /// whole mutation, so they are serialized per user.
    user_state: RwLock<HashMap<String, BTreeMap<String, StateValue>>>,
    app_state: RwLock<BTreeMap<String, StateValue>>,
    audit: AuditLog,
    /// Sessions with a turn currently in flight.
    in_flight: StdMutex<HashSet<String>>,
}

/// A pure-read merge of everything visible to one session.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session: Session,
    pub user_state: BTreeMap<String, StateValue>,
    pub app_state: BTreeMap<String, StateValue>,
}

/// The context store.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                sessions: RwLock::new(HashMap::new()),
                owner_index: RwLock::new(HashMap::new()),
                user_state: RwLock::new(HashMap::new()),
                app_state: RwLock::new(BTreeMap::new()),
                audit: AuditLog::new(),
                in_flight: StdMutex::new(HashSet::new()),
            }),
        }
    }

    fn owner_key(user_id: &UserId, course_id: Option<&CourseId>) -> String {
        match course_id {
            Some(course) => format!("{user_id}|{course}"),
            None => format!("{user_id}|-"),
        }
    }

    /// Create a session for (user, course), or return the existing live one.
    ///
    /// Idempotent: the same pair reuses its session until that session goes
    /// stale. Returns the id and whether a new session was created.
    pub async fn initialize(
        &self,
        user_id: UserId,
        course_id: Option<CourseId>,
    ) -> (SessionId, bool) {
        let key = Self::owner_key(&user_id, course_id.as_ref());

        {
            let index = self.inner.owner_index.read().await;
            if let Some(existing) = index.get(&key) {
                let sessions = self.inner.sessions.read().await;
                if let Some(session) = sessions.get(&existing.0) {
                    if !session.stale {
                        debug!(session_id = %existing, "Reusing live session");
                        return (existing.clone(), false);
                    }
                }
            }
        }

        let session = Session::new(user_id, course_id);
        let id = session.id.clone();
        info!(session_id = %id, user_id = %session.user_id, "Session created");

        self.inner
            .sessions
            .write()
            .await
            .insert(id.0.clone(), session);
        self.inner
            .owner_index
            .write()
            .await
            .insert(key, id.clone());
        (id, true)
    }

    /// Fetch a session by id.
    pub async fn get_session(&self, id: &SessionId) -> Option<Session> {
        self.inner.sessions.read().await.get(&id.0).cloned()
    }

    /// A pure read of everything the session can see. Never mutates.
    pub async fn snapshot(&self, id: &SessionId) -> Result<SessionSnapshot, StateError> {
        let session = self
            .get_session(id)
            .await
            .ok_or_else(|| StateError::SessionNotFound(id.0.clone()))?;
        let user_state = self
            .inner
            .user_state
            .read()
            .await
            .get(&session.user_id.0)
            .cloned()
            .unwrap_or_default();
        let app_state = self.inner.app_state.read().await.clone();
        Ok(SessionSnapshot {
            session,
            user_state,
            app_state,
        })
    }

    /// Read a state entry visible to `session_id`.
    ///
    /// Ephemeral entries only exist inside an in-flight turn, so reading
    /// them through the store always yields `None`.
    pub async fn get(
        &self,
        scope: Scope,
        key: &str,
        session_id: &SessionId,
    ) -> Result<Option<StateValue>, StateError> {
        match scope {
            Scope::Session => {
                let sessions = self.inner.sessions.read().await;
                let session = sessions
                    .get(&session_id.0)
                    .ok_or_else(|| StateError::SessionNotFound(session_id.0.clone()))?;
                Ok(session.state.get(key).cloned())
            }
            Scope::User => {
                let user_id = self.user_of(session_id).await?;
                Ok(self
                    .inner
                    .user_state
                    .read()
                    .await
                    .get(&user_id.0)
                    .and_then(|m| m.get(key))
                    .cloned())
            }
            Scope::App => Ok(self.inner.app_state.read().await.get(key).cloned()),
            Scope::Ephemeral => Ok(None),
        }
    }

    /// Write a state entry directly (outside a turn).
    ///
    /// Every write is audited. App-scope writes require a privileged actor;
    /// session-scope writes are rejected when a session actor targets a
    /// session other than its own. Ephemeral writes are audited but never
    /// persisted.
    pub async fn set(
        &self,
        scope: Scope,
        key: &str,
        value: StateValue,
        actor: &Actor,
        session_id: &SessionId,
    ) -> Result<(), StateError> {
        match scope {
            Scope::App => {
                if !actor.privileged {
                    return Err(StateError::ScopeViolation {
                        scope,
                        key: key.to_string(),
                        actor: actor.name.clone(),
                    });
                }
                let mut app = self.inner.app_state.write().await;
                let old = app.insert(key.to_string(), value.clone());
                self.inner
                    .audit
                    .record(scope, key, old, value, actor, None);
                Ok(())
            }
            Scope::Session => {
                self.check_session_actor(actor, session_id, scope, key)?;
                let mut sessions = self.inner.sessions.write().await;
                let session = sessions
                    .get_mut(&session_id.0)
                    .ok_or_else(|| StateError::SessionNotFound(session_id.0.clone()))?;
                let old = session.state.insert(key.to_string(), value.clone());
                session.last_activity = Utc::now();
                self.inner
                    .audit
                    .record(scope, key, old, value, actor, Some(session_id));
                Ok(())
            }
            Scope::User => {
                let user_id = self.user_of(session_id).await?;
                let mut user_state = self.inner.user_state.write().await;
                let map = user_state.entry(user_id.0).or_default();
                let old = map.insert(key.to_string(), value.clone());
                self.inner
                    .audit
                    .record(scope, key, old, value, actor, Some(session_id));
                Ok(())
            }
            Scope::Ephemeral => {
                // Audited for attribution, dropped by design.
                self.inner
                    .audit
                    .record(scope, key, None, value, actor, Some(session_id));
                Ok(())
            }
        }
    }

    /// Point the session at a (possibly different) course.
    pub async fn update_course_context(
        &self,
        session_id: &SessionId,
        course_id: Option<CourseId>,
        actor: &Actor,
    ) -> Result<(), StateError> {
        let mut sessions = self.inner.sessions.write().await;
        let session = sessions
            .get_mut(&session_id.0)
            .ok_or_else(|| StateError::SessionNotFound(session_id.0.clone()))?;
        let old = session
            .course_id
            .as_ref()
            .map(|c| StateValue::Text(c.0.clone()));
        let new = course_id
            .as_ref()
            .map(|c| StateValue::Text(c.0.clone()))
            .unwrap_or(StateValue::Null);
        session.course_id = course_id;
        session.last_activity = Utc::now();
        self.inner
            .audit
            .record(Scope::Session, "course_id", old, new, actor, Some(session_id));
        Ok(())
    }

    /// Mark sessions inactive for longer than `threshold` as stale.
    /// Returns how many were newly marked.
    pub async fn mark_stale_sessions(&self, threshold: chrono::Duration) -> usize {
        let mut sessions = self.inner.sessions.write().await;
        let mut marked = 0;
        for session in sessions.values_mut() {
            if !session.stale && session.inactive_for(threshold) {
                session.stale = true;
                marked += 1;
                debug!(session_id = %session.id, "Session marked stale");
            }
        }
        marked
    }

    /// Begin a turn for `session_id`, enforcing at-most-one in flight.
    pub async fn begin_turn(
        &self,
        session_id: &SessionId,
        actor: Actor,
    ) -> Result<TurnGuard, StateError> {
        if self.get_session(session_id).await.is_none() {
            return Err(StateError::SessionNotFound(session_id.0.clone()));
        }

        let mut in_flight = self.inner.in_flight.lock().unwrap();
        if !in_flight.insert(session_id.0.clone()) {
            return Err(StateError::LockTimeout {
                session_id: session_id.0.clone(),
            });
        }
        drop(in_flight);

        Ok(TurnGuard {
            inner: self.inner.clone(),
            session_id: session_id.clone(),
            actor,
            staged_session: Vec::new(),
            staged_user: Vec::new(),
            staged_app: Vec::new(),
            staged_ephemeral: BTreeMap::new(),
            staged_turn: None,
            staged_phase: None,
            staged_course: None,
        })
    }

    /// The full audit trail.
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.inner.audit.entries()
    }

    /// Replay the audited phase transitions for one session, verifying each
    /// against the phase machine. Returns the transition list, or the first
    /// illegal transition found.
    pub fn phase_transitions(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<(SessionPhase, SessionPhase)>, StateError> {
        let mut transitions = Vec::new();
        for entry in self.inner.audit.entries_for_session(session_id) {
            if entry.key != PHASE_KEY {
                continue;
            }
            let Some(old) = entry.old else { continue };
            let (Ok(from), Ok(to)) = (
                serde_json::from_value::<SessionPhase>(old.to_json()),
                serde_json::from_value::<SessionPhase>(entry.new.to_json()),
            ) else {
                continue;
            };
            if !from.permits(&to) {
                return Err(StateError::IllegalPhaseTransition {
                    from: from.to_string(),
                    to: to.to_string(),
                });
            }
            transitions.push((from, to));
        }
        Ok(transitions)
    }

    async fn user_of(&self, session_id: &SessionId) -> Result<UserId, StateError> {
        let sessions = self.inner.sessions.read().await;
        sessions
            .get(&session_id.0)
            .map(|s| s.user_id.clone())
            .ok_or_else(|| StateError::SessionNotFound(session_id.0.clone()))
    }

    fn check_session_actor(
        &self,
        actor: &Actor,
        session_id: &SessionId,
        scope: Scope,
        key: &str,
    ) -> Result<(), StateError> {
        if actor.privileged {
            return Ok(());
        }
        let own = format!("session:{session_id}");
        if actor.name.starts_with("session:") && actor.name != own {
            return Err(StateError::ScopeViolation {
                scope,
                key: key.to_string(),
                actor: actor.name.clone(),
            });
        }
        Ok(())
    }
}

/// A staged, atomic turn mutation.
///
/// Writes accumulate on the guard and reach the store only on
/// [`TurnGuard::commit`]. Dropping the guard (cancellation, an error, an
/// agent timeout) releases the session with no store mutation having taken
/// effect.
#[derive(Debug)]
pub struct TurnGuard {
    inner: Arc<Inner>,
    session_id: SessionId,
    actor: Actor,
    staged_session: Vec<(String, StateValue)>,
    staged_user: Vec<(String, StateValue)>,
    staged_app: Vec<(String, StateValue)>,
    staged_ephemeral: BTreeMap<String, StateValue>,
    staged_turn: Option<Turn>,
    staged_phase: Option<SessionPhase>,
    staged_course: Option<Option<CourseId>>,
}

impl TurnGuard {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Stage a state write for this turn.
    pub fn set(&mut self, scope: Scope, key: &str, value: StateValue) -> Result<(), StateError> {
        match scope {
            Scope::App if !self.actor.privileged => Err(StateError::ScopeViolation {
                scope,
                key: key.to_string(),
                actor: self.actor.name.clone(),
            }),
            Scope::App => {
                self.staged_app.push((key.to_string(), value));
                Ok(())
            }
            Scope::Session => {
                self.staged_session.push((key.to_string(), value));
                Ok(())
            }
            Scope::User => {
                self.staged_user.push((key.to_string(), value));
                Ok(())
            }
            Scope::Ephemeral => {
                self.staged_ephemeral.insert(key.to_string(), value);
                Ok(())
            }
        }
    }

    /// Read through the staged writes, falling back to committed state.
    pub async fn get(&self, scope: Scope, key: &str) -> Result<Option<StateValue>, StateError> {
        let staged = match scope {
            Scope::Session => self
                .staged_session
                .iter()
                .rev()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone()),
            Scope::User => self
                .staged_user
                .iter()
                .rev()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone()),
            Scope::App => self
                .staged_app
                .iter()
                .rev()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone()),
            Scope::Ephemeral => self.staged_ephemeral.get(key).cloned(),
        };
        if staged.is_some() {
            return Ok(staged);
        }
        if scope == Scope::Ephemeral {
            return Ok(None);
        }
        SessionStore {
            inner: self.inner.clone(),
        }
        .get(scope, key, &self.session_id)
        .await
    }

    /// Stage the turn to append on commit.
    pub fn stage_turn(&mut self, turn: Turn) {
        self.staged_turn = Some(turn);
    }

    /// Stage a phase transition. Legality is checked at commit time against
    /// the phase the session actually holds.
    pub fn set_phase(&mut self, phase: SessionPhase) {
        self.staged_phase = Some(phase);
    }

    /// Stage a course-context change for this turn.
    pub fn set_course(&mut self, course_id: Option<CourseId>) {
        self.staged_course = Some(course_id);
    }

    /// Apply every staged write atomically. Ephemeral entries are dropped
    /// here: they never outlive the turn.
    pub async fn commit(mut self) -> Result<(), StateError> {
        let mut sessions = self.inner.sessions.write().await;
        let session = sessions
            .get_mut(&self.session_id.0)
            .ok_or_else(|| StateError::SessionNotFound(self.session_id.0.clone()))?;

        if let Some(next) = &self.staged_phase {
            if !session.phase.permits(next) {
                return Err(StateError::IllegalPhaseTransition {
                    from: session.phase.to_string(),
                    to: next.to_string(),
                });
            }
        }

        for (key, value) in &self.staged_session {
            let old = session.state.insert(key.clone(), value.clone());
            self.inner.audit.record(
                Scope::Session,
                key,
                old,
                value.clone(),
                &self.actor,
                Some(&self.session_id),
            );
        }

        if let Some(course_id) = self.staged_course.take() {
            let old = session
                .course_id
                .as_ref()
                .map(|c| StateValue::Text(c.0.clone()));
            let new = course_id
                .as_ref()
                .map(|c| StateValue::Text(c.0.clone()))
                .unwrap_or(StateValue::Null);
            session.course_id = course_id;
            self.inner.audit.record(
                Scope::Session,
                "course_id",
                old,
                new,
                &self.actor,
                Some(&self.session_id),
            );
        }

        if let Some(next) = self.staged_phase.take() {
            let old = session.phase;
            session.phase = next;
            self.inner.audit.record(
                Scope::Session,
                PHASE_KEY,
                Some(StateValue::from_json(
                    serde_json::to_value(old).unwrap_or(serde_json::Value::Null),
                )),
                StateValue::from_json(
                    serde_json::to_value(next).unwrap_or(serde_json::Value::Null),
                ),
                &self.actor,
                Some(&self.session_id),
            );
        }

        if let Some(turn) = self.staged_turn.take() {
            session.push_turn(turn);
        } else {
            session.last_activity = Utc::now();
        }
        let user_id = session.user_id.clone();
        drop(sessions);

        if !self.staged_user.is_empty() {
            let mut user_state = self.inner.user_state.write().await;
            let map = user_state.entry(user_id.0).or_default();
            for (key, value) in &self.staged_user {
                let old = map.insert(key.clone(), value.clone());
                self.inner.audit.record(
                    Scope::User,
                    key,
                    old,
                    value.clone(),
                    &self.actor,
                    Some(&self.session_id),
                );
            }
        }

        if !self.staged_app.is_empty() {
            let mut app = self.inner.app_state.write().await;
            for (key, value) in &self.staged_app {
                let old = app.insert(key.clone(), value.clone());
                self.inner
                    .audit
                    .record(Scope::App, key, old, value.clone(), &self.actor, None);
            }
        }

        Ok(())
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        self.inner
            .in_flight
            .lock()
            .unwrap()
            .remove(&self.session_id.0);
    }
}
