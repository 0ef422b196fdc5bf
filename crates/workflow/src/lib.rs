//! Workflow orchestrator — the turn pipeline for CourseCraft.
//!
//! The orchestrator owns everything that happens between an inbound chat
//! message and the committed turn: session bootstrap, context assembly,
//! routing, the agent invocation (with the timeout and retry budget),
//! the guardrail review loop, and the atomic commit of all resulting
//! state. Phases advance only when an artifact passes review.
//!
//! A turn is all-or-nothing: every store mutation is staged on the
//! session's [`TurnGuard`] and applied in one commit. An agent timeout,
//! a retry-budget exhaustion, or a caller cancellation drops the guard
//! and leaves the session exactly as it was.

use std::sync::Arc;
use std::time::Duration;

use coursecraft_agents::drafting::{objectives_to_state, OBJECTIVES_STATE_KEY};
use coursecraft_agents::{route, ContextAssembler};
use coursecraft_core::artifact::Artifact;
use coursecraft_core::context::{ContextPayload, GUARDRAIL_FEEDBACK_KEY};
use coursecraft_core::course::{Course, CourseProvider, UserProfile};
use coursecraft_core::error::{AgentError, Error, Result, StateError};
use coursecraft_core::invoke::{AgentId, AgentInvoker, AgentReply, UiUpdate};
use coursecraft_core::phase::{SessionPhase, WorkflowPhase};
use coursecraft_core::protocol::{
    ApprovalMessage, ProposalMessage, ProtocolMessage, RevisionRequest, TurnRef,
};
use coursecraft_core::session::{Session, SessionId, Turn, UserId};
use coursecraft_core::state::{Scope, StateValue};
use coursecraft_guardrails::{validate, RuleSet, Verdict};
use coursecraft_memory::MemoryIndex;
use coursecraft_store::{Actor, SessionStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// What the user sees once the workflow has reached its terminal phase.
const DONE_REPLY: &str = "This course draft is complete. Start a new session to work on \
     another course, or request a revision of the final draft.";

/// One inbound chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Omitted on the first turn; the orchestrator bootstraps a session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,

    pub user_id: UserId,

    pub message: String,

    /// Course context supplied by the frontend, absorbed into the session.
    #[serde(default, rename = "current_course", skip_serializing_if = "Option::is_none")]
    pub course: Option<Course>,

    /// Teacher profile supplied by the frontend, remembered across sessions.
    #[serde(default, rename = "user_profile", skip_serializing_if = "Option::is_none")]
    pub profile: Option<UserProfile>,
}

/// What a turn returns to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: SessionId,

    /// The agent's text response.
    pub response: String,

    pub current_agent_id: AgentId,

    /// The session's phase after this turn.
    pub phase: SessionPhase,

    /// Structured UI hints, when the agent produced any.
    #[serde(default, rename = "ui_updates", skip_serializing_if = "Option::is_none")]
    pub ui: Option<UiUpdate>,
}

/// The workflow orchestrator. Cheap to clone via the `Arc`'d collaborators.
pub struct Orchestrator {
    store: SessionStore,
    memory: MemoryIndex,
    courses: Arc<dyn CourseProvider>,
    invoker: Arc<dyn AgentInvoker>,
    assembler: ContextAssembler,
    rules: RuleSet,
    invoke_timeout: Duration,
    max_retries: u32,
}

impl Orchestrator {
    pub fn new(
        store: SessionStore,
        memory: MemoryIndex,
        courses: Arc<dyn CourseProvider>,
        invoker: Arc<dyn AgentInvoker>,
    ) -> Self {
        Self {
            store,
            memory,
            courses,
            invoker,
            assembler: ContextAssembler::default(),
            rules: RuleSet::builtin(),
            invoke_timeout: Duration::from_secs(30),
            max_retries: 2,
        }
    }

    pub fn with_assembler(mut self, assembler: ContextAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_invoke_timeout(mut self, timeout: Duration) -> Self {
        self.invoke_timeout = timeout;
        self
    }

    /// How many additional attempts follow a failed or timed-out invocation.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn memory(&self) -> &MemoryIndex {
        &self.memory
    }

    pub fn courses(&self) -> &dyn CourseProvider {
        self.courses.as_ref()
    }

    /// Bootstrap a session for (user, course). Idempotent while the existing
    /// session is live; any supplied profile or course is recorded in memory.
    pub async fn initialize(
        &self,
        user_id: UserId,
        profile: Option<&UserProfile>,
        course: Option<&Course>,
    ) -> Result<SessionId> {
        if let Some(profile) = profile {
            self.memory.remember_user(profile).await?;
        }
        if let Some(course) = course {
            self.memory.remember_course(&user_id, course).await?;
        }

        let (session_id, created) = self
            .store
            .initialize(user_id, course.map(|c| c.id.clone()))
            .await;
        if created {
            info!(session_id = %session_id, "Session bootstrapped");
        }
        Ok(session_id)
    }

    /// Fetch a session by id.
    pub async fn session(&self, id: &SessionId) -> Result<Session> {
        self.store
            .get_session(id)
            .await
            .ok_or_else(|| StateError::SessionNotFound(id.0.clone()).into())
    }

    /// Assemble the context payload a hypothetical next turn would see.
    /// A pure read, exposed for inspection and debugging.
    pub async fn assemble_context(
        &self,
        session_id: &SessionId,
        message: &str,
    ) -> Result<ContextPayload> {
        let snapshot = self.store.snapshot(session_id).await.map_err(Error::from)?;
        Ok(self
            .assembler
            .assemble(&snapshot, message, &self.memory, self.courses.as_ref())
            .await)
    }

    /// Mark sessions inactive past `threshold` as stale.
    pub async fn sweep_stale(&self, threshold: chrono::Duration) -> usize {
        self.store.mark_stale_sessions(threshold).await
    }

    /// Handle one chat turn end to end.
    pub async fn handle_turn(&self, request: ChatRequest) -> Result<ChatResponse> {
        let (session_id, bootstrapped) = match &request.session_id {
            Some(id) => {
                if self.store.get_session(id).await.is_none() {
                    return Err(StateError::SessionNotFound(id.0.clone()).into());
                }
                (id.clone(), false)
            }
            None => {
                let id = self
                    .initialize(
                        request.user_id.clone(),
                        request.profile.as_ref(),
                        request.course.as_ref(),
                    )
                    .await?;
                (id, true)
            }
        };

        // At most one turn in flight per session; everything below stages
        // onto this guard and commits at the very end.
        let mut guard = self
            .store
            .begin_turn(&session_id, Actor::orchestrator())
            .await
            .map_err(Error::from)?;

        // Absorb request-supplied context (already seeded when we
        // bootstrapped above).
        if !bootstrapped {
            if let Some(profile) = &request.profile {
                self.memory.remember_user(profile).await?;
            }
            if let Some(course) = &request.course {
                self.memory.remember_course(&request.user_id, course).await?;
            }
        }

        let mut snapshot = self.store.snapshot(&session_id).await.map_err(Error::from)?;
        if let Some(course) = &request.course {
            if snapshot.session.course_id.as_ref() != Some(&course.id) {
                guard.set_course(Some(course.id.clone()));
                snapshot.session.course_id = Some(course.id.clone());
            }
        }

        // Terminal phase: no agent invocation, but the turn is still recorded.
        if snapshot.session.phase.is_done() {
            debug!(session_id = %session_id, "Turn on a completed workflow");
            guard.stage_turn(Turn::new(request.message.as_str(), DONE_REPLY, AgentId::Generic));
            guard.commit().await.map_err(Error::from)?;
            return Ok(ChatResponse {
                session_id,
                response: DONE_REPLY.to_string(),
                current_agent_id: AgentId::Generic,
                phase: snapshot.session.phase,
                ui: None,
            });
        }

        let payload = self
            .assembler
            .assemble(&snapshot, &request.message, &self.memory, self.courses.as_ref())
            .await;

        let agent = route(&snapshot.session.phase, &request.message);
        info!(session_id = %session_id, agent = %agent, phase = %snapshot.session.phase, "Turn routed");

        // The only suspending call of the turn. On failure the guard drops
        // here and the session keeps its pre-turn state.
        let reply = self.invoke_with_retry(agent, &payload).await?;

        let mut response_text = reply.text;
        let mut phase = snapshot.session.phase;

        if let Some(artifact) = &reply.artifact {
            let proposal = ProposalMessage {
                artifact: artifact.clone(),
                proposed_by: agent,
                produced_in: snapshot.session.phase.effective_phase(),
                turn: TurnRef {
                    session_id: session_id.clone(),
                    turn_index: snapshot.session.turns.len(),
                },
            };

            match self.review_proposal(&proposal) {
                ProtocolMessage::Approval(_) => {
                    debug!(kind = artifact.kind_str(), "Proposal approved");
                    if let Artifact::Objectives(objectives) = artifact {
                        // Downstream agents structure and assess against
                        // the captured objectives.
                        guard.set(
                            Scope::Session,
                            OBJECTIVES_STATE_KEY,
                            objectives_to_state(objectives),
                        )?;
                    }
                    if payload.guardrail_feedback.is_some() {
                        guard.set(Scope::Session, GUARDRAIL_FEEDBACK_KEY, StateValue::Null)?;
                    }
                    if let Some(next) = advance_on(&snapshot.session.phase, artifact) {
                        guard.set_phase(next);
                        phase = next;
                    }
                }
                ProtocolMessage::RevisionRequest(revision) => {
                    info!(
                        rule_id = %revision.reason.rule_id,
                        kind = artifact.kind_str(),
                        "Proposal rejected, revision requested"
                    );
                    guard.set(
                        Scope::Session,
                        GUARDRAIL_FEEDBACK_KEY,
                        revision.reason.to_state_value(),
                    )?;
                    let held = SessionPhase::RevisionRequested {
                        resume: snapshot.session.phase.effective_phase(),
                    };
                    guard.set_phase(held);
                    phase = held;
                    response_text
                        .push_str(&format!("\n\nRevision requested: {}", revision.reason));
                }
                ProtocolMessage::Proposal(_) => unreachable!("reviewer never proposes"),
            }
        }

        guard.stage_turn(Turn::new(request.message.as_str(), response_text.as_str(), agent));
        guard.commit().await.map_err(Error::from)?;

        Ok(ChatResponse {
            session_id,
            response: response_text,
            current_agent_id: agent,
            phase,
            ui: reply.ui,
        })
    }

    /// The external entry of the review loop: a human (or any reviewer
    /// outside the automatic guardrails) approves the artifact under
    /// revision or requests another revision pass.
    pub async fn review(
        &self,
        session_id: &SessionId,
        message: ProtocolMessage,
    ) -> Result<ChatResponse> {
        let mut guard = self
            .store
            .begin_turn(session_id, Actor::orchestrator())
            .await
            .map_err(Error::from)?;
        let session = self.session(session_id).await?;

        let (phase, response) = match message {
            ProtocolMessage::Approval(_) => match session.phase {
                SessionPhase::RevisionRequested { resume } => {
                    let next = resume
                        .next()
                        .map(|phase| SessionPhase::Active { phase })
                        .unwrap_or(SessionPhase::Active { phase: resume });
                    guard.set(Scope::Session, GUARDRAIL_FEEDBACK_KEY, StateValue::Null)?;
                    guard.set_phase(next);
                    info!(session_id = %session_id, phase = %next, "Revision approved");
                    (next, "Approved. The workflow has advanced.".to_string())
                }
                phase => (phase, "Nothing is awaiting approval.".to_string()),
            },
            ProtocolMessage::RevisionRequest(revision) => {
                // The artifact under revision is the one whose approval
                // produced the current phase.
                let resume = match session.phase {
                    SessionPhase::Active { phase } => phase.prev().unwrap_or(phase),
                    SessionPhase::RevisionRequested { resume } => resume,
                };
                guard.set(
                    Scope::Session,
                    GUARDRAIL_FEEDBACK_KEY,
                    revision.reason.to_state_value(),
                )?;
                let held = SessionPhase::RevisionRequested { resume };
                guard.set_phase(held);
                info!(session_id = %session_id, rule_id = %revision.reason.rule_id, "Revision requested by reviewer");
                (
                    held,
                    format!("Revision requested: {}", revision.reason),
                )
            }
            ProtocolMessage::Proposal(_) => {
                return Err(Error::Internal(
                    "proposals originate from agents, not reviewers".into(),
                ));
            }
        };

        guard.commit().await.map_err(Error::from)?;

        Ok(ChatResponse {
            session_id: session_id.clone(),
            response,
            current_agent_id: AgentId::Generic,
            phase,
            ui: None,
        })
    }

    /// The automatic reviewer: guardrails decide the proposal's fate.
    fn review_proposal(&self, proposal: &ProposalMessage) -> ProtocolMessage {
        match validate(&proposal.artifact, &self.rules) {
            Verdict::Pass => ProtocolMessage::Approval(ApprovalMessage {
                turn: proposal.turn.clone(),
            }),
            Verdict::Fail(reason) => ProtocolMessage::RevisionRequest(RevisionRequest {
                reason,
                turn: proposal.turn.clone(),
            }),
        }
    }

    /// Invoke the agent under the configured timeout, retrying up to the
    /// budget before surfacing `AgentUnavailable` for this turn.
    async fn invoke_with_retry(
        &self,
        agent: AgentId,
        payload: &ContextPayload,
    ) -> Result<AgentReply> {
        let attempts = self.max_retries + 1;
        for attempt in 1..=attempts {
            match tokio::time::timeout(self.invoke_timeout, self.invoker.invoke(agent, payload))
                .await
            {
                Ok(Ok(reply)) => return Ok(reply),
                Ok(Err(err)) => {
                    warn!(agent = %agent, attempt, error = %err, "Agent invocation failed");
                }
                Err(_) => {
                    warn!(
                        agent = %agent,
                        attempt,
                        timeout_secs = self.invoke_timeout.as_secs(),
                        "Agent invocation timed out"
                    );
                }
            }
        }
        Err(AgentError::Unavailable {
            agent_id: agent.to_string(),
            attempts,
        }
        .into())
    }
}

/// Whether `artifact` is the product that completes `phase`.
fn artifact_completes(phase: WorkflowPhase, artifact: &Artifact) -> bool {
    matches!(
        (phase, artifact),
        (WorkflowPhase::NeedsAnalysis, Artifact::Objectives(_))
            | (WorkflowPhase::ObjectivesCaptured, Artifact::Syllabus(_))
            | (WorkflowPhase::StructureProposed, Artifact::Assessment(_))
            | (WorkflowPhase::DraftReady, Artifact::Assessment(_))
    )
}

/// The phase an approved artifact advances to, if it advances at all.
/// Side artifacts (resources, plain text) never move the workflow.
fn advance_on(phase: &SessionPhase, artifact: &Artifact) -> Option<SessionPhase> {
    let effective = phase.effective_phase();
    if !artifact_completes(effective, artifact) {
        return None;
    }
    effective
        .next()
        .map(|phase| SessionPhase::Active { phase })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use coursecraft_core::artifact::{BloomLevel, LearningObjective};
    use coursecraft_core::protocol::GuardrailReason;
    use coursecraft_store::CourseCatalog;
    use std::sync::Mutex;

    /// Returns scripted replies in order; `Pending` entries never resolve,
    /// which is how invocation timeouts are simulated.
    enum Scripted {
        Reply(AgentReply),
        Error(AgentError),
        Pending,
    }

    struct ScriptedInvoker {
        script: Mutex<Vec<Scripted>>,
        calls: Mutex<u32>,
    }

    impl ScriptedInvoker {
        fn new(script: Vec<Scripted>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl AgentInvoker for ScriptedInvoker {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn invoke(
            &self,
            _agent: AgentId,
            _payload: &ContextPayload,
        ) -> std::result::Result<AgentReply, AgentError> {
            *self.calls.lock().unwrap() += 1;
            let next = {
                let mut script = self.script.lock().unwrap();
                if script.is_empty() {
                    Scripted::Reply(AgentReply::text_only("unscripted"))
                } else {
                    script.remove(0)
                }
            };
            match next {
                Scripted::Reply(reply) => Ok(reply),
                Scripted::Error(err) => Err(err),
                Scripted::Pending => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }
    }

    fn spanning_objectives() -> Vec<LearningObjective> {
        vec![
            LearningObjective::new("Recall organelle names", BloomLevel::Remembering),
            LearningObjective::new("Explain membrane transport", BloomLevel::Understanding),
            LearningObjective::new("Apply osmosis to labs", BloomLevel::Application),
            LearningObjective::new("Analyze division defects", BloomLevel::Analysis),
            LearningObjective::new("Design an experiment", BloomLevel::Creation),
        ]
    }

    fn objectives_reply(objectives: Vec<LearningObjective>) -> AgentReply {
        AgentReply {
            text: "Objectives drafted.".into(),
            artifact: Some(Artifact::Objectives(objectives)),
            ui: None,
        }
    }

    fn orchestrator(invoker: Arc<dyn AgentInvoker>) -> Orchestrator {
        Orchestrator::new(
            SessionStore::new(),
            MemoryIndex::in_memory(),
            Arc::new(CourseCatalog::new()),
            invoker,
        )
        .with_invoke_timeout(Duration::from_millis(50))
    }

    fn request(session_id: Option<SessionId>, message: &str) -> ChatRequest {
        ChatRequest {
            session_id,
            user_id: UserId::from("u1"),
            message: message.into(),
            course: None,
            profile: None,
        }
    }

    #[tokio::test]
    async fn approved_objectives_advance_the_phase() {
        let invoker = Arc::new(ScriptedInvoker::new(vec![Scripted::Reply(
            objectives_reply(spanning_objectives()),
        )]));
        let orch = orchestrator(invoker);

        let response = orch
            .handle_turn(request(None, "Define objectives for cell biology"))
            .await
            .unwrap();

        assert_eq!(response.current_agent_id, AgentId::Objectives);
        assert_eq!(
            response.phase,
            SessionPhase::Active {
                phase: WorkflowPhase::ObjectivesCaptured
            }
        );

        // Objectives were parked in session state for the downstream agents.
        let session = orch.session(&response.session_id).await.unwrap();
        assert!(session.state.contains_key(OBJECTIVES_STATE_KEY));
        assert_eq!(session.turns.len(), 1);
    }

    #[tokio::test]
    async fn rejected_artifact_holds_phase_and_records_feedback() {
        // Untagged objective: fails the objectives-tagged rule.
        let mut objectives = spanning_objectives();
        objectives.push(LearningObjective::untagged("Know some biology"));
        let invoker = Arc::new(ScriptedInvoker::new(vec![Scripted::Reply(
            objectives_reply(objectives),
        )]));
        let orch = orchestrator(invoker);

        let response = orch
            .handle_turn(request(None, "Define objectives for cell biology"))
            .await
            .unwrap();

        assert_eq!(
            response.phase,
            SessionPhase::RevisionRequested {
                resume: WorkflowPhase::NeedsAnalysis
            }
        );
        assert!(response.response.contains("Revision requested"));
        assert!(response.response.contains("objectives-tagged"));

        // The turn was kept, and the next payload carries the reason.
        let session = orch.session(&response.session_id).await.unwrap();
        assert_eq!(session.turns.len(), 1);
        let payload = orch
            .assemble_context(&response.session_id, "try again")
            .await
            .unwrap();
        assert_eq!(
            payload.guardrail_feedback.as_ref().map(|r| r.rule_id.as_str()),
            Some("objectives-tagged")
        );
    }

    #[tokio::test]
    async fn passing_retry_clears_feedback_and_advances() {
        let mut untagged = spanning_objectives();
        untagged.push(LearningObjective::untagged("vague"));
        let invoker = Arc::new(ScriptedInvoker::new(vec![
            Scripted::Reply(objectives_reply(untagged)),
            Scripted::Reply(objectives_reply(spanning_objectives())),
        ]));
        let orch = orchestrator(invoker);

        let first = orch
            .handle_turn(request(None, "Define objectives for cell biology"))
            .await
            .unwrap();
        assert!(first.phase.is_revision());

        let second = orch
            .handle_turn(request(
                Some(first.session_id.clone()),
                "objectives again, all tagged this time",
            ))
            .await
            .unwrap();
        assert_eq!(
            second.phase,
            SessionPhase::Active {
                phase: WorkflowPhase::ObjectivesCaptured
            }
        );
        let payload = orch
            .assemble_context(&second.session_id, "next")
            .await
            .unwrap();
        assert!(payload.guardrail_feedback.is_none());
    }

    #[tokio::test]
    async fn invocation_errors_retry_then_succeed() {
        let invoker = Arc::new(ScriptedInvoker::new(vec![
            Scripted::Error(AgentError::Invocation("transient".into())),
            Scripted::Reply(objectives_reply(spanning_objectives())),
        ]));
        let orch = orchestrator(invoker.clone());

        let response = orch
            .handle_turn(request(None, "Define objectives for cell biology"))
            .await
            .unwrap();
        assert_eq!(invoker.calls(), 2);
        assert!(!response.phase.is_revision());
    }

    #[tokio::test]
    async fn exhausted_retries_leave_session_untouched() {
        let invoker = Arc::new(ScriptedInvoker::new(vec![
            Scripted::Pending,
            Scripted::Pending,
            Scripted::Pending,
        ]));
        let orch = orchestrator(invoker.clone());
        let session_id = orch
            .initialize(UserId::from("u1"), None, None)
            .await
            .unwrap();

        let err = orch
            .handle_turn(request(Some(session_id.clone()), "objectives please"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Agent(AgentError::Unavailable { attempts: 3, .. })
        ));
        assert_eq!(invoker.calls(), 3);

        // Pre-turn state: no turn recorded, phase unchanged, lock released.
        let session = orch.session(&session_id).await.unwrap();
        assert!(session.turns.is_empty());
        assert_eq!(session.phase, SessionPhase::start());
        orch.store()
            .begin_turn(&session_id, Actor::orchestrator())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn concurrent_turn_is_rejected_with_lock_timeout() {
        let invoker = Arc::new(ScriptedInvoker::new(vec![]));
        let orch = orchestrator(invoker);
        let session_id = orch
            .initialize(UserId::from("u1"), None, None)
            .await
            .unwrap();

        let _guard = orch
            .store()
            .begin_turn(&session_id, Actor::orchestrator())
            .await
            .unwrap();
        let err = orch
            .handle_turn(request(Some(session_id), "hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::State(StateError::LockTimeout { .. })));
    }

    #[tokio::test]
    async fn unknown_session_id_fails_fast() {
        let orch = orchestrator(Arc::new(ScriptedInvoker::new(vec![])));
        let err = orch
            .handle_turn(request(Some(SessionId::from("nope")), "hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::State(StateError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn review_approval_advances_out_of_revision() {
        let mut untagged = spanning_objectives();
        untagged.push(LearningObjective::untagged("vague"));
        let invoker = Arc::new(ScriptedInvoker::new(vec![Scripted::Reply(
            objectives_reply(untagged),
        )]));
        let orch = orchestrator(invoker);

        let first = orch
            .handle_turn(request(None, "Define objectives for cell biology"))
            .await
            .unwrap();
        assert!(first.phase.is_revision());

        // A human reviewer overrides the guardrail.
        let approved = orch
            .review(
                &first.session_id,
                ProtocolMessage::Approval(ApprovalMessage {
                    turn: TurnRef {
                        session_id: first.session_id.clone(),
                        turn_index: 0,
                    },
                }),
            )
            .await
            .unwrap();
        assert_eq!(
            approved.phase,
            SessionPhase::Active {
                phase: WorkflowPhase::ObjectivesCaptured
            }
        );
        let payload = orch
            .assemble_context(&first.session_id, "next")
            .await
            .unwrap();
        assert!(payload.guardrail_feedback.is_none());
    }

    #[tokio::test]
    async fn reviewer_revision_re_enters_the_producing_phase() {
        let invoker = Arc::new(ScriptedInvoker::new(vec![Scripted::Reply(
            objectives_reply(spanning_objectives()),
        )]));
        let orch = orchestrator(invoker);

        let response = orch
            .handle_turn(request(None, "Define objectives for cell biology"))
            .await
            .unwrap();
        assert_eq!(
            response.phase,
            SessionPhase::Active {
                phase: WorkflowPhase::ObjectivesCaptured
            }
        );

        let revised = orch
            .review(
                &response.session_id,
                ProtocolMessage::RevisionRequest(RevisionRequest {
                    reason: GuardrailReason::new("reviewer", "objective 2 is too vague"),
                    turn: TurnRef {
                        session_id: response.session_id.clone(),
                        turn_index: 0,
                    },
                }),
            )
            .await
            .unwrap();
        assert_eq!(
            revised.phase,
            SessionPhase::RevisionRequested {
                resume: WorkflowPhase::NeedsAnalysis
            }
        );
        let payload = orch
            .assemble_context(&response.session_id, "revise")
            .await
            .unwrap();
        assert_eq!(
            payload.guardrail_feedback.as_ref().map(|r| r.rule_id.as_str()),
            Some("reviewer")
        );
    }

    #[tokio::test]
    async fn side_artifacts_never_advance_the_phase() {
        let resources = AgentReply {
            text: "Some resources.".into(),
            artifact: Some(Artifact::Resources(vec![])),
            ui: None,
        };
        let invoker = Arc::new(ScriptedInvoker::new(vec![Scripted::Reply(resources)]));
        let orch = orchestrator(invoker);

        let response = orch
            .handle_turn(request(None, "Recommend a good book"))
            .await
            .unwrap();
        assert_eq!(response.current_agent_id, AgentId::Resources);
        assert_eq!(response.phase, SessionPhase::start());
    }

    #[tokio::test]
    async fn bootstrap_seeds_memory_records() {
        let orch = orchestrator(Arc::new(ScriptedInvoker::new(vec![])));
        let profile = UserProfile {
            user_id: UserId::from("u1"),
            name: "Dr. Smith".into(),
            email: "smith@example.edu".into(),
            preferences: serde_json::Map::new(),
        };
        let course = Course::new("c1", "Cell Biology", "Intro", "CEGEP");

        orch.initialize(UserId::from("u1"), Some(&profile), Some(&course))
            .await
            .unwrap();
        assert_eq!(orch.memory().count().await.unwrap(), 2);
    }

    #[test]
    fn advancement_is_phase_and_artifact_specific() {
        let objectives = Artifact::Objectives(vec![]);
        let at_start = SessionPhase::start();
        assert_eq!(
            advance_on(&at_start, &objectives),
            Some(SessionPhase::Active {
                phase: WorkflowPhase::ObjectivesCaptured
            })
        );
        // Wrong product for the phase.
        assert_eq!(advance_on(&at_start, &Artifact::Text("hi".into())), None);

        // A revision resumes and advances past its producing phase.
        let revising = SessionPhase::RevisionRequested {
            resume: WorkflowPhase::NeedsAnalysis,
        };
        assert_eq!(
            advance_on(&revising, &objectives),
            Some(SessionPhase::Active {
                phase: WorkflowPhase::ObjectivesCaptured
            })
        );
    }
}
