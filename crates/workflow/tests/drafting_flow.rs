//! End-to-end turn pipeline tests against the real drafting agents.

use std::sync::Arc;
use std::time::Duration;

use coursecraft_agents::DraftingInvoker;
use coursecraft_core::artifact::BloomLevel;
use coursecraft_core::context::ContextPayload;
use coursecraft_core::course::Course;
use coursecraft_core::error::{AgentError, Error, StateError};
use coursecraft_core::invoke::{AgentId, AgentInvoker, AgentReply};
use coursecraft_core::memory::MemoryQuery;
use coursecraft_core::phase::{SessionPhase, WorkflowPhase};
use coursecraft_core::protocol::{GuardrailReason, ProtocolMessage, RevisionRequest, TurnRef};
use coursecraft_core::session::{SessionId, UserId};
use coursecraft_guardrails::{AppliesTo, Rule, RuleKind, RuleSet};
use coursecraft_memory::MemoryIndex;
use coursecraft_store::{CourseCatalog, SessionStore};
use coursecraft_workflow::{ChatRequest, ChatResponse, Orchestrator};

fn cell_biology() -> Course {
    let mut course = Course::new("c1", "Cell Biology", "Introductory cell biology", "CEGEP");
    course.term = Some("Fall 2024".into());
    course
}

async fn drafting_orchestrator() -> Orchestrator {
    let catalog = CourseCatalog::new();
    catalog.upsert(&UserId::from("u1"), cell_biology()).await;
    Orchestrator::new(
        SessionStore::new(),
        MemoryIndex::in_memory(),
        Arc::new(catalog),
        Arc::new(DraftingInvoker::default()),
    )
}

fn turn(session_id: &SessionId, message: &str) -> ChatRequest {
    ChatRequest {
        session_id: Some(session_id.clone()),
        user_id: UserId::from("u1"),
        message: message.into(),
        course: None,
        profile: None,
    }
}

async fn send(orch: &Orchestrator, session_id: &SessionId, message: &str) -> ChatResponse {
    orch.handle_turn(turn(session_id, message)).await.unwrap()
}

fn active(phase: WorkflowPhase) -> SessionPhase {
    SessionPhase::Active { phase }
}

#[tokio::test]
async fn objectives_turn_advances_and_tags_cognitive_levels() {
    let orch = drafting_orchestrator().await;
    let session_id = orch
        .initialize(UserId::from("u1"), None, Some(&cell_biology()))
        .await
        .unwrap();

    let response = send(&orch, &session_id, "Define objectives for cell biology").await;

    assert_eq!(response.current_agent_id, AgentId::Objectives);
    assert_eq!(response.phase, active(WorkflowPhase::ObjectivesCaptured));
    // At least one objective in the reply carries a recognized level.
    assert!(BloomLevel::ALL
        .iter()
        .any(|level| response.response.contains(level.as_str())));
}

#[tokio::test]
async fn guardrail_rejection_holds_phase_and_informs_the_next_turn() {
    // A rule the drafting agent cannot satisfy: it drafts five objectives.
    let mut rules = RuleSet::builtin();
    rules.add(Rule {
        id: "ten-objectives".into(),
        description: "Demand more objectives than the drafter produces".into(),
        applies_to: AppliesTo::Objectives,
        kind: RuleKind::MinObjectives { count: 10 },
        enabled: true,
        priority: 100,
    });
    let orch = drafting_orchestrator().await.with_rules(rules);
    let session_id = orch
        .initialize(UserId::from("u1"), None, Some(&cell_biology()))
        .await
        .unwrap();

    let response = send(&orch, &session_id, "Define objectives for cell biology").await;

    // Rejection never advances: the effective phase is still the start.
    assert_eq!(
        response.phase,
        SessionPhase::RevisionRequested {
            resume: WorkflowPhase::NeedsAnalysis
        }
    );
    assert!(response.response.contains("ten-objectives"));

    // The turn stayed in history and the next payload carries the reason.
    let session = orch.session(&session_id).await.unwrap();
    assert_eq!(session.turns.len(), 1);
    let payload = orch
        .assemble_context(&session_id, "try again")
        .await
        .unwrap();
    assert_eq!(
        payload
            .guardrail_feedback
            .as_ref()
            .map(|r| r.rule_id.as_str()),
        Some("ten-objectives")
    );
    assert!(payload.render().contains("=== REVISION FEEDBACK ==="));
}

#[tokio::test]
async fn bootstrap_is_idempotent_across_turns() {
    let orch = drafting_orchestrator().await;
    let course = cell_biology();
    let first = orch
        .initialize(UserId::from("u1"), None, Some(&course))
        .await
        .unwrap();
    let second = orch
        .initialize(UserId::from("u1"), None, Some(&course))
        .await
        .unwrap();
    assert_eq!(first, second);

    send(&orch, &first, "Define objectives for cell biology").await;
    send(&orch, &first, "Now structure the course").await;

    // One session, both turns on it.
    let session = orch.session(&first).await.unwrap();
    assert_eq!(session.turns.len(), 2);
    assert!(session.turns[0].timestamp <= session.turns[1].timestamp);
}

#[tokio::test]
async fn course_snapshots_are_recalled_per_user() {
    let orch = drafting_orchestrator().await;
    orch.initialize(UserId::from("u1"), None, Some(&cell_biology()))
        .await
        .unwrap();

    let results = orch
        .memory()
        .search(&MemoryQuery::new(UserId::from("u1"), "cell biology"))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].record.content.contains("Cell Biology"));

    let unrelated = orch
        .memory()
        .search(&MemoryQuery::new(UserId::from("u2"), "cell biology"))
        .await
        .unwrap();
    assert!(unrelated.is_empty());
}

#[tokio::test]
async fn full_drafting_flow_reaches_done_and_stays_there() {
    let orch = drafting_orchestrator().await;
    let session_id = orch
        .initialize(UserId::from("u1"), None, Some(&cell_biology()))
        .await
        .unwrap();

    let steps: [(&str, WorkflowPhase); 4] = [
        ("Define objectives for cell biology", WorkflowPhase::ObjectivesCaptured),
        ("Propose a structure", WorkflowPhase::StructureProposed),
        ("Draft the assessment", WorkflowPhase::DraftReady),
        ("Finalize the assessment", WorkflowPhase::Done),
    ];
    for (message, expected) in steps {
        let response = send(&orch, &session_id, message).await;
        assert_eq!(response.phase, active(expected), "after '{message}'");
    }

    // Terminal: the turn is recorded but no agent is invoked.
    let response = send(&orch, &session_id, "One more quiz please").await;
    assert_eq!(response.phase, active(WorkflowPhase::Done));
    assert_eq!(response.current_agent_id, AgentId::Generic);
    assert!(response.response.contains("complete"));
    assert_eq!(orch.session(&session_id).await.unwrap().turns.len(), 5);

    // The audited phase history replays without an illegal transition.
    let transitions = orch.store().phase_transitions(&session_id).unwrap();
    assert_eq!(transitions.len(), 4);
    assert_eq!(transitions.last().unwrap().1, active(WorkflowPhase::Done));
}

#[tokio::test]
async fn done_is_left_only_through_a_revision_replay() {
    let orch = drafting_orchestrator().await;
    let session_id = orch
        .initialize(UserId::from("u1"), None, Some(&cell_biology()))
        .await
        .unwrap();
    for message in [
        "Define objectives for cell biology",
        "Propose a structure",
        "Draft the assessment",
        "Finalize the assessment",
    ] {
        send(&orch, &session_id, message).await;
    }
    assert!(orch.session(&session_id).await.unwrap().phase.is_done());

    let response = orch
        .review(
            &session_id,
            ProtocolMessage::RevisionRequest(RevisionRequest {
                reason: GuardrailReason::new("reviewer", "rework the final quiz"),
                turn: TurnRef {
                    session_id: session_id.clone(),
                    turn_index: 3,
                },
            }),
        )
        .await
        .unwrap();
    assert_eq!(
        response.phase,
        SessionPhase::RevisionRequested {
            resume: WorkflowPhase::DraftReady
        }
    );

    // The replayed revision pins the assessment agent again.
    let retry = send(&orch, &session_id, "tighten the rubric").await;
    assert_eq!(retry.current_agent_id, AgentId::Assessment);
    assert_eq!(retry.phase, active(WorkflowPhase::Done));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn overlapping_turns_on_one_session_are_serialized() {
    // An invoker that parks until released, so the first turn holds the
    // session lock while the second arrives.
    struct GatedInvoker {
        gate: Arc<tokio::sync::Notify>,
    }

    #[async_trait::async_trait]
    impl AgentInvoker for GatedInvoker {
        fn name(&self) -> &str {
            "gated"
        }

        async fn invoke(
            &self,
            _agent: AgentId,
            _payload: &ContextPayload,
        ) -> Result<AgentReply, AgentError> {
            self.gate.notified().await;
            Ok(AgentReply::text_only("done waiting"))
        }
    }

    let gate = Arc::new(tokio::sync::Notify::new());
    let orch = Arc::new(
        Orchestrator::new(
            SessionStore::new(),
            MemoryIndex::in_memory(),
            Arc::new(CourseCatalog::new()),
            Arc::new(GatedInvoker { gate: gate.clone() }),
        )
        .with_invoke_timeout(Duration::from_secs(5)),
    );
    let session_id = orch
        .initialize(UserId::from("u1"), None, None)
        .await
        .unwrap();

    let first = tokio::spawn({
        let orch = orch.clone();
        let session_id = session_id.clone();
        async move { orch.handle_turn(turn(&session_id, "first")).await }
    });
    // Give the first turn time to take the session lock.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = orch.handle_turn(turn(&session_id, "second")).await;
    assert!(matches!(
        second.unwrap_err(),
        Error::State(StateError::LockTimeout { .. })
    ));

    gate.notify_one();
    first.await.unwrap().unwrap();

    // Exactly the serialized turn reached the history.
    let session = orch.session(&session_id).await.unwrap();
    assert_eq!(session.turns.len(), 1);
    assert_eq!(session.turns[0].user_message, "first");
}
