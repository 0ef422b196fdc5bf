//! Context assembly — builds the payload handed to every agent invocation.
//!
//! Assembly is a pure read: it works off a [`SessionSnapshot`] taken by the
//! store, queries the memory index, and resolves the course through the
//! provider port. It never writes anything, so assembling twice with no
//! intervening mutation yields identical payloads.
//!
//! An unresolvable course does not fail the turn: the payload carries an
//! explicit "course unknown" marker and assembly continues.

use coursecraft_core::context::{ContextPayload, MemoryExcerpt, GUARDRAIL_FEEDBACK_KEY};
use coursecraft_core::course::CourseProvider;
use coursecraft_core::memory::MemoryQuery;
use coursecraft_core::protocol::GuardrailReason;
use coursecraft_memory::MemoryIndex;
use coursecraft_store::SessionSnapshot;
use tracing::{debug, warn};

/// The stateless assembler. Create one and reuse it.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    /// How many trailing turns to include as short-term memory.
    recent_turns: usize,
    /// How many long-term memory excerpts to retrieve.
    recall_limit: usize,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self {
            recent_turns: 2,
            recall_limit: 5,
        }
    }
}

impl ContextAssembler {
    pub fn new(recent_turns: usize, recall_limit: usize) -> Self {
        Self {
            recent_turns,
            recall_limit,
        }
    }

    /// Assemble the payload for one turn.
    ///
    /// Steps, in order: session state from the snapshot, the last N turns,
    /// memory retrieval for the user (keyed to the course when known),
    /// course flattening with verbatim details, and any guardrail feedback
    /// left by the previous turn.
    pub async fn assemble(
        &self,
        snapshot: &SessionSnapshot,
        message: &str,
        memory: &MemoryIndex,
        courses: &dyn CourseProvider,
    ) -> ContextPayload {
        let session = &snapshot.session;

        // Course resolution degrades instead of failing.
        let mut course_lines = Vec::new();
        let mut course_details = None;
        let mut course_known = false;
        let mut course_title = None;

        if let Some(course_id) = &session.course_id {
            match courses.course(course_id).await {
                Ok(Some(course)) => {
                    course_lines.push(format!("Course_ID: {}", course.id));
                    course_lines.push(format!("Course_Name: {}", course.title));
                    course_lines.push(format!("Course_Description: {}", course.description));
                    course_lines.push(format!("Course_Level: {}", course.level));
                    if let Some(term) = &course.term {
                        course_lines.push(format!("Course_Session: {term}"));
                    }
                    if let Some(instructor) = &course.instructor {
                        course_lines.push(format!("Course_Instructor: {instructor}"));
                    }
                    course_details = course.details.clone();
                    course_title = Some(course.title.clone());
                    course_known = true;
                }
                Ok(None) => {
                    debug!(course_id = %course_id, "Course not found, assembling degraded context");
                }
                Err(err) => {
                    warn!(course_id = %course_id, error = %err, "Course provider failed, assembling degraded context");
                }
            }
        }

        // Long-term memory: key the query to the course when we know it,
        // otherwise fall back to the message itself.
        let query_text = course_title.unwrap_or_else(|| message.to_string());
        let query = MemoryQuery::new(session.user_id.clone(), query_text)
            .with_limit(self.recall_limit);
        let memory_excerpts = match memory.search(&query).await {
            Ok(results) => results
                .into_iter()
                .map(|scored| MemoryExcerpt {
                    kind: scored.record.kind,
                    content: scored.record.content,
                })
                .collect(),
            Err(err) => {
                warn!(error = %err, "Memory search failed, assembling without recall");
                Vec::new()
            }
        };

        let guardrail_feedback = session
            .state
            .get(GUARDRAIL_FEEDBACK_KEY)
            .and_then(GuardrailReason::from_state_value);

        ContextPayload {
            session_id: session.id.clone(),
            user_id: session.user_id.clone(),
            message: message.to_string(),
            phase: session.phase,
            state: session.state.clone(),
            recent_turns: session.recent_turns(self.recent_turns).to_vec(),
            memory: memory_excerpts,
            course_lines,
            course_details,
            course_known,
            guardrail_feedback,
        }
    }
}
