//! Deterministic specialist drafting agents.
//!
//! `DraftingInvoker` implements the invocation port with template-based
//! content generation: objectives spanning the taxonomy, a module-per-
//! objective syllabus, assessments tied to objectives, and resource
//! suggestions. A remote language model is a drop-in replacement behind the
//! same `AgentInvoker` trait; nothing above this layer can tell the
//! difference.

use async_trait::async_trait;
use coursecraft_core::artifact::{
    AnswerOption, Artifact, Assessment, AssessmentItem, BloomLevel, CourseStructure, ItemKind,
    LearningObjective, ModuleOutline, ResourceSuggestion,
};
use coursecraft_core::context::ContextPayload;
use coursecraft_core::error::AgentError;
use coursecraft_core::invoke::{AgentId, AgentInvoker, AgentReply, UiUpdate};
use coursecraft_core::state::StateValue;
use std::collections::BTreeMap;
use tracing::debug;

/// Session-state key under which approved objectives are kept for the
/// downstream syllabus and assessment agents.
pub const OBJECTIVES_STATE_KEY: &str = "objectives";

/// Verb bank per taxonomy level, lowest cognitive demand first.
const BLOOM_VERBS: [(BloomLevel, [&str; 5]); 6] = [
    (BloomLevel::Remembering, ["Recall", "Define", "List", "Identify", "Name"]),
    (BloomLevel::Understanding, ["Explain", "Describe", "Discuss", "Interpret", "Summarize"]),
    (BloomLevel::Application, ["Apply", "Implement", "Use", "Demonstrate", "Illustrate"]),
    (BloomLevel::Analysis, ["Analyze", "Examine", "Differentiate", "Categorize", "Compare"]),
    (BloomLevel::Evaluation, ["Evaluate", "Assess", "Critique", "Judge", "Justify"]),
    (BloomLevel::Creation, ["Create", "Design", "Develop", "Formulate", "Propose"]),
];

const RESOURCE_KINDS: [&str; 3] = ["article", "video", "book"];

/// Encode objectives for a scoped state entry.
pub fn objectives_to_state(objectives: &[LearningObjective]) -> StateValue {
    StateValue::from_json(
        serde_json::to_value(objectives).unwrap_or(serde_json::Value::Null),
    )
}

/// Decode objectives from a scoped state entry, if present and well-formed.
pub fn objectives_from_state(
    state: &BTreeMap<String, StateValue>,
) -> Option<Vec<LearningObjective>> {
    let value = state.get(OBJECTIVES_STATE_KEY)?;
    serde_json::from_value(value.to_json()).ok()
}

/// The deterministic drafting invoker.
pub struct DraftingInvoker {
    /// Course length used when structuring a syllabus.
    weeks: u32,
    /// How many objectives to draft.
    objective_count: usize,
}

impl Default for DraftingInvoker {
    fn default() -> Self {
        Self {
            weeks: 12,
            objective_count: 5,
        }
    }
}

impl DraftingInvoker {
    pub fn new(weeks: u32, objective_count: usize) -> Self {
        Self {
            weeks,
            objective_count,
        }
    }

    /// The subject the draft is about: the course when known, otherwise the
    /// trailing "... for <topic>" of the message, otherwise the message.
    fn topic(payload: &ContextPayload) -> String {
        if let Some(line) = payload
            .course_lines
            .iter()
            .find_map(|l| l.strip_prefix("Course_Name: "))
        {
            return line.to_string();
        }
        if let Some((_, after)) = payload.message.rsplit_once(" for ") {
            let topic = after.trim().trim_end_matches(['.', '!', '?']);
            if !topic.is_empty() {
                return topic.to_string();
            }
        }
        let message = payload.message.trim();
        if message.is_empty() {
            "your course".to_string()
        } else {
            message.to_string()
        }
    }

    /// Objectives already captured this session, or a fresh draft.
    fn objectives_for(&self, payload: &ContextPayload, topic: &str) -> Vec<LearningObjective> {
        objectives_from_state(&payload.state)
            .filter(|o| !o.is_empty())
            .unwrap_or_else(|| self.draft_objectives(topic))
    }

    fn draft_objectives(&self, topic: &str) -> Vec<LearningObjective> {
        BLOOM_VERBS
            .iter()
            .take(self.objective_count)
            .enumerate()
            .map(|(i, (level, verbs))| {
                LearningObjective::new(
                    format!(
                        "{} the key concepts and principles of {topic}",
                        verbs[i % verbs.len()]
                    ),
                    *level,
                )
            })
            .collect()
    }

    fn objectives_reply(&self, payload: &ContextPayload) -> AgentReply {
        let topic = Self::topic(payload);
        let objectives = self.draft_objectives(&topic);

        let mut text = format!(
            "I have drafted {} learning objectives for {topic}:\n",
            objectives.len()
        );
        for objective in &objectives {
            let level = objective
                .level
                .map(|l| l.as_str())
                .unwrap_or("untagged");
            text.push_str(&format!("- {} ({level})\n", objective.text));
        }
        text.push_str("\nShall I propose a course structure around these?");

        let mut task_parameters = serde_json::Map::new();
        task_parameters.insert(
            "learningObjectives".into(),
            serde_json::Value::String(
                objectives
                    .iter()
                    .map(|o| o.text.clone())
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
        );

        AgentReply {
            text,
            artifact: Some(Artifact::Objectives(objectives)),
            ui: Some(UiUpdate {
                task_parameters,
                generated_assessment: None,
            }),
        }
    }

    fn syllabus_reply(&self, payload: &ContextPayload) -> AgentReply {
        let topic = Self::topic(payload);
        let objectives = self.objectives_for(payload, &topic);
        let module_count = objectives.len().min(self.weeks as usize).max(1);

        let modules: Vec<ModuleOutline> = objectives
            .iter()
            .take(module_count)
            .enumerate()
            .map(|(i, objective)| {
                let activities = match objective.level {
                    Some(BloomLevel::Remembering) | Some(BloomLevel::Understanding) => {
                        vec!["Lecture and discussion".to_string()]
                    }
                    Some(BloomLevel::Application) | Some(BloomLevel::Analysis) => {
                        vec!["Case study and group work".to_string()]
                    }
                    _ => vec!["Project work and presentations".to_string()],
                };
                ModuleOutline {
                    week: i as u32 + 1,
                    title: format!("Module {}", i + 1),
                    focus_objective: objective.text.clone(),
                    activities,
                    assessment: Some(if i + 1 == module_count {
                        "Final Project".to_string()
                    } else {
                        "Quiz".to_string()
                    }),
                }
            })
            .collect();

        let text = format!(
            "Here is a proposed structure for {topic}: {} modules across {} weeks, \
             each built around one objective. Review it and we can move on to drafting \
             the assessment.",
            modules.len(),
            self.weeks
        );

        let mut task_parameters = serde_json::Map::new();
        task_parameters.insert(
            "outputType".into(),
            serde_json::Value::String("syllabus".into()),
        );

        AgentReply {
            text,
            artifact: Some(Artifact::Syllabus(CourseStructure { modules })),
            ui: Some(UiUpdate {
                task_parameters,
                generated_assessment: None,
            }),
        }
    }

    fn assessment_reply(&self, payload: &ContextPayload) -> AgentReply {
        let topic = Self::topic(payload);
        let objectives = self.objectives_for(payload, &topic);
        let kinds = [ItemKind::MultipleChoice, ItemKind::OpenEnded, ItemKind::CaseStudy];

        let items: Vec<AssessmentItem> = objectives
            .iter()
            .enumerate()
            .map(|(i, objective)| {
                let kind = kinds[i % kinds.len()];
                let level = objective.level.unwrap_or(BloomLevel::Understanding);
                let mut item = AssessmentItem {
                    question: format!("Question about '{}' ({} level)", objective.text, level),
                    objective: objective.text.clone(),
                    level,
                    kind,
                    options: vec![],
                    correct_answer: None,
                    rubric: None,
                };
                match kind {
                    ItemKind::MultipleChoice => {
                        item.options = ["A", "B", "C", "D"]
                            .iter()
                            .map(|id| AnswerOption {
                                id: id.to_string(),
                                text: format!("Option {id}"),
                            })
                            .collect();
                        item.correct_answer = Some("A".into());
                    }
                    ItemKind::OpenEnded => {
                        item.rubric =
                            Some("Criteria for evaluating a complete response".into());
                    }
                    ItemKind::CaseStudy => {
                        item.rubric = Some(
                            "Assess the analysis against the focus objective".into(),
                        );
                    }
                }
                item
            })
            .collect();

        let assessment = Assessment {
            title: format!("Quiz for {topic}"),
            items,
        };
        let generated = serde_json::to_value(&assessment).ok();

        let text = format!(
            "The assessment has been generated: {} items covering {} objectives for {topic}.",
            assessment.items.len(),
            objectives.len()
        );

        let mut task_parameters = serde_json::Map::new();
        task_parameters.insert(
            "bloomsLevel".into(),
            serde_json::Value::String(
                objectives
                    .iter()
                    .filter_map(|o| o.level.map(|l| l.as_str().to_string()))
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
        );

        AgentReply {
            text,
            artifact: Some(Artifact::Assessment(assessment)),
            ui: Some(UiUpdate {
                task_parameters,
                generated_assessment: generated,
            }),
        }
    }

    fn resources_reply(&self, payload: &ContextPayload) -> AgentReply {
        let topic = Self::topic(payload);
        let lower = payload.message.to_lowercase();
        let mut kinds: Vec<&str> = RESOURCE_KINDS
            .iter()
            .copied()
            .filter(|k| lower.contains(k))
            .collect();
        if kinds.is_empty() {
            kinds = RESOURCE_KINDS.to_vec();
        }

        let resources: Vec<ResourceSuggestion> = kinds
            .iter()
            .map(|kind| ResourceSuggestion {
                title: format!(
                    "{}{} resource for {topic}",
                    kind[..1].to_uppercase(),
                    &kind[1..]
                ),
                kind: kind.to_string(),
                description: format!("A {kind} about {topic}"),
            })
            .collect();

        let text = format!(
            "Here are {} suggested resources for {topic}, mixing media types for accessibility.",
            resources.len()
        );

        AgentReply {
            text,
            artifact: Some(Artifact::Resources(resources)),
            ui: None,
        }
    }

    fn generic_reply(&self, payload: &ContextPayload) -> AgentReply {
        let topic = Self::topic(payload);
        AgentReply::text_only(format!(
            "I can help you plan {topic}: drafting learning objectives, structuring a \
             syllabus, generating aligned assessments, or recommending resources. \
             What would you like to start with?"
        ))
    }
}

#[async_trait]
impl AgentInvoker for DraftingInvoker {
    fn name(&self) -> &str {
        "drafting"
    }

    async fn invoke(
        &self,
        agent: AgentId,
        payload: &ContextPayload,
    ) -> Result<AgentReply, AgentError> {
        debug!(agent = %agent, session_id = %payload.session_id, "Drafting invocation");
        Ok(match agent {
            AgentId::Objectives => self.objectives_reply(payload),
            AgentId::Syllabus => self.syllabus_reply(payload),
            AgentId::Assessment => self.assessment_reply(payload),
            AgentId::Resources => self.resources_reply(payload),
            AgentId::Generic => self.generic_reply(payload),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursecraft_core::phase::SessionPhase;
    use coursecraft_core::session::{SessionId, UserId};

    fn payload(message: &str) -> ContextPayload {
        ContextPayload {
            session_id: SessionId::from("s1"),
            user_id: UserId::from("u1"),
            message: message.into(),
            phase: SessionPhase::start(),
            state: BTreeMap::new(),
            recent_turns: vec![],
            memory: vec![],
            course_lines: vec![],
            course_details: None,
            course_known: false,
            guardrail_feedback: None,
        }
    }

    #[tokio::test]
    async fn objectives_span_the_taxonomy() {
        let invoker = DraftingInvoker::default();
        let reply = invoker
            .invoke(AgentId::Objectives, &payload("Define objectives for cell biology"))
            .await
            .unwrap();

        let Some(Artifact::Objectives(objectives)) = reply.artifact else {
            panic!("expected objectives artifact");
        };
        assert_eq!(objectives.len(), 5);
        assert!(objectives.iter().all(|o| o.level.is_some()));
        let distinct: std::collections::HashSet<_> =
            objectives.iter().filter_map(|o| o.level).collect();
        assert!(distinct.len() >= 4);
        assert!(objectives[0].text.contains("cell biology"));
        assert!(reply.text.contains("Remembering"));
    }

    #[tokio::test]
    async fn topic_prefers_the_known_course() {
        let mut p = payload("Define objectives for something else");
        p.course_lines = vec![
            "Course_ID: c1".into(),
            "Course_Name: Cell Biology".into(),
        ];
        p.course_known = true;

        let reply = DraftingInvoker::default()
            .invoke(AgentId::Objectives, &p)
            .await
            .unwrap();
        assert!(reply.text.contains("Cell Biology"));
    }

    #[tokio::test]
    async fn syllabus_builds_one_module_per_objective() {
        let mut p = payload("structure please");
        let objectives = DraftingInvoker::default().draft_objectives("cell biology");
        p.state.insert(
            OBJECTIVES_STATE_KEY.into(),
            objectives_to_state(&objectives),
        );

        let reply = DraftingInvoker::default()
            .invoke(AgentId::Syllabus, &p)
            .await
            .unwrap();
        let Some(Artifact::Syllabus(structure)) = reply.artifact else {
            panic!("expected syllabus artifact");
        };
        assert_eq!(structure.modules.len(), objectives.len());
        assert_eq!(structure.modules[0].week, 1);
        assert_eq!(structure.modules[0].focus_objective, objectives[0].text);
        assert_eq!(
            structure.modules.last().unwrap().assessment.as_deref(),
            Some("Final Project")
        );
        // Lower levels get lecture-style activities.
        assert_eq!(structure.modules[0].activities, vec!["Lecture and discussion"]);
    }

    #[tokio::test]
    async fn assessment_items_reference_objectives() {
        let reply = DraftingInvoker::default()
            .invoke(AgentId::Assessment, &payload("quiz for cell biology"))
            .await
            .unwrap();
        let Some(Artifact::Assessment(assessment)) = reply.artifact else {
            panic!("expected assessment artifact");
        };
        assert!(!assessment.items.is_empty());
        assert!(assessment.items.iter().all(|i| !i.objective.is_empty()));

        // Kinds rotate, and MCQs carry options with a keyed answer.
        assert_eq!(assessment.items[0].kind, ItemKind::MultipleChoice);
        assert_eq!(assessment.items[0].options.len(), 4);
        assert_eq!(assessment.items[0].correct_answer.as_deref(), Some("A"));
        assert_eq!(assessment.items[1].kind, ItemKind::OpenEnded);
        assert!(assessment.items[1].rubric.is_some());

        // The UI payload mirrors the generated assessment.
        let ui = reply.ui.unwrap();
        assert!(ui.generated_assessment.is_some());
    }

    #[tokio::test]
    async fn resources_honor_requested_kinds() {
        let reply = DraftingInvoker::default()
            .invoke(AgentId::Resources, &payload("a video for cell biology"))
            .await
            .unwrap();
        let Some(Artifact::Resources(resources)) = reply.artifact else {
            panic!("expected resources artifact");
        };
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].kind, "video");
        assert!(resources[0].title.contains("cell biology"));

        // No kind named: all defaults.
        let reply = DraftingInvoker::default()
            .invoke(AgentId::Resources, &payload("resources for cell biology"))
            .await
            .unwrap();
        let Some(Artifact::Resources(resources)) = reply.artifact else {
            panic!("expected resources artifact");
        };
        assert_eq!(resources.len(), 3);
    }

    #[tokio::test]
    async fn generic_reply_has_no_artifact() {
        let reply = DraftingInvoker::default()
            .invoke(AgentId::Generic, &payload("hello"))
            .await
            .unwrap();
        assert!(reply.artifact.is_none());
        assert!(reply.text.contains("learning objectives"));
    }

    #[test]
    fn objectives_state_roundtrip() {
        let objectives = DraftingInvoker::default().draft_objectives("cell biology");
        let mut state = BTreeMap::new();
        state.insert(OBJECTIVES_STATE_KEY.into(), objectives_to_state(&objectives));
        assert_eq!(objectives_from_state(&state), Some(objectives));
    }
}
