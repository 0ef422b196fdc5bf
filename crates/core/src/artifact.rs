//! Drafted course artifacts and the cognitive taxonomy.
//!
//! An `Artifact` is what a specialist agent proposes for review: a set of
//! learning objectives, a syllabus outline, an assessment, or resource
//! suggestions. Artifacts flow through the proposal/approval loop and are
//! what the guardrail rules inspect.

use serde::{Deserialize, Serialize};

/// The six recognized cognitive levels of Bloom's taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BloomLevel {
    Remembering,
    Understanding,
    Application,
    Analysis,
    Evaluation,
    Creation,
}

impl BloomLevel {
    /// All levels, lowest cognitive demand first.
    pub const ALL: [BloomLevel; 6] = [
        BloomLevel::Remembering,
        BloomLevel::Understanding,
        BloomLevel::Application,
        BloomLevel::Analysis,
        BloomLevel::Evaluation,
        BloomLevel::Creation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BloomLevel::Remembering => "Remembering",
            BloomLevel::Understanding => "Understanding",
            BloomLevel::Application => "Application",
            BloomLevel::Analysis => "Analysis",
            BloomLevel::Evaluation => "Evaluation",
            BloomLevel::Creation => "Creation",
        }
    }

    /// Parse a level name or its verb form ("apply" → `Application`).
    /// Case-insensitive. Returns `None` for unrecognized labels.
    pub fn recognize(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "remembering" | "remember" | "recall" => Some(BloomLevel::Remembering),
            "understanding" | "understand" => Some(BloomLevel::Understanding),
            "application" | "apply" => Some(BloomLevel::Application),
            "analysis" | "analyze" | "analyse" => Some(BloomLevel::Analysis),
            "evaluation" | "evaluate" => Some(BloomLevel::Evaluation),
            "creation" | "create" => Some(BloomLevel::Creation),
            _ => None,
        }
    }
}

impl std::fmt::Display for BloomLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A learning objective, ideally tagged with its cognitive level.
///
/// The tag is optional at the type level because agents draft objectives in
/// free form; the guardrail layer is what insists on a recognized level
/// before an objectives artifact can advance the workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningObjective {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<BloomLevel>,
}

impl LearningObjective {
    pub fn new(text: impl Into<String>, level: BloomLevel) -> Self {
        Self {
            text: text.into(),
            level: Some(level),
        }
    }

    /// An objective with no taxonomy tag (the guardrail layer rejects these).
    pub fn untagged(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            level: None,
        }
    }
}

/// One module of a proposed course structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleOutline {
    /// 1-based week number.
    pub week: u32,
    pub title: String,
    /// The objective this module is built around.
    pub focus_objective: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub activities: Vec<String>,
    /// Short note on how the module is assessed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment: Option<String>,
}

/// A proposed syllabus outline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseStructure {
    pub modules: Vec<ModuleOutline>,
}

/// The kind of assessment item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    #[serde(rename = "mcq")]
    MultipleChoice,
    #[serde(rename = "open_ended")]
    OpenEnded,
    #[serde(rename = "case_study")]
    CaseStudy,
}

/// An answer option for multiple-choice items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: String,
    pub text: String,
}

/// A single assessment item, tied to the objective it measures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentItem {
    pub question: String,
    /// The learning objective this item measures (empty = untied, which the
    /// guardrail layer rejects).
    pub objective: String,
    pub level: BloomLevel,
    pub kind: ItemKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<AnswerOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rubric: Option<String>,
}

/// A drafted assessment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub title: String,
    pub items: Vec<AssessmentItem>,
}

/// A recommended learning resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSuggestion {
    pub title: String,
    /// Media kind (article, video, book, ...).
    pub kind: String,
    pub description: String,
}

/// What a specialist agent proposes for review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Artifact {
    Objectives(Vec<LearningObjective>),
    Syllabus(CourseStructure),
    Assessment(Assessment),
    Resources(Vec<ResourceSuggestion>),
    Text(String),
}

impl Artifact {
    pub fn kind_str(&self) -> &'static str {
        match self {
            Artifact::Objectives(_) => "objectives",
            Artifact::Syllabus(_) => "syllabus",
            Artifact::Assessment(_) => "assessment",
            Artifact::Resources(_) => "resources",
            Artifact::Text(_) => "text",
        }
    }
}
