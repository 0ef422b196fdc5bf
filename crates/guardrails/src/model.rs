//! Rule data model — the types that define artifact checks.

use coursecraft_core::artifact::Artifact;
use serde::{Deserialize, Serialize};

/// A set of rules, built in code or loaded from configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    /// All rules in the set.
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load rules from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, crate::GuardrailError> {
        let set: RuleSet = toml::from_str(toml_str)?;
        set.validate()?;
        Ok(set)
    }

    /// The rules shipped by default: taxonomy tagging and coverage for
    /// objectives, objective references for assessments, non-empty
    /// structure for syllabi.
    pub fn builtin() -> Self {
        let mut set = Self::new();
        set.add(Rule {
            id: "objectives-tagged".into(),
            description: "Every objective must cite a recognized taxonomy level".into(),
            applies_to: AppliesTo::Objectives,
            kind: RuleKind::ObjectivesTagged,
            enabled: true,
            priority: 10,
        });
        set.add(Rule {
            id: "min-objectives".into(),
            description: "An objectives draft needs a workable minimum".into(),
            applies_to: AppliesTo::Objectives,
            kind: RuleKind::MinObjectives { count: 3 },
            enabled: true,
            priority: 5,
        });
        set.add(Rule {
            id: "bloom-coverage".into(),
            description: "Objectives should span the taxonomy, not cluster in one level".into(),
            applies_to: AppliesTo::Objectives,
            kind: RuleKind::BloomCoverage { min_levels: 4 },
            enabled: true,
            priority: 0,
        });
        set.add(Rule {
            id: "items-reference-objectives".into(),
            description: "Every assessment item must reference a learning objective".into(),
            applies_to: AppliesTo::Assessment,
            kind: RuleKind::ItemsReferenceObjectives,
            enabled: true,
            priority: 0,
        });
        set.add(Rule {
            id: "non-empty-structure".into(),
            description: "A syllabus proposal needs at least one module".into(),
            applies_to: AppliesTo::Syllabus,
            kind: RuleKind::NonEmptyStructure,
            enabled: true,
            priority: 0,
        });
        set
    }

    pub fn add(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Remove a rule by id. Returns `true` if found.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.id != id);
        self.rules.len() < before
    }

    pub fn validate(&self) -> Result<(), crate::GuardrailError> {
        for rule in &self.rules {
            rule.validate()?;
        }
        Ok(())
    }

    /// Enabled rules applying to the given artifact, highest priority first
    /// (ties broken by insertion order).
    pub fn matching(&self, artifact: &Artifact) -> Vec<&Rule> {
        let mut matches: Vec<&Rule> = self
            .rules
            .iter()
            .filter(|r| r.enabled && r.applies_to.matches(artifact))
            .collect();
        matches.sort_by_key(|r| std::cmp::Reverse(r.priority));
        matches
    }

    pub fn active_count(&self) -> usize {
        self.rules.iter().filter(|r| r.enabled).count()
    }
}

/// A single validation rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Unique id, referenced by rejection reasons.
    pub id: String,

    #[serde(default)]
    pub description: String,

    /// Which artifact kind this rule inspects.
    pub applies_to: AppliesTo,

    /// The check itself.
    #[serde(flatten)]
    pub kind: RuleKind,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Higher priority = evaluated first. Ties broken by insertion order.
    #[serde(default)]
    pub priority: i32,
}

fn default_true() -> bool {
    true
}

impl Rule {
    pub fn validate(&self) -> Result<(), crate::GuardrailError> {
        if self.id.is_empty() {
            return Err(crate::GuardrailError::InvalidRule {
                id: "(empty)".into(),
                reason: "rule id cannot be empty".into(),
            });
        }
        if let RuleKind::MinObjectives { count } = &self.kind {
            if *count == 0 {
                return Err(crate::GuardrailError::InvalidRule {
                    id: self.id.clone(),
                    reason: "min_objectives count cannot be zero".into(),
                });
            }
        }
        if let RuleKind::BloomCoverage { min_levels } = &self.kind {
            if *min_levels == 0 || *min_levels > 6 {
                return Err(crate::GuardrailError::InvalidRule {
                    id: self.id.clone(),
                    reason: "bloom_coverage min_levels must be 1..=6".into(),
                });
            }
        }
        Ok(())
    }
}

/// The artifact kinds a rule can apply to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppliesTo {
    Objectives,
    Syllabus,
    Assessment,
    Resources,
    Any,
}

impl AppliesTo {
    pub fn matches(&self, artifact: &Artifact) -> bool {
        match (self, artifact) {
            (AppliesTo::Any, _) => true,
            (AppliesTo::Objectives, Artifact::Objectives(_)) => true,
            (AppliesTo::Syllabus, Artifact::Syllabus(_)) => true,
            (AppliesTo::Assessment, Artifact::Assessment(_)) => true,
            (AppliesTo::Resources, Artifact::Resources(_)) => true,
            _ => false,
        }
    }
}

/// The closed set of checks.
///
/// Declarative by construction: a rule file selects a check and its
/// parameters, nothing more.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum RuleKind {
    /// Every objective carries a recognized taxonomy level.
    ObjectivesTagged,
    /// At least `count` objectives.
    MinObjectives { count: usize },
    /// Objectives span at least `min_levels` distinct taxonomy levels.
    BloomCoverage { min_levels: usize },
    /// Every assessment item references a learning objective.
    ItemsReferenceObjectives,
    /// A syllabus has at least one module.
    NonEmptyStructure,
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursecraft_core::artifact::{BloomLevel, CourseStructure, LearningObjective};

    #[test]
    fn builtin_rules_are_valid() {
        let set = RuleSet::builtin();
        assert!(set.validate().is_ok());
        assert_eq!(set.active_count(), 5);
    }

    #[test]
    fn rule_set_from_toml() {
        let toml = r#"
[[rules]]
id = "objectives-tagged"
description = "Objectives must cite a taxonomy level"
applies_to = "objectives"
check = "objectives_tagged"

[[rules]]
id = "min-objectives"
applies_to = "objectives"
check = "min_objectives"
count = 4
priority = 5

[[rules]]
id = "coverage"
applies_to = "objectives"
check = "bloom_coverage"
min_levels = 3
enabled = false
"#;
        let set = RuleSet::from_toml(toml).unwrap();
        assert_eq!(set.rules.len(), 3);
        assert_eq!(set.active_count(), 2);
        assert_eq!(set.rules[1].kind, RuleKind::MinObjectives { count: 4 });
        assert!(!set.rules[2].enabled);
    }

    #[test]
    fn invalid_rules_rejected() {
        let toml = r#"
[[rules]]
id = ""
applies_to = "objectives"
check = "objectives_tagged"
"#;
        assert!(RuleSet::from_toml(toml).is_err());

        let toml = r#"
[[rules]]
id = "bad-coverage"
applies_to = "objectives"
check = "bloom_coverage"
min_levels = 7
"#;
        assert!(RuleSet::from_toml(toml).is_err());
    }

    #[test]
    fn matching_filters_and_orders_by_priority() {
        let set = RuleSet::builtin();
        let objectives = Artifact::Objectives(vec![LearningObjective::new(
            "Explain mitosis",
            BloomLevel::Understanding,
        )]);
        let matches = set.matching(&objectives);
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].id, "objectives-tagged");
        assert_eq!(matches[1].id, "min-objectives");

        let syllabus = Artifact::Syllabus(CourseStructure::default());
        let matches = set.matching(&syllabus);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "non-empty-structure");
    }

    #[test]
    fn remove_rule() {
        let mut set = RuleSet::builtin();
        assert!(set.remove("bloom-coverage"));
        assert!(!set.remove("bloom-coverage"));
        assert_eq!(set.active_count(), 4);
    }
}
