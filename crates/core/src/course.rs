//! Course and user-profile models, plus the external data provider port.
//!
//! The relational store behind these types is an external collaborator.
//! The core only ever reads through `CourseProvider`, and a missing course
//! is an `Option::None` outcome, never a crash.

use crate::error::CourseError;
use crate::session::{CourseId, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A course as stored by the external data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub description: String,
    /// Academic level (e.g. "Beginner", "CEGEP").
    pub level: String,
    /// Term label (e.g. "Fall 2024").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
    /// Structured course details kept verbatim (objectives, modules,
    /// assessment methods as maintained in the external store).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Course {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        level: impl Into<String>,
    ) -> Self {
        Self {
            id: CourseId(id.into()),
            title: title.into(),
            description: description.into(),
            level: level.into(),
            term: None,
            instructor: None,
            details: None,
        }
    }
}

/// A teacher's profile as supplied by the frontend or the data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub preferences: serde_json::Map<String, serde_json::Value>,
}

/// Synchronous-read port onto the external course/user store.
#[async_trait]
pub trait CourseProvider: Send + Sync {
    /// Look up a course by id. `None` if it does not exist.
    async fn course(&self, id: &CourseId) -> std::result::Result<Option<Course>, CourseError>;

    /// All courses belonging to a user. Empty if none.
    async fn courses_for_user(
        &self,
        user: &UserId,
    ) -> std::result::Result<Vec<Course>, CourseError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_optional_fields_skipped() {
        let course = Course::new("c1", "Cell Biology", "Introductory cell biology", "CEGEP");
        let json = serde_json::to_string(&course).unwrap();
        assert!(!json.contains("term"));
        assert!(!json.contains("instructor"));
        assert!(!json.contains("details"));
    }

    #[test]
    fn course_roundtrip_with_details() {
        let mut course = Course::new("c1", "Cell Biology", "Intro", "CEGEP");
        course.details = Some(serde_json::json!({
            "modules": [{"name": "Organelles", "duration": "2 weeks"}],
        }));
        let json = serde_json::to_string(&course).unwrap();
        let back: Course = serde_json::from_str(&json).unwrap();
        assert_eq!(back, course);
    }
}
