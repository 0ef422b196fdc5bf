//! Memory records — immutable long-term facts about users and courses.
//!
//! Records are write-once: an update appends a new record rather than
//! mutating in place, so history stays reconstructable. The backend trait
//! deliberately has no update or delete surface.

use crate::course::{Course, UserProfile};
use crate::error::MemoryError;
use crate::session::UserId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a memory record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    UserProfile,
    CourseSnapshot,
}

impl MemoryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MemoryKind::UserProfile => "user_profile",
            MemoryKind::CourseSnapshot => "course_snapshot",
        }
    }
}

/// An immutable, searchable long-term fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique record id.
    pub id: String,

    pub kind: MemoryKind,

    /// The owning user.
    pub user_id: UserId,

    /// Free-text searchable content.
    pub content: String,

    /// The canonical object this record was derived from, kept verbatim.
    #[serde(default)]
    pub metadata: serde_json::Value,

    pub created_at: DateTime<Utc>,
}

impl MemoryRecord {
    pub fn new(
        kind: MemoryKind,
        user_id: UserId,
        content: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            user_id,
            content: content.into(),
            metadata,
            created_at: Utc::now(),
        }
    }

    /// Build the searchable snapshot of a user profile.
    pub fn user_profile(profile: &UserProfile) -> Self {
        let content = format!(
            "User profile: {} ({}). Preferences: {}",
            profile.name,
            profile.email,
            if profile.preferences.is_empty() {
                "none".to_string()
            } else {
                serde_json::Value::Object(profile.preferences.clone()).to_string()
            }
        );
        let metadata = serde_json::to_value(profile).unwrap_or(serde_json::Value::Null);
        Self::new(MemoryKind::UserProfile, profile.user_id.clone(), content, metadata)
    }

    /// Build the searchable snapshot of a course for a user.
    pub fn course_snapshot(user_id: &UserId, course: &Course) -> Self {
        let mut content = format!(
            "Course: {} ({}). Level: {}. {}",
            course.title, course.id, course.level, course.description
        );
        if let Some(instructor) = &course.instructor {
            content.push_str(&format!(" Instructor: {instructor}."));
        }
        let metadata = serde_json::to_value(course).unwrap_or(serde_json::Value::Null);
        Self::new(MemoryKind::CourseSnapshot, user_id.clone(), content, metadata)
    }
}

/// A query against the memory index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryQuery {
    /// Only records owned by this user are searched.
    pub user_id: UserId,

    /// Keyword text to score against `content`.
    pub text: String,

    /// Maximum number of results.
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    5
}

impl MemoryQuery {
    pub fn new(user_id: UserId, text: impl Into<String>) -> Self {
        Self {
            user_id,
            text: text.into(),
            limit: default_limit(),
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// A record with its relevance score for one query.
///
/// The score lives outside the record so that search never mutates what is
/// stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub record: MemoryRecord,
    pub score: f32,
}

/// The memory persistence port.
///
/// Implementations: in-memory (bundled), or an external append-only store.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// The backend name (e.g., "in_memory").
    fn name(&self) -> &str;

    /// Append a record. Returns the record id.
    async fn add(&self, record: MemoryRecord) -> std::result::Result<String, MemoryError>;

    /// Search records for a user, ordered by relevance then recency.
    async fn search(
        &self,
        query: &MemoryQuery,
    ) -> std::result::Result<Vec<ScoredRecord>, MemoryError>;

    /// Fetch a record by id.
    async fn get(&self, id: &str) -> std::result::Result<Option<MemoryRecord>, MemoryError>;

    /// Total record count.
    async fn count(&self) -> std::result::Result<usize, MemoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_profile_snapshot_content() {
        let profile = UserProfile {
            user_id: UserId::from("u1"),
            name: "Dr. Smith".into(),
            email: "smith@example.edu".into(),
            preferences: serde_json::Map::new(),
        };
        let record = MemoryRecord::user_profile(&profile);
        assert_eq!(record.kind, MemoryKind::UserProfile);
        assert_eq!(record.user_id, UserId::from("u1"));
        assert!(record.content.contains("Dr. Smith"));
        assert!(record.content.contains("smith@example.edu"));
        assert_eq!(record.metadata["name"], "Dr. Smith");
    }

    #[test]
    fn course_snapshot_content() {
        let mut course = crate::course::Course::new(
            "c1",
            "Cell Biology",
            "Introductory cell biology",
            "CEGEP",
        );
        course.instructor = Some("Dr. Smith".into());
        let record = MemoryRecord::course_snapshot(&UserId::from("u1"), &course);
        assert_eq!(record.kind, MemoryKind::CourseSnapshot);
        assert!(record.content.contains("Cell Biology"));
        assert!(record.content.contains("Instructor: Dr. Smith"));
        assert_eq!(record.metadata["title"], "Cell Biology");
    }

    #[test]
    fn query_defaults() {
        let query = MemoryQuery::new(UserId::from("u1"), "cell biology");
        assert_eq!(query.limit, 5);
        assert_eq!(query.with_limit(10).limit, 10);
    }
}
