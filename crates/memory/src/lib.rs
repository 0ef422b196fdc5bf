//! Memory index for CourseCraft — cross-session recall of user profiles
//! and course snapshots.
//!
//! `MemoryIndex` wraps any [`MemoryBackend`] and enforces the record
//! invariants at the boundary: a record must carry an owner and content,
//! and once written it is never changed (updates append new records).

pub mod in_memory;

pub use in_memory::InMemoryBackend;

use coursecraft_core::course::{Course, UserProfile};
use coursecraft_core::error::MemoryError;
use coursecraft_core::memory::{MemoryBackend, MemoryQuery, MemoryRecord, ScoredRecord};
use coursecraft_core::session::{CourseId, UserId};
use std::sync::Arc;
use tracing::debug;

/// The write-once-append store with keyword search.
#[derive(Clone)]
pub struct MemoryIndex {
    backend: Arc<dyn MemoryBackend>,
}

impl MemoryIndex {
    pub fn new(backend: Arc<dyn MemoryBackend>) -> Self {
        Self { backend }
    }

    /// An index over the bundled in-memory backend.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBackend::new()))
    }

    /// Append a record after validating it.
    ///
    /// Fails with `InvalidRecord` when `user_id` or `content` is empty.
    pub async fn add(&self, record: MemoryRecord) -> Result<String, MemoryError> {
        if record.user_id.0.trim().is_empty() {
            return Err(MemoryError::InvalidRecord("missing user_id".into()));
        }
        if record.content.trim().is_empty() {
            return Err(MemoryError::InvalidRecord("missing content".into()));
        }
        debug!(kind = record.kind.as_str(), user_id = %record.user_id, "Adding memory record");
        self.backend.add(record).await
    }

    /// Record a snapshot of a user profile.
    pub async fn remember_user(&self, profile: &UserProfile) -> Result<String, MemoryError> {
        self.add(MemoryRecord::user_profile(profile)).await
    }

    /// Record a snapshot of a course for a user.
    pub async fn remember_course(
        &self,
        user_id: &UserId,
        course: &Course,
    ) -> Result<String, MemoryError> {
        self.add(MemoryRecord::course_snapshot(user_id, course)).await
    }

    /// Keyword search over a user's records, ordered by relevance then
    /// recency.
    pub async fn search(&self, query: &MemoryQuery) -> Result<Vec<ScoredRecord>, MemoryError> {
        self.backend.search(query).await
    }

    /// The most recent course snapshots known for a user, deduplicated by
    /// course id (newest wins).
    pub async fn courses_for_user(&self, user_id: &UserId) -> Result<Vec<Course>, MemoryError> {
        let query = MemoryQuery::new(user_id.clone(), "Course:").with_limit(50);
        let results = self.backend.search(&query).await?;

        let mut seen = std::collections::HashSet::new();
        let mut courses = Vec::new();
        for scored in results {
            let Ok(course) = serde_json::from_value::<Course>(scored.record.metadata.clone())
            else {
                continue;
            };
            if seen.insert(CourseId::from(&course.id.0)) {
                courses.push(course);
            }
        }
        Ok(courses)
    }

    pub async fn count(&self) -> Result<usize, MemoryError> {
        self.backend.count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursecraft_core::memory::MemoryKind;

    fn index() -> MemoryIndex {
        MemoryIndex::in_memory()
    }

    #[tokio::test]
    async fn rejects_record_without_user() {
        let err = index()
            .add(MemoryRecord::new(
                MemoryKind::CourseSnapshot,
                UserId::from(""),
                "content",
                serde_json::Value::Null,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::InvalidRecord(_)));
    }

    #[tokio::test]
    async fn rejects_record_without_content() {
        let err = index()
            .add(MemoryRecord::new(
                MemoryKind::UserProfile,
                UserId::from("u1"),
                "   ",
                serde_json::Value::Null,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::InvalidRecord(_)));
    }

    #[tokio::test]
    async fn course_snapshot_is_searchable() {
        let index = index();
        let course = Course::new("c1", "Cell Biology", "Introductory cell biology", "CEGEP");
        index
            .remember_course(&UserId::from("u1"), &course)
            .await
            .unwrap();

        let results = index
            .search(&MemoryQuery::new(UserId::from("u1"), "cell biology"))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);

        // The unrelated user sees nothing.
        let empty = index
            .search(&MemoryQuery::new(UserId::from("u2"), "cell biology"))
            .await
            .unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn updates_append_rather_than_mutate() {
        let index = index();
        let user = UserId::from("u1");
        let mut course = Course::new("c1", "Cell Biology", "v1", "CEGEP");
        let first_id = index.remember_course(&user, &course).await.unwrap();

        course.description = "v2".into();
        let second_id = index.remember_course(&user, &course).await.unwrap();

        assert_ne!(first_id, second_id);
        assert_eq!(index.count().await.unwrap(), 2);

        // The newest snapshot wins when deduplicating.
        let courses = index.courses_for_user(&user).await.unwrap();
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].description, "v2");
    }

    #[tokio::test]
    async fn courses_for_user_dedupes_by_id() {
        let index = index();
        let user = UserId::from("u1");
        index
            .remember_course(&user, &Course::new("c1", "Cell Biology", "Intro", "CEGEP"))
            .await
            .unwrap();
        index
            .remember_course(&user, &Course::new("c2", "Genetics", "Intro", "CEGEP"))
            .await
            .unwrap();

        let courses = index.courses_for_user(&user).await.unwrap();
        assert_eq!(courses.len(), 2);
    }
}
