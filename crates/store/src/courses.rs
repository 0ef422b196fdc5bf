//! In-memory course catalog — stands in for the external relational store.
//!
//! The real system reads courses from a relational database owned by the
//! web application. The orchestration layer only ever sees the
//! `CourseProvider` port, so this catalog is enough to run and test against.

use async_trait::async_trait;
use coursecraft_core::course::{Course, CourseProvider};
use coursecraft_core::error::CourseError;
use coursecraft_core::session::{CourseId, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct CourseCatalog {
    courses: Arc<RwLock<HashMap<String, Course>>>,
    owners: Arc<RwLock<HashMap<String, Vec<CourseId>>>>,
}

impl CourseCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a course, owned by `user`.
    pub async fn upsert(&self, user: &UserId, course: Course) {
        let id = course.id.clone();
        self.courses.write().await.insert(id.0.clone(), course);
        let mut owners = self.owners.write().await;
        let list = owners.entry(user.0.clone()).or_default();
        if !list.contains(&id) {
            list.push(id);
        }
    }
}

#[async_trait]
impl CourseProvider for CourseCatalog {
    async fn course(&self, id: &CourseId) -> Result<Option<Course>, CourseError> {
        Ok(self.courses.read().await.get(&id.0).cloned())
    }

    async fn courses_for_user(&self, user: &UserId) -> Result<Vec<Course>, CourseError> {
        let owners = self.owners.read().await;
        let Some(ids) = owners.get(&user.0) else {
            return Ok(Vec::new());
        };
        let courses = self.courses.read().await;
        Ok(ids.iter().filter_map(|id| courses.get(&id.0).cloned()).collect())
    }
}
