//! In-memory backend — the bundled record store.
//!
//! Records live in an append-only `Vec` behind an `RwLock`. There is no
//! update or delete path; immutability is structural, not a convention.

use async_trait::async_trait;
use coursecraft_core::error::MemoryError;
use coursecraft_core::memory::{MemoryBackend, MemoryQuery, MemoryRecord, ScoredRecord};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

pub struct InMemoryBackend {
    records: Arc<RwLock<Vec<MemoryRecord>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Keyword relevance: occurrences of each query term in the content,
/// normalized by content length so short precise records outrank long
/// rambling ones.
fn keyword_score(content: &str, query: &str) -> f32 {
    let content_lower = content.to_lowercase();
    let terms: Vec<&str> = query.split_whitespace().collect();
    if terms.is_empty() {
        return 0.0;
    }
    let occurrences: usize = terms
        .iter()
        .map(|t| content_lower.matches(&t.to_lowercase()).count())
        .sum();
    occurrences as f32 / (content.len() as f32 / 100.0).max(1.0)
}

#[async_trait]
impl MemoryBackend for InMemoryBackend {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn add(&self, mut record: MemoryRecord) -> Result<String, MemoryError> {
        if record.id.is_empty() {
            record.id = Uuid::new_v4().to_string();
        }
        let id = record.id.clone();
        self.records.write().await.push(record);
        Ok(id)
    }

    async fn search(&self, query: &MemoryQuery) -> Result<Vec<ScoredRecord>, MemoryError> {
        let records = self.records.read().await;

        let mut results: Vec<ScoredRecord> = records
            .iter()
            .filter(|r| r.user_id == query.user_id)
            .map(|r| ScoredRecord {
                score: keyword_score(&r.content, &query.text),
                record: r.clone(),
            })
            .filter(|s| query.text.trim().is_empty() || s.score > 0.0)
            .collect();

        // Relevance first, recency as the tie-breaker.
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.record.created_at.cmp(&a.record.created_at))
        });
        results.truncate(query.limit);

        Ok(results)
    }

    async fn get(&self, id: &str) -> Result<Option<MemoryRecord>, MemoryError> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(self.records.read().await.len())
    }
}
