//! In-memory adapters backing tests and database-less local runs.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use time::PrimitiveDateTime;

use crate::db::models::{Attempt, QuestionMeta, TestPattern};
use crate::db::types::AttemptStatus;
use crate::stores::{AttemptStore, PatternCatalog, QuestionBank, StoreError};

#[derive(Default)]
pub(crate) struct MemoryAttemptStore {
    attempts: RwLock<HashMap<String, Attempt>>,
}

impl MemoryAttemptStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn create(&self, attempt: &Attempt) -> Result<(), StoreError> {
        let mut attempts = self.attempts.write().expect("attempt store lock");
        if attempts.contains_key(&attempt.id) {
            return Err(StoreError::VersionConflict);
        }
        attempts.insert(attempt.id.clone(), attempt.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Attempt, StoreError> {
        self.attempts
            .read()
            .expect("attempt store lock")
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, mut attempt: Attempt) -> Result<Attempt, StoreError> {
        let mut attempts = self.attempts.write().expect("attempt store lock");
        let stored = attempts.get_mut(&attempt.id).ok_or(StoreError::NotFound)?;
        if stored.version != attempt.version {
            return Err(StoreError::VersionConflict);
        }
        attempt.version += 1;
        *stored = attempt.clone();
        Ok(attempt)
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Attempt>, StoreError> {
        let attempts = self.attempts.read().expect("attempt store lock");
        let mut owned: Vec<Attempt> =
            attempts.values().filter(|attempt| attempt.owner_id == owner_id).cloned().collect();
        owned.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(owned)
    }

    async fn submitted_percentages(&self, pattern_id: &str) -> Result<Vec<f64>, StoreError> {
        let attempts = self.attempts.read().expect("attempt store lock");
        Ok(attempts
            .values()
            .filter(|attempt| {
                attempt.pattern_id == pattern_id && attempt.status == AttemptStatus::Submitted
            })
            .filter_map(|attempt| attempt.graded.as_ref().map(|graded| graded.percentage))
            .collect())
    }

    async fn list_due(&self, now: PrimitiveDateTime) -> Result<Vec<Attempt>, StoreError> {
        let attempts = self.attempts.read().expect("attempt store lock");
        Ok(attempts
            .values()
            .filter(|attempt| attempt.status == AttemptStatus::InProgress)
            .filter(|attempt| {
                attempt.section_deadline.map(|deadline| deadline <= now).unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MemoryPatternCatalog {
    patterns: RwLock<HashMap<String, TestPattern>>,
}

impl MemoryPatternCatalog {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, pattern: TestPattern) {
        self.patterns.write().expect("catalog lock").insert(pattern.id.clone(), pattern);
    }
}

#[async_trait]
impl PatternCatalog for MemoryPatternCatalog {
    async fn get(&self, id: &str) -> Result<Option<TestPattern>, StoreError> {
        Ok(self.patterns.read().expect("catalog lock").get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<TestPattern>, StoreError> {
        let patterns = self.patterns.read().expect("catalog lock");
        let mut listed: Vec<TestPattern> = patterns.values().cloned().collect();
        listed.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listed)
    }
}

#[derive(Default)]
pub(crate) struct MemoryQuestionBank {
    meta: RwLock<HashMap<String, QuestionMeta>>,
    answers: RwLock<HashMap<String, String>>,
}

impl MemoryQuestionBank {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, meta: QuestionMeta, correct_answer: &str) {
        self.answers
            .write()
            .expect("question bank lock")
            .insert(meta.id.clone(), correct_answer.to_string());
        self.meta.write().expect("question bank lock").insert(meta.id.clone(), meta);
    }
}

#[async_trait]
impl QuestionBank for MemoryQuestionBank {
    async fn display_meta(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, QuestionMeta>, StoreError> {
        let meta = self.meta.read().expect("question bank lock");
        Ok(ids.iter().filter_map(|id| meta.get(id).map(|m| (id.clone(), m.clone()))).collect())
    }

    async fn correct_answers(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, String>, StoreError> {
        let answers = self.answers.read().expect("question bank lock");
        Ok(ids
            .iter()
            .filter_map(|id| answers.get(id).map(|answer| (id.clone(), answer.clone())))
            .collect())
    }
}
