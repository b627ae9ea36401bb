//! Storage seams for the attempt engine.
//!
//! The engine talks to three collaborators: the attempt store it owns, and
//! the read-only pattern catalog and question bank owned by the content
//! platform. Each is a trait so the service can run against Postgres in
//! production and against in-memory fixtures in tests.

pub(crate) mod memory;
pub(crate) mod postgres;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use time::PrimitiveDateTime;

use crate::db::models::{Attempt, QuestionMeta, TestPattern};

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("version conflict")]
    VersionConflict,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            other => StoreError::Backend(other.into()),
        }
    }
}

/// Durable keyed storage for attempt records. All mutation goes through
/// `update`, which is a compare-and-swap on the attempt's version field so
/// concurrent writers against one attempt serialize instead of interleaving.
#[async_trait]
pub(crate) trait AttemptStore: Send + Sync {
    async fn create(&self, attempt: &Attempt) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<Attempt, StoreError>;

    /// Persists `attempt` if the stored version still equals
    /// `attempt.version`; returns the attempt with its version bumped, or
    /// `VersionConflict` on a lost race.
    async fn update(&self, attempt: Attempt) -> Result<Attempt, StoreError>;

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Attempt>, StoreError>;

    /// Percentages of every submitted attempt for a pattern. A snapshot read;
    /// never blocks writers.
    async fn submitted_percentages(&self, pattern_id: &str) -> Result<Vec<f64>, StoreError>;

    /// In-progress attempts whose active-section deadline has passed.
    async fn list_due(&self, now: PrimitiveDateTime) -> Result<Vec<Attempt>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Read-only access to test definitions.
#[async_trait]
pub(crate) trait PatternCatalog: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<TestPattern>, StoreError>;

    async fn list(&self) -> Result<Vec<TestPattern>, StoreError>;
}

/// Read-only access to question content. Correct answers are only handed out
/// through `correct_answers`, which grading alone consumes.
#[async_trait]
pub(crate) trait QuestionBank: Send + Sync {
    async fn display_meta(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, QuestionMeta>, StoreError>;

    async fn correct_answers(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, String>, StoreError>;
}

#[derive(Clone)]
pub(crate) struct Stores {
    pub(crate) attempts: Arc<dyn AttemptStore>,
    pub(crate) catalog: Arc<dyn PatternCatalog>,
    pub(crate) bank: Arc<dyn QuestionBank>,
}
