use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{Attempt, QuestionMeta, SectionSpec, TestPattern};
use crate::repositories;
use crate::stores::{AttemptStore, PatternCatalog, QuestionBank, StoreError};

#[derive(Clone)]
pub(crate) struct PgAttemptStore {
    pool: PgPool,
}

impl PgAttemptStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptStore for PgAttemptStore {
    async fn create(&self, attempt: &Attempt) -> Result<(), StoreError> {
        let inserted = repositories::attempts::create(&self.pool, attempt).await?;
        if !inserted {
            return Err(StoreError::VersionConflict);
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Attempt, StoreError> {
        repositories::attempts::find_by_id(&self.pool, id)
            .await?
            .map(Attempt::from)
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, mut attempt: Attempt) -> Result<Attempt, StoreError> {
        let updated = repositories::attempts::update_versioned(&self.pool, &attempt).await?;
        if !updated {
            // Distinguish a lost race from a vanished row.
            return match repositories::attempts::find_by_id(&self.pool, &attempt.id).await? {
                Some(_) => Err(StoreError::VersionConflict),
                None => Err(StoreError::NotFound),
            };
        }
        attempt.version += 1;
        Ok(attempt)
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Attempt>, StoreError> {
        let rows = repositories::attempts::list_by_owner(&self.pool, owner_id).await?;
        Ok(rows.into_iter().map(Attempt::from).collect())
    }

    async fn submitted_percentages(&self, pattern_id: &str) -> Result<Vec<f64>, StoreError> {
        Ok(repositories::attempts::submitted_percentages(&self.pool, pattern_id).await?)
    }

    async fn list_due(&self, now: PrimitiveDateTime) -> Result<Vec<Attempt>, StoreError> {
        let rows = repositories::attempts::list_due(&self.pool, now).await?;
        Ok(rows.into_iter().map(Attempt::from).collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(repositories::health::ping(&self.pool).await?)
    }
}

#[derive(Clone)]
pub(crate) struct PgPatternCatalog {
    pool: PgPool,
}

impl PgPatternCatalog {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_sections(&self, pattern_id: &str) -> Result<Vec<SectionSpec>, StoreError> {
        let rows = repositories::patterns::list_sections(&self.pool, pattern_id).await?;
        Ok(rows
            .into_iter()
            .map(|row| SectionSpec {
                name: row.name,
                question_ids: row.question_ids.0,
                time_limit_seconds: row.time_limit_seconds,
            })
            .collect())
    }
}

#[async_trait]
impl PatternCatalog for PgPatternCatalog {
    async fn get(&self, id: &str) -> Result<Option<TestPattern>, StoreError> {
        let Some(row) = repositories::patterns::find_by_id(&self.pool, id).await? else {
            return Ok(None);
        };

        let sections = self.load_sections(&row.id).await?;
        Ok(Some(TestPattern {
            id: row.id,
            name: row.name,
            cutoff_percentage: row.cutoff_percentage,
            sections,
        }))
    }

    async fn list(&self) -> Result<Vec<TestPattern>, StoreError> {
        let rows = repositories::patterns::list(&self.pool).await?;

        let mut patterns = Vec::with_capacity(rows.len());
        for row in rows {
            let sections = self.load_sections(&row.id).await?;
            patterns.push(TestPattern {
                id: row.id,
                name: row.name,
                cutoff_percentage: row.cutoff_percentage,
                sections,
            });
        }
        Ok(patterns)
    }
}

#[derive(Clone)]
pub(crate) struct PgQuestionBank {
    pool: PgPool,
}

impl PgQuestionBank {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuestionBank for PgQuestionBank {
    async fn display_meta(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, QuestionMeta>, StoreError> {
        let rows = repositories::questions::list_by_ids(&self.pool, ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    row.id.clone(),
                    QuestionMeta {
                        id: row.id,
                        text: row.text,
                        options: row.options.0,
                        difficulty: row.difficulty,
                    },
                )
            })
            .collect())
    }

    async fn correct_answers(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, String>, StoreError> {
        let rows = repositories::questions::list_by_ids(&self.pool, ids).await?;
        Ok(rows.into_iter().map(|row| (row.id, row.correct_answer)).collect())
    }
}
