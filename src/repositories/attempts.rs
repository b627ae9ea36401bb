use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{Attempt, AttemptRow};
use crate::db::types::AttemptStatus;

pub(crate) const COLUMNS: &str = "\
    id, owner_id, pattern_id, status, current_section_index, started_at, \
    completed_at, section_deadline, sections, graded, version, created_at, updated_at";

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<AttemptRow>, sqlx::Error> {
    sqlx::query_as::<_, AttemptRow>(&format!("SELECT {COLUMNS} FROM attempts WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list_by_owner(
    pool: &PgPool,
    owner_id: &str,
) -> Result<Vec<AttemptRow>, sqlx::Error> {
    sqlx::query_as::<_, AttemptRow>(&format!(
        "SELECT {COLUMNS} FROM attempts WHERE owner_id = $1 ORDER BY started_at DESC"
    ))
    .bind(owner_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn create(pool: &PgPool, attempt: &Attempt) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO attempts (
            id, owner_id, pattern_id, status, current_section_index, started_at,
            completed_at, section_deadline, sections, graded, version, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)
        ON CONFLICT DO NOTHING",
    )
    .bind(&attempt.id)
    .bind(&attempt.owner_id)
    .bind(&attempt.pattern_id)
    .bind(attempt.status)
    .bind(attempt.current_section_index as i32)
    .bind(attempt.started_at)
    .bind(attempt.completed_at)
    .bind(attempt.section_deadline)
    .bind(Json(&attempt.sections))
    .bind(attempt.graded.as_ref().map(Json))
    .bind(attempt.version)
    .bind(attempt.created_at)
    .bind(attempt.updated_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Versioned write: succeeds only when the stored row still carries the
/// version the caller read. Returns false on a lost race.
pub(crate) async fn update_versioned(
    pool: &PgPool,
    attempt: &Attempt,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE attempts SET
            status = $1, current_section_index = $2, completed_at = $3,
            section_deadline = $4, sections = $5, graded = $6,
            version = version + 1, updated_at = $7
         WHERE id = $8 AND version = $9",
    )
    .bind(attempt.status)
    .bind(attempt.current_section_index as i32)
    .bind(attempt.completed_at)
    .bind(attempt.section_deadline)
    .bind(Json(&attempt.sections))
    .bind(attempt.graded.as_ref().map(Json))
    .bind(attempt.updated_at)
    .bind(&attempt.id)
    .bind(attempt.version)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn submitted_percentages(
    pool: &PgPool,
    pattern_id: &str,
) -> Result<Vec<f64>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT (graded->>'percentage')::float8 FROM attempts \
         WHERE pattern_id = $1 AND status = $2 AND graded IS NOT NULL",
    )
    .bind(pattern_id)
    .bind(AttemptStatus::Submitted)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_due(
    pool: &PgPool,
    now: PrimitiveDateTime,
) -> Result<Vec<AttemptRow>, sqlx::Error> {
    sqlx::query_as::<_, AttemptRow>(&format!(
        "SELECT {COLUMNS} FROM attempts \
         WHERE status = $1 AND section_deadline IS NOT NULL AND section_deadline <= $2"
    ))
    .bind(AttemptStatus::InProgress)
    .bind(now)
    .fetch_all(pool)
    .await
}
