use sqlx::PgPool;

use crate::db::models::{PatternRow, SectionRow};

pub(crate) const COLUMNS: &str = "id, name, cutoff_percentage";

pub(crate) const SECTION_COLUMNS: &str =
    "pattern_id, name, order_index, time_limit_seconds, question_ids";

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<PatternRow>, sqlx::Error> {
    sqlx::query_as::<_, PatternRow>(&format!(
        "SELECT {COLUMNS} FROM test_patterns WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list(pool: &PgPool) -> Result<Vec<PatternRow>, sqlx::Error> {
    sqlx::query_as::<_, PatternRow>(&format!(
        "SELECT {COLUMNS} FROM test_patterns ORDER BY name"
    ))
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_sections(
    pool: &PgPool,
    pattern_id: &str,
) -> Result<Vec<SectionRow>, sqlx::Error> {
    sqlx::query_as::<_, SectionRow>(&format!(
        "SELECT {SECTION_COLUMNS} FROM pattern_sections \
         WHERE pattern_id = $1 ORDER BY order_index"
    ))
    .bind(pattern_id)
    .fetch_all(pool)
    .await
}
