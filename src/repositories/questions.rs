use sqlx::PgPool;

use crate::db::models::QuestionRow;

pub(crate) const COLUMNS: &str = "id, text, options, correct_answer, difficulty";

pub(crate) async fn list_by_ids(
    pool: &PgPool,
    ids: &[String],
) -> Result<Vec<QuestionRow>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, QuestionRow>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE id = ANY($1)"
    ))
    .bind(ids)
    .fetch_all(pool)
    .await
}
