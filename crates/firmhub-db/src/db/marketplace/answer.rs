use std::collections::{HashMap, HashSet};

use firmhub_core::models::{
    Answer, AnswerContent, AnswerTranslation, FormSubmission, StoredAnswer, ValidatedAnswer,
};
use firmhub_core::{AppError, Language};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::db::transaction::TransactionGuard;

/// Form submissions and their answers.
#[derive(Clone)]
pub struct AnswerRepository {
    pool: PgPool,
}

impl AnswerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a validated batch. The submission row is created on first save and each
    /// answer replaces any previous answer to the same question.
    #[tracing::instrument(skip(self, answers), fields(db.table = "answers", db.operation = "upsert", answer_count = answers.len()))]
    pub async fn save_answers(
        &self,
        firm_id: Uuid,
        category_id: Uuid,
        answers: &[ValidatedAnswer],
    ) -> Result<FormSubmission, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;

        let submission = sqlx::query_as::<Postgres, FormSubmission>(
            r#"
            INSERT INTO form_submissions (firm_id, category_id)
            VALUES ($1, $2)
            ON CONFLICT (firm_id, category_id) DO UPDATE SET updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(firm_id)
        .bind(category_id)
        .fetch_one(tx.conn()?)
        .await?;

        for answer in answers {
            let value = match &answer.content {
                AnswerContent::Value(value) => Some(value.clone()),
                AnswerContent::Translated(_) | AnswerContent::Options(_) => None,
            };

            let (answer_id,): (Uuid,) = sqlx::query_as(
                r#"
                INSERT INTO answers (firm_id, category_id, question_id, value)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (firm_id, category_id, question_id)
                DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
                RETURNING id
                "#,
            )
            .bind(firm_id)
            .bind(category_id)
            .bind(answer.question_id)
            .bind(value)
            .fetch_one(tx.conn()?)
            .await?;

            sqlx::query("DELETE FROM answer_translations WHERE answer_id = $1")
                .bind(answer_id)
                .execute(tx.conn()?)
                .await?;
            sqlx::query("DELETE FROM answer_options WHERE answer_id = $1")
                .bind(answer_id)
                .execute(tx.conn()?)
                .await?;

            match &answer.content {
                AnswerContent::Value(_) => {}
                AnswerContent::Translated(texts) => {
                    for (language, text) in texts {
                        sqlx::query(
                            "INSERT INTO answer_translations (answer_id, language, text) VALUES ($1, $2, $3)",
                        )
                        .bind(answer_id)
                        .bind(language)
                        .bind(text)
                        .execute(tx.conn()?)
                        .await?;
                    }
                }
                AnswerContent::Options(option_ids) => {
                    for (idx, option_id) in option_ids.iter().enumerate() {
                        sqlx::query(
                            "INSERT INTO answer_options (answer_id, option_id, position) VALUES ($1, $2, $3)",
                        )
                        .bind(answer_id)
                        .bind(option_id)
                        .bind(idx as i32 + 1)
                        .execute(tx.conn()?)
                        .await?;
                    }
                }
            }
        }

        tx.commit().await?;

        tracing::info!(
            firm_id = %firm_id,
            category_id = %category_id,
            answer_count = answers.len(),
            "Answers saved"
        );

        Ok(submission)
    }

    /// Stored answers of one submission, keyed by question.
    #[tracing::instrument(skip(self), fields(db.table = "answers", db.operation = "select"))]
    pub async fn load_answers(
        &self,
        firm_id: Uuid,
        category_id: Uuid,
    ) -> Result<HashMap<Uuid, StoredAnswer>, AppError> {
        let answers = sqlx::query_as::<Postgres, Answer>(
            "SELECT * FROM answers WHERE firm_id = $1 AND category_id = $2",
        )
        .bind(firm_id)
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = answers.iter().map(|a| a.id).collect();

        let translations = sqlx::query_as::<Postgres, AnswerTranslation>(
            "SELECT answer_id, language, text FROM answer_translations WHERE answer_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let selections: Vec<(Uuid, Uuid)> = sqlx::query_as(
            r#"
            SELECT answer_id, option_id FROM answer_options
            WHERE answer_id = ANY($1)
            ORDER BY position
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut translations_by_answer: HashMap<Uuid, Vec<AnswerTranslation>> = HashMap::new();
        for t in translations {
            translations_by_answer.entry(t.answer_id).or_default().push(t);
        }
        let mut options_by_answer: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for (answer_id, option_id) in selections {
            options_by_answer.entry(answer_id).or_default().push(option_id);
        }

        Ok(answers
            .into_iter()
            .map(|a| {
                let mut translations = translations_by_answer.remove(&a.id).unwrap_or_default();
                translations.sort_by_key(|t| t.language.code());
                (
                    a.question_id,
                    StoredAnswer {
                        question_id: a.question_id,
                        value: a.value,
                        option_ids: options_by_answer.remove(&a.id).unwrap_or_default(),
                        translations,
                        updated_at: a.updated_at,
                    },
                )
            })
            .collect())
    }

    /// Categories in which the firm has saved at least one batch.
    #[tracing::instrument(skip(self), fields(db.table = "form_submissions", db.operation = "select"))]
    pub async fn started_categories(&self, firm_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT category_id FROM form_submissions WHERE firm_id = $1 ORDER BY created_at",
        )
        .bind(firm_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Questions the firm has answered with some content across all of its submissions.
    #[tracing::instrument(skip(self), fields(db.table = "answers", db.operation = "select"))]
    pub async fn answered_question_ids(&self, firm_id: Uuid) -> Result<HashSet<Uuid>, AppError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT a.question_id
            FROM answers a
            WHERE a.firm_id = $1
              AND (a.value IS NOT NULL
                   OR EXISTS (SELECT 1 FROM answer_translations t WHERE t.answer_id = a.id)
                   OR EXISTS (SELECT 1 FROM answer_options o WHERE o.answer_id = a.id))
            "#,
        )
        .bind(firm_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Free-text answers of a firm in every language, for moderation before review.
    #[tracing::instrument(skip(self), fields(db.table = "answer_translations", db.operation = "select"))]
    pub async fn text_answers(&self, firm_id: Uuid) -> Result<Vec<(Uuid, Language, String)>, AppError> {
        let rows: Vec<(Uuid, Language, String)> = sqlx::query_as(
            r#"
            SELECT a.question_id, t.language, t.text
            FROM answer_translations t
            JOIN answers a ON a.id = t.answer_id
            WHERE a.firm_id = $1
            "#,
        )
        .bind(firm_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Answers stored as a plain JSON string, as given for string and text questions.
    #[tracing::instrument(skip(self), fields(db.table = "answers", db.operation = "select"))]
    pub async fn string_answers(&self, firm_id: Uuid) -> Result<Vec<(Uuid, String)>, AppError> {
        let rows: Vec<(Uuid, String)> = sqlx::query_as(
            r#"
            SELECT question_id, value #>> '{}'
            FROM answers
            WHERE firm_id = $1 AND jsonb_typeof(value) = 'string'
            "#,
        )
        .bind(firm_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
