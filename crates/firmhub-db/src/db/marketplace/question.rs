use std::collections::HashMap;

use firmhub_core::models::{
    OptionDefinition, OptionInput, OptionTranslation, OrderItem, Question, QuestionDefinition,
    QuestionInput, QuestionOption, QuestionTranslation,
};
use firmhub_core::{AppError, FieldError, Language};
use sqlx::{PgConnection, PgPool, Postgres};
use uuid::Uuid;

use crate::db::transaction::TransactionGuard;

/// Questions with their translations and options.
///
/// Positions inside a category (and inside a question for options) are kept as a
/// permutation of `1..=n`: inserts and deletes shift their neighbours in the same
/// transaction, and the unique constraints are deferred to commit time.
#[derive(Clone)]
pub struct QuestionRepository {
    pool: PgPool,
}

impl QuestionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load every question of a category, ordered by position.
    #[tracing::instrument(skip(self), fields(db.table = "questions", db.operation = "select"))]
    pub async fn load_definitions(
        &self,
        category_id: Uuid,
    ) -> Result<Vec<QuestionDefinition>, AppError> {
        let questions = sqlx::query_as::<Postgres, Question>(
            "SELECT * FROM questions WHERE category_id = $1 ORDER BY position",
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;

        self.assemble(questions).await
    }

    /// Load the definitions of every question in the given categories.
    #[tracing::instrument(skip(self, category_ids), fields(db.table = "questions", db.operation = "select"))]
    pub async fn load_definitions_for_categories(
        &self,
        category_ids: &[Uuid],
    ) -> Result<Vec<QuestionDefinition>, AppError> {
        let questions = sqlx::query_as::<Postgres, Question>(
            "SELECT * FROM questions WHERE category_id = ANY($1) ORDER BY category_id, position",
        )
        .bind(category_ids)
        .fetch_all(&self.pool)
        .await?;

        self.assemble(questions).await
    }

    #[tracing::instrument(skip(self), fields(db.table = "questions", db.operation = "select", db.record_id = %id))]
    pub async fn load_definition(&self, id: Uuid) -> Result<Option<QuestionDefinition>, AppError> {
        let question = sqlx::query_as::<Postgres, Question>("SELECT * FROM questions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match question {
            Some(question) => Ok(self.assemble(vec![question]).await?.into_iter().next()),
            None => Ok(None),
        }
    }

    async fn assemble(&self, questions: Vec<Question>) -> Result<Vec<QuestionDefinition>, AppError> {
        if questions.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = questions.iter().map(|q| q.id).collect();

        let translation_rows: Vec<(Uuid, Language, String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT question_id, language, label, help_text
            FROM question_translations
            WHERE question_id = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let options = sqlx::query_as::<Postgres, QuestionOption>(
            "SELECT * FROM question_options WHERE question_id = ANY($1) ORDER BY position",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;
        let option_ids: Vec<Uuid> = options.iter().map(|o| o.id).collect();

        let option_translation_rows: Vec<(Uuid, Language, String)> = sqlx::query_as(
            "SELECT option_id, language, label FROM option_translations WHERE option_id = ANY($1)",
        )
        .bind(&option_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut translations: HashMap<Uuid, Vec<QuestionTranslation>> = HashMap::new();
        for (question_id, language, label, help_text) in translation_rows {
            translations
                .entry(question_id)
                .or_default()
                .push(QuestionTranslation {
                    language,
                    label,
                    help_text,
                });
        }

        let mut option_translations: HashMap<Uuid, Vec<OptionTranslation>> = HashMap::new();
        for (option_id, language, label) in option_translation_rows {
            option_translations
                .entry(option_id)
                .or_default()
                .push(OptionTranslation { language, label });
        }

        let mut options_by_question: HashMap<Uuid, Vec<OptionDefinition>> = HashMap::new();
        for option in options {
            let translations = option_translations.remove(&option.id).unwrap_or_default();
            options_by_question
                .entry(option.question_id)
                .or_default()
                .push(OptionDefinition {
                    option,
                    translations,
                });
        }

        Ok(questions
            .into_iter()
            .map(|question| QuestionDefinition {
                translations: translations.remove(&question.id).unwrap_or_default(),
                options: options_by_question.remove(&question.id).unwrap_or_default(),
                question,
            })
            .collect())
    }

    /// Insert a question at `input.position`, shifting later questions down.
    #[tracing::instrument(skip(self, input), fields(db.table = "questions", db.operation = "insert"))]
    pub async fn create(
        &self,
        category_id: Uuid,
        input: &QuestionInput,
    ) -> Result<QuestionDefinition, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;

        let count = count_in_category(tx.conn()?, category_id).await?;
        check_slot(input.position, count + 1)?;

        sqlx::query(
            r#"
            UPDATE questions SET position = position + 1, updated_at = NOW()
            WHERE category_id = $1 AND position >= $2
            "#,
        )
        .bind(category_id)
        .bind(input.position)
        .execute(tx.conn()?)
        .await?;

        let question = sqlx::query_as::<Postgres, Question>(
            r#"
            INSERT INTO questions (category_id, question_type, position, is_required, json_schema)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(category_id)
        .bind(input.question_type)
        .bind(input.position)
        .bind(input.is_required)
        .bind(&input.json_schema)
        .fetch_one(tx.conn()?)
        .await?;

        replace_translations(tx.conn()?, question.id, &input.translations).await?;
        let mut options = Vec::with_capacity(input.options.len());
        for option in &input.options {
            options.push(insert_option(tx.conn()?, question.id, option).await?);
        }

        tx.commit().await?;

        tracing::info!(
            question_id = %question.id,
            category_id = %category_id,
            question_type = %question.question_type,
            "Question created"
        );

        Ok(QuestionDefinition {
            question,
            translations: input.translations.clone(),
            options,
        })
    }

    /// Replace a question's definition. Options are matched by position so that
    /// existing selections survive a relabelling; surplus options are removed, along with
    /// answers that no longer select anything. A question that already has answers keeps
    /// its type.
    #[tracing::instrument(skip(self, input), fields(db.table = "questions", db.operation = "update", db.record_id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        input: &QuestionInput,
    ) -> Result<Option<QuestionDefinition>, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;

        let current = sqlx::query_as::<Postgres, Question>(
            "SELECT * FROM questions WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(tx.conn()?)
        .await?;
        let Some(current) = current else {
            tx.rollback().await?;
            return Ok(None);
        };

        if current.question_type != input.question_type {
            let (answers,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM answers WHERE question_id = $1")
                    .bind(id)
                    .fetch_one(tx.conn()?)
                    .await?;
            if answers > 0 {
                tx.rollback().await?;
                return Err(AppError::Conflict(format!(
                    "Question has {} answers; its type cannot change from {} to {}",
                    answers, current.question_type, input.question_type
                )));
            }
        }

        if current.position != input.position {
            let count = count_in_category(tx.conn()?, current.category_id).await?;
            check_slot(input.position, count)?;
            move_question(tx.conn()?, &current, input.position).await?;
        }

        let question = sqlx::query_as::<Postgres, Question>(
            r#"
            UPDATE questions
            SET question_type = $2, position = $3, is_required = $4, json_schema = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.question_type)
        .bind(input.position)
        .bind(input.is_required)
        .bind(&input.json_schema)
        .fetch_one(tx.conn()?)
        .await?;

        replace_translations(tx.conn()?, id, &input.translations).await?;

        let existing = sqlx::query_as::<Postgres, QuestionOption>(
            "SELECT * FROM question_options WHERE question_id = $1 ORDER BY position",
        )
        .bind(id)
        .fetch_all(tx.conn()?)
        .await?;
        let by_position: HashMap<i32, Uuid> =
            existing.iter().map(|o| (o.position, o.id)).collect();

        let mut options = Vec::with_capacity(input.options.len());
        for option in &input.options {
            match by_position.get(&option.position) {
                Some(option_id) => {
                    replace_option_translations(tx.conn()?, *option_id, &option.translations)
                        .await?;
                    options.push(OptionDefinition {
                        option: QuestionOption {
                            id: *option_id,
                            question_id: id,
                            position: option.position,
                        },
                        translations: option.translations.clone(),
                    });
                }
                None => options.push(insert_option(tx.conn()?, id, option).await?),
            }
        }

        let kept: Vec<Uuid> = options.iter().map(|o| o.option.id).collect();
        sqlx::query("DELETE FROM question_options WHERE question_id = $1 AND NOT (id = ANY($2))")
            .bind(id)
            .bind(&kept)
            .execute(tx.conn()?)
            .await?;

        if question.question_type.is_choice() {
            let emptied = sqlx::query(
                r#"
                DELETE FROM answers a
                WHERE a.question_id = $1
                  AND NOT EXISTS (SELECT 1 FROM answer_options o WHERE o.answer_id = a.id)
                "#,
            )
            .bind(id)
            .execute(tx.conn()?)
            .await?;
            if emptied.rows_affected() > 0 {
                tracing::info!(
                    question_id = %id,
                    answers = emptied.rows_affected(),
                    "Removed answers left without selections"
                );
            }
        }

        tx.commit().await?;

        Ok(Some(QuestionDefinition {
            question,
            translations: input.translations.clone(),
            options,
        }))
    }

    /// Delete a question and close the gap it leaves in its category.
    #[tracing::instrument(skip(self), fields(db.table = "questions", db.operation = "delete", db.record_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;

        let deleted: Option<(Uuid, i32)> = sqlx::query_as(
            "DELETE FROM questions WHERE id = $1 RETURNING category_id, position",
        )
        .bind(id)
        .fetch_optional(tx.conn()?)
        .await?;

        let Some((category_id, position)) = deleted else {
            tx.rollback().await?;
            return Ok(false);
        };

        sqlx::query(
            r#"
            UPDATE questions SET position = position - 1, updated_at = NOW()
            WHERE category_id = $1 AND position > $2
            "#,
        )
        .bind(category_id)
        .bind(position)
        .execute(tx.conn()?)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    #[tracing::instrument(skip(self), fields(db.table = "questions", db.operation = "select"))]
    pub async fn question_ids(&self, category_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT id FROM questions WHERE category_id = $1 ORDER BY position")
                .bind(category_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "question_options", db.operation = "select"))]
    pub async fn option_ids(&self, question_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM question_options WHERE question_id = $1 ORDER BY position",
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Apply an already validated question order to a category.
    #[tracing::instrument(skip(self, items), fields(db.table = "questions", db.operation = "update"))]
    pub async fn reorder_questions(
        &self,
        category_id: Uuid,
        items: &[OrderItem],
    ) -> Result<(), AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        for item in items {
            sqlx::query(
                r#"
                UPDATE questions SET position = $3, updated_at = NOW()
                WHERE id = $1 AND category_id = $2
                "#,
            )
            .bind(item.id)
            .bind(category_id)
            .bind(item.position)
            .execute(tx.conn()?)
            .await?;
        }
        tx.commit().await
    }

    /// Apply an already validated option order to a question.
    #[tracing::instrument(skip(self, items), fields(db.table = "question_options", db.operation = "update"))]
    pub async fn reorder_options(
        &self,
        question_id: Uuid,
        items: &[OrderItem],
    ) -> Result<(), AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        for item in items {
            sqlx::query(
                "UPDATE question_options SET position = $3 WHERE id = $1 AND question_id = $2",
            )
            .bind(item.id)
            .bind(question_id)
            .bind(item.position)
            .execute(tx.conn()?)
            .await?;
        }
        tx.commit().await
    }
}

fn check_slot(position: i32, max: i64) -> Result<(), AppError> {
    if position < 1 || i64::from(position) > max {
        return Err(AppError::validation(
            "Invalid question definition",
            vec![FieldError::new(
                "position",
                format!("Position must be between 1 and {}", max.max(1)),
            )],
        ));
    }
    Ok(())
}

async fn count_in_category(conn: &mut PgConnection, category_id: Uuid) -> Result<i64, AppError> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM questions WHERE category_id = $1")
        .bind(category_id)
        .fetch_one(conn)
        .await?;
    Ok(count)
}

async fn move_question(
    conn: &mut PgConnection,
    current: &Question,
    target: i32,
) -> Result<(), AppError> {
    let (from, to, delta) = if target < current.position {
        (target, current.position - 1, 1)
    } else {
        (current.position + 1, target, -1)
    };
    sqlx::query(
        r#"
        UPDATE questions SET position = position + $4, updated_at = NOW()
        WHERE category_id = $1 AND position BETWEEN $2 AND $3
        "#,
    )
    .bind(current.category_id)
    .bind(from)
    .bind(to)
    .bind(delta)
    .execute(conn)
    .await?;
    Ok(())
}

async fn replace_translations(
    conn: &mut PgConnection,
    question_id: Uuid,
    translations: &[QuestionTranslation],
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM question_translations WHERE question_id = $1")
        .bind(question_id)
        .execute(&mut *conn)
        .await?;
    for t in translations {
        sqlx::query(
            r#"
            INSERT INTO question_translations (question_id, language, label, help_text)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(question_id)
        .bind(t.language)
        .bind(&t.label)
        .bind(&t.help_text)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn replace_option_translations(
    conn: &mut PgConnection,
    option_id: Uuid,
    translations: &[OptionTranslation],
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM option_translations WHERE option_id = $1")
        .bind(option_id)
        .execute(&mut *conn)
        .await?;
    for t in translations {
        sqlx::query("INSERT INTO option_translations (option_id, language, label) VALUES ($1, $2, $3)")
            .bind(option_id)
            .bind(t.language)
            .bind(&t.label)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn insert_option(
    conn: &mut PgConnection,
    question_id: Uuid,
    input: &OptionInput,
) -> Result<OptionDefinition, AppError> {
    let option = sqlx::query_as::<Postgres, QuestionOption>(
        "INSERT INTO question_options (question_id, position) VALUES ($1, $2) RETURNING *",
    )
    .bind(question_id)
    .bind(input.position)
    .fetch_one(&mut *conn)
    .await?;

    replace_option_translations(conn, option.id, &input.translations).await?;

    Ok(OptionDefinition {
        option,
        translations: input.translations.clone(),
    })
}
