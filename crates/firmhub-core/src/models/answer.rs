use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::i18n::Language;
use crate::models::LocalizedQuestion;

/// One submitted answer, tagged by shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerInput {
    /// Scalar answer for string, text, number and date questions.
    Basic {
        question_id: Uuid,
        #[schema(value_type = Object)]
        value: serde_json::Value,
    },
    SingleChoice {
        question_id: Uuid,
        option_id: Uuid,
    },
    MultiChoice {
        question_id: Uuid,
        option_ids: Vec<Uuid>,
    },
}

impl AnswerInput {
    pub fn question_id(&self) -> Uuid {
        match self {
            AnswerInput::Basic { question_id, .. }
            | AnswerInput::SingleChoice { question_id, .. }
            | AnswerInput::MultiChoice { question_id, .. } => *question_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AnswerInput::Basic { .. } => "basic",
            AnswerInput::SingleChoice { .. } => "single_choice",
            AnswerInput::MultiChoice { .. } => "multi_choice",
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SubmitAnswersRequest {
    pub answers: Vec<AnswerInput>,
}

/// Normalized answer content, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerContent {
    /// Scalar value stored as JSON.
    Value(serde_json::Value),
    /// Free text given per language.
    Translated(Vec<(Language, String)>),
    /// Selected option ids, in submission order.
    Options(Vec<Uuid>),
}

/// An answer that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedAnswer {
    pub question_id: Uuid,
    pub content: AnswerContent,
}

/// Questionnaire submission of one firm for one category.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct FormSubmission {
    pub firm_id: Uuid,
    pub category_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Answer {
    pub id: Uuid,
    pub firm_id: Uuid,
    pub category_id: Uuid,
    pub question_id: Uuid,
    pub value: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AnswerTranslation {
    pub answer_id: Uuid,
    pub language: Language,
    pub text: String,
}

/// Stored answer with its selections and translations.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StoredAnswer {
    pub question_id: Uuid,
    #[schema(value_type = Option<Object>)]
    pub value: Option<serde_json::Value>,
    pub option_ids: Vec<Uuid>,
    pub translations: Vec<AnswerTranslation>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FormQuestionView {
    pub question: LocalizedQuestion,
    pub answer: Option<StoredAnswer>,
}

/// A firm's questionnaire for one category in the request language.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FormView {
    pub firm_id: Uuid,
    pub category_id: Uuid,
    pub language: Language,
    pub questions: Vec<FormQuestionView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_input_deserializes_by_kind() {
        let qid = Uuid::new_v4();
        let oid = Uuid::new_v4();
        let raw = serde_json::json!([
            {"kind": "basic", "question_id": qid, "value": 12},
            {"kind": "single_choice", "question_id": qid, "option_id": oid},
            {"kind": "multi_choice", "question_id": qid, "option_ids": [oid]}
        ]);
        let parsed: Vec<AnswerInput> = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed[0].kind(), "basic");
        assert_eq!(parsed[1].kind(), "single_choice");
        assert_eq!(parsed[2].kind(), "multi_choice");
        assert!(parsed.iter().all(|a| a.question_id() == qid));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let raw = serde_json::json!({"kind": "matrix", "question_id": Uuid::new_v4()});
        assert!(serde_json::from_value::<AnswerInput>(raw).is_err());
    }
}
