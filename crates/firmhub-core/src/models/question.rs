use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::i18n::{pick_translation, Language};

/// Declared type of a questionnaire question.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "question_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    String,
    Text,
    Number,
    Date,
    SingleSelect,
    MultiSelect,
}

impl QuestionType {
    pub fn is_choice(self) -> bool {
        matches!(self, QuestionType::SingleSelect | QuestionType::MultiSelect)
    }
}

impl Display for QuestionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            QuestionType::String => write!(f, "string"),
            QuestionType::Text => write!(f, "text"),
            QuestionType::Number => write!(f, "number"),
            QuestionType::Date => write!(f, "date"),
            QuestionType::SingleSelect => write!(f, "single_select"),
            QuestionType::MultiSelect => write!(f, "multi_select"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Question {
    pub id: Uuid,
    pub category_id: Uuid,
    pub question_type: QuestionType,
    pub position: i32,
    pub is_required: bool,
    pub json_schema: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, Validate)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct QuestionTranslation {
    pub language: Language,
    #[validate(length(min = 1, max = 500))]
    pub label: String,
    #[validate(length(max = 2000))]
    pub help_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct QuestionOption {
    pub id: Uuid,
    pub question_id: Uuid,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, Validate)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OptionTranslation {
    pub language: Language,
    #[validate(length(min = 1, max = 300))]
    pub label: String,
}

/// An option with all of its translations.
#[derive(Debug, Clone)]
pub struct OptionDefinition {
    pub option: QuestionOption,
    pub translations: Vec<OptionTranslation>,
}

/// A question aggregate as loaded for validation and rendering.
#[derive(Debug, Clone)]
pub struct QuestionDefinition {
    pub question: Question,
    pub translations: Vec<QuestionTranslation>,
    pub options: Vec<OptionDefinition>,
}

impl QuestionDefinition {
    pub fn has_option(&self, option_id: Uuid) -> bool {
        self.options.iter().any(|o| o.option.id == option_id)
    }

    /// Render the question in `lang`, options sorted by position.
    pub fn localize(&self, lang: Language, fallback: Language) -> LocalizedQuestion {
        let picked = pick_translation(&self.translations, lang, fallback, |t| t.language);
        let mut options: Vec<LocalizedOption> = self
            .options
            .iter()
            .map(|o| LocalizedOption {
                id: o.option.id,
                position: o.option.position,
                label: pick_translation(&o.translations, lang, fallback, |t| t.language)
                    .map(|t| t.label.clone())
                    .unwrap_or_default(),
            })
            .collect();
        options.sort_by_key(|o| o.position);

        LocalizedQuestion {
            id: self.question.id,
            category_id: self.question.category_id,
            question_type: self.question.question_type,
            position: self.question.position,
            is_required: self.question.is_required,
            label: picked.map(|t| t.label.clone()).unwrap_or_default(),
            help_text: picked.and_then(|t| t.help_text.clone()),
            json_schema: self.question.json_schema.clone(),
            options,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LocalizedOption {
    pub id: Uuid,
    pub position: i32,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LocalizedQuestion {
    pub id: Uuid,
    pub category_id: Uuid,
    pub question_type: QuestionType,
    pub position: i32,
    pub is_required: bool,
    pub label: String,
    pub help_text: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub json_schema: Option<serde_json::Value>,
    pub options: Vec<LocalizedOption>,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct OptionInput {
    pub position: i32,
    #[validate(length(min = 1, message = "At least one translation is required"), nested)]
    pub translations: Vec<OptionTranslation>,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct QuestionInput {
    pub question_type: QuestionType,
    pub position: i32,
    #[serde(default)]
    pub is_required: bool,
    #[schema(value_type = Option<Object>)]
    pub json_schema: Option<serde_json::Value>,
    #[validate(length(min = 1, message = "At least one translation is required"), nested)]
    pub translations: Vec<QuestionTranslation>,
    #[serde(default)]
    #[validate(nested)]
    pub options: Vec<OptionInput>,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub position: i32,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReorderRequest {
    pub items: Vec<OrderItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> QuestionDefinition {
        let question_id = Uuid::new_v4();
        let now = Utc::now();
        let option = |position: i32, en: &str, fr: &str| OptionDefinition {
            option: QuestionOption {
                id: Uuid::new_v4(),
                question_id,
                position,
            },
            translations: vec![
                OptionTranslation {
                    language: Language::En,
                    label: en.to_string(),
                },
                OptionTranslation {
                    language: Language::Fr,
                    label: fr.to_string(),
                },
            ],
        };
        QuestionDefinition {
            question: Question {
                id: question_id,
                category_id: Uuid::new_v4(),
                question_type: QuestionType::SingleSelect,
                position: 1,
                is_required: true,
                json_schema: None,
                created_at: now,
                updated_at: now,
            },
            translations: vec![QuestionTranslation {
                language: Language::En,
                label: "Team size".to_string(),
                help_text: None,
            }],
            options: vec![option(2, "Large", "Grande"), option(1, "Small", "Petite")],
        }
    }

    #[test]
    fn test_localize_sorts_options_and_translates() {
        let localized = definition().localize(Language::Fr, Language::En);
        assert_eq!(localized.label, "Team size");
        assert_eq!(localized.options[0].label, "Petite");
        assert_eq!(localized.options[1].label, "Grande");
    }

    #[test]
    fn test_has_option() {
        let def = definition();
        let known = def.options[0].option.id;
        assert!(def.has_option(known));
        assert!(!def.has_option(Uuid::new_v4()));
    }
}
