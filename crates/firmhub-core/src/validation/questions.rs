//! Definition-time checks for questions and their options.

use std::collections::HashSet;

use validator::Validate;

use crate::constants::MAX_OPTIONS_PER_QUESTION;
use crate::error::{AppError, FieldError};
use crate::i18n::{translate, Language, MessageKey};
use crate::models::QuestionInput;
use crate::validation::ordering::check_contiguous;
use crate::validation::schema::compile_schema;

/// Validate a question definition before it is stored.
///
/// Choice questions need at least one option with contiguous positions; other
/// types take no options. A JSON Schema is only accepted on basic questions and
/// must compile. Each language may be translated once.
pub fn validate_question_input(input: &QuestionInput, lang: Language) -> Result<(), AppError> {
    input.validate()?;

    let mut errors = Vec::new();

    let mut languages = HashSet::new();
    if input
        .translations
        .iter()
        .any(|t| !languages.insert(t.language))
    {
        errors.push(FieldError::new(
            "translations",
            "Each language may be translated only once",
        ));
    }

    if input.position < 1 {
        errors.push(FieldError::new("position", "Position starts at 1"));
    }

    if input.question_type.is_choice() {
        if input.options.is_empty() {
            errors.push(FieldError::new(
                "options",
                "Choice questions need at least one option",
            ));
        }
        if input.options.len() > MAX_OPTIONS_PER_QUESTION {
            errors.push(FieldError::new(
                "options",
                format!("At most {} options per question", MAX_OPTIONS_PER_QUESTION),
            ));
        }
        let positions: Vec<i32> = input.options.iter().map(|o| o.position).collect();
        if !check_contiguous(&positions) {
            errors.push(FieldError::new(
                "options",
                translate(
                    MessageKey::OrderNotContiguous,
                    lang,
                    &[("count", &positions.len().to_string())],
                ),
            ));
        }
        for (idx, option) in input.options.iter().enumerate() {
            let mut option_langs = HashSet::new();
            if option
                .translations
                .iter()
                .any(|t| !option_langs.insert(t.language))
            {
                errors.push(FieldError::new(
                    format!("options[{}].translations", idx),
                    "Each language may be translated only once",
                ));
            }
        }
        if input.json_schema.is_some() {
            errors.push(FieldError::new(
                "json_schema",
                "Choice questions do not take a JSON Schema",
            ));
        }
    } else {
        if !input.options.is_empty() {
            errors.push(FieldError::new(
                "options",
                "Only choice questions take options",
            ));
        }
        if let Some(schema) = &input.json_schema {
            if let Err(err) = compile_schema(schema) {
                errors.extend(err.field_errors().iter().cloned());
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::validation(
            "Invalid question definition",
            errors,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OptionInput, OptionTranslation, QuestionTranslation, QuestionType};
    use serde_json::json;

    fn label(language: Language) -> QuestionTranslation {
        QuestionTranslation {
            language,
            label: "Label".to_string(),
            help_text: None,
        }
    }

    fn option(position: i32) -> OptionInput {
        OptionInput {
            position,
            translations: vec![OptionTranslation {
                language: Language::En,
                label: format!("Option {}", position),
            }],
        }
    }

    fn input(question_type: QuestionType, options: Vec<OptionInput>) -> QuestionInput {
        QuestionInput {
            question_type,
            position: 1,
            is_required: false,
            json_schema: None,
            translations: vec![label(Language::En)],
            options,
        }
    }

    #[test]
    fn test_choice_question_with_contiguous_options_passes() {
        let q = input(
            QuestionType::MultiSelect,
            vec![option(2), option(1), option(3)],
        );
        assert!(validate_question_input(&q, Language::En).is_ok());
    }

    #[test]
    fn test_option_order_with_gap_fails() {
        let q = input(QuestionType::SingleSelect, vec![option(1), option(3)]);
        let err = validate_question_input(&q, Language::En).unwrap_err();
        assert!(err.field_errors().iter().any(|e| e.field == "options"));
    }

    #[test]
    fn test_option_order_with_duplicates_fails() {
        let q = input(QuestionType::SingleSelect, vec![option(1), option(1)]);
        assert!(validate_question_input(&q, Language::En).is_err());
    }

    #[test]
    fn test_choice_question_needs_options() {
        let q = input(QuestionType::SingleSelect, vec![]);
        assert!(validate_question_input(&q, Language::En).is_err());
    }

    #[test]
    fn test_basic_question_rejects_options() {
        let q = input(QuestionType::String, vec![option(1)]);
        assert!(validate_question_input(&q, Language::En).is_err());
    }

    #[test]
    fn test_schema_must_compile() {
        let mut q = input(QuestionType::Number, vec![]);
        q.json_schema = Some(json!({"type": "integer", "minimum": 0}));
        assert!(validate_question_input(&q, Language::En).is_ok());
        q.json_schema = Some(json!({"type": 12}));
        assert!(validate_question_input(&q, Language::En).is_err());
    }

    #[test]
    fn test_duplicate_translation_language_fails() {
        let mut q = input(QuestionType::String, vec![]);
        q.translations.push(label(Language::En));
        assert!(validate_question_input(&q, Language::En).is_err());
    }
}
