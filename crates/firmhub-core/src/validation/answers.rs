//! Answer validation engine
//!
//! A submission batch is checked against the question definitions of its category.
//! Every answer is checked and every failure is reported under `answers[i]`; a batch
//! with any failure is rejected as a whole so nothing is persisted.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate};
use serde_json::Value;
use uuid::Uuid;

use crate::constants::MAX_ANSWERS_PER_BATCH;
use crate::error::{AppError, FieldError};
use crate::i18n::{translate, Language, MessageKey};
use crate::models::{
    AnswerContent, AnswerInput, QuestionDefinition, QuestionType, ValidatedAnswer,
};
use crate::validation::schema::schema_violations;

/// Validate a batch of answers against the questions of one category.
pub fn validate_answers(
    questions: &[QuestionDefinition],
    answers: &[AnswerInput],
    lang: Language,
) -> Result<Vec<ValidatedAnswer>, AppError> {
    if answers.len() > MAX_ANSWERS_PER_BATCH {
        return Err(AppError::field(
            "answers",
            format!("At most {} answers per submission", MAX_ANSWERS_PER_BATCH),
        ));
    }

    let by_id: HashMap<Uuid, &QuestionDefinition> =
        questions.iter().map(|q| (q.question.id, q)).collect();

    let mut seen = HashSet::new();
    let mut validated = Vec::with_capacity(answers.len());
    let mut errors = Vec::new();

    for (index, answer) in answers.iter().enumerate() {
        let field = format!("answers[{}]", index);
        let question_id = answer.question_id();

        if !seen.insert(question_id) {
            errors.push(FieldError::new(
                field,
                translate(
                    MessageKey::DuplicateQuestion,
                    lang,
                    &[("question_id", &question_id.to_string())],
                ),
            ));
            continue;
        }

        let Some(definition) = by_id.get(&question_id) else {
            errors.push(FieldError::new(
                field,
                translate(
                    MessageKey::QuestionNotFound,
                    lang,
                    &[("question_id", &question_id.to_string())],
                ),
            ));
            continue;
        };

        match validate_one(definition, answer, lang) {
            Ok(content) => validated.push(ValidatedAnswer {
                question_id,
                content,
            }),
            Err(messages) => {
                errors.extend(messages.into_iter().map(|m| FieldError::new(field.clone(), m)))
            }
        }
    }

    if errors.is_empty() {
        Ok(validated)
    } else {
        Err(AppError::validation(
            translate(MessageKey::AnswersInvalid, lang, &[]),
            errors,
        ))
    }
}

/// Required questions of `questions` that have no entry in `answered`.
pub fn missing_required_questions(
    questions: &[QuestionDefinition],
    answered: &HashSet<Uuid>,
) -> Vec<Uuid> {
    let mut missing: Vec<&QuestionDefinition> = questions
        .iter()
        .filter(|q| q.question.is_required && !answered.contains(&q.question.id))
        .collect();
    missing.sort_by_key(|q| q.question.position);
    missing.into_iter().map(|q| q.question.id).collect()
}

fn wrong_kind(answer: &AnswerInput, question_type: QuestionType, lang: Language) -> Vec<String> {
    vec![translate(
        MessageKey::WrongAnswerKind,
        lang,
        &[
            ("kind", answer.kind()),
            ("question_type", &question_type.to_string()),
        ],
    )]
}

fn validate_one(
    definition: &QuestionDefinition,
    answer: &AnswerInput,
    lang: Language,
) -> Result<AnswerContent, Vec<String>> {
    let question_type = definition.question.question_type;

    match answer {
        AnswerInput::Basic { value, .. } => {
            if question_type.is_choice() {
                return Err(wrong_kind(answer, question_type, lang));
            }
            let content = check_basic_type(question_type, value, lang)?;
            if let Some(schema) = &definition.question.json_schema {
                check_schema(schema, &content, lang)?;
            }
            Ok(content)
        }
        AnswerInput::SingleChoice { option_id, .. } => {
            if question_type != QuestionType::SingleSelect {
                return Err(wrong_kind(answer, question_type, lang));
            }
            if !definition.has_option(*option_id) {
                return Err(vec![option_not_in_question(*option_id, lang)]);
            }
            Ok(AnswerContent::Options(vec![*option_id]))
        }
        AnswerInput::MultiChoice { option_ids, .. } => {
            if question_type != QuestionType::MultiSelect {
                return Err(wrong_kind(answer, question_type, lang));
            }
            if option_ids.is_empty() {
                return Err(vec![translate(MessageKey::EmptySelection, lang, &[])]);
            }

            let mut errors = Vec::new();
            let mut seen = HashSet::new();
            for option_id in option_ids {
                if !seen.insert(*option_id) {
                    errors.push(translate(
                        MessageKey::DuplicateSelection,
                        lang,
                        &[("option_id", &option_id.to_string())],
                    ));
                } else if !definition.has_option(*option_id) {
                    errors.push(option_not_in_question(*option_id, lang));
                }
            }

            if errors.is_empty() {
                Ok(AnswerContent::Options(option_ids.clone()))
            } else {
                Err(errors)
            }
        }
    }
}

fn option_not_in_question(option_id: Uuid, lang: Language) -> String {
    translate(
        MessageKey::OptionNotInQuestion,
        lang,
        &[("option_id", &option_id.to_string())],
    )
}

fn type_mismatch(expected: &str, lang: Language) -> Vec<String> {
    vec![translate(
        MessageKey::TypeMismatch,
        lang,
        &[("expected", expected)],
    )]
}

fn is_date(s: &str) -> bool {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() || DateTime::parse_from_rfc3339(s).is_ok()
}

/// Check the runtime JSON type of a basic answer against the declared question type.
fn check_basic_type(
    question_type: QuestionType,
    value: &Value,
    lang: Language,
) -> Result<AnswerContent, Vec<String>> {
    match question_type {
        QuestionType::String => match value {
            Value::String(_) => Ok(AnswerContent::Value(value.clone())),
            _ => Err(type_mismatch("string", lang)),
        },
        QuestionType::Number => match value {
            Value::Number(_) => Ok(AnswerContent::Value(value.clone())),
            _ => Err(type_mismatch("number", lang)),
        },
        QuestionType::Date => match value {
            Value::String(s) if is_date(s) => Ok(AnswerContent::Value(value.clone())),
            Value::String(_) => Err(vec![translate(MessageKey::InvalidDate, lang, &[])]),
            _ => Err(type_mismatch("date", lang)),
        },
        QuestionType::Text => match value {
            Value::String(_) => Ok(AnswerContent::Value(value.clone())),
            Value::Object(map) if !map.is_empty() => {
                let mut translations = Vec::with_capacity(map.len());
                for (code, text) in map {
                    let (Some(language), Some(text)) = (Language::from_code(code), text.as_str())
                    else {
                        return Err(type_mismatch("text", lang));
                    };
                    translations.push((language, text.to_string()));
                }
                Ok(AnswerContent::Translated(translations))
            }
            _ => Err(type_mismatch("text", lang)),
        },
        QuestionType::SingleSelect | QuestionType::MultiSelect => {
            Err(type_mismatch(&question_type.to_string(), lang))
        }
    }
}

/// Apply the question schema. Per-language text is checked one translation at a time.
fn check_schema(
    schema: &Value,
    content: &AnswerContent,
    lang: Language,
) -> Result<(), Vec<String>> {
    let instances: Vec<Value> = match content {
        AnswerContent::Value(v) => vec![v.clone()],
        AnswerContent::Translated(items) => items
            .iter()
            .map(|(_, text)| Value::String(text.clone()))
            .collect(),
        AnswerContent::Options(_) => return Ok(()),
    };

    let mut errors = Vec::new();
    for instance in &instances {
        let violations = schema_violations(schema, instance).map_err(|e| vec![e.to_string()])?;
        errors.extend(violations.into_iter().map(|detail| {
            translate(MessageKey::SchemaViolation, lang, &[("detail", &detail)])
        }));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorMetadata;
    use crate::models::{OptionDefinition, Question, QuestionOption};
    use chrono::Utc;
    use serde_json::json;

    fn question(question_type: QuestionType, schema: Option<Value>) -> QuestionDefinition {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let options = if question_type.is_choice() {
            (1..=3)
                .map(|position| OptionDefinition {
                    option: QuestionOption {
                        id: Uuid::new_v4(),
                        question_id: id,
                        position,
                    },
                    translations: vec![],
                })
                .collect()
        } else {
            vec![]
        };
        QuestionDefinition {
            question: Question {
                id,
                category_id: Uuid::new_v4(),
                question_type,
                position: 1,
                is_required: true,
                json_schema: schema,
                created_at: now,
                updated_at: now,
            },
            translations: vec![],
            options,
        }
    }

    fn basic(q: &QuestionDefinition, value: Value) -> AnswerInput {
        AnswerInput::Basic {
            question_id: q.question.id,
            value,
        }
    }

    #[test]
    fn test_basic_types_accept_matching_values() {
        let qs = vec![
            question(QuestionType::String, None),
            question(QuestionType::Number, None),
            question(QuestionType::Date, None),
            question(QuestionType::Text, None),
        ];
        let answers = vec![
            basic(&qs[0], json!("ACME")),
            basic(&qs[1], json!(12.5)),
            basic(&qs[2], json!("2024-02-29")),
            basic(&qs[3], json!({"en": "Hello", "fr": "Bonjour"})),
        ];
        let validated = validate_answers(&qs, &answers, Language::En).unwrap();
        assert_eq!(validated.len(), 4);
        assert!(matches!(validated[3].content, AnswerContent::Translated(ref t) if t.len() == 2));
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let qs = vec![question(QuestionType::Number, None)];
        let err = validate_answers(&qs, &[basic(&qs[0], json!("12"))], Language::En).unwrap_err();
        assert_eq!(err.field_errors()[0].field, "answers[0]");
        assert!(err.field_errors()[0].message.contains("number"));
    }

    #[test]
    fn test_invalid_date_is_rejected() {
        let qs = vec![question(QuestionType::Date, None)];
        assert!(validate_answers(&qs, &[basic(&qs[0], json!("2023-02-30"))], Language::En).is_err());
        assert!(
            validate_answers(&qs, &[basic(&qs[0], json!("2023-02-03T10:00:00Z"))], Language::En)
                .is_ok()
        );
    }

    #[test]
    fn test_text_with_unknown_language_is_rejected() {
        let qs = vec![question(QuestionType::Text, None)];
        let answers = [basic(&qs[0], json!({"xx": "?"}))];
        assert!(validate_answers(&qs, &answers, Language::En).is_err());
    }

    #[test]
    fn test_schema_is_enforced() {
        let qs = vec![question(
            QuestionType::Number,
            Some(json!({"type": "integer", "minimum": 1, "maximum": 10})),
        )];
        assert!(validate_answers(&qs, &[basic(&qs[0], json!(5))], Language::En).is_ok());
        let err = validate_answers(&qs, &[basic(&qs[0], json!(50))], Language::En).unwrap_err();
        assert_eq!(err.field_errors().len(), 1);
    }

    #[test]
    fn test_schema_applies_to_each_translation() {
        let qs = vec![question(
            QuestionType::Text,
            Some(json!({"type": "string", "maxLength": 5})),
        )];
        let answers = [basic(&qs[0], json!({"en": "short", "de": "viel zu lang"}))];
        let err = validate_answers(&qs, &answers, Language::En).unwrap_err();
        assert_eq!(err.field_errors().len(), 1);
    }

    #[test]
    fn test_single_choice_requires_member_option() {
        let qs = vec![question(QuestionType::SingleSelect, None)];
        let ok = AnswerInput::SingleChoice {
            question_id: qs[0].question.id,
            option_id: qs[0].options[1].option.id,
        };
        assert!(validate_answers(&qs, &[ok], Language::En).is_ok());

        let foreign = AnswerInput::SingleChoice {
            question_id: qs[0].question.id,
            option_id: Uuid::new_v4(),
        };
        assert!(validate_answers(&qs, &[foreign], Language::En).is_err());
    }

    #[test]
    fn test_multi_choice_with_foreign_option_is_rejected() {
        let qs = vec![
            question(QuestionType::MultiSelect, None),
            question(QuestionType::MultiSelect, None),
        ];
        // option of the second question submitted for the first
        let answer = AnswerInput::MultiChoice {
            question_id: qs[0].question.id,
            option_ids: vec![qs[0].options[0].option.id, qs[1].options[0].option.id],
        };
        let err = validate_answers(&qs, &[answer], Language::En).unwrap_err();
        assert_eq!(err.http_status_code(), 400);
        assert_eq!(err.field_errors().len(), 1);
    }

    #[test]
    fn test_multi_choice_must_be_non_empty_and_unique() {
        let qs = vec![question(QuestionType::MultiSelect, None)];
        let empty = AnswerInput::MultiChoice {
            question_id: qs[0].question.id,
            option_ids: vec![],
        };
        assert!(validate_answers(&qs, &[empty], Language::En).is_err());

        let dup = AnswerInput::MultiChoice {
            question_id: qs[0].question.id,
            option_ids: vec![qs[0].options[0].option.id, qs[0].options[0].option.id],
        };
        assert!(validate_answers(&qs, &[dup], Language::En).is_err());
    }

    #[test]
    fn test_kind_must_match_question_type() {
        let qs = vec![
            question(QuestionType::SingleSelect, None),
            question(QuestionType::String, None),
        ];
        let basic_for_choice = basic(&qs[0], json!("x"));
        let multi_for_single = AnswerInput::MultiChoice {
            question_id: qs[0].question.id,
            option_ids: vec![qs[0].options[0].option.id],
        };
        let single_for_string = AnswerInput::SingleChoice {
            question_id: qs[1].question.id,
            option_id: Uuid::new_v4(),
        };
        for answer in [basic_for_choice, multi_for_single, single_for_string] {
            assert!(validate_answers(&qs, &[answer], Language::En).is_err());
        }
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let qs = vec![
            question(QuestionType::String, None),
            question(QuestionType::Number, None),
        ];
        let answers = vec![basic(&qs[0], json!("fine")), basic(&qs[1], json!(true))];
        let err = validate_answers(&qs, &answers, Language::En).unwrap_err();
        assert_eq!(err.field_errors().len(), 1);
        assert_eq!(err.field_errors()[0].field, "answers[1]");
    }

    #[test]
    fn test_unknown_and_duplicate_questions_are_rejected() {
        let qs = vec![question(QuestionType::String, None)];
        let other = question(QuestionType::String, None);
        let answers = vec![
            basic(&qs[0], json!("a")),
            basic(&qs[0], json!("b")),
            basic(&other, json!("c")),
        ];
        let err = validate_answers(&qs, &answers, Language::En).unwrap_err();
        let fields: Vec<&str> = err.field_errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["answers[1]", "answers[2]"]);
    }

    #[test]
    fn test_messages_are_localized() {
        let qs = vec![question(QuestionType::MultiSelect, None)];
        let empty = AnswerInput::MultiChoice {
            question_id: qs[0].question.id,
            option_ids: vec![],
        };
        let err = validate_answers(&qs, &[empty], Language::De).unwrap_err();
        assert_eq!(err.field_errors()[0].message, "Wählen Sie mindestens eine Option");
    }

    #[test]
    fn test_missing_required_questions() {
        let mut optional = question(QuestionType::String, None);
        optional.question.is_required = false;
        let required = question(QuestionType::String, None);
        let qs = vec![optional, required.clone()];
        let missing = missing_required_questions(&qs, &HashSet::new());
        assert_eq!(missing, vec![required.question.id]);

        let answered: HashSet<Uuid> = [required.question.id].into_iter().collect();
        assert!(missing_required_questions(&qs, &answered).is_empty());
    }
}
