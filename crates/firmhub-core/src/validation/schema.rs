//! JSON Schema support for basic questions.
//!
//! Schemas are stored with the question and compiled when an answer is checked.
//! Remote `$ref`s are never fetched.

use jsonschema::{Retrieve, Uri, Validator};
use serde_json::Value;

use crate::error::AppError;

/// Refuses to resolve any external reference.
struct NoRemoteRefs;

impl Retrieve for NoRemoteRefs {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        Err(format!("external schema reference not allowed: {}", uri.as_str()).into())
    }
}

/// Compile a question schema, rejecting documents that are not valid JSON Schema.
pub fn compile_schema(schema: &Value) -> Result<Validator, AppError> {
    if !schema.is_object() && !schema.is_boolean() {
        return Err(AppError::field(
            "json_schema",
            "JSON Schema must be an object",
        ));
    }
    let mut opts = jsonschema::options();
    opts.with_retriever(NoRemoteRefs);
    opts.build(schema)
        .map_err(|e| AppError::field("json_schema", format!("Invalid JSON Schema: {}", e)))
}

/// Check `instance` against `schema`; returns one message per violation.
pub fn schema_violations(schema: &Value, instance: &Value) -> Result<Vec<String>, AppError> {
    let validator = compile_schema(schema)?;
    Ok(validator
        .iter_errors(instance)
        .map(|e| {
            let path = e.instance_path.to_string();
            if path.is_empty() {
                e.to_string()
            } else {
                format!("{}: {}", path, e)
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_instance_has_no_violations() {
        let schema = json!({"type": "number", "minimum": 1, "maximum": 500});
        assert!(schema_violations(&schema, &json!(42)).unwrap().is_empty());
    }

    #[test]
    fn test_violations_are_reported() {
        let schema = json!({"type": "string", "maxLength": 3});
        let violations = schema_violations(&schema, &json!("too long")).unwrap();
        assert_eq!(violations.len(), 1);
    }

    #[test]
    fn test_invalid_schema_is_rejected() {
        let schema = json!({"type": "no-such-type"});
        let err = compile_schema(&schema).unwrap_err();
        assert_eq!(err.field_errors()[0].field, "json_schema");
    }

    #[test]
    fn test_non_object_schema_is_rejected() {
        assert!(compile_schema(&json!("string")).is_err());
    }

    #[test]
    fn test_remote_refs_are_not_fetched() {
        let schema = json!({"$ref": "https://example.com/schema.json"});
        assert!(compile_schema(&schema).is_err());
    }
}
