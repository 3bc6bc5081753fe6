use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::i18n::{pick_translation, Language};

/// Name and description of a taxonomy node in one language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, Validate)]
pub struct TaxonomyTranslation {
    pub language: Language,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

/// Translations are stored as one JSONB column per node.
#[cfg(feature = "sqlx")]
pub type Translations = sqlx::types::Json<Vec<TaxonomyTranslation>>;

#[cfg(not(feature = "sqlx"))]
pub type Translations = Vec<TaxonomyTranslation>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Cluster {
    pub id: Uuid,
    pub slug: String,
    pub position: i32,
    pub translations: Translations,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Category {
    pub id: Uuid,
    pub cluster_id: Uuid,
    pub slug: String,
    pub position: i32,
    pub translations: Translations,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Service {
    pub id: Uuid,
    pub category_id: Uuid,
    pub slug: String,
    pub translations: Translations,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A taxonomy node rendered in the request language.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LocalizedNode {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub slug: String,
    pub position: i32,
    pub language: Language,
    pub name: String,
    pub description: Option<String>,
}

impl LocalizedNode {
    pub fn build(
        id: Uuid,
        parent_id: Option<Uuid>,
        slug: &str,
        position: i32,
        translations: &[TaxonomyTranslation],
        lang: Language,
        fallback: Language,
    ) -> Self {
        let picked = pick_translation(translations, lang, fallback, |t| t.language);
        LocalizedNode {
            id,
            parent_id,
            slug: slug.to_string(),
            position,
            language: picked.map(|t| t.language).unwrap_or(lang),
            name: picked.map(|t| t.name.clone()).unwrap_or_else(|| slug.to_string()),
            description: picked.and_then(|t| t.description.clone()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct UpsertTaxonomyRequest {
    /// Required for categories (cluster) and services (category).
    pub parent_id: Option<Uuid>,
    #[validate(length(min = 1, max = 100))]
    pub slug: String,
    #[serde(default)]
    pub position: i32,
    #[validate(length(min = 1, message = "At least one translation is required"), nested)]
    pub translations: Vec<TaxonomyTranslation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translations() -> Vec<TaxonomyTranslation> {
        vec![
            TaxonomyTranslation {
                language: Language::En,
                name: "Accounting".to_string(),
                description: None,
            },
            TaxonomyTranslation {
                language: Language::Fr,
                name: "Comptabilité".to_string(),
                description: Some("Services comptables".to_string()),
            },
        ]
    }

    #[test]
    fn test_localized_node_uses_requested_language() {
        let node = LocalizedNode::build(
            Uuid::new_v4(),
            None,
            "accounting",
            1,
            &translations(),
            Language::Fr,
            Language::En,
        );
        assert_eq!(node.name, "Comptabilité");
        assert_eq!(node.language, Language::Fr);
    }

    #[test]
    fn test_localized_node_falls_back_to_default_language() {
        let node = LocalizedNode::build(
            Uuid::new_v4(),
            None,
            "accounting",
            1,
            &translations(),
            Language::De,
            Language::En,
        );
        assert_eq!(node.name, "Accounting");
        assert_eq!(node.language, Language::En);
    }

    #[test]
    fn test_localized_node_without_translations_uses_slug() {
        let node = LocalizedNode::build(
            Uuid::new_v4(),
            None,
            "legal",
            2,
            &[],
            Language::De,
            Language::En,
        );
        assert_eq!(node.name, "legal");
    }
}
