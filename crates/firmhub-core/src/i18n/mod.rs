//! Request language and localized messages
//!
//! Every request carries one resolved [`Language`]. Validation and moderation
//! failures are reported through [`MessageKey`]s which are rendered in that language.

mod catalog;

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use utoipa::ToSchema;

pub use catalog::MessageKey;

/// Languages the marketplace publishes content in.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "text", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Fr,
    De,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::En, Language::Fr, Language::De];

    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Fr => "fr",
            Language::De => "de",
        }
    }

    /// Parse a language code or a full tag (`fr-CH` resolves to `fr`).
    pub fn from_code(code: &str) -> Option<Self> {
        let primary = code
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_lowercase();
        match primary.as_str() {
            "en" => Some(Language::En),
            "fr" => Some(Language::Fr),
            "de" => Some(Language::De),
            _ => None,
        }
    }

    /// Resolve an `Accept-Language` header value.
    ///
    /// Entries are ranked by their `q` weight (default 1.0); ties keep header order.
    /// Entries with `q=0` are ignored. Returns `None` when nothing is supported.
    pub fn from_accept_language(header: &str) -> Option<Self> {
        let mut candidates: Vec<(f32, usize, Language)> = header
            .split(',')
            .enumerate()
            .filter_map(|(idx, part)| {
                let mut pieces = part.split(';');
                let tag = pieces.next()?.trim();
                let weight = pieces
                    .find_map(|p| p.trim().strip_prefix("q="))
                    .and_then(|q| q.trim().parse::<f32>().ok())
                    .unwrap_or(1.0);
                if weight <= 0.0 {
                    return None;
                }
                Language::from_code(tag).map(|lang| (weight, idx, lang))
            })
            .collect();

        candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        candidates.first().map(|(_, _, lang)| *lang)
    }

    /// Resolution order: explicit query parameter, then `Accept-Language`, then default.
    pub fn negotiate(query: Option<&str>, accept_language: Option<&str>, default: Self) -> Self {
        query
            .and_then(Language::from_code)
            .or_else(|| accept_language.and_then(Language::from_accept_language))
            .unwrap_or(default)
    }
}

impl Display for Language {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.code())
    }
}

impl std::str::FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::from_code(s).ok_or_else(|| anyhow::anyhow!("Unsupported language: {}", s))
    }
}

/// Render a message in `lang`, substituting `{name}` placeholders from `args`.
pub fn translate(key: MessageKey, lang: Language, args: &[(&str, &str)]) -> String {
    let mut text = key.template(lang).to_string();
    for (name, value) in args {
        text = text.replace(&format!("{{{}}}", name), value);
    }
    text
}

/// Pick the translation for `lang` from a set of per-language values, falling back
/// to `fallback` and then to any available entry.
pub fn pick_translation<'a, T, F>(
    items: &'a [T],
    lang: Language,
    fallback: Language,
    lang_of: F,
) -> Option<&'a T>
where
    F: Fn(&T) -> Language,
{
    items
        .iter()
        .find(|t| lang_of(t) == lang)
        .or_else(|| items.iter().find(|t| lang_of(t) == fallback))
        .or_else(|| items.first())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code_accepts_region_tags() {
        assert_eq!(Language::from_code("fr-CH"), Some(Language::Fr));
        assert_eq!(Language::from_code("DE"), Some(Language::De));
        assert_eq!(Language::from_code("en_US"), Some(Language::En));
        assert_eq!(Language::from_code("es"), None);
    }

    #[test]
    fn test_accept_language_ranks_by_weight() {
        let lang = Language::from_accept_language("es;q=1.0, en;q=0.5, de;q=0.8");
        assert_eq!(lang, Some(Language::De));
    }

    #[test]
    fn test_accept_language_keeps_header_order_on_ties() {
        assert_eq!(
            Language::from_accept_language("fr, de"),
            Some(Language::Fr)
        );
    }

    #[test]
    fn test_accept_language_ignores_zero_weight() {
        assert_eq!(Language::from_accept_language("fr;q=0, it"), None);
    }

    #[test]
    fn test_negotiate_prefers_query_then_header_then_default() {
        assert_eq!(
            Language::negotiate(Some("de"), Some("fr"), Language::En),
            Language::De
        );
        assert_eq!(
            Language::negotiate(Some("xx"), Some("fr"), Language::En),
            Language::Fr
        );
        assert_eq!(Language::negotiate(None, None, Language::Fr), Language::Fr);
    }

    #[test]
    fn test_translate_substitutes_arguments() {
        let msg = translate(
            MessageKey::TypeMismatch,
            Language::En,
            &[("expected", "number")],
        );
        assert!(msg.contains("number"));
        assert!(!msg.contains('{'));
    }

    #[test]
    fn test_pick_translation_falls_back() {
        let items = vec![(Language::De, "Hallo"), (Language::En, "Hello")];
        let picked = pick_translation(&items, Language::Fr, Language::En, |t| t.0);
        assert_eq!(picked.map(|t| t.1), Some("Hello"));
        let picked = pick_translation(&items, Language::De, Language::En, |t| t.0);
        assert_eq!(picked.map(|t| t.1), Some("Hallo"));
    }
}
