//! Profanity detection
//!
//! Text is lowercased, Latin diacritics are folded (`é` → `e`, `ß` → `ss`), common
//! character substitutions are undone (`4` → `a`, `$` → `s`, ...) and the result is split
//! into words. Terms go through the same folding. A word matches when it equals a listed
//! term or a listed term followed by a common inflection suffix.

use std::collections::HashSet;

use crate::error::{AppError, FieldError};
use crate::i18n::{translate, Language, MessageKey};

const BUILTIN_TERMS: &[&str] = &[
    // en
    "asshole", "bastard", "bitch", "bullshit", "cunt", "dickhead", "fuck", "motherfucker",
    "shit", "slut", "whore", "wanker",
    // fr
    "bordel", "connard", "connasse", "enculé", "merde", "pute", "putain", "salope",
    // de
    "arschloch", "fotze", "hurensohn", "scheiße", "schlampe", "wichser",
];

const SUFFIXES: &[&str] = &["s", "es", "ed", "er", "ers", "ing", "in", "y", "e", "en"];

#[derive(Debug, Clone)]
pub struct ProfanityFilter {
    terms: HashSet<String>,
}

impl Default for ProfanityFilter {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl ProfanityFilter {
    /// Built-in multilingual list plus `extra_terms` (case-insensitive).
    pub fn new(extra_terms: &[String]) -> Self {
        let terms = BUILTIN_TERMS
            .iter()
            .map(|t| Self::normalize(t))
            .chain(extra_terms.iter().map(|t| Self::normalize(t.trim())))
            .filter(|t| !t.is_empty())
            .collect();
        Self { terms }
    }

    fn normalize(text: &str) -> String {
        let mut normalized = String::with_capacity(text.len());
        for c in text.chars().flat_map(char::to_lowercase) {
            match c {
                '0' => normalized.push('o'),
                '1' | '!' | '|' => normalized.push('i'),
                '3' => normalized.push('e'),
                '4' | '@' => normalized.push('a'),
                '5' | '$' => normalized.push('s'),
                '7' => normalized.push('t'),
                other => fold_diacritic(other, &mut normalized),
            }
        }
        normalized
    }

    fn word_matches(&self, word: &str) -> bool {
        if self.terms.contains(word) {
            return true;
        }
        SUFFIXES.iter().any(|suffix| {
            word.strip_suffix(suffix)
                .is_some_and(|stem| stem.chars().count() >= 3 && self.terms.contains(stem))
        })
    }

    /// Listed terms found in `text`, in order of first appearance.
    pub fn find(&self, text: &str) -> Vec<String> {
        let normalized = Self::normalize(text);
        let mut found: Vec<String> = Vec::new();
        for word in normalized
            .split(|c: char| !c.is_alphabetic())
            .filter(|w| !w.is_empty())
        {
            if self.word_matches(word) && !found.iter().any(|f| f == word) {
                found.push(word.to_string());
            }
        }
        found
    }

    pub fn contains_profanity(&self, text: &str) -> bool {
        !self.find(text).is_empty()
    }

    /// Check named text fields; every offending field gets a localized message.
    /// The offending text itself is never echoed back.
    pub fn check_fields(&self, fields: &[(&str, &str)], lang: Language) -> Result<(), AppError> {
        let message = translate(MessageKey::ProfanityDetected, lang, &[]);
        let errors: Vec<FieldError> = fields
            .iter()
            .filter(|(_, text)| self.contains_profanity(text))
            .map(|(field, _)| FieldError::new(*field, message.clone()))
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation(message, errors))
        }
    }
}

/// Push `c` without its accent; letters outside Latin-1 and Latin Extended-A pass through.
fn fold_diacritic(c: char, out: &mut String) {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'ç' | 'ć' | 'č' => "c",
        'ď' | 'đ' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => "e",
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'į' | 'ı' => "i",
        'ł' | 'ľ' => "l",
        'ñ' | 'ń' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => "o",
        'ŕ' | 'ř' => "r",
        'ś' | 'š' | 'ş' => "s",
        'ť' | 'ţ' => "t",
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' | 'ų' => "u",
        'ý' | 'ÿ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        'ß' => "ss",
        'æ' => "ae",
        'œ' => "oe",
        other => {
            out.push(other);
            return;
        }
    };
    out.push_str(folded);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_passes() {
        let filter = ProfanityFilter::default();
        assert!(!filter.contains_profanity("We provide accounting services in Geneva."));
        assert!(!filter.contains_profanity("Shitake mushrooms and Dickens novels"));
    }

    #[test]
    fn test_detects_listed_terms_case_insensitively() {
        let filter = ProfanityFilter::default();
        assert!(filter.contains_profanity("This is SHIT"));
        assert!(filter.contains_profanity("quelle merde"));
        assert!(filter.contains_profanity("So ein Arschloch"));
    }

    #[test]
    fn test_detects_substitutions_and_inflections() {
        let filter = ProfanityFilter::default();
        assert!(filter.contains_profanity("sh1t happens"));
        assert!(filter.contains_profanity("fucking"));
        assert!(filter.contains_profanity("bitches"));
    }

    #[test]
    fn test_accents_are_ignored() {
        let filter = ProfanityFilter::default();
        for text in ["espèce d'enculé", "ENCULÉ", "encule", "Scheiße", "SCHEISSE", "cönnârd"] {
            assert!(filter.contains_profanity(text), "{}", text);
        }
        assert!(!filter.contains_profanity("Café crème à Genève"));

        let custom = ProfanityFilter::new(&["Arnaqué".to_string()]);
        assert!(custom.contains_profanity("une arnaque"));
        assert!(custom.contains_profanity("une ARNAQUÉ"));
    }

    #[test]
    fn test_extra_terms_are_applied() {
        let filter = ProfanityFilter::new(&["Scam".to_string()]);
        assert!(filter.contains_profanity("not a scam"));
        assert!(!ProfanityFilter::default().contains_profanity("not a scam"));
    }

    #[test]
    fn test_check_fields_reports_each_field() {
        let filter = ProfanityFilter::default();
        let err = filter
            .check_fields(
                &[("name", "Clean Ltd"), ("description", "best shit in town")],
                Language::Fr,
            )
            .unwrap_err();
        assert_eq!(err.field_errors().len(), 1);
        assert_eq!(err.field_errors()[0].field, "description");
        assert_eq!(err.field_errors()[0].message, "Contient un langage inapproprié");
    }
}
