//! Order lists for questions within a category and options within a question.
//!
//! A valid list is a permutation of `1..=n`: no duplicates, no gaps, starting at 1.

use std::collections::HashSet;

use uuid::Uuid;

use crate::error::{AppError, FieldError};
use crate::i18n::{translate, Language, MessageKey};
use crate::models::OrderItem;

/// Check that `positions` is a permutation of `1..=positions.len()`.
pub fn check_contiguous(positions: &[i32]) -> bool {
    let n = positions.len();
    let mut seen = vec![false; n];
    for &p in positions {
        if p < 1 || p as usize > n {
            return false;
        }
        let slot = &mut seen[p as usize - 1];
        if *slot {
            return false;
        }
        *slot = true;
    }
    true
}

/// Error reported on `field` when an order list is not contiguous.
pub fn order_error(field: &str, count: usize, lang: Language) -> AppError {
    let message = translate(
        MessageKey::OrderNotContiguous,
        lang,
        &[("count", &count.to_string())],
    );
    AppError::validation(message.clone(), vec![FieldError::new(field, message)])
}

/// Validate a reorder request against the ids that currently exist.
///
/// Every existing id must appear exactly once and the new positions must be contiguous.
pub fn validate_reorder(
    existing_ids: &[Uuid],
    items: &[OrderItem],
    lang: Language,
) -> Result<(), AppError> {
    let existing: HashSet<Uuid> = existing_ids.iter().copied().collect();
    let requested: HashSet<Uuid> = items.iter().map(|i| i.id).collect();

    if requested.len() != items.len() {
        return Err(AppError::field("items", "Each id may appear only once"));
    }
    if requested != existing {
        return Err(AppError::field(
            "items",
            "The order list must contain every item exactly once",
        ));
    }

    let positions: Vec<i32> = items.iter().map(|i| i.position).collect();
    if !check_contiguous(&positions) {
        return Err(order_error("items", positions.len(), lang));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contiguous_permutations_pass() {
        assert!(check_contiguous(&[]));
        assert!(check_contiguous(&[1]));
        assert!(check_contiguous(&[3, 1, 2]));
    }

    #[test]
    fn test_gaps_fail() {
        assert!(!check_contiguous(&[1, 3]));
        assert!(!check_contiguous(&[2, 3, 4]));
    }

    #[test]
    fn test_duplicates_fail() {
        assert!(!check_contiguous(&[1, 1, 2]));
    }

    #[test]
    fn test_zero_and_negative_fail() {
        assert!(!check_contiguous(&[0, 1]));
        assert!(!check_contiguous(&[-1, 1]));
    }

    #[test]
    fn test_reorder_requires_exact_id_set() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let items = vec![OrderItem { id: a, position: 1 }];
        assert!(validate_reorder(&[a, b], &items, Language::En).is_err());

        let items = vec![
            OrderItem { id: a, position: 2 },
            OrderItem { id: b, position: 1 },
        ];
        assert!(validate_reorder(&[a, b], &items, Language::En).is_ok());
    }

    #[test]
    fn test_reorder_with_gap_is_localized() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let items = vec![
            OrderItem { id: a, position: 1 },
            OrderItem { id: b, position: 3 },
        ];
        let err = validate_reorder(&[a, b], &items, Language::Fr).unwrap_err();
        assert_eq!(err.field_errors()[0].field, "items");
        assert!(err.field_errors()[0].message.contains("1 à 2"));
    }

    #[test]
    fn test_reorder_rejects_repeated_ids() {
        let a = Uuid::new_v4();
        let items = vec![
            OrderItem { id: a, position: 1 },
            OrderItem { id: a, position: 2 },
        ];
        assert!(validate_reorder(&[a], &items, Language::En).is_err());
    }
}
