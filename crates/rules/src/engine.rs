use std::sync::Arc;

use rust_decimal::Decimal;

use crate::category::{Category, FALLBACK_CATEGORY};
use crate::store::{CategoryStore, RuleError};

/// Deterministic mapping from `(description, amount)` to a category.
///
/// A thin wrapper over the rule store's snapshot: matching itself is the
/// pure [`match_category`] scan, plus fallback resolution. No I/O
/// happens during a match.
pub struct Categorizer {
    store: Arc<CategoryStore>,
}

impl Categorizer {
    pub fn new(store: Arc<CategoryStore>) -> Self {
        Categorizer { store }
    }

    /// Returns the first matching category in snapshot order, or the
    /// fallback. A missing fallback is a configuration error and
    /// surfaces as [`RuleError::RuleNotFound`].
    pub fn categorize(&self, description: &str, amount: Decimal) -> Result<Category, RuleError> {
        let categories = self.store.categories();
        if let Some(category) = match_category(&categories, description, amount) {
            return Ok(category.clone());
        }
        self.store.by_name(FALLBACK_CATEGORY)
    }
}

/// Scans `categories` in order for the first keyword match, skipping the
/// fallback category.
///
/// The description is lower-cased once. A keyword hit on a category with
/// `requires_positive_amount` only counts when the amount is strictly
/// positive; otherwise the scan continues with later categories. An
/// empty description never matches.
pub fn match_category<'a>(
    categories: &'a [Category],
    description: &str,
    amount: Decimal,
) -> Option<&'a Category> {
    if description.is_empty() {
        return None;
    }
    let lower = description.to_lowercase();
    categories
        .iter()
        .filter(|c| c.name != FALLBACK_CATEGORY)
        .find(|c| c.matches(&lower) && (!c.requires_positive_amount || amount > Decimal::ZERO))
}
