use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub i64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An unclassified record as produced by a source adapter.
///
/// Amounts are signed: negative is a debit/expense, positive a
/// credit/income.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransaction {
    pub customer_id: String,
    pub description: String,
    pub amount: Decimal,
    pub timestamp: NaiveDateTime,
    /// Originating channel label (e.g. "WEB", "ATM"), distinct from the
    /// adapter that produced the record.
    pub source: String,
}

/// A raw transaction augmented with its resolved category, as persisted.
///
/// `id` is `None` until the record store assigns one on save. `category`
/// holds the category's display name. `category` and `source` are
/// optional because stored rows may predate either column; aggregation
/// excludes such rows from the affected grouping only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorizedTransaction {
    pub id: Option<TransactionId>,
    pub customer_id: String,
    pub amount: Decimal,
    pub timestamp: NaiveDateTime,
    pub description: String,
    pub category: Option<String>,
    pub source: Option<String>,
}

impl CategorizedTransaction {
    pub fn from_raw(raw: RawTransaction, category_display_name: String) -> Self {
        CategorizedTransaction {
            id: None,
            customer_id: raw.customer_id,
            amount: raw.amount,
            timestamp: raw.timestamp,
            description: raw.description,
            category: Some(category_display_name),
            source: Some(raw.source),
        }
    }
}
