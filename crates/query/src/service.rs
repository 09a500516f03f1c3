use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use spendlens_core::{CategorizedTransaction, DateRange, TransactionId};
use spendlens_storage::{StoreError, TransactionStore};

/// Minimum length of a search query after trimming.
const MIN_SEARCH_LEN: usize = 2;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("no records found for customer {0}")]
    CustomerNotFound(String),
    #[error("transaction {id} was not found for customer {customer_id}")]
    TransactionNotFound {
        customer_id: String,
        id: TransactionId,
    },
    #[error("invalid date range: {0}")]
    InvalidDateRange(&'static str),
    #[error("search query must be at least 2 characters after trimming")]
    InvalidSearchQuery,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Read-side queries over persisted categorized transactions, scoped to
/// one customer.
///
/// Every operation first verifies the customer has at least one record;
/// the store is append-only, so concurrent ingestion between that check
/// and the query can only add rows.
pub struct AggregationService {
    store: Arc<dyn TransactionStore>,
}

impl AggregationService {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        AggregationService { store }
    }

    /// All records for the customer, newest first.
    pub fn get_all_transactions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<CategorizedTransaction>, QueryError> {
        self.require_customer(customer_id)?;
        Ok(self.store.find_by_customer(customer_id)?)
    }

    /// Sum of absolute amounts per category display name. Records
    /// without a category are excluded from this grouping only.
    pub fn get_totals_by_category(
        &self,
        customer_id: &str,
    ) -> Result<BTreeMap<String, Decimal>, QueryError> {
        self.totals_by(customer_id, |tx| tx.category.as_deref())
    }

    /// Sum of absolute amounts per source label. Records without a
    /// source are excluded from this grouping only.
    pub fn get_totals_by_source(
        &self,
        customer_id: &str,
    ) -> Result<BTreeMap<String, Decimal>, QueryError> {
        self.totals_by(customer_id, |tx| tx.source.as_deref())
    }

    /// Records with a timestamp between `start` at 00:00:00 and `end` at
    /// 23:59:59, inclusive, newest first.
    pub fn get_by_date_range(
        &self,
        customer_id: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<CategorizedTransaction>, QueryError> {
        let start = start.ok_or(QueryError::InvalidDateRange("start date is required"))?;
        let end = end.ok_or(QueryError::InvalidDateRange("end date is required"))?;
        if start > end {
            return Err(QueryError::InvalidDateRange("start date is after end date"));
        }
        self.require_customer(customer_id)?;

        let (start_dt, end_dt) = DateRange::new(start, end).datetime_bounds();
        Ok(self
            .store
            .find_by_customer_and_range(customer_id, start_dt, end_dt)?)
    }

    pub fn get_transaction_by_id(
        &self,
        customer_id: &str,
        id: TransactionId,
    ) -> Result<CategorizedTransaction, QueryError> {
        self.require_customer(customer_id)?;
        self.store
            .find_by_customer_and_id(customer_id, id)?
            .ok_or_else(|| QueryError::TransactionNotFound {
                customer_id: customer_id.to_string(),
                id,
            })
    }

    /// Case-insensitive substring search over description, category, and
    /// source.
    pub fn search_transactions(
        &self,
        customer_id: &str,
        query: &str,
    ) -> Result<Vec<CategorizedTransaction>, QueryError> {
        let query = query.trim();
        if query.chars().count() < MIN_SEARCH_LEN {
            return Err(QueryError::InvalidSearchQuery);
        }
        self.require_customer(customer_id)?;
        Ok(self.store.search(customer_id, query)?)
    }

    fn require_customer(&self, customer_id: &str) -> Result<(), QueryError> {
        if self.store.exists_for_customer(customer_id)? {
            Ok(())
        } else {
            Err(QueryError::CustomerNotFound(customer_id.to_string()))
        }
    }

    fn totals_by<F>(
        &self,
        customer_id: &str,
        key: F,
    ) -> Result<BTreeMap<String, Decimal>, QueryError>
    where
        F: Fn(&CategorizedTransaction) -> Option<&str>,
    {
        self.require_customer(customer_id)?;
        let mut totals = BTreeMap::new();
        for tx in self.store.find_by_customer(customer_id)? {
            if let Some(group) = key(&tx) {
                *totals.entry(group.to_string()).or_insert(Decimal::ZERO) += tx.amount.abs();
            }
        }
        Ok(totals)
    }
}
