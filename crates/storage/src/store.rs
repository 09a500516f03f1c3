use chrono::NaiveDateTime;
use thiserror::Error;

use spendlens_core::{CategorizedTransaction, TransactionId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Contract over the durable record store for categorized transactions.
///
/// Every `find_*` method returns records ordered by timestamp
/// descending. Records are append-only in the base flow; deletion is a
/// backend retention concern outside this contract.
pub trait TransactionStore: Send + Sync {
    /// Persists one record, returning it with its assigned id.
    fn save(&self, tx: CategorizedTransaction) -> Result<CategorizedTransaction, StoreError>;

    /// Persists a batch, stopping at the first backend failure.
    fn save_all(
        &self,
        txs: Vec<CategorizedTransaction>,
    ) -> Result<Vec<CategorizedTransaction>, StoreError> {
        txs.into_iter().map(|tx| self.save(tx)).collect()
    }

    fn find_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Vec<CategorizedTransaction>, StoreError>;

    /// Records for the customer with `start <= timestamp <= end`.
    fn find_by_customer_and_range(
        &self,
        customer_id: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<CategorizedTransaction>, StoreError>;

    fn find_by_customer_and_id(
        &self,
        customer_id: &str,
        id: TransactionId,
    ) -> Result<Option<CategorizedTransaction>, StoreError>;

    fn exists_for_customer(&self, customer_id: &str) -> Result<bool, StoreError>;

    /// Case-insensitive substring match over description, category, and
    /// source.
    fn search(
        &self,
        customer_id: &str,
        needle: &str,
    ) -> Result<Vec<CategorizedTransaction>, StoreError>;
}
