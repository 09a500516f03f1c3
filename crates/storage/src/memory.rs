use std::sync::{PoisonError, RwLock};

use chrono::NaiveDateTime;

use spendlens_core::{CategorizedTransaction, TransactionId};

use crate::store::{StoreError, TransactionStore};

/// In-memory [`TransactionStore`] backing the pipeline, the query
/// service, and tests. Ids are assigned from a monotonic counter.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

struct Inner {
    rows: Vec<CategorizedTransaction>,
    next_id: i64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            inner: RwLock::new(Inner {
                rows: Vec::new(),
                next_id: 1,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn collect_sorted<F>(&self, matches: F) -> Vec<CategorizedTransaction>
    where
        F: Fn(&CategorizedTransaction) -> bool,
    {
        let mut rows: Vec<CategorizedTransaction> =
            self.read().rows.iter().filter(|tx| matches(tx)).cloned().collect();
        // Stable sort: equal timestamps keep insertion order.
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        rows
    }
}

impl TransactionStore for MemoryStore {
    fn save(&self, mut tx: CategorizedTransaction) -> Result<CategorizedTransaction, StoreError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        tx.id = Some(TransactionId(inner.next_id));
        inner.next_id += 1;
        inner.rows.push(tx.clone());
        Ok(tx)
    }

    fn find_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Vec<CategorizedTransaction>, StoreError> {
        Ok(self.collect_sorted(|tx| tx.customer_id == customer_id))
    }

    fn find_by_customer_and_range(
        &self,
        customer_id: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<CategorizedTransaction>, StoreError> {
        Ok(self.collect_sorted(|tx| {
            tx.customer_id == customer_id && tx.timestamp >= start && tx.timestamp <= end
        }))
    }

    fn find_by_customer_and_id(
        &self,
        customer_id: &str,
        id: TransactionId,
    ) -> Result<Option<CategorizedTransaction>, StoreError> {
        Ok(self
            .read()
            .rows
            .iter()
            .find(|tx| tx.customer_id == customer_id && tx.id == Some(id))
            .cloned())
    }

    fn exists_for_customer(&self, customer_id: &str) -> Result<bool, StoreError> {
        Ok(self.read().rows.iter().any(|tx| tx.customer_id == customer_id))
    }

    fn search(
        &self,
        customer_id: &str,
        needle: &str,
    ) -> Result<Vec<CategorizedTransaction>, StoreError> {
        let needle = needle.to_lowercase();
        let contains = |field: &Option<String>| {
            field
                .as_deref()
                .is_some_and(|v| v.to_lowercase().contains(&needle))
        };
        Ok(self.collect_sorted(|tx| {
            tx.customer_id == customer_id
                && (tx.description.to_lowercase().contains(&needle)
                    || contains(&tx.category)
                    || contains(&tx.source))
        }))
    }
}
