use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use spendlens_core::CategorizedTransaction;
use spendlens_rules::Categorizer;
use spendlens_storage::TransactionStore;

use crate::adapter::SourceAdapter;

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-source outcome of one ingestion run.
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source: String,
    pub fetched: usize,
    pub ingested: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub sources: Vec<SourceReport>,
}

impl IngestReport {
    pub fn total_ingested(&self) -> usize {
        self.sources.iter().map(|s| s.ingested).sum()
    }
}

/// Pulls raw transactions from every registered source adapter,
/// categorizes them, and persists the result.
///
/// Sources run as independent tasks: one unreachable or slow source
/// never blocks the others, and a failed save drops only that record.
pub struct IngestionPipeline {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    categorizer: Arc<Categorizer>,
    store: Arc<dyn TransactionStore>,
    fetch_timeout: Duration,
}

impl IngestionPipeline {
    pub fn new(categorizer: Arc<Categorizer>, store: Arc<dyn TransactionStore>) -> Self {
        IngestionPipeline {
            adapters: Vec::new(),
            categorizer,
            store,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.push(adapter);
    }

    /// Runs one ingestion pass over all registered sources.
    pub async fn run(&self) -> IngestReport {
        let mut handles = Vec::with_capacity(self.adapters.len());
        for adapter in &self.adapters {
            let adapter = Arc::clone(adapter);
            let categorizer = Arc::clone(&self.categorizer);
            let store = Arc::clone(&self.store);
            let fetch_timeout = self.fetch_timeout;
            handles.push(tokio::spawn(async move {
                ingest_source(adapter, categorizer, store, fetch_timeout).await
            }));
        }

        let mut report = IngestReport::default();
        for handle in handles {
            match handle.await {
                Ok(source_report) => report.sources.push(source_report),
                Err(e) => error!("ingestion task panicked: {e}"),
            }
        }
        report
    }
}

async fn ingest_source(
    adapter: Arc<dyn SourceAdapter>,
    categorizer: Arc<Categorizer>,
    store: Arc<dyn TransactionStore>,
    fetch_timeout: Duration,
) -> SourceReport {
    let label = adapter.label().to_string();

    let raws = match tokio::time::timeout(fetch_timeout, adapter.fetch()).await {
        Ok(Ok(raws)) => raws,
        Ok(Err(e)) => {
            warn!(source = %label, "source fetch failed, continuing with empty batch: {e}");
            Vec::new()
        }
        Err(_) => {
            warn!(
                source = %label,
                "source fetch timed out after {fetch_timeout:?}, continuing with empty batch"
            );
            Vec::new()
        }
    };

    let mut report = SourceReport {
        source: label.clone(),
        fetched: raws.len(),
        ingested: 0,
        failed: 0,
    };

    // Records are persisted one at a time so a single bad record cannot
    // abort the rest of the batch.
    for raw in raws {
        let category = match categorizer.categorize(&raw.description, raw.amount) {
            Ok(category) => category,
            Err(e) => {
                error!(source = %label, "categorization failed, dropping record: {e}");
                report.failed += 1;
                continue;
            }
        };
        let tx = CategorizedTransaction::from_raw(raw, category.display_name.clone());
        match store.save(tx) {
            Ok(_) => report.ingested += 1,
            Err(e) => {
                error!(source = %label, "failed to persist record, dropping it: {e}");
                report.failed += 1;
            }
        }
    }

    info!(
        source = %label,
        fetched = report.fetched,
        ingested = report.ingested,
        failed = report.failed,
        "source ingest complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use spendlens_core::RawTransaction;
    use spendlens_rules::CategoryStore;
    use spendlens_storage::{MemoryStore, StoreError};

    use crate::adapter::SourceError;

    fn raw(customer: &str, desc: &str, amount: i64) -> RawTransaction {
        RawTransaction {
            customer_id: customer.to_string(),
            description: desc.to_string(),
            amount: Decimal::from(amount),
            timestamp: NaiveDate::from_ymd_opt(2025, 10, 12)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            source: "TEST".to_string(),
        }
    }

    fn categorizer() -> Arc<Categorizer> {
        let store = CategoryStore::new();
        store.add_category("OTHER", "Other", false);
        store.add_category("FOOD", "Food", false);
        store.add_keyword("FOOD", "spar").unwrap();
        store.add_category("INCOME", "Income", true);
        store.add_keyword("INCOME", "salary").unwrap();
        Arc::new(Categorizer::new(Arc::new(store)))
    }

    struct StubSource {
        label: &'static str,
        batch: Result<Vec<RawTransaction>, ()>,
    }

    #[async_trait]
    impl SourceAdapter for StubSource {
        fn label(&self) -> &str {
            self.label
        }

        async fn fetch(&self) -> Result<Vec<RawTransaction>, SourceError> {
            match &self.batch {
                Ok(batch) => Ok(batch.clone()),
                Err(()) => Err(SourceError::Document("stubbed failure".to_string())),
            }
        }
    }

    struct SlowSource;

    #[async_trait]
    impl SourceAdapter for SlowSource {
        fn label(&self) -> &str {
            "SLOW"
        }

        async fn fetch(&self) -> Result<Vec<RawTransaction>, SourceError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![raw("CUST-1", "too late", 1)])
        }
    }

    /// Store double that rejects records whose description contains
    /// "poison".
    struct FlakyStore {
        inner: MemoryStore,
    }

    impl TransactionStore for FlakyStore {
        fn save(
            &self,
            tx: CategorizedTransaction,
        ) -> Result<CategorizedTransaction, StoreError> {
            if tx.description.contains("poison") {
                return Err(StoreError::Backend("rejected".to_string()));
            }
            self.inner.save(tx)
        }

        fn find_by_customer(
            &self,
            customer_id: &str,
        ) -> Result<Vec<CategorizedTransaction>, StoreError> {
            self.inner.find_by_customer(customer_id)
        }

        fn find_by_customer_and_range(
            &self,
            customer_id: &str,
            start: chrono::NaiveDateTime,
            end: chrono::NaiveDateTime,
        ) -> Result<Vec<CategorizedTransaction>, StoreError> {
            self.inner.find_by_customer_and_range(customer_id, start, end)
        }

        fn find_by_customer_and_id(
            &self,
            customer_id: &str,
            id: spendlens_core::TransactionId,
        ) -> Result<Option<CategorizedTransaction>, StoreError> {
            self.inner.find_by_customer_and_id(customer_id, id)
        }

        fn exists_for_customer(&self, customer_id: &str) -> Result<bool, StoreError> {
            self.inner.exists_for_customer(customer_id)
        }

        fn search(
            &self,
            customer_id: &str,
            needle: &str,
        ) -> Result<Vec<CategorizedTransaction>, StoreError> {
            self.inner.search(customer_id, needle)
        }
    }

    #[tokio::test]
    async fn categorizes_and_persists_with_display_name() {
        let store = Arc::new(MemoryStore::new());
        let mut pipeline =
            IngestionPipeline::new(categorizer(), Arc::clone(&store) as Arc<dyn TransactionStore>);
        pipeline.register(Arc::new(StubSource {
            label: "A",
            batch: Ok(vec![raw("CUST-1", "Spar groceries", -120), raw("CUST-1", "Salary", 5000)]),
        }));

        let report = pipeline.run().await;
        assert_eq!(report.total_ingested(), 2);

        let rows = store.find_by_customer("CUST-1").unwrap();
        let categories: Vec<&str> =
            rows.iter().filter_map(|t| t.category.as_deref()).collect();
        assert!(categories.contains(&"Food"));
        assert!(categories.contains(&"Income"));
    }

    #[tokio::test]
    async fn failing_source_does_not_block_others() {
        let store = Arc::new(MemoryStore::new());
        let mut pipeline =
            IngestionPipeline::new(categorizer(), Arc::clone(&store) as Arc<dyn TransactionStore>);
        pipeline.register(Arc::new(StubSource { label: "BROKEN", batch: Err(()) }));
        pipeline.register(Arc::new(StubSource {
            label: "GOOD",
            batch: Ok(vec![raw("CUST-1", "Spar", -10)]),
        }));

        let report = pipeline.run().await;
        assert_eq!(report.sources.len(), 2);
        assert_eq!(report.total_ingested(), 1);
        assert_eq!(store.len(), 1);

        let broken = report.sources.iter().find(|s| s.source == "BROKEN").unwrap();
        assert_eq!(broken.fetched, 0);
        assert_eq!(broken.ingested, 0);
    }

    #[tokio::test]
    async fn slow_source_times_out_to_empty_batch() {
        let store = Arc::new(MemoryStore::new());
        let mut pipeline =
            IngestionPipeline::new(categorizer(), Arc::clone(&store) as Arc<dyn TransactionStore>)
                .with_fetch_timeout(Duration::from_millis(20));
        pipeline.register(Arc::new(SlowSource));
        pipeline.register(Arc::new(StubSource {
            label: "FAST",
            batch: Ok(vec![raw("CUST-1", "Spar", -10)]),
        }));

        let report = pipeline.run().await;
        let slow = report.sources.iter().find(|s| s.source == "SLOW").unwrap();
        assert_eq!(slow.fetched, 0);
        assert_eq!(report.total_ingested(), 1);
    }

    #[tokio::test]
    async fn failed_save_drops_only_that_record() {
        let store = Arc::new(FlakyStore { inner: MemoryStore::new() });
        let mut pipeline =
            IngestionPipeline::new(categorizer(), Arc::clone(&store) as Arc<dyn TransactionStore>);
        pipeline.register(Arc::new(StubSource {
            label: "A",
            batch: Ok(vec![
                raw("CUST-1", "Spar", -10),
                raw("CUST-1", "poison pill", -1),
                raw("CUST-1", "Salary", 500),
            ]),
        }));

        let report = pipeline.run().await;
        assert_eq!(report.sources[0].fetched, 3);
        assert_eq!(report.sources[0].ingested, 2);
        assert_eq!(report.sources[0].failed, 1);
        assert_eq!(store.inner.len(), 2);
    }

    #[tokio::test]
    async fn missing_fallback_counts_records_as_failed() {
        let rules = CategoryStore::new();
        rules.add_category("FOOD", "Food", false);
        rules.add_keyword("FOOD", "spar").unwrap();
        let store = Arc::new(MemoryStore::new());
        let mut pipeline = IngestionPipeline::new(
            Arc::new(Categorizer::new(Arc::new(rules))),
            Arc::clone(&store) as Arc<dyn TransactionStore>,
        );
        pipeline.register(Arc::new(StubSource {
            label: "A",
            batch: Ok(vec![raw("CUST-1", "unmatched", -10)]),
        }));

        let report = pipeline.run().await;
        assert_eq!(report.sources[0].failed, 1);
        assert!(store.is_empty());
    }
}
