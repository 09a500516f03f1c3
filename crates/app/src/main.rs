use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use spendlens_import::{
    CsvFileSource, FlatFileSource, IngestionPipeline, JsonHttpSource, XmlFileSource,
};
use spendlens_query::{AggregationService, QueryError};
use spendlens_rules::{Categorizer, CategoryStore};
use spendlens_storage::{MemoryStore, TransactionStore};

mod config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| "spendlens.toml".to_string());
    let customer = args.next();

    let config = config::load(Path::new(&config_path))?;

    // ── Rules ─────────────────────────────────────────────────────────
    let rules = Arc::new(CategoryStore::with_ttl(Duration::from_secs(
        config.rules.cache_ttl_minutes * 60,
    )));
    let report = rules
        .load_csv_path(&config.rules.categories_file)
        .with_context(|| {
            format!(
                "failed to load category rules from {}",
                config.rules.categories_file.display()
            )
        })?;
    tracing::info!(loaded = report.loaded, skipped = report.skipped, "category rules loaded");
    rules
        .ensure_fallback()
        .context("category configuration must define the OTHER fallback category")?;

    // ── Ingestion ─────────────────────────────────────────────────────
    let store: Arc<dyn TransactionStore> = Arc::new(MemoryStore::new());
    let fetch_timeout = Duration::from_secs(config.ingest.fetch_timeout_secs);
    let mut pipeline =
        IngestionPipeline::new(Arc::new(Categorizer::new(Arc::clone(&rules))), Arc::clone(&store))
            .with_fetch_timeout(fetch_timeout);

    if let Some(path) = &config.sources.csv_file {
        pipeline.register(Arc::new(CsvFileSource::new(path)));
    }
    if let Some(path) = &config.sources.flat_file {
        pipeline.register(Arc::new(FlatFileSource::new(path)));
    }
    if let Some(path) = &config.sources.xml_file {
        pipeline.register(Arc::new(XmlFileSource::new(path)));
    }
    if let Some(endpoint) = &config.sources.json_endpoint {
        pipeline.register(Arc::new(JsonHttpSource::new(endpoint.as_str(), fetch_timeout)?));
    }

    let report = pipeline.run().await;
    for source in &report.sources {
        tracing::info!(
            source = %source.source,
            fetched = source.fetched,
            ingested = source.ingested,
            failed = source.failed,
            "source result"
        );
    }
    tracing::info!(total = report.total_ingested(), "ingestion complete");

    // ── Optional per-customer report ──────────────────────────────────
    if let Some(customer) = customer {
        print_customer_report(&AggregationService::new(store), &customer)?;
    }

    Ok(())
}

fn print_customer_report(service: &AggregationService, customer: &str) -> anyhow::Result<()> {
    let transactions = match service.get_all_transactions(customer) {
        Ok(transactions) => transactions,
        Err(QueryError::CustomerNotFound(id)) => {
            println!("no records found for customer {id}");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("transactions for {customer} (newest first):");
    for tx in &transactions {
        println!(
            "  {}  {:>12}  {:<12}  {}",
            tx.timestamp,
            tx.amount,
            tx.category.as_deref().unwrap_or("-"),
            tx.description
        );
    }

    println!("totals by category (absolute amounts):");
    for (category, total) in service.get_totals_by_category(customer)? {
        println!("  {category:<16} {total}");
    }

    println!("totals by source (absolute amounts):");
    for (source, total) in service.get_totals_by_source(customer)? {
        println!("  {source:<16} {total}");
    }

    Ok(())
}
