use async_trait::async_trait;
use thiserror::Error;

use spendlens_core::RawTransaction;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read source file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to call transaction endpoint: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed source document: {0}")]
    Document(String),
}

/// One implementation per wire format.
///
/// `fetch` returns the source's full batch in source order. Malformed
/// individual records are skipped (and logged) inside the adapter; only
/// a failure of the source as a whole (unreachable file or endpoint,
/// undecodable document) is an `Err`. The ingestion pipeline treats
/// that as an empty batch for this source, so one broken source never
/// stops the others.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Adapter label used in logs and ingest reports.
    fn label(&self) -> &str;

    async fn fetch(&self) -> Result<Vec<RawTransaction>, SourceError>;
}
