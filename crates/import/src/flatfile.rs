use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use spendlens_core::RawTransaction;

use crate::adapter::{SourceAdapter, SourceError};
use crate::util;

// Record layout, widths in bytes:
// transactionId 11 | customerId 10 | description 33 | merchant 19 |
// reference 16 | type 6 | amount 9 | currency 3 | timestamp 19 | source 9
// Only customerId, description, amount, timestamp and source are
// extracted; the rest are skip-fields by width.
const CUSTOMER_ID: Field = Field { start: 11, width: 10 };
const DESCRIPTION: Field = Field { start: 21, width: 33 };
const AMOUNT: Field = Field { start: 95, width: 9 };
const TIMESTAMP: Field = Field { start: 107, width: 19 };
const SOURCE: Field = Field { start: 126, width: 9 };

struct Field {
    start: usize,
    width: usize,
}

impl Field {
    fn slice<'a>(&self, line: &'a str) -> &'a str {
        let end = (self.start + self.width).min(line.len());
        line.get(self.start..end).unwrap_or("").trim()
    }
}

#[derive(Debug, Error)]
enum LineError {
    #[error("unparseable amount {0:?}")]
    Amount(String),
    #[error("unparseable timestamp {0:?}")]
    Timestamp(String),
}

/// Fixed-width flat-file source.
///
/// A line whose amount or timestamp does not parse is logged and
/// dropped; processing continues with the next line.
pub struct FlatFileSource {
    path: PathBuf,
}

impl FlatFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FlatFileSource { path: path.into() }
    }
}

#[async_trait]
impl SourceAdapter for FlatFileSource {
    fn label(&self) -> &str {
        "FLAT_FILE"
    }

    async fn fetch(&self) -> Result<Vec<RawTransaction>, SourceError> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        Ok(parse_flat_file(&text))
    }
}

pub(crate) fn parse_flat_file(text: &str) -> Vec<RawTransaction> {
    let mut transactions = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(line) {
            Ok(tx) => transactions.push(tx),
            Err(e) => warn!(line = idx + 1, "dropping flat-file line: {e}"),
        }
    }
    transactions
}

fn parse_line(line: &str) -> Result<RawTransaction, LineError> {
    let amount_raw = AMOUNT.slice(line);
    let amount = util::parse_amount(amount_raw)
        .ok_or_else(|| LineError::Amount(amount_raw.to_string()))?;

    let timestamp_raw = TIMESTAMP.slice(line);
    let timestamp = util::parse_timestamp(timestamp_raw)
        .ok_or_else(|| LineError::Timestamp(timestamp_raw.to_string()))?;

    Ok(RawTransaction {
        customer_id: CUSTOMER_ID.slice(line).to_string(),
        description: DESCRIPTION.slice(line).to_string(),
        amount,
        timestamp,
        source: SOURCE.slice(line).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn record(customer: &str, desc: &str, amount: &str, ts: &str, source: &str) -> String {
        format!(
            "{:<11}{:<10}{:<33}{:<19}{:<16}{:<6}{:<9}{:<3}{:<19}{:<9}",
            "TX000000001", customer, desc, "SPAR SANDTON", "REF-20251012-001", "POS", amount, "ZAR",
            ts, source
        )
    }

    #[test]
    fn parses_fixed_width_record() {
        let line = record("CUST-1", "Grocery Store - SPAR", "000245.90", "2025-10-12T14:21:10", "POS");
        let rows = parse_flat_file(&line);
        assert_eq!(rows.len(), 1);
        let tx = &rows[0];
        assert_eq!(tx.customer_id, "CUST-1");
        assert_eq!(tx.description, "Grocery Store - SPAR");
        assert_eq!(tx.amount, Decimal::new(24590, 2));
        assert_eq!(
            tx.timestamp,
            NaiveDate::from_ymd_opt(2025, 10, 12)
                .unwrap()
                .and_hms_opt(14, 21, 10)
                .unwrap()
        );
        assert_eq!(tx.source, "POS");
    }

    #[test]
    fn timestamp_falls_back_to_space_separated_format() {
        let line = record("CUST-1", "Fuel", "-00400.00", "2025-10-02 18:00:00", "POS");
        let rows = parse_flat_file(&line);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount, Decimal::new(-40000, 2));
    }

    #[test]
    fn bad_amount_drops_only_that_line() {
        let good = record("CUST-1", "Spar", "000080.00", "2025-10-03T09:00:00", "POS");
        let bad = record("CUST-1", "Broken", "oops!!", "2025-10-03T09:00:00", "POS");
        let text = format!("{bad}\n{good}\n");
        let rows = parse_flat_file(&text);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].description, "Spar");
    }

    #[test]
    fn bad_timestamp_drops_the_line() {
        let line = record("CUST-1", "Spar", "000080.00", "12 October, 2pm", "POS");
        assert!(parse_flat_file(&line).is_empty());
    }

    #[test]
    fn truncated_line_is_dropped_not_panicking() {
        // Cut off inside the amount field.
        let line = record("CUST-1", "Spar", "000080.00", "2025-10-03T09:00:00", "POS");
        let truncated = &line[..100];
        assert!(parse_flat_file(truncated).is_empty());
    }

    #[test]
    fn blank_lines_are_skipped() {
        let line = record("CUST-1", "Spar", "000080.00", "2025-10-03T09:00:00", "POS");
        let text = format!("\n   \n{line}\n\n");
        assert_eq!(parse_flat_file(&text).len(), 1);
    }

    #[tokio::test]
    async fn fetch_missing_file_is_a_source_error() {
        let source = FlatFileSource::new("/no/such/transactions.dat");
        assert!(matches!(source.fetch().await, Err(SourceError::Io(_))));
    }
}
