use std::path::PathBuf;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::warn;

use spendlens_core::RawTransaction;

use crate::adapter::{SourceAdapter, SourceError};
use crate::util;

/// Default channel label when a row omits the trailing source field.
const DEFAULT_SOURCE: &str = "external";

/// CSV source with header `customerId,description,amount,timestamp,source`.
///
/// Blank lines and `#` comments are skipped. Per-field defaults are
/// independent: a bad amount becomes zero without touching a good
/// timestamp on the same row, and the other way around.
pub struct CsvFileSource {
    path: PathBuf,
}

impl CsvFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvFileSource { path: path.into() }
    }
}

#[async_trait]
impl SourceAdapter for CsvFileSource {
    fn label(&self) -> &str {
        "CSV_FILE"
    }

    async fn fetch(&self) -> Result<Vec<RawTransaction>, SourceError> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        Ok(parse_csv(&text))
    }
}

pub(crate) fn parse_csv(text: &str) -> Vec<RawTransaction> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .comment(Some(b'#'))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut transactions = Vec::new();
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!("skipping unreadable CSV row: {e}");
                continue;
            }
        };
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }

        let amount_raw = record.get(2).unwrap_or_default();
        let amount = match util::parse_amount(amount_raw) {
            Some(amount) => amount,
            None => {
                if !amount_raw.is_empty() {
                    warn!("invalid amount {amount_raw:?}, defaulting to zero");
                }
                Decimal::ZERO
            }
        };

        let source = match record.get(4) {
            Some(source) if !source.is_empty() => source.to_string(),
            _ => DEFAULT_SOURCE.to_string(),
        };

        transactions.push(RawTransaction {
            customer_id: record.get(0).unwrap_or_default().to_string(),
            description: record.get(1).unwrap_or_default().to_string(),
            amount,
            timestamp: util::parse_timestamp_or_now(record.get(3).unwrap_or_default()),
            source,
        });
    }
    transactions
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn dt(d: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 10, d)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn parses_well_formed_rows() {
        let text = "\
customerId,description,amount,timestamp,source
CUST-1,Grocery Store - SPAR,-120.50,2025-10-12T14:21:10,WEB
CUST-1,Salary payment,5000.00,2025-10-25 08:00:00,EFT
";
        let rows = parse_csv(text);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].customer_id, "CUST-1");
        assert_eq!(rows[0].amount, Decimal::new(-12050, 2));
        assert_eq!(rows[0].timestamp, dt(12, 14, 21, 10));
        assert_eq!(rows[1].timestamp, dt(25, 8, 0, 0));
        assert_eq!(rows[1].source, "EFT");
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let text = "\
customerId,description,amount,timestamp,source
# monthly export
CUST-1,Caltex fuel,-400.00,2025-10-02T18:00:00,CARD

CUST-1,Spar,-80.00,2025-10-03T09:00:00,CARD
";
        assert_eq!(parse_csv(text).len(), 2);
    }

    #[test]
    fn bad_amount_defaults_to_zero_keeping_good_timestamp() {
        let text = "\
customerId,description,amount,timestamp,source
CUST-1,Broken amount,oops,2025-10-12T14:21:10,WEB
";
        let rows = parse_csv(text);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount, Decimal::ZERO);
        assert_eq!(rows[0].timestamp, dt(12, 14, 21, 10));
    }

    #[test]
    fn bad_timestamp_defaults_to_now_keeping_good_amount() {
        let text = "\
customerId,description,amount,timestamp,source
CUST-1,Broken timestamp,-9.99,whenever,WEB
";
        let before = chrono::Local::now().naive_local();
        let rows = parse_csv(text);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount, Decimal::new(-999, 2));
        assert!(rows[0].timestamp >= before);
    }

    #[test]
    fn missing_source_defaults() {
        let text = "\
customerId,description,amount,timestamp,source
CUST-1,No source,-1.00,2025-10-12T14:21:10
";
        let rows = parse_csv(text);
        assert_eq!(rows[0].source, DEFAULT_SOURCE);
    }

    #[tokio::test]
    async fn fetch_missing_file_is_a_source_error() {
        let source = CsvFileSource::new("/no/such/transactions.csv");
        assert!(matches!(source.fetch().await, Err(SourceError::Io(_))));
    }

    #[tokio::test]
    async fn fetch_reads_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "customerId,description,amount,timestamp,source").unwrap();
        writeln!(file, "CUST-1,Spar,-80.00,2025-10-03T09:00:00,CARD").unwrap();

        let source = CsvFileSource::new(file.path());
        let rows = source.fetch().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].description, "Spar");
    }
}
