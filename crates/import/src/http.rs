use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::warn;

use spendlens_core::RawTransaction;

use crate::adapter::{SourceAdapter, SourceError};
use crate::util;

/// Default channel label when a payload record omits `source`.
const DEFAULT_SOURCE: &str = "JSON_FEED";

/// JSON-over-HTTP source: GET against a configured endpoint returning
/// either `{ "transactions": [...] }` or a bare array of records.
///
/// The request is time-boxed by the client's builder timeout; a network
/// or decode failure for the whole call surfaces as a `SourceError` and
/// becomes an empty batch at the pipeline boundary.
pub struct JsonHttpSource {
    endpoint: String,
    client: reqwest::Client,
}

impl JsonHttpSource {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(JsonHttpSource {
            endpoint: endpoint.into(),
            client,
        })
    }
}

#[async_trait]
impl SourceAdapter for JsonHttpSource {
    fn label(&self) -> &str {
        "JSON_HTTP"
    }

    async fn fetch(&self) -> Result<Vec<RawTransaction>, SourceError> {
        let payload: Value = self
            .client
            .get(&self.endpoint)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(map_payload(&payload))
    }
}

pub(crate) fn map_payload(payload: &Value) -> Vec<RawTransaction> {
    let records = match payload {
        Value::Array(records) => records.as_slice(),
        Value::Object(map) => match map.get("transactions") {
            Some(Value::Array(records)) => records.as_slice(),
            _ => {
                warn!("payload object has no transactions array");
                &[]
            }
        },
        _ => {
            warn!("unexpected payload shape, ignoring");
            &[]
        }
    };
    records.iter().filter_map(map_record).collect()
}

fn map_record(value: &Value) -> Option<RawTransaction> {
    let Some(record) = value.as_object() else {
        warn!("skipping non-object payload record");
        return None;
    };

    let timestamp = match record.get("timestamp") {
        None | Some(Value::Null) => util::now(),
        Some(value) => util::parse_timestamp_or_now(&text(value)),
    };

    Some(RawTransaction {
        customer_id: field_or(record, "customerId", ""),
        description: field_or(record, "description", ""),
        amount: amount_of(record.get("amount")),
        timestamp,
        source: field_or(record, "source", DEFAULT_SOURCE),
    })
}

fn field_or(record: &serde_json::Map<String, Value>, key: &str, default: &str) -> String {
    match record.get(key) {
        None | Some(Value::Null) => default.to_string(),
        Some(value) => text(value),
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn amount_of(value: Option<&Value>) -> Decimal {
    match value {
        None | Some(Value::Null) => Decimal::ZERO,
        Some(Value::Number(n)) => {
            let raw = n.to_string();
            Decimal::from_str(&raw)
                .or_else(|_| Decimal::from_scientific(&raw))
                .unwrap_or_else(|_| {
                    warn!("invalid amount {raw:?}, defaulting to zero");
                    Decimal::ZERO
                })
        }
        Some(Value::String(s)) => util::parse_amount(s).unwrap_or_else(|| {
            warn!("invalid amount {s:?}, defaulting to zero");
            Decimal::ZERO
        }),
        Some(other) => {
            warn!("invalid amount {other}, defaulting to zero");
            Decimal::ZERO
        }
    }
}
