use chrono::{Local, NaiveDateTime};
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::warn;

const FALLBACK_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Tries ISO-8601 local form (`2025-10-12T14:21:10`) first, then
/// `yyyy-MM-dd HH:mm:ss`.
pub(crate) fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse::<NaiveDateTime>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, FALLBACK_TIMESTAMP_FORMAT))
        .ok()
}

/// Per-field default: an empty value quietly becomes "now", an invalid
/// one is logged first.
pub(crate) fn parse_timestamp_or_now(raw: &str) -> NaiveDateTime {
    match parse_timestamp(raw) {
        Some(ts) => ts,
        None => {
            if !raw.trim().is_empty() {
                warn!("invalid timestamp {raw:?}, defaulting to now");
            }
            now()
        }
    }
}

pub(crate) fn parse_amount(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw.trim()).ok()
}
