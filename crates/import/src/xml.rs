use std::path::PathBuf;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::warn;

use spendlens_core::RawTransaction;

use crate::adapter::{SourceAdapter, SourceError};
use crate::util;

/// Default channel label when a `<transaction>` has no `<channel>`.
const DEFAULT_SOURCE: &str = "XML_SOURCE";

/// XML source: every `<transaction>` element yields one record via
/// child-element text with per-field defaults. A UTF-8 byte-order mark
/// at the start of the document is stripped before parsing.
pub struct XmlFileSource {
    path: PathBuf,
}

impl XmlFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        XmlFileSource { path: path.into() }
    }
}

#[async_trait]
impl SourceAdapter for XmlFileSource {
    fn label(&self) -> &str {
        "XML_FILE"
    }

    async fn fetch(&self) -> Result<Vec<RawTransaction>, SourceError> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        parse_xml(&text)
    }
}

pub(crate) fn parse_xml(text: &str) -> Result<Vec<RawTransaction>, SourceError> {
    let doc = text.strip_prefix('\u{feff}').unwrap_or(text).trim();
    if !doc.starts_with('<') {
        return Err(SourceError::Document(
            "content does not look like an XML document".to_string(),
        ));
    }
    Ok(transaction_blocks(doc).into_iter().map(parse_block).collect())
}

/// Inner text of each `<transaction>` element, in document order.
fn transaction_blocks(doc: &str) -> Vec<&str> {
    const OPEN: &str = "<transaction";
    const CLOSE: &str = "</transaction>";

    let mut blocks = Vec::new();
    let mut rest = doc;
    while let Some(pos) = rest.find(OPEN) {
        let after_name = &rest[pos + OPEN.len()..];
        // Reject longer tag names such as <transactions>.
        if !after_name.starts_with(|c: char| c == '>' || c.is_ascii_whitespace()) {
            rest = after_name;
            continue;
        }
        let Some(tag_end) = after_name.find('>') else {
            break;
        };
        let body = &after_name[tag_end + 1..];
        let Some(close) = body.find(CLOSE) else {
            break;
        };
        blocks.push(&body[..close]);
        rest = &body[close + CLOSE.len()..];
    }
    blocks
}

fn parse_block(block: &str) -> RawTransaction {
    let amount_raw = child_text(block, "amount").unwrap_or("0");
    let amount = match util::parse_amount(amount_raw) {
        Some(amount) => amount,
        None => {
            warn!("invalid amount {amount_raw:?}, defaulting to zero");
            Decimal::ZERO
        }
    };

    RawTransaction {
        customer_id: child_text(block, "customerId").unwrap_or("").to_string(),
        description: child_text(block, "description").unwrap_or("").to_string(),
        amount,
        timestamp: util::parse_timestamp_or_now(child_text(block, "timestamp").unwrap_or("")),
        source: child_text(block, "channel").unwrap_or(DEFAULT_SOURCE).to_string(),
    }
}

/// Trimmed text of the first `<tag>...</tag>` child, if present.
fn child_text<'a>(block: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = block.find(&open)? + open.len();
    let end = block[start..].find(&close)? + start;
    Some(block[start..end].trim())
}
