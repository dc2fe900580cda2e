//! 📦 Common data structures: the things that ride the conveyor belt between clusters.
//!
//! 🎬 A document leaves the source index. It does not know where it is going. It does
//! not know it is about to be wrapped in an NDJSON action line and flung at a bulk API.
//! It just wants to be queried. Don't we all. 🦆

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::value::RawValue;
use serde_json::{Map, Value};

/// 🎯 One document as the source hands it over.
///
/// `source` stays a [`RawValue`]: we copy structure, we do not reinterpret it.
/// No ETL here. Bytes in, bytes out.
#[derive(Debug, Clone, Deserialize)]
pub struct Hit {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_type", default)]
    pub doc_type: Option<String>,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_routing", default)]
    pub routing: Option<String>,
    #[serde(rename = "_source")]
    pub source: Box<RawValue>,
}

/// 📜 One page of a scroll cursor.
///
/// `total` is the document count the store reported for the whole scroll, not this page.
#[derive(Debug, Clone, Default)]
pub struct ScrollPage {
    pub scroll_id: Option<String>,
    pub total: u64,
    pub hits: Vec<Hit>,
}

/// 💔 A document the target refused to index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFailure {
    pub index: String,
    pub doc_type: Option<String>,
    pub id: String,
    pub error: String,
}

/// 📬 What one bulk request did.
#[derive(Debug, Clone, Default)]
pub struct BulkSummary {
    pub succeeded: u64,
    pub failures: Vec<DocumentFailure>,
}

/// 📊 The running (and eventually final) tally of a transfer.
///
/// Only grows. Once the transfer returns it, nobody touches it again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferOutcome {
    pub success_count: u64,
    pub failure_count: u64,
    pub failures: Vec<DocumentFailure>,
}

impl TransferOutcome {
    /// 🔄 Fold one bulk response into the tally, keeping failures in arrival order.
    pub(crate) fn absorb(&mut self, summary: BulkSummary) {
        self.success_count += summary.succeeded;
        self.failure_count += summary.failures.len() as u64;
        self.failures.extend(summary.failures);
    }

    pub fn processed(&self) -> u64 {
        self.success_count + self.failure_count
    }
}

/// 🔗 One (alias → index) edge, plus whatever the store hangs on it.
///
/// `options` holds the per-binding properties (`filter`, `routing`, `index_routing`,
/// `search_routing`, `is_write_index`). Empty for a plain binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasBinding {
    pub alias: String,
    pub index: String,
    pub options: Map<String, Value>,
}

impl AliasBinding {
    pub fn new(alias: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            index: index.into(),
            options: Map::new(),
        }
    }

    pub fn with_options(mut self, options: Map<String, Value>) -> Self {
        self.options = options;
        self
    }
}

/// 🗺️ alias name → its bindings, sorted by index so logs and tests are deterministic.
pub type AliasBindings = BTreeMap<String, Vec<AliasBinding>>;

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(id: &str) -> DocumentFailure {
        DocumentFailure {
            index: "orders-v2".to_string(),
            doc_type: Some("_doc".to_string()),
            id: id.to_string(),
            error: "mapper_parsing_exception: nope".to_string(),
        }
    }

    #[test]
    fn the_one_where_the_tally_only_ever_goes_up() {
        let mut the_tally = TransferOutcome::default();
        the_tally.absorb(BulkSummary {
            succeeded: 3,
            failures: vec![failure("a")],
        });
        the_tally.absorb(BulkSummary {
            succeeded: 2,
            failures: vec![failure("b"), failure("c")],
        });

        assert_eq!(the_tally.success_count, 5);
        assert_eq!(the_tally.failure_count, 3);
        assert_eq!(the_tally.processed(), 8);
        let the_ids: Vec<&str> = the_tally.failures.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(the_ids, vec!["a", "b", "c"], "failures keep arrival order");
    }

    #[test]
    fn the_one_where_a_hit_keeps_its_source_bytes_untouched() -> anyhow::Result<()> {
        let the_hit: Hit = serde_json::from_str(
            r#"{"_index":"orders","_type":"_doc","_id":"42","_routing":"eu","_source":{"total": 1.50,"sku":"x"}}"#,
        )?;
        assert_eq!(the_hit.index, "orders");
        assert_eq!(the_hit.routing.as_deref(), Some("eu"));
        assert_eq!(the_hit.source.get(), r#"{"total": 1.50,"sku":"x"}"#);
        Ok(())
    }
}
