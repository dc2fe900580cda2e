//! 🔌 Backends: where the real I/O happens.
//!
//! 🎭 The migration state machine never speaks HTTP. It speaks [`DocumentStore`], and
//! whoever implements it does the talking: a real Elasticsearch cluster, or an
//! in-memory stand-in that tests can poke, prod, and sabotage at will.
//!
//! 🦆 The duck is here because every file must have one. This is law.

use async_trait::async_trait;
use serde_json::Value;

use crate::common::{AliasBinding, AliasBindings, BulkSummary, Hit, ScrollPage};
use crate::error::StoreError;

pub mod elasticsearch;
pub mod in_mem;

pub use elasticsearch::ElasticsearchStore;
pub use in_mem::InMemoryStore;

/// 🗄️ The administrative and bulk surface of a document store, as far as a migration cares.
///
/// # Contract
/// - Every method is a single round trip. No retries. Retries are a lie we tell ourselves.
/// - `get_mapping` / `get_settings` return the store's raw response, keyed by concrete
///   index name. Asking with an alias name answers for the index behind it.
/// - `open_scroll` / `next_scroll` return pages until one comes back empty.
/// - `update_aliases` applies all removals and additions as one atomic request.
#[async_trait]
pub trait DocumentStore: std::fmt::Debug + Send + Sync {
    /// 🏷️ Human-readable name for logs. Usually the URL.
    fn name(&self) -> &str;

    /// 👋 "Are you even there?" Returns the store's version string.
    async fn version(&self) -> Result<String, StoreError>;

    /// 🔍 Does an index or alias by this name exist?
    async fn index_exists(&self, name: &str) -> Result<bool, StoreError>;

    async fn get_mapping(&self, index: &str) -> Result<Value, StoreError>;

    async fn get_settings(&self, index: &str) -> Result<Value, StoreError>;

    /// 🏗️ Create `name` from `body`. Returns the store's `acknowledged` flag.
    async fn create_index(&self, name: &str, body: &Value) -> Result<bool, StoreError>;

    /// 📜 Start a scroll over `index`. `page_size` None lets the store pick.
    async fn open_scroll(
        &self,
        index: &str,
        page_size: Option<usize>,
    ) -> Result<ScrollPage, StoreError>;

    async fn next_scroll(&self, scroll_id: &str) -> Result<ScrollPage, StoreError>;

    async fn clear_scroll(&self, scroll_id: &str) -> Result<(), StoreError>;

    /// 📬 Index `hits` into `index`, keeping their ids and routing.
    async fn bulk_index(&self, index: &str, hits: &[Hit]) -> Result<BulkSummary, StoreError>;

    /// 🔄 Make everything indexed so far visible to searches.
    async fn refresh(&self, index: &str) -> Result<(), StoreError>;

    /// 🔗 Every alias with its bindings, properties included.
    async fn get_alias_bindings(&self) -> Result<AliasBindings, StoreError>;

    async fn update_aliases(
        &self,
        removals: &[AliasBinding],
        additions: &[AliasBinding],
    ) -> Result<(), StoreError>;
}
