//! 🧠 In-memory document store: a cluster that fits in a `BTreeMap`.
//!
//! Behaves like a tiny, honest Elasticsearch: indices with mappings, settings and
//! documents, aliases that resolve to indices, scroll cursors, bulk upserts by `_id`,
//! and an atomic alias endpoint. Plus a few levers real clusters don't hand out:
//! refuse specific documents, fail specific operations, withhold acknowledgements.
//!
//! 🔒 `Arc<Mutex<..>>` so tests can keep a clone, hand the other to the migration,
//! and peek inside afterwards. Communist data, but in a good way.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use serde_json::value::RawValue;
use tokio::sync::Mutex;

use crate::backends::DocumentStore;
use crate::common::{AliasBinding, AliasBindings, BulkSummary, DocumentFailure, Hit, ScrollPage};
use crate::error::StoreError;

// 📦 what ES hands back when nobody asks for a page size
const DEFAULT_PAGE_SIZE: usize = 10;

/// 🎛️ Operations that can be told to fail with [`StoreError::Injected`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StoreOperation {
    Version,
    IndexExists,
    GetMapping,
    GetSettings,
    CreateIndex,
    Scroll,
    ClearScroll,
    Bulk,
    Refresh,
    GetAliases,
    UpdateAliases,
}

/// 🗺️ alias name → concrete index names. The shape tests like to assert on.
pub type AliasIndices = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Default)]
struct MemIndex {
    mapping: Value,
    settings: Value,
    docs: Vec<Hit>,
}

#[derive(Debug)]
struct MemScroll {
    remaining: VecDeque<Hit>,
    page_size: usize,
    total: u64,
}

#[derive(Debug, Default)]
struct MemState {
    indices: BTreeMap<String, MemIndex>,
    aliases: AliasIndices,
    alias_options: BTreeMap<(String, String), Map<String, Value>>,
    scrolls: HashMap<String, MemScroll>,
    scrolls_opened: u64,
    creations: Vec<(String, Value)>,
    alias_updates: Vec<(Vec<AliasBinding>, Vec<AliasBinding>)>,
    rejected_ids: BTreeSet<String>,
    failing: BTreeSet<StoreOperation>,
    withhold_acknowledgement: bool,
}

impl MemState {
    /// 🔍 name → concrete indices. An index resolves to itself, an alias to its bindings.
    fn resolve(&self, name: &str) -> Vec<String> {
        if self.indices.contains_key(name) {
            vec![name.to_string()]
        } else {
            self.aliases.get(name).cloned().unwrap_or_default()
        }
    }

    fn check(&self, operation: StoreOperation) -> Result<(), StoreError> {
        if self.failing.contains(&operation) {
            return Err(StoreError::Injected(format!("{:?}", operation)));
        }
        Ok(())
    }

    fn next_page(&mut self, scroll_id: &str) -> Result<ScrollPage, StoreError> {
        let scroll = self
            .scrolls
            .get_mut(scroll_id)
            .ok_or_else(|| not_found(scroll_id, "search_context_missing_exception"))?;
        let take = scroll.page_size.min(scroll.remaining.len());
        let hits: Vec<Hit> = scroll.remaining.drain(..take).collect();
        Ok(ScrollPage {
            scroll_id: Some(scroll_id.to_string()),
            total: scroll.total,
            hits,
        })
    }
}

fn not_found(name: &str, kind: &str) -> StoreError {
    StoreError::Status {
        url: format!("memory://{}", name),
        status: 404,
        body: format!(r#"{{"error":{{"type":"{}"}}}}"#, kind),
    }
}

/// 🧠 See the module docs. Clone freely: every clone sees the same cluster.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    name: String,
    state: Arc<Mutex<MemState>>,
}

impl InMemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MemState::default())),
        }
    }

    // ===== setup =====

    /// 🏗️ Plant an index with a `{"mappings": ..}`-style mapping body and a settings object.
    pub async fn put_index(&self, name: &str, mapping: Value, settings: Value) {
        self.state.lock().await.indices.insert(
            name.to_string(),
            MemIndex {
                mapping,
                settings,
                docs: Vec::new(),
            },
        );
    }

    /// 📄 Plant a document. `source` must be JSON. Replaces any document with the same id.
    pub async fn put_document(&self, index: &str, id: &str, source: &str) -> Result<(), StoreError> {
        let source = RawValue::from_string(source.to_string()).map_err(|source| {
            StoreError::Decode {
                url: format!("memory://{}/{}", index, id),
                source,
            }
        })?;
        let hit = Hit {
            index: index.to_string(),
            doc_type: Some("_doc".to_string()),
            id: id.to_string(),
            routing: None,
            source,
        };
        let mut state = self.state.lock().await;
        let target = state
            .indices
            .get_mut(index)
            .ok_or_else(|| not_found(index, "index_not_found_exception"))?;
        upsert(&mut target.docs, hit);
        Ok(())
    }

    pub async fn bind_alias(&self, alias: &str, index: &str) {
        self.bind_alias_with(alias, index, Map::new()).await;
    }

    /// 🔗 Bind with properties (`filter`, `routing`, `is_write_index`, ...).
    pub async fn bind_alias_with(&self, alias: &str, index: &str, options: Map<String, Value>) {
        let mut state = self.state.lock().await;
        let bound = state.aliases.entry(alias.to_string()).or_default();
        if !bound.iter().any(|i| i == index) {
            bound.push(index.to_string());
            bound.sort();
        }
        state
            .alias_options
            .insert((alias.to_string(), index.to_string()), options);
    }

    /// 💔 The target will refuse any document with this id, per-document, not per-request.
    pub async fn reject_document(&self, id: &str) {
        self.state.lock().await.rejected_ids.insert(id.to_string());
    }

    /// 💀 Make `operation` fail with a transport error from now on.
    pub async fn fail_on(&self, operation: StoreOperation) {
        self.state.lock().await.failing.insert(operation);
    }

    /// 🤐 Create indices but answer `acknowledged: false`.
    pub async fn withhold_acknowledgement(&self) {
        self.state.lock().await.withhold_acknowledgement = true;
    }

    // ===== inspection =====

    pub async fn index_names(&self) -> Vec<String> {
        self.state.lock().await.indices.keys().cloned().collect()
    }

    /// 📋 Every `create_index` call that reached the store, with its body, in order.
    pub async fn creations(&self) -> Vec<(String, Value)> {
        self.state.lock().await.creations.clone()
    }

    /// 📄 `(id, raw source)` pairs of `index`, in insertion order.
    pub async fn documents(&self, index: &str) -> Vec<(String, String)> {
        self.state
            .lock()
            .await
            .indices
            .get(index)
            .map(|i| {
                i.docs
                    .iter()
                    .map(|h| (h.id.clone(), h.source.get().to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn alias_bindings(&self) -> AliasIndices {
        self.state.lock().await.aliases.clone()
    }

    /// 🏷️ Properties of one binding, None when the binding doesn't exist.
    pub async fn alias_options(&self, alias: &str, index: &str) -> Option<Map<String, Value>> {
        self.state
            .lock()
            .await
            .alias_options
            .get(&(alias.to_string(), index.to_string()))
            .cloned()
    }

    /// 🔀 Every `update_aliases` request as `(removals, additions)`.
    pub async fn alias_updates(&self) -> Vec<(Vec<AliasBinding>, Vec<AliasBinding>)> {
        self.state.lock().await.alias_updates.clone()
    }

    pub async fn open_scrolls(&self) -> usize {
        self.state.lock().await.scrolls.len()
    }
}

fn upsert(docs: &mut Vec<Hit>, hit: Hit) {
    match docs.iter_mut().find(|d| d.id == hit.id) {
        Some(existing) => *existing = hit,
        None => docs.push(hit),
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn version(&self) -> Result<String, StoreError> {
        self.state.lock().await.check(StoreOperation::Version)?;
        Ok("in-memory".to_string())
    }

    async fn index_exists(&self, name: &str) -> Result<bool, StoreError> {
        let state = self.state.lock().await;
        state.check(StoreOperation::IndexExists)?;
        Ok(!state.resolve(name).is_empty())
    }

    async fn get_mapping(&self, index: &str) -> Result<Value, StoreError> {
        let state = self.state.lock().await;
        state.check(StoreOperation::GetMapping)?;
        let concrete = state.resolve(index);
        if concrete.is_empty() {
            return Err(not_found(index, "index_not_found_exception"));
        }
        let mut response = serde_json::Map::new();
        for name in concrete {
            if let Some(found) = state.indices.get(&name) {
                response.insert(name, found.mapping.clone());
            }
        }
        Ok(Value::Object(response))
    }

    async fn get_settings(&self, index: &str) -> Result<Value, StoreError> {
        let state = self.state.lock().await;
        state.check(StoreOperation::GetSettings)?;
        let concrete = state.resolve(index);
        if concrete.is_empty() {
            return Err(not_found(index, "index_not_found_exception"));
        }
        let mut response = serde_json::Map::new();
        for name in concrete {
            if let Some(found) = state.indices.get(&name) {
                response.insert(name, json!({ "settings": found.settings }));
            }
        }
        Ok(Value::Object(response))
    }

    async fn create_index(&self, name: &str, body: &Value) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        state.check(StoreOperation::CreateIndex)?;
        if !state.resolve(name).is_empty() {
            return Err(StoreError::Status {
                url: format!("memory://{}", name),
                status: 400,
                body: r#"{"error":{"type":"resource_already_exists_exception"}}"#.to_string(),
            });
        }
        state.creations.push((name.to_string(), body.clone()));

        let mut mapping = body.clone();
        let settings = mapping
            .as_object_mut()
            .and_then(|m| m.remove("settings"))
            .unwrap_or_else(|| json!({}));
        state.indices.insert(
            name.to_string(),
            MemIndex {
                mapping,
                settings,
                docs: Vec::new(),
            },
        );
        Ok(!state.withhold_acknowledgement)
    }

    async fn open_scroll(
        &self,
        index: &str,
        page_size: Option<usize>,
    ) -> Result<ScrollPage, StoreError> {
        let mut state = self.state.lock().await;
        state.check(StoreOperation::Scroll)?;
        let concrete = state.resolve(index);
        if concrete.is_empty() {
            return Err(not_found(index, "index_not_found_exception"));
        }
        let remaining: VecDeque<Hit> = concrete
            .iter()
            .filter_map(|name| state.indices.get(name))
            .flat_map(|i| i.docs.iter().cloned())
            .collect();

        state.scrolls_opened += 1;
        let scroll_id = format!("scroll-{}", state.scrolls_opened);
        let total = remaining.len() as u64;
        state.scrolls.insert(
            scroll_id.clone(),
            MemScroll {
                remaining,
                page_size: page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1),
                total,
            },
        );
        state.next_page(&scroll_id)
    }

    async fn next_scroll(&self, scroll_id: &str) -> Result<ScrollPage, StoreError> {
        let mut state = self.state.lock().await;
        state.check(StoreOperation::Scroll)?;
        state.next_page(scroll_id)
    }

    async fn clear_scroll(&self, scroll_id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.check(StoreOperation::ClearScroll)?;
        state.scrolls.remove(scroll_id);
        Ok(())
    }

    async fn bulk_index(&self, index: &str, hits: &[Hit]) -> Result<BulkSummary, StoreError> {
        let mut state = self.state.lock().await;
        state.check(StoreOperation::Bulk)?;
        let rejected = state.rejected_ids.clone();
        let target = state
            .indices
            .get_mut(index)
            .ok_or_else(|| not_found(index, "index_not_found_exception"))?;

        let mut summary = BulkSummary::default();
        for hit in hits {
            if rejected.contains(&hit.id) {
                summary.failures.push(DocumentFailure {
                    index: index.to_string(),
                    doc_type: hit.doc_type.clone(),
                    id: hit.id.clone(),
                    error: "mapper_parsing_exception: document rejected".to_string(),
                });
                continue;
            }
            let mut copy = hit.clone();
            copy.index = index.to_string();
            upsert(&mut target.docs, copy);
            summary.succeeded += 1;
        }
        Ok(summary)
    }

    async fn refresh(&self, index: &str) -> Result<(), StoreError> {
        let state = self.state.lock().await;
        state.check(StoreOperation::Refresh)?;
        if state.resolve(index).is_empty() {
            return Err(not_found(index, "index_not_found_exception"));
        }
        Ok(())
    }

    async fn get_alias_bindings(&self) -> Result<AliasBindings, StoreError> {
        let state = self.state.lock().await;
        state.check(StoreOperation::GetAliases)?;
        let bindings = state
            .aliases
            .iter()
            .map(|(alias, indices)| {
                let bound = indices
                    .iter()
                    .map(|index| {
                        let options = state
                            .alias_options
                            .get(&(alias.clone(), index.clone()))
                            .cloned()
                            .unwrap_or_default();
                        AliasBinding::new(alias.as_str(), index.as_str()).with_options(options)
                    })
                    .collect();
                (alias.clone(), bound)
            })
            .collect();
        Ok(bindings)
    }

    async fn update_aliases(
        &self,
        removals: &[AliasBinding],
        additions: &[AliasBinding],
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.check(StoreOperation::UpdateAliases)?;
        state
            .alias_updates
            .push((removals.to_vec(), additions.to_vec()));

        // -- all or nothing: validate every action before touching a single binding
        if let Some(missing) = removals
            .iter()
            .chain(additions.iter())
            .find(|b| !state.indices.contains_key(&b.index))
        {
            return Err(not_found(&missing.index, "index_not_found_exception"));
        }

        for binding in removals {
            if let Some(bound) = state.aliases.get_mut(&binding.alias) {
                bound.retain(|i| i != &binding.index);
            }
            state
                .alias_options
                .remove(&(binding.alias.clone(), binding.index.clone()));
        }
        for binding in additions {
            let bound = state.aliases.entry(binding.alias.clone()).or_default();
            if !bound.contains(&binding.index) {
                bound.push(binding.index.clone());
                bound.sort();
            }
            state.alias_options.insert(
                (binding.alias.clone(), binding.index.clone()),
                binding.options.clone(),
            );
        }
        state.aliases.retain(|_, bound| !bound.is_empty());
        Ok(())
    }
}
