//! # 📡 THE ELASTICSEARCH BACKEND
//!
//! 🎬 COLD OPEN. INT. SERVER ROOM, 3:47 AM
//!
//! "I'll just reindex it," they whispered. "It'll be fast," they said.
//! "And nobody will notice, because of the alias," they added, with the
//! confidence of someone who has never seen a dangling alias.
//!
//! 🚀 This module is the only place in the crate that speaks HTTP. Every method is
//! one round trip to one endpoint: `HEAD /{index}`, `GET /{index}/_mapping`,
//! `GET /{index}/_settings`, `PUT /{index}`, the scroll API, `_bulk`, `_refresh`
//! and `_aliases`. No retries. The caller decides what a failure means.
//!
//! 🦆 (mandatory duck, no context provided, none shall be requested)

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, trace};

use crate::app_config::{ClusterConfig, TransportConfig};
use crate::backends::DocumentStore;
use crate::common::{AliasBinding, AliasBindings, BulkSummary, DocumentFailure, Hit, ScrollPage};
use crate::error::StoreError;

/// 📦 A handle on one Elasticsearch cluster.
///
/// Holds one `reqwest::Client` for the whole run, because spinning up a new client per
/// request is the networking equivalent of buying a new car every time you need groceries.
#[derive(Debug, Clone)]
pub struct ElasticsearchStore {
    client: reqwest::Client,
    config: ClusterConfig,
    scroll_keep_alive: String,
    /// 🔢 Major version, learned from [`DocumentStore::version`]. Unknown means "modern".
    major_version: Arc<OnceLock<u64>>,
}

/// 🦕 Clusters before 7 still want a `_type` on every bulk action.
const TYPELESS_SINCE_MAJOR: u64 = 7;

/// 🔢 `"6.8.23"` → 6. Snapshots and other suffixes are fine, only the leading digits count.
fn major_of(version: &str) -> Option<u64> {
    version.split('.').next()?.trim().parse().ok()
}

impl ElasticsearchStore {
    /// 🚀 Build the client. Does not touch the network; call [`DocumentStore::version`] for that.
    pub fn new(config: ClusterConfig, transport: &TransportConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(transport.connect_timeout_secs))
            .timeout(Duration::from_secs(transport.request_timeout_secs))
            .build()
            .map_err(|source| StoreError::Http {
                url: config.url.clone(),
                source,
            })?;

        Ok(Self {
            client,
            config,
            scroll_keep_alive: transport.scroll_keep_alive.clone(),
            major_version: Arc::new(OnceLock::new()),
        })
    }

    /// 🔧 `https://host//my-index` is a crime. Trim both sides of the slash.
    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// 🔒 API key wins over basic auth. Anonymous is the participation trophy.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        if let Some(ref api_key) = self.config.api_key {
            request.header("Authorization", format!("ApiKey {}", api_key))
        } else if let Some(ref username) = self.config.username {
            request.basic_auth(username, self.config.password.as_ref())
        } else {
            request
        }
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Response, StoreError> {
        self.authorize(request)
            .send()
            .await
            .map_err(|source| StoreError::Http {
                url: url.to_string(),
                source,
            })
    }

    async fn read_body(response: Response, url: &str) -> Result<String, StoreError> {
        response.text().await.map_err(|source| StoreError::Http {
            url: url.to_string(),
            source,
        })
    }

    /// 📡 Send, insist on 2xx, decode the body as `T`.
    async fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &str,
    ) -> Result<T, StoreError> {
        let response = self.send(request, url).await?;
        let status = response.status();
        let body = Self::read_body(response, url).await?;
        if !status.is_success() {
            return Err(StoreError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|source| StoreError::Decode {
            url: url.to_string(),
            source,
        })
    }

    fn json_request(&self, request: RequestBuilder, body: &Value) -> RequestBuilder {
        request
            .header("Content-Type", "application/json")
            .body(body.to_string())
    }

    /// 📦 Two lines per document: the action, then the untouched `_source`.
    fn wants_document_types(&self) -> bool {
        self.major_version
            .get()
            .is_some_and(|major| *major < TYPELESS_SINCE_MAJOR)
    }

    /// 📦 `with_types` adds the hit's `_type`, for clusters that still have mapping types.
    fn bulk_body(index: &str, hits: &[Hit], with_types: bool) -> String {
        let estimated_size: usize = hits.iter().map(|h| h.source.get().len() + 100).sum();
        let mut bulk_body = String::with_capacity(estimated_size);

        for hit in hits {
            // -- _id is preserved so a re-run overwrites instead of duplicating
            let mut action = json!({ "index": { "_index": index, "_id": hit.id } });
            if let Some(ref routing) = hit.routing {
                action["index"]["routing"] = json!(routing);
            }
            if let (true, Some(doc_type)) = (with_types, hit.doc_type.as_ref()) {
                action["index"]["_type"] = json!(doc_type);
            }
            bulk_body.push_str(&action.to_string());
            bulk_body.push('\n');
            bulk_body.push_str(hit.source.get());
            bulk_body.push('\n');
        }

        bulk_body
    }
}

// ===== wire shapes =====

#[derive(Debug, Deserialize)]
struct RootResponse {
    version: VersionInfo,
}

#[derive(Debug, Deserialize)]
struct VersionInfo {
    number: String,
}

#[derive(Debug, Deserialize)]
struct AcknowledgedResponse {
    #[serde(default)]
    acknowledged: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "_scroll_id", default)]
    scroll_id: Option<String>,
    hits: SearchHits,
}

#[derive(Debug, Deserialize)]
struct SearchHits {
    #[serde(default)]
    total: Option<TotalHits>,
    #[serde(default)]
    hits: Vec<Hit>,
}

/// 🔢 ES 6 says `"total": 3`. ES 7+ says `"total": {"value": 3, "relation": "eq"}`.
/// Same number, two outfits.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TotalHits {
    Legacy(u64),
    Object { value: u64 },
}

impl TotalHits {
    fn value(&self) -> u64 {
        match self {
            TotalHits::Legacy(value) => *value,
            TotalHits::Object { value } => *value,
        }
    }
}

impl From<SearchResponse> for ScrollPage {
    fn from(response: SearchResponse) -> Self {
        ScrollPage {
            scroll_id: response.scroll_id,
            total: response.hits.total.map(|t| t.value()).unwrap_or(0),
            hits: response.hits.hits,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    #[serde(rename = "_index", default)]
    index: Option<String>,
    #[serde(rename = "_type", default)]
    doc_type: Option<String>,
    #[serde(rename = "_id", default)]
    id: Option<String>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct IndexAliases {
    #[serde(default)]
    aliases: HashMap<String, Value>,
}

/// 💬 `{"type": "mapper_parsing_exception", "reason": "..."}` → `"mapper_parsing_exception: ..."`.
fn describe_bulk_error(error: &Value) -> String {
    match (
        error.get("type").and_then(Value::as_str),
        error.get("reason").and_then(Value::as_str),
    ) {
        (Some(kind), Some(reason)) => format!("{}: {}", kind, reason),
        (None, Some(reason)) => reason.to_string(),
        _ => match error.as_str() {
            Some(text) => text.to_string(),
            None => error.to_string(),
        },
    }
}

fn summarize_bulk(response: BulkResponse, index: &str, hits: &[Hit]) -> BulkSummary {
    let mut summary = BulkSummary::default();
    for (position, item) in response.items.into_iter().enumerate() {
        // -- one key per item ("index"), named after the action we sent
        let Some(item) = item.into_values().next() else {
            continue;
        };
        match item.error {
            None => summary.succeeded += 1,
            Some(ref error) => {
                let fallback_id = hits.get(position).map(|h| h.id.clone()).unwrap_or_default();
                summary.failures.push(DocumentFailure {
                    index: item.index.clone().unwrap_or_else(|| index.to_string()),
                    doc_type: item.doc_type.clone(),
                    id: item.id.clone().unwrap_or(fallback_id),
                    error: describe_bulk_error(error),
                });
            }
        }
    }
    summary
}

#[async_trait]
impl DocumentStore for ElasticsearchStore {
    fn name(&self) -> &str {
        &self.config.url
    }

    async fn version(&self) -> Result<String, StoreError> {
        let url = self.endpoint("");
        let root: RootResponse = self.fetch(self.client.get(&url), &url).await?;
        if let Some(major) = major_of(&root.version.number) {
            let _ = self.major_version.set(major);
        }
        Ok(root.version.number)
    }

    async fn index_exists(&self, name: &str) -> Result<bool, StoreError> {
        let url = self.endpoint(name);
        let response = self.send(self.client.head(&url), &url).await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(StoreError::Status {
                url,
                status: status.as_u16(),
                body: String::new(),
            }),
        }
    }

    async fn get_mapping(&self, index: &str) -> Result<Value, StoreError> {
        let url = self.endpoint(&format!("{}/_mapping", index));
        self.fetch(self.client.get(&url), &url).await
    }

    async fn get_settings(&self, index: &str) -> Result<Value, StoreError> {
        let url = self.endpoint(&format!("{}/_settings", index));
        self.fetch(self.client.get(&url), &url).await
    }

    async fn create_index(&self, name: &str, body: &Value) -> Result<bool, StoreError> {
        let url = self.endpoint(name);
        debug!("🏗️ PUT {} with body {}", url, body);
        let request = self.json_request(self.client.put(&url), body);
        let response: AcknowledgedResponse = self.fetch(request, &url).await?;
        Ok(response.acknowledged)
    }

    async fn open_scroll(
        &self,
        index: &str,
        page_size: Option<usize>,
    ) -> Result<ScrollPage, StoreError> {
        let url = self.endpoint(&format!("{}/_search?scroll={}", index, self.scroll_keep_alive));
        // -- _doc order is the cheapest order. we copy everything, so order is vibes anyway.
        let mut body = json!({ "sort": ["_doc"], "track_total_hits": true });
        if let Some(size) = page_size {
            body["size"] = json!(size);
        }
        let request = self.json_request(self.client.post(&url), &body);
        let response: SearchResponse = self.fetch(request, &url).await?;
        trace!("📜 Scroll opened on {} with {} hits in the first page", index, response.hits.hits.len());
        Ok(response.into())
    }

    async fn next_scroll(&self, scroll_id: &str) -> Result<ScrollPage, StoreError> {
        let url = self.endpoint("_search/scroll");
        let body = json!({ "scroll": self.scroll_keep_alive, "scroll_id": scroll_id });
        let request = self.json_request(self.client.post(&url), &body);
        let response: SearchResponse = self.fetch(request, &url).await?;
        Ok(response.into())
    }

    async fn clear_scroll(&self, scroll_id: &str) -> Result<(), StoreError> {
        let url = self.endpoint("_search/scroll");
        let body = json!({ "scroll_id": [scroll_id] });
        let request = self.json_request(self.client.delete(&url), &body);
        let _: Value = self.fetch(request, &url).await?;
        Ok(())
    }

    async fn bulk_index(&self, index: &str, hits: &[Hit]) -> Result<BulkSummary, StoreError> {
        if hits.is_empty() {
            return Ok(BulkSummary::default());
        }
        let url = self.endpoint("_bulk");
        let request = self
            .client
            .post(&url)
            // ⚠️ application/x-ndjson, not application/json. ES cares. Deeply.
            .header("Content-Type", "application/x-ndjson")
            .body(Self::bulk_body(index, hits, self.wants_document_types()));
        let response: BulkResponse = self.fetch(request, &url).await?;
        let summary = summarize_bulk(response, index, hits);
        trace!(
            "📬 Bulk into {}: {} ok, {} refused",
            index,
            summary.succeeded,
            summary.failures.len()
        );
        Ok(summary)
    }

    async fn refresh(&self, index: &str) -> Result<(), StoreError> {
        let url = self.endpoint(&format!("{}/_refresh", index));
        let _: Value = self.fetch(self.client.post(&url), &url).await?;
        Ok(())
    }

    async fn get_alias_bindings(&self) -> Result<AliasBindings, StoreError> {
        let url = self.endpoint("_aliases");
        let by_index: HashMap<String, IndexAliases> =
            self.fetch(self.client.get(&url), &url).await?;

        // 🔄 the store answers index → aliases; we want alias → indices
        let mut bindings = AliasBindings::new();
        for (index, entry) in by_index {
            for (alias, properties) in entry.aliases {
                let options = match properties {
                    Value::Object(options) => options,
                    _ => Map::new(),
                };
                let binding = AliasBinding::new(alias.clone(), index.clone()).with_options(options);
                bindings.entry(alias).or_default().push(binding);
            }
        }
        for bound in bindings.values_mut() {
            bound.sort_by(|a, b| a.index.cmp(&b.index));
        }
        Ok(bindings)
    }

    async fn update_aliases(
        &self,
        removals: &[AliasBinding],
        additions: &[AliasBinding],
    ) -> Result<(), StoreError> {
        let url = self.endpoint("_aliases");
        // -- removals first, then additions, one request: nobody sees the alias bound to nothing
        let actions: Vec<Value> = removals
            .iter()
            .map(|b| json!({ "remove": { "index": b.index, "alias": b.alias } }))
            .chain(additions.iter().map(|b| {
                // -- filter, routing and is_write_index ride along on the add
                let mut add = b.options.clone();
                add.insert("index".to_string(), json!(b.index));
                add.insert("alias".to_string(), json!(b.alias));
                json!({ "add": add })
            }))
            .collect();
        let body = json!({ "actions": actions });
        debug!("🔀 POST {} with body {}", url, body);
        let request = self.json_request(self.client.post(&url), &body);
        let response: AcknowledgedResponse = self.fetch(request, &url).await?;
        if !response.acknowledged {
            return Err(StoreError::Unexpected {
                url,
                reason: "alias update was not acknowledged".to_string(),
            });
        }
        Ok(())
    }
}
