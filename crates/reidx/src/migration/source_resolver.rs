//! 🔍 Source Resolver: "does the thing we're copying even exist, and what does it look like?"

use serde_json::Value;
use tracing::{debug, info};

use crate::backends::DocumentStore;
use crate::error::{MigrationError, StoreError};

/// 🗑️ Settings the store stamps on an index itself and refuses to accept on create.
const GENERATED_INDEX_SETTINGS: &[&str] = &["uuid", "creation_date", "provided_name", "version", "resize"];

pub(crate) async fn ensure_source_exists(
    source: &dyn DocumentStore,
    index: &str,
) -> Result<(), MigrationError> {
    let exists = source.index_exists(index).await.map_err(|e| {
        MigrationError::transport(format!("verifying if index <{}> exists", index), e)
    })?;
    if !exists {
        return Err(MigrationError::SourceNotFound(index.to_string()));
    }
    info!("✅ Source <{}> found on {}", index, source.name());
    Ok(())
}

/// 🗺️ Mapping + settings of `index`, merged into one body that recreates an equivalent index:
/// `{"mappings": …, "settings": …}`.
pub(crate) async fn resolve_schema(
    source: &dyn DocumentStore,
    index: &str,
) -> Result<Value, MigrationError> {
    let schema_failed = |source: StoreError| MigrationError::SchemaFetchFailed {
        index: index.to_string(),
        source,
    };

    let mapping_response = source.get_mapping(index).await.map_err(schema_failed)?;
    let mut schema = first_entry(source, mapping_response, "mapping").map_err(schema_failed)?;

    let settings_response = source.get_settings(index).await.map_err(schema_failed)?;
    let mut settings = first_entry(source, settings_response, "settings")
        .map_err(schema_failed)?
        .get_mut("settings")
        .map(Value::take)
        .unwrap_or_else(|| Value::Object(Default::default()));
    strip_generated_settings(&mut settings);

    match schema.as_object_mut() {
        Some(body) => {
            body.insert("settings".to_string(), settings);
        }
        None => {
            return Err(schema_failed(StoreError::Unexpected {
                url: source.name().to_string(),
                reason: format!("mapping of <{}> is not an object", index),
            }));
        }
    }
    debug!("🗺️ Resolved schema of <{}>: {}", index, schema);
    Ok(schema)
}

/// 📦 Responses are keyed by concrete index name. When `index` is an alias the key is the
/// index behind it, so we take whichever entry comes first.
fn first_entry(source: &dyn DocumentStore, response: Value, what: &str) -> Result<Value, StoreError> {
    match response {
        Value::Object(entries) => entries.into_iter().next().map(|(_, v)| v).ok_or_else(|| {
            StoreError::Unexpected {
                url: source.name().to_string(),
                reason: format!("empty {} response", what),
            }
        }),
        _ => Err(StoreError::Unexpected {
            url: source.name().to_string(),
            reason: format!("{} response is not an object", what),
        }),
    }
}

/// 🧽 Drop store-generated settings, in both nested (`{"index": {"uuid": …}}`) and flat
/// (`{"index.uuid": …}`) form.
pub fn strip_generated_settings(settings: &mut Value) {
    let Some(top) = settings.as_object_mut() else {
        return;
    };

    if let Some(index) = top.get_mut("index").and_then(Value::as_object_mut) {
        for key in GENERATED_INDEX_SETTINGS {
            index.remove(*key);
        }
        if let Some(allocation) = index
            .get_mut("routing")
            .and_then(|r| r.get_mut("allocation"))
            .and_then(Value::as_object_mut)
        {
            allocation.remove("initial_recovery");
        }
    }

    top.retain(|key, _| {
        let Some(rest) = key.strip_prefix("index.") else {
            return true;
        };
        let generated = GENERATED_INDEX_SETTINGS
            .iter()
            .any(|g| rest == *g || rest.starts_with(&format!("{}.", g)));
        !generated && !rest.starts_with("routing.allocation.initial_recovery")
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::InMemoryStore;
    use crate::backends::in_mem::StoreOperation;
    use serde_json::json;

    #[tokio::test]
    async fn the_one_where_the_source_has_left_the_building() {
        let store = InMemoryStore::new("memory");
        assert!(matches!(
            ensure_source_exists(&store, "orders").await,
            Err(MigrationError::SourceNotFound(name)) if name == "orders"
        ));
    }

    #[tokio::test]
    async fn the_one_where_mapping_and_settings_become_one_body() -> anyhow::Result<()> {
        let store = InMemoryStore::new("memory");
        store
            .put_index(
                "orders-v1",
                json!({ "mappings": { "properties": { "sku": { "type": "keyword" } } } }),
                json!({ "index": {
                    "number_of_shards": "3",
                    "uuid": "abc",
                    "creation_date": "1700000000000",
                    "provided_name": "orders-v1",
                    "version": { "created": "7170999" },
                    "analysis": { "analyzer": { "folded": { "type": "custom" } } }
                } }),
            )
            .await;
        store.bind_alias("orders-live", "orders-v1").await;

        let schema = resolve_schema(&store, "orders-live").await?;
        assert_eq!(
            schema,
            json!({
                "mappings": { "properties": { "sku": { "type": "keyword" } } },
                "settings": { "index": {
                    "number_of_shards": "3",
                    "analysis": { "analyzer": { "folded": { "type": "custom" } } }
                } }
            })
        );
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_schema_fetch_trips_on_the_wire() {
        let store = InMemoryStore::new("memory");
        store.put_index("orders", json!({ "mappings": {} }), json!({})).await;
        store.fail_on(StoreOperation::GetSettings).await;

        assert!(matches!(
            resolve_schema(&store, "orders").await,
            Err(MigrationError::SchemaFetchFailed { .. })
        ));
    }

    #[test]
    fn the_one_where_flat_settings_get_scrubbed_too() {
        let mut settings = json!({
            "index.number_of_replicas": "1",
            "index.uuid": "abc",
            "index.version.created": "7170999",
            "index.routing.allocation.initial_recovery._id": "node-1",
            "index.routing.allocation.include._tier_preference": "data_content"
        });
        strip_generated_settings(&mut settings);
        assert_eq!(
            settings,
            json!({
                "index.number_of_replicas": "1",
                "index.routing.allocation.include._tier_preference": "data_content"
            })
        );
    }
}
