//! 🏗️ Target Provisioner: make sure there is somewhere for the documents to land.
//!
//! Absent target: create it exactly once, from the replacement mapping or the source's
//! own schema. Present target: ask before reusing it, and refuse outright if the operator
//! also brought a mapping we'd have no way to apply.

use tracing::info;

use crate::backends::DocumentStore;
use crate::confirm::{self, Confirmation};
use crate::error::MigrationError;
use crate::migration::source_resolver;
use crate::request::MigrationRequest;

/// 🎯 How the target ended up ready (or didn't).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Provisioned {
    Created,
    Reused,
    Declined,
}

pub(crate) async fn provision(
    source: &dyn DocumentStore,
    target: &dyn DocumentStore,
    request: &MigrationRequest,
    confirmation: &mut dyn Confirmation,
) -> Result<Provisioned, MigrationError> {
    let target_index = request.target_index.as_str();
    let exists = target.index_exists(target_index).await.map_err(|e| {
        MigrationError::transport(format!("verifying if index <{}> exists", target_index), e)
    })?;

    if exists {
        if request.explicit_mapping.is_some() {
            return Err(MigrationError::TargetExistsWithMapping(target_index.to_string()));
        }
        let question = format!(
            "Index <{}> already exists, do you want to index all documents without changing the current mapping?",
            target_index
        );
        return Ok(match confirm::confirm_blocking(confirmation, &question)? {
            true => {
                info!("♻️ Reusing existing index <{}> with its current mapping", target_index);
                Provisioned::Reused
            }
            false => {
                info!("🛑 Operator declined to reuse <{}>, nothing was copied", target_index);
                Provisioned::Declined
            }
        });
    }

    let body = match request.explicit_mapping {
        Some(ref mapping) => mapping.clone(),
        None => source_resolver::resolve_schema(source, &request.source_index).await?,
    };

    let acknowledged = target
        .create_index(target_index, &body)
        .await
        .map_err(|e| MigrationError::IndexCreationFailed {
            index: target_index.to_string(),
            reason: e.to_string(),
        })?;
    if !acknowledged {
        return Err(MigrationError::IndexCreationFailed {
            index: target_index.to_string(),
            reason: "the store did not acknowledge the new index".to_string(),
        });
    }

    info!("🏗️ New index <{}> was created on {}", target_index, target.name());
    Ok(Provisioned::Created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::InMemoryStore;
    use crate::backends::in_mem::StoreOperation;
    use crate::confirm::PromptConfirmation;
    use serde_json::json;
    use std::io::Cursor;

    fn request(explicit_mapping: Option<serde_json::Value>) -> MigrationRequest {
        MigrationRequest {
            source_host: "memory".to_string(),
            source_index: "orders".to_string(),
            target_host: "memory".to_string(),
            target_index: "orders-v2".to_string(),
            explicit_mapping,
            batch_size: Some(2),
        }
    }

    fn answers(script: &str) -> PromptConfirmation<Cursor<Vec<u8>>, Vec<u8>> {
        PromptConfirmation::new(Cursor::new(script.as_bytes().to_vec()), Vec::new())
    }

    async fn store_with_source() -> InMemoryStore {
        let store = InMemoryStore::new("memory");
        store
            .put_index(
                "orders",
                json!({ "mappings": { "properties": { "sku": { "type": "keyword" } } } }),
                json!({ "index": { "number_of_shards": "1" } }),
            )
            .await;
        store
    }

    #[tokio::test]
    async fn the_one_where_the_target_is_born_from_the_source_schema() -> anyhow::Result<()> {
        let store = store_with_source().await;
        let outcome = provision(&store, &store, &request(None), &mut answers("")).await?;

        assert_eq!(outcome, Provisioned::Created);
        assert_eq!(
            store.creations().await,
            vec![(
                "orders-v2".to_string(),
                json!({
                    "mappings": { "properties": { "sku": { "type": "keyword" } } },
                    "settings": { "index": { "number_of_shards": "1" } }
                })
            )]
        );
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_operator_mapping_wins() -> anyhow::Result<()> {
        let store = store_with_source().await;
        let the_mapping = json!({ "mappings": { "properties": { "sku": { "type": "text" } } } });
        provision(&store, &store, &request(Some(the_mapping.clone())), &mut answers("")).await?;

        assert_eq!(store.creations().await, vec![("orders-v2".to_string(), the_mapping)]);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_shrug_from_the_store_is_fatal() {
        let store = store_with_source().await;
        store.withhold_acknowledgement().await;

        assert!(matches!(
            provision(&store, &store, &request(None), &mut answers("")).await,
            Err(MigrationError::IndexCreationFailed { .. })
        ));
    }

    #[tokio::test]
    async fn the_one_where_creation_blows_up_on_the_wire() {
        let store = store_with_source().await;
        store.fail_on(StoreOperation::CreateIndex).await;

        assert!(matches!(
            provision(&store, &store, &request(None), &mut answers("")).await,
            Err(MigrationError::IndexCreationFailed { .. })
        ));
    }

    #[tokio::test]
    async fn the_one_where_an_existing_target_needs_a_yes() -> anyhow::Result<()> {
        let store = store_with_source().await;
        store.put_index("orders-v2", json!({ "mappings": {} }), json!({})).await;

        let reused = provision(&store, &store, &request(None), &mut answers("huh\ny\n")).await?;
        assert_eq!(reused, Provisioned::Reused);

        let declined = provision(&store, &store, &request(None), &mut answers("No\n")).await?;
        assert_eq!(declined, Provisioned::Declined);

        assert!(store.creations().await.is_empty(), "nothing gets created twice");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn the_one_where_the_question_is_asked_on_a_multi_thread_runtime() -> anyhow::Result<()> {
        let store = store_with_source().await;
        store.put_index("orders-v2", json!({ "mappings": {} }), json!({})).await;

        let outcome = provision(&store, &store, &request(None), &mut answers("yes\n")).await?;
        assert_eq!(outcome, Provisioned::Reused);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_existing_target_plus_mapping_is_ambiguous() {
        let store = store_with_source().await;
        store.put_index("orders-v2", json!({ "mappings": {} }), json!({})).await;

        let result = provision(
            &store,
            &store,
            &request(Some(json!({ "mappings": {} }))),
            &mut answers("yes\n"),
        )
        .await;
        assert!(matches!(result, Err(MigrationError::TargetExistsWithMapping(name)) if name == "orders-v2"));
    }
}
