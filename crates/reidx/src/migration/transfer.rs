//! 🚚 Transfer: scroll the source, bulk into the target, count everything.
//!
//! Pages are copied one blocking round trip at a time. Progress callbacks run inline
//! after each page, on the same control flow, so the tally and the tracker need no locks.
//! A per-document refusal is bookkeeping. A failed request is the end of the road.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::backends::DocumentStore;
use crate::common::{ScrollPage, TransferOutcome};
use crate::error::{MigrationError, StoreError};
use crate::progress::{ReindexProgress, format_duration};
use crate::request::MigrationRequest;

/// 📜 Copy every document of `source_index` into `target_index`, `batch_size` at a time.
///
/// `on_progress(processed, total)` fires after every page with cumulative counts.
/// The scroll is cleared on the way out, success or not; a failure to clear is only a warning.
pub(crate) async fn reindex(
    source: &dyn DocumentStore,
    source_index: &str,
    target: &dyn DocumentStore,
    target_index: &str,
    batch_size: Option<usize>,
    on_progress: &mut dyn FnMut(u64, u64),
) -> Result<TransferOutcome, StoreError> {
    let first = source.open_scroll(source_index, batch_size).await?;
    let mut scroll_id = first.scroll_id.clone();

    let result = copy_pages(source, target, target_index, first, &mut scroll_id, on_progress).await;

    if let Some(ref id) = scroll_id {
        if let Err(e) = source.clear_scroll(id).await {
            warn!("⚠️ Could not clear scroll on {}: {}", source.name(), e);
        }
    }
    result
}

async fn copy_pages(
    source: &dyn DocumentStore,
    target: &dyn DocumentStore,
    target_index: &str,
    first: ScrollPage,
    scroll_id: &mut Option<String>,
    on_progress: &mut dyn FnMut(u64, u64),
) -> Result<TransferOutcome, StoreError> {
    let total = first.total;
    let mut page = first;
    let mut outcome = TransferOutcome::default();
    let mut processed = 0u64;

    while !page.hits.is_empty() {
        debug!("📦 Copying a page of {} documents into <{}>", page.hits.len(), target_index);
        let summary = target.bulk_index(target_index, &page.hits).await?;
        processed += page.hits.len() as u64;
        outcome.absorb(summary);
        on_progress(processed, total);

        let Some(id) = scroll_id.clone() else {
            break;
        };
        page = source.next_scroll(&id).await?;
        // -- the store may hand out a fresh cursor id with any page
        if page.scroll_id.is_some() {
            *scroll_id = page.scroll_id.clone();
        }
    }

    Ok(outcome)
}

/// 🚀 The Coordinator's transfer step: reindex with progress, refresh, and report.
pub(crate) async fn run_transfer(
    source: &dyn DocumentStore,
    target: &dyn DocumentStore,
    request: &MigrationRequest,
    progress: &mut ReindexProgress,
) -> Result<(TransferOutcome, Duration), MigrationError> {
    let transfer_failed = |source: StoreError| MigrationError::TransferFailed {
        source_index: request.source_index.clone(),
        target_index: request.target_index.clone(),
        source,
    };

    info!("🚚 Starting reindexing <{}> → <{}>...", request.source_index, request.target_index);
    progress.start();
    let result = reindex(
        source,
        &request.source_index,
        target,
        &request.target_index,
        request.batch_size,
        &mut |processed, total| {
            progress.observe(processed, total);
        },
    )
    .await;
    progress.finish();
    let outcome = result.map_err(transfer_failed)?;

    target
        .refresh(&request.target_index)
        .await
        .map_err(transfer_failed)?;

    let elapsed = progress.elapsed();
    info!(
        "✅ Reindex was completed in <{}>, {} documents succeeded and {} failed",
        format_duration(elapsed),
        outcome.success_count,
        outcome.failure_count
    );

    if !outcome.failures.is_empty() {
        warn!("⚠️ We got errors in some documents...");
        for failure in &outcome.failures {
            error!(
                "💔 Index[{}] Type[{}] Id[{}]: {}",
                failure.index,
                failure.doc_type.as_deref().unwrap_or("_doc"),
                failure.id,
                failure.error
            );
        }
    }

    Ok((outcome, elapsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::InMemoryStore;
    use crate::backends::in_mem::StoreOperation;
    use serde_json::json;

    async fn store_with_docs(count: usize) -> anyhow::Result<InMemoryStore> {
        let store = InMemoryStore::new("memory");
        store.put_index("orders", json!({ "mappings": {} }), json!({})).await;
        store.put_index("orders-v2", json!({ "mappings": {} }), json!({})).await;
        for n in 0..count {
            store
                .put_document("orders", &format!("doc-{}", n), &format!(r#"{{"n":{}}}"#, n))
                .await?;
        }
        Ok(store)
    }

    #[tokio::test]
    async fn the_one_where_every_document_is_accounted_for() -> anyhow::Result<()> {
        let store = store_with_docs(7).await?;
        store.reject_document("doc-3").await;
        store.reject_document("doc-5").await;

        let mut the_calls = Vec::new();
        let outcome = reindex(&store, "orders", &store, "orders-v2", Some(3), &mut |done, total| {
            the_calls.push((done, total))
        })
        .await?;

        assert_eq!(outcome.success_count, 5);
        assert_eq!(outcome.failure_count, 2);
        assert_eq!(outcome.processed(), 7, "success + failure = total");
        let the_failed: Vec<&str> = outcome.failures.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(the_failed, vec!["doc-3", "doc-5"]);
        assert_eq!(the_calls, vec![(3, 7), (6, 7), (7, 7)]);
        assert_eq!(store.documents("orders-v2").await.len(), 5);
        assert_eq!(store.open_scrolls().await, 0, "scroll is cleared on the way out");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_store_picks_the_page_size() -> anyhow::Result<()> {
        let store = store_with_docs(25).await?;
        let mut the_pages = 0;
        let outcome =
            reindex(&store, "orders", &store, "orders-v2", None, &mut |_, _| the_pages += 1).await?;

        assert_eq!(outcome.success_count, 25);
        assert_eq!(the_pages, 3, "in-memory default is 10 per page");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_an_empty_source_copies_nothing_quietly() -> anyhow::Result<()> {
        let store = store_with_docs(0).await?;
        let mut the_calls = 0;
        let outcome =
            reindex(&store, "orders", &store, "orders-v2", Some(5), &mut |_, _| the_calls += 1).await?;

        assert_eq!(outcome, TransferOutcome::default());
        assert_eq!(the_calls, 0);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_dead_bulk_endpoint_is_fatal_but_tidy() -> anyhow::Result<()> {
        let store = store_with_docs(4).await?;
        store.fail_on(StoreOperation::Bulk).await;

        let result = reindex(&store, "orders", &store, "orders-v2", Some(2), &mut |_, _| {}).await;
        assert!(matches!(result, Err(StoreError::Injected(_))));
        assert_eq!(store.open_scrolls().await, 0, "scroll is cleared even on failure");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_stuck_scroll_cleanup_is_just_a_warning() -> anyhow::Result<()> {
        let store = store_with_docs(2).await?;
        store.fail_on(StoreOperation::ClearScroll).await;

        let outcome = reindex(&store, "orders", &store, "orders-v2", Some(5), &mut |_, _| {}).await?;
        assert_eq!(outcome.success_count, 2);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_coordinator_reports_monotonic_progress() -> anyhow::Result<()> {
        let store = store_with_docs(9).await?;
        let request = MigrationRequest {
            source_host: "memory".to_string(),
            source_index: "orders".to_string(),
            target_host: "memory".to_string(),
            target_index: "orders-v2".to_string(),
            explicit_mapping: None,
            batch_size: Some(4),
        };
        let mut the_tracker = ReindexProgress::hidden("orders");

        let (outcome, _elapsed) = run_transfer(&store, &store, &request, &mut the_tracker).await?;
        assert_eq!(outcome.success_count, 9);
        assert_eq!(the_tracker.last_percent(), Some(100));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_failed_refresh_is_a_failed_transfer() -> anyhow::Result<()> {
        let store = store_with_docs(1).await?;
        store.fail_on(StoreOperation::Refresh).await;
        let request = MigrationRequest {
            source_host: "memory".to_string(),
            source_index: "orders".to_string(),
            target_host: "memory".to_string(),
            target_index: "orders-v2".to_string(),
            explicit_mapping: None,
            batch_size: None,
        };

        let result = run_transfer(&store, &store, &request, &mut ReindexProgress::hidden("orders")).await;
        assert!(matches!(result, Err(MigrationError::TransferFailed { .. })));
        Ok(())
    }
}
