//! 🔀 Alias swap: the "zero" in zero-downtime.
//!
//! If the name we copied from is an alias, every old binding goes and the new index
//! comes in, in one request. Readers see the old index or the new one, never neither.
//! If the name was a bare index there is nothing to swap; external references are
//! the operator's business.

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::backends::DocumentStore;
use crate::common::AliasBinding;
use crate::error::MigrationError;
use crate::report::AliasSwap;

pub(crate) async fn repoint_alias(
    store: &dyn DocumentStore,
    alias: &str,
    new_index: &str,
) -> Result<Option<AliasSwap>, MigrationError> {
    // -- one snapshot, taken after the transfer finished
    let bindings = store
        .get_alias_bindings()
        .await
        .map_err(|e| MigrationError::transport("getting aliases", e))?;

    let removals = bindings.get(alias).cloned().unwrap_or_default();
    if removals.is_empty() {
        info!("📭 <{}> is a bare index, no alias to repoint", alias);
        return Ok(None);
    }

    let additions = [AliasBinding::new(alias, new_index).with_options(carried_options(alias, &removals))];
    let previous: Vec<String> = removals.iter().map(|b| b.index.clone()).collect();

    store
        .update_aliases(&removals, &additions)
        .await
        .map_err(|source| MigrationError::AliasUpdateFailed {
            alias: alias.to_string(),
            source,
        })?;

    info!(
        "🔀 Alias <{}>: {:?} was removed and now points to <{}>",
        alias, previous, new_index
    );
    Ok(Some(AliasSwap {
        alias: alias.to_string(),
        previous,
        current: new_index.to_string(),
    }))
}

/// 🏷️ The new binding inherits the old one's filter, routing and write flag.
/// With several old bindings that disagree, the first (by index name) wins and we say so.
fn carried_options(alias: &str, removals: &[AliasBinding]) -> Map<String, Value> {
    let mut with_options = removals.iter().filter(|b| !b.options.is_empty());
    let Some(first) = with_options.next() else {
        return Map::new();
    };
    if with_options.any(|other| other.options != first.options) {
        warn!(
            "⚠️ Bindings of <{}> disagree on their properties, keeping the ones from <{}>",
            alias, first.index
        );
    }
    first.options.clone()
}
