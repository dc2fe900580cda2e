//! 🚚 reidx: move an Elasticsearch index under a new mapping without the readers noticing.
//!
//! Three stages, strictly in order: find the source, get a target ready, copy everything
//! across and flip the alias. See [`migration::migrate`] for the state machine and
//! [`backends::DocumentStore`] for the seam between it and the network.

pub mod app_config;
pub mod backends;
pub mod common;
pub mod confirm;
pub mod error;
pub mod migration;
pub mod progress;
pub mod report;
pub mod request;

use tracing::info;

use crate::app_config::{AppConfig, ClusterConfig, TransportConfig};
use crate::backends::{DocumentStore, ElasticsearchStore};
use crate::confirm::Confirmation;
use crate::progress::ReindexProgress;
use crate::request::MigrationRequest;

pub use crate::error::{MigrationError, StoreError};
pub use crate::report::{MigrationOutcome, MigrationReport};

/// 🔌 Build a client for one cluster and say hello, so a dead host fails before anything else.
async fn connect(
    cluster: &ClusterConfig,
    transport: &TransportConfig,
) -> Result<ElasticsearchStore, MigrationError> {
    let action = || format!("connecting to {}", cluster.url);
    let store = ElasticsearchStore::new(cluster.clone(), transport)
        .map_err(|e| MigrationError::transport(action(), e))?;
    let version = store
        .version()
        .await
        .map_err(|e| MigrationError::transport(action(), e))?;
    info!("🔌 Connected in Elasticsearch <{}>, version {}", cluster.url, version);
    Ok(store)
}

/// 🚀 From loaded configuration to a finished (or declined) migration against real clusters.
pub async fn run(
    app_config: AppConfig,
    confirmation: &mut dyn Confirmation,
) -> Result<MigrationOutcome, MigrationError> {
    let request = MigrationRequest::from_config(&app_config).await?;

    let source = connect(&app_config.source, &app_config.transport).await?;
    let target = connect(&app_config.target, &app_config.transport).await?;

    let progress = ReindexProgress::new(&request.source_index);
    migration::migrate(&request, &source, &target, confirmation, progress).await
}
