//! 🎬 *[camera pans across a dimly lit server room]*
//! 🎬 "In a world where mappings must change... one alias refused to blink."
//!
//! 📦 The migration state machine. Strictly forward, no loops back:
//!
//! ```text
//! resolve source ──▶ provision target ──▶ transfer ──▶ repoint alias
//!        │                  │                 │              │
//!   SourceNotFound    Declined (exit 0)  TransferFailed  AliasUpdateFailed
//! ```
//!
//! Every fatal branch aborts the run. Per-document failures do not; they ride along in
//! the report. The only place this waits on a human is the provisioning prompt.

mod alias_swap;
mod source_resolver;
mod target_provisioner;
mod transfer;

pub use source_resolver::strip_generated_settings;

use tracing::info;

use crate::backends::DocumentStore;
use crate::confirm::Confirmation;
use crate::error::MigrationError;
use crate::progress::ReindexProgress;
use crate::report::{MigrationOutcome, MigrationReport};
use crate::request::MigrationRequest;
use target_provisioner::Provisioned;

/// 🚀 Run one migration, start to finish.
///
/// `progress` is owned for the duration of this run and dropped with it.
pub async fn migrate(
    request: &MigrationRequest,
    source: &dyn DocumentStore,
    target: &dyn DocumentStore,
    confirmation: &mut dyn Confirmation,
    mut progress: ReindexProgress,
) -> Result<MigrationOutcome, MigrationError> {
    request.validate()?;
    info!(
        "🎬 Migrating <{}> on {} → <{}> on {}",
        request.source_index,
        source.name(),
        request.target_index,
        target.name()
    );

    source_resolver::ensure_source_exists(source, &request.source_index).await?;

    let target_created = match target_provisioner::provision(source, target, request, confirmation).await? {
        Provisioned::Created => true,
        Provisioned::Reused => false,
        Provisioned::Declined => {
            return Ok(MigrationOutcome::Declined {
                target_index: request.target_index.clone(),
            });
        }
    };

    let (transfer, elapsed) = transfer::run_transfer(source, target, request, &mut progress).await?;

    let alias_swap =
        alias_swap::repoint_alias(target, &request.source_index, &request.target_index).await?;

    Ok(MigrationOutcome::Completed(MigrationReport {
        source_index: request.source_index.clone(),
        target_index: request.target_index.clone(),
        target_created,
        transfer,
        elapsed,
        alias_swap,
    }))
}
