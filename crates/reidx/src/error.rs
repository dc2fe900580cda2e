//! 💀 Errors: the taxonomy of everything that can go sideways during a migration.
//!
//! Two layers, like a sad lasagna:
//! - [`StoreError`]: the document store said no, or said nothing, or said gibberish.
//! - [`MigrationError`]: which stage of the run died, and what it was holding at the time.
//!
//! Per-document bulk failures are NOT in here. Those are data, not errors. They get
//! collected into a `TransferOutcome` and read aloud at the end, like a eulogy. 🦆

use std::path::PathBuf;

use thiserror::Error;

/// 📡 Transport-level failure talking to the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// 🔌 The request never got an HTTP answer (DNS, refused, timeout, TLS tantrum).
    #[error("request to '{url}' failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// 🚫 The store answered, but not with a 2xx.
    #[error("'{url}' answered {status}: {body}")]
    Status { url: String, status: u16, body: String },

    /// 🧩 The store answered 2xx with a body we can't make sense of.
    #[error("could not decode response from '{url}'")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// 🤷 The body decoded fine but is missing a piece we need.
    #[error("unexpected response from '{url}': {reason}")]
    Unexpected { url: String, reason: String },

    /// 🧪 Failure injected by an in-memory store. Tests only care that it propagates.
    #[error("injected store failure: {0}")]
    Injected(String),
}

/// 🎬 Fatal conditions of a migration run. Every one of these aborts the run.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// 📝 Missing or contradictory input. Raised before anything touches the network.
    #[error("invalid migration request: {0}")]
    Validation(String),

    /// 📂 The replacement mapping file could not be read.
    #[error("could not read mapping file '{path}'")]
    MappingFileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 🧩 The replacement mapping file is not JSON.
    #[error("mapping file '{path}' is not valid JSON")]
    MappingFileInvalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// 📡 Generic transport failure while `action` was in flight.
    #[error("store request failed while {action}")]
    Transport {
        action: String,
        #[source]
        source: StoreError,
    },

    /// 🔍 The source index or alias does not exist.
    #[error("the index <{0}> doesn't exist, we need a valid index or alias")]
    SourceNotFound(String),

    /// 🗺️ Mapping or settings of the source could not be fetched.
    #[error("could not fetch schema of index <{index}>")]
    SchemaFetchFailed {
        index: String,
        #[source]
        source: StoreError,
    },

    /// 🏗️ The store refused, or did not acknowledge, the new index.
    #[error("could not create index <{index}>: {reason}")]
    IndexCreationFailed { index: String, reason: String },

    /// ⚠️ An explicit mapping was supplied for a target that already exists.
    #[error(
        "index <{0}> already exists and a replacement mapping was supplied; \
         delete the index or drop the mapping file and re-run"
    )]
    TargetExistsWithMapping(String),

    /// ⌨️ The confirmation prompt could not read an answer.
    #[error("cannot read confirmation from input: {0}")]
    Confirmation(String),

    /// 🚚 The bulk transfer itself blew up (not a per-document failure).
    #[error("reindexing <{source_index}> into <{target_index}> failed")]
    TransferFailed {
        source_index: String,
        target_index: String,
        #[source]
        source: StoreError,
    },

    /// 🔀 The combined alias update request failed.
    #[error("error updating alias <{alias}>")]
    AliasUpdateFailed {
        alias: String,
        #[source]
        source: StoreError,
    },
}

impl MigrationError {
    pub(crate) fn transport(action: impl Into<String>, source: StoreError) -> Self {
        MigrationError::Transport {
            action: action.into(),
            source,
        }
    }
}
