//! 🔧 App Configuration: the sacred TOML-to-struct pipeline, now with flags on top.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." -- every developer at 3am 🦆
//!
//! 🏗️ Layers, lowest to highest: serde defaults → TOML file → `REIDX_*` env → CLI flags.
//! Figment does the merging. We do the worrying.

use std::path::{Path, PathBuf};

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::Deserialize;
use tracing::info;

/// 📡 Where we point when nobody says otherwise. Localhost. Always localhost.
pub const DEFAULT_CLUSTER_URL: &str = "http://127.0.0.1:9200";

/// 📦 Everything a migration run needs to know about itself.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 🚰 Where the documents live today.
    #[serde(default)]
    pub source: ClusterConfig,
    /// 🎯 Where they will live tomorrow. `index` may be left empty; we'll invent one.
    #[serde(default)]
    pub target: ClusterConfig,
    /// 🗺️ Optional replacement mapping document for the new index.
    #[serde(default)]
    pub mapping_file: Option<PathBuf>,
    /// 📦 Docs per scroll page / bulk request. `<= 0` lets the store pick.
    #[serde(default = "default_bulk_size")]
    pub bulk_size: i64,
    #[serde(default)]
    pub transport: TransportConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source: ClusterConfig::default(),
            target: ClusterConfig::default(),
            mapping_file: None,
            bulk_size: default_bulk_size(),
            transport: TransportConfig::default(),
        }
    }
}

/// 🔌 One cluster endpoint plus whichever auth you brought.
///
/// Auth is tri-modal: api_key, username+password, or "I hope anonymous works".
/// API key wins when both are present. This is not a democracy.
#[derive(Debug, Deserialize, Clone)]
pub struct ClusterConfig {
    #[serde(default = "default_cluster_url")]
    pub url: String,
    #[serde(default)]
    pub index: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            url: default_cluster_url(),
            index: None,
            username: None,
            password: None,
            api_key: None,
        }
    }
}

/// ⏱️ HTTP patience levels and scroll cursor lifetime.
#[derive(Debug, Deserialize, Clone)]
pub struct TransportConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// 📜 How long the source keeps the scroll context warm between pages. ES time units.
    #[serde(default = "default_scroll_keep_alive")]
    pub scroll_keep_alive: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            scroll_keep_alive: default_scroll_keep_alive(),
        }
    }
}

fn default_cluster_url() -> String {
    DEFAULT_CLUSTER_URL.to_string()
}

// 📦 500 docs per page. Big enough to be fast, small enough to fit in a bulk request.
fn default_bulk_size() -> i64 {
    500
}

fn default_connect_timeout_secs() -> u64 {
    10
}

// ⏱️ bulk requests can be meaty and we're not monsters
fn default_request_timeout_secs() -> u64 {
    60
}

fn default_scroll_keep_alive() -> String {
    "5m".to_string()
}

/// 🎛️ Values the operator typed on the command line. Each one, when present,
/// beats whatever the file and the environment said.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub from_host: Option<String>,
    pub index: Option<String>,
    pub to_host: Option<String>,
    pub new_index: Option<String>,
    pub new_mapping: Option<PathBuf>,
    pub bulk_size: Option<i64>,
}

impl ConfigOverrides {
    fn into_figment(self, figment: Figment) -> Figment {
        // 🔧 one Serialized provider per flag, keyed by its dotted path in AppConfig
        let mut figment = figment;
        if let Some(url) = self.from_host {
            figment = figment.merge(Serialized::default("source.url", url));
        }
        if let Some(index) = self.index {
            figment = figment.merge(Serialized::default("source.index", index));
        }
        if let Some(url) = self.to_host {
            figment = figment.merge(Serialized::default("target.url", url));
        }
        if let Some(index) = self.new_index {
            figment = figment.merge(Serialized::default("target.index", index));
        }
        if let Some(path) = self.new_mapping {
            figment = figment.merge(Serialized::default("mapping_file", path));
        }
        if let Some(bulk_size) = self.bulk_size {
            figment = figment.merge(Serialized::default("bulk_size", bulk_size));
        }
        figment
    }
}

/// 🚀 Load the config: file, then env vars, then flags. Last one wins.
///
/// - `config_file_name` None → env + flags only. No pizza defaults, no surprise `config.toml`.
/// - `config_file_name` Some → the file joins the party, under env and flags.
///
/// Nested env keys use a double underscore: `REIDX_SOURCE__URL`, `REIDX_TARGET__API_KEY`.
pub fn load_config(
    config_file_name: Option<&Path>,
    overrides: ConfigOverrides,
) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new();
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };
    let config = config.merge(Env::prefixed("REIDX_").split("__"));
    let config = overrides.into_figment(config);

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}', environment variables (REIDX_*) and flags. \
             The file exists in our hearts, but apparently not in a shape serde understands.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (REIDX_*) and flags. \
                 No file was provided, so this one's all on the environment. Classic."
            .to_string(),
    };

    config.extract().context(context_msg)
}
