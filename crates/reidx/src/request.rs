//! 📝 The Migration Request: what the operator asked for, checked once, then frozen.
//!
//! Everything in here happens before a single byte hits the network: required fields,
//! the replacement mapping file (read and parsed as JSON), the generated target name,
//! and the "you can't copy an index onto itself" rule.

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::app_config::AppConfig;
use crate::error::MigrationError;

/// 📦 A validated, immutable migration request.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationRequest {
    pub source_host: String,
    pub source_index: String,
    pub target_host: String,
    pub target_index: String,
    /// 🗺️ Replacement mapping body, if the operator brought one.
    pub explicit_mapping: Option<Value>,
    /// 📦 Docs per page. None lets the store choose.
    pub batch_size: Option<usize>,
}

/// 🎲 `orders` → `orders-3f9c0a1b2c4d`. The suffix is the last 12 hex chars of a v4 UUID.
pub fn default_target_index(source_index: &str) -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", source_index, &uuid[uuid.len() - 12..])
}

/// 📦 Non-positive sizes mean "store's default", positive ones mean what they say.
pub fn batch_size_from(bulk_size: i64) -> Option<usize> {
    usize::try_from(bulk_size).ok().filter(|size| *size > 0)
}

fn same_host(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl MigrationRequest {
    /// 🚀 Build and validate a request from the loaded configuration.
    pub async fn from_config(app_config: &AppConfig) -> Result<Self, MigrationError> {
        let source_index = non_blank(app_config.source.index.as_ref()).ok_or_else(|| {
            MigrationError::Validation(
                "the source index is required (`--index` or `source.index`)".to_string(),
            )
        })?;

        let explicit_mapping = match app_config.mapping_file {
            Some(ref path) => Some(read_mapping_file(path).await?),
            None => None,
        };

        let target_index = non_blank(app_config.target.index.as_ref())
            .unwrap_or_else(|| default_target_index(&source_index));

        let request = Self {
            source_host: app_config.source.url.clone(),
            source_index,
            target_host: app_config.target.url.clone(),
            target_index,
            explicit_mapping,
            batch_size: batch_size_from(app_config.bulk_size),
        };
        request.validate()?;
        Ok(request)
    }

    /// 🔒 The invariants a request must hold regardless of how it was built.
    pub fn validate(&self) -> Result<(), MigrationError> {
        if self.source_index.trim().is_empty() {
            return Err(MigrationError::Validation(
                "the source index is required".to_string(),
            ));
        }
        if self.target_index.trim().is_empty() {
            return Err(MigrationError::Validation(
                "the target index name is empty".to_string(),
            ));
        }
        if self.source_index == self.target_index && same_host(&self.source_host, &self.target_host) {
            return Err(MigrationError::Validation(format!(
                "source and target are both <{}> on {}; pick a different target index",
                self.source_index, self.source_host
            )));
        }
        Ok(())
    }
}

/// 📂 Read the replacement mapping and make sure it is JSON before anything else happens.
pub async fn read_mapping_file(path: &Path) -> Result<Value, MigrationError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| MigrationError::MappingFileUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
    debug!("🗺️ New mapping of {}: {}", path.display(), contents);
    serde_json::from_str(&contents).map_err(|source| MigrationError::MappingFileInvalid {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::ClusterConfig;
    use figment::Figment;
    use std::io::Write;

    fn config_with(source_index: Option<&str>, target_index: Option<&str>) -> AppConfig {
        let mut app_config: AppConfig = Figment::new()
            .extract()
            .expect("💀 defaults should always extract");
        app_config.source = ClusterConfig {
            index: source_index.map(str::to_string),
            ..ClusterConfig::default()
        };
        app_config.target = ClusterConfig {
            index: target_index.map(str::to_string),
            ..ClusterConfig::default()
        };
        app_config
    }

    #[tokio::test]
    async fn the_one_where_no_source_index_means_no_party() {
        for missing in [None, Some("   ")] {
            let result = MigrationRequest::from_config(&config_with(missing, None)).await;
            assert!(matches!(result, Err(MigrationError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn the_one_where_the_target_gets_a_generated_name() -> anyhow::Result<()> {
        let request = MigrationRequest::from_config(&config_with(Some("orders"), None)).await?;

        let suffix = request
            .target_index
            .strip_prefix("orders-")
            .expect("generated name starts with the source name");
        assert_eq!(suffix.len(), 12);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(request.batch_size, Some(500));
        assert!(request.explicit_mapping.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_copying_onto_yourself_is_refused() {
        let result = MigrationRequest::from_config(&config_with(Some("orders"), Some("orders"))).await;
        assert!(matches!(result, Err(MigrationError::Validation(_))));
    }

    #[tokio::test]
    async fn the_one_where_same_name_on_another_cluster_is_fine() -> anyhow::Result<()> {
        let mut app_config = config_with(Some("orders"), Some("orders"));
        app_config.target.url = "http://new-cluster:9200".to_string();
        let request = MigrationRequest::from_config(&app_config).await?;
        assert_eq!(request.target_index, "orders");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_mapping_file_is_read_and_parsed() -> anyhow::Result<()> {
        let mut the_file = tempfile::NamedTempFile::new()?;
        the_file.write_all(br#"{"mappings":{"properties":{"sku":{"type":"keyword"}}}}"#)?;

        let mut app_config = config_with(Some("orders"), Some("orders-v2"));
        app_config.mapping_file = Some(the_file.path().to_path_buf());
        let request = MigrationRequest::from_config(&app_config).await?;

        assert_eq!(
            request.explicit_mapping,
            Some(serde_json::json!({"mappings":{"properties":{"sku":{"type":"keyword"}}}}))
        );
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_broken_mapping_file_stops_us_early() -> anyhow::Result<()> {
        let mut the_file = tempfile::NamedTempFile::new()?;
        the_file.write_all(b"{ this is not json")?;

        let mut app_config = config_with(Some("orders"), Some("orders-v2"));
        app_config.mapping_file = Some(the_file.path().to_path_buf());
        assert!(matches!(
            MigrationRequest::from_config(&app_config).await,
            Err(MigrationError::MappingFileInvalid { .. })
        ));

        app_config.mapping_file = Some(the_file.path().with_extension("missing"));
        assert!(matches!(
            MigrationRequest::from_config(&app_config).await,
            Err(MigrationError::MappingFileUnreadable { .. })
        ));
        Ok(())
    }

    #[test]
    fn the_one_where_non_positive_batch_sizes_defer_to_the_store() {
        assert_eq!(batch_size_from(500), Some(500));
        assert_eq!(batch_size_from(0), None);
        assert_eq!(batch_size_from(-3), None);
    }
}
