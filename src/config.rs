//! Service configuration.
//!
//! Loaded from TOML (see [`crate::cli::ConfigDiscovery`] for where it is
//! looked up). Every field has a default, so an empty file is valid.

use crate::action_info::ActionInfoCacheConfig;
use crate::env;
use crate::storage::{FileDestinationResolver, ResourceStore};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub storage: StorageConfig,
    pub action_info: ActionInfoConfig,
}

/// Where received resources are placed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub storage_root: PathBuf,
    pub staging_dir_name: String,
    pub archive_dir_name: String,
}

/// Bounds for cached action info
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionInfoConfig {
    /// Seconds a record waits for its transfer; 0 keeps records forever
    pub ttl_secs: u64,
    /// Maximum cached records; 0 means unbounded
    pub max_entries: usize,
}

impl ServiceConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).context("Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content).context("Failed to write config file")
    }

    /// Convert configuration to a TOML string
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }

    pub fn validate(&self) -> Result<()> {
        self.storage.validate()
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<()> {
        for (field, name) in [
            ("staging_dir_name", &self.staging_dir_name),
            ("archive_dir_name", &self.archive_dir_name),
        ] {
            let mut components = Path::new(name).components();
            let single_normal = matches!(
                (components.next(), components.next()),
                (Some(Component::Normal(_)), None)
            );
            if !single_normal || name == env::storage::INCOMING_DIR_NAME {
                bail!("{} must be a plain directory name, got {:?}", field, name);
            }
        }

        if self.staging_dir_name == self.archive_dir_name {
            bail!(
                "staging_dir_name and archive_dir_name must differ (both {:?})",
                self.staging_dir_name
            );
        }
        Ok(())
    }

    pub fn resolver(&self) -> FileDestinationResolver {
        FileDestinationResolver::new(
            &self.storage_root,
            &self.staging_dir_name,
            &self.archive_dir_name,
        )
    }

    pub fn resource_store(&self) -> ResourceStore {
        ResourceStore::new(self.storage_root.clone(), self.resolver())
    }
}

impl ActionInfoConfig {
    pub fn cache_config(&self) -> ActionInfoCacheConfig {
        ActionInfoCacheConfig {
            ttl: (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs)),
            max_entries: (self.max_entries > 0).then_some(self.max_entries),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_root: env::default_storage_root(),
            staging_dir_name: env::storage::STAGING_DIR_NAME.to_string(),
            archive_dir_name: env::storage::ARCHIVE_DIR_NAME.to_string(),
        }
    }
}

impl Default for ActionInfoConfig {
    fn default() -> Self {
        let defaults = ActionInfoCacheConfig::default();
        Self {
            ttl_secs: defaults.ttl.map(|ttl| ttl.as_secs()).unwrap_or(0),
            max_entries: defaults.max_entries.unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = ServiceConfig::from_toml_str("").unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.action_info.ttl_secs, 600);
        assert_eq!(config.action_info.max_entries, 1024);
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = ServiceConfig::default();
        config.storage.storage_root = PathBuf::from("/srv/nearby");
        config.action_info.ttl_secs = 30;

        let toml = config.to_toml_string().unwrap();
        assert_eq!(ServiceConfig::from_toml_str(&toml).unwrap(), config);
    }

    #[test]
    fn test_partial_toml() {
        let config = ServiceConfig::from_toml_str(
            r#"
            [storage]
            storage_root = "/srv/nearby"
            archive_dir_name = "inbox"

            [action_info]
            ttl_secs = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.storage_root, PathBuf::from("/srv/nearby"));
        assert_eq!(config.storage.staging_dir_name, "pending_action");
        assert_eq!(config.storage.archive_dir_name, "inbox");
        assert_eq!(
            config.action_info.cache_config(),
            ActionInfoCacheConfig {
                ttl: None,
                max_entries: Some(1024)
            }
        );
    }

    #[test]
    fn test_rejects_unsafe_area_names() {
        for bad in [
            r#"[storage]
staging_dir_name = "../elsewhere""#,
            r#"[storage]
archive_dir_name = "a/b""#,
            r#"[storage]
archive_dir_name = ".incoming""#,
            r#"[storage]
staging_dir_name = "same"
archive_dir_name = "same""#,
        ] {
            assert!(ServiceConfig::from_toml_str(bad).is_err(), "accepted {}", bad);
        }
    }

    #[test]
    fn test_resolver_uses_configured_areas() {
        let config = StorageConfig {
            storage_root: PathBuf::from("/srv/nearby"),
            staging_dir_name: "todo".to_string(),
            archive_dir_name: "inbox".to_string(),
        };
        let resolver = config.resolver();

        assert_eq!(resolver.staging_dir(), Path::new("/srv/nearby/todo"));
        assert_eq!(resolver.archive_dir(), Path::new("/srv/nearby/inbox"));
    }
}
