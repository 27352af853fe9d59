//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Current directory: ./nearby.toml or ./.nearby/config.toml
//! 2. User config: ~/.nearby/config.toml
//! 3. System config: /etc/nearby/config.toml
//! 4. Built-in defaults

use crate::{ServiceConfig, env};
use anyhow::{Context, Result};
use std::env as std_env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Load `explicit` if given, otherwise discover a config file using the hierarchy
    pub fn load(explicit: Option<&Path>) -> Result<ServiceConfig> {
        if let Some(path) = explicit {
            info!("Loading configuration override from: {:?}", path);
            return ServiceConfig::from_toml_file(path);
        }
        Self::discover_config()
    }

    /// Discover and load configuration using the hierarchy
    pub fn discover_config() -> Result<ServiceConfig> {
        if let Some(config_path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", config_path);
            return ServiceConfig::from_toml_file(config_path);
        }

        info!("No configuration file found, using defaults");
        Ok(ServiceConfig::default())
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        Self::first_existing(&Self::get_config_candidates())
    }

    fn first_existing(candidates: &[PathBuf]) -> Option<PathBuf> {
        for candidate in candidates {
            debug!("Checking for config file: {:?}", candidate);
            if candidate.is_file() {
                debug!("Found config file: {:?}", candidate);
                return Some(candidate.clone());
            }
        }

        debug!("No config file found in discovery hierarchy");
        None
    }

    /// Get list of configuration file candidates in priority order
    fn get_config_candidates() -> Vec<PathBuf> {
        Self::candidates_for(
            std_env::current_dir().ok().as_deref(),
            Self::get_home_dir().as_deref(),
        )
    }

    fn candidates_for(current_dir: Option<&Path>, home_dir: Option<&Path>) -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        // 1. Current directory: ./nearby.toml, ./.nearby/config.toml
        if let Some(current_dir) = current_dir {
            candidates.push(current_dir.join(env::LOCAL_CONFIG_FILE_NAME));
            candidates.push(env::local_config_file_path(current_dir));
        }

        // 2. User config: ~/.nearby/config.toml
        if let Some(home_dir) = home_dir {
            candidates.push(env::user_config_file_path(home_dir));
        }

        // 3. System config: /etc/nearby/config.toml (Unix-like systems)
        #[cfg(unix)]
        candidates.push(PathBuf::from("/etc/nearby/config.toml"));

        // Windows system config: C:\ProgramData\nearby\config.toml
        #[cfg(windows)]
        if let Ok(program_data) = std_env::var("PROGRAMDATA") {
            candidates.push(PathBuf::from(program_data).join("nearby").join("config.toml"));
        }

        candidates
    }

    /// Get home directory path
    fn get_home_dir() -> Option<PathBuf> {
        std_env::var("HOME")
            .ok()
            .or_else(|| std_env::var("USERPROFILE").ok())
            .map(PathBuf::from)
    }

    /// Create a default config file in the user's home directory
    pub fn create_default_user_config() -> Result<PathBuf> {
        let home_dir = Self::get_home_dir().context("Could not determine home directory")?;
        let config_dir = env::user_config_dir_path(&home_dir);
        let config_path = env::user_config_file_path(&home_dir);

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).with_context(|| {
                format!("Failed to create directory: {}", config_dir.display())
            })?;
            info!("Created configuration directory: {:?}", config_dir);
        }

        if !config_path.exists() {
            ServiceConfig::default().to_toml_file(&config_path)?;
            info!("Created default configuration file: {:?}", config_path);
        } else {
            warn!("Configuration file already exists: {:?}", config_path);
        }

        Ok(config_path)
    }

    /// Show configuration discovery information for debugging
    pub fn show_discovery_info() {
        println!("Configuration Discovery Hierarchy:");
        println!();

        let candidates = Self::get_config_candidates();
        for (i, candidate) in candidates.iter().enumerate() {
            let status = if candidate.exists() {
                if candidate.is_file() {
                    "✓ EXISTS"
                } else {
                    "✗ NOT A FILE"
                }
            } else {
                "✗ NOT FOUND"
            };

            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        println!();
        if let Some(found) = Self::first_existing(&candidates) {
            println!("Active configuration: {:?}", found);
        } else {
            println!("Active configuration: Built-in defaults");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_config_candidates_order() {
        let candidates = ConfigDiscovery::candidates_for(
            Some(Path::new("/work/project")),
            Some(Path::new("/home/user")),
        );

        assert_eq!(candidates[0], Path::new("/work/project/nearby.toml"));
        assert_eq!(candidates[1], Path::new("/work/project/.nearby/config.toml"));
        assert_eq!(candidates[2], Path::new("/home/user/.nearby/config.toml"));
    }

    #[test]
    fn test_first_existing_skips_missing_and_directories() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.toml");
        let directory = temp_dir.path().join("dir.toml");
        let present = temp_dir.path().join("present.toml");
        fs::create_dir(&directory).unwrap();
        fs::write(&present, "").unwrap();

        assert_eq!(
            ConfigDiscovery::first_existing(&[missing, directory, present.clone()]),
            Some(present)
        );
    }

    #[test]
    fn test_load_explicit_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("custom.toml");
        fs::write(
            &config_path,
            "[storage]\nstorage_root = \"/srv/nearby\"\n",
        )
        .unwrap();

        let config = ConfigDiscovery::load(Some(&config_path)).unwrap();
        assert_eq!(config.storage.storage_root, PathBuf::from("/srv/nearby"));
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        assert!(ConfigDiscovery::load(Some(&temp_dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    #[serial]
    fn test_create_default_user_config() {
        let temp_home = TempDir::new().unwrap();
        let previous = std_env::var_os("HOME");
        // SAFETY: serialized with every other test that touches HOME
        unsafe { std_env::set_var("HOME", temp_home.path()) };

        let created = ConfigDiscovery::create_default_user_config();

        match previous {
            Some(home) => unsafe { std_env::set_var("HOME", home) },
            None => unsafe { std_env::remove_var("HOME") },
        }

        let created = created.unwrap();
        assert_eq!(created, temp_home.path().join(".nearby").join("config.toml"));
        let loaded = ServiceConfig::from_toml_file(&created).unwrap();
        assert_eq!(loaded, ServiceConfig::default());
    }
}
