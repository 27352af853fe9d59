//! Environment constants and path utilities for the nearby session service.
//!
//! This module centralizes the directory and file names used for received
//! resources and configuration, so storage and config discovery agree on them.

use std::path::{Path, PathBuf};

/// Main application directory name (hidden directory like .git, .vscode)
pub const NEARBY_DIR_NAME: &str = ".nearby";

/// Configuration file name inside the application directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file name looked up in the current directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "nearby.toml";

/// Storage directory and file names
pub mod storage {
    /// Staging area for resources that arrived with action info
    pub const STAGING_DIR_NAME: &str = "pending_action";

    /// Archive area for resources received without action info
    pub const ARCHIVE_DIR_NAME: &str = "received";

    /// Scratch directory for in-flight copies, renamed into place on success
    pub const INCOMING_DIR_NAME: &str = ".incoming";

    /// Extension of in-flight copy files
    pub const PARTIAL_FILE_EXTENSION: &str = "part";
}

/// Build the main .nearby directory path from a base directory
pub fn nearby_dir_path(base: &Path) -> PathBuf {
    base.join(NEARBY_DIR_NAME)
}

/// Default storage root when none is configured
pub fn default_storage_root() -> PathBuf {
    std::env::temp_dir().join("nearby-session")
}

/// Build a storage area path (staging or archive) under the storage root
pub fn storage_area_path(storage_root: &Path, area_dir_name: &str) -> PathBuf {
    storage_root.join(area_dir_name)
}

/// Build the in-flight copy directory path under the storage root
pub fn incoming_dir_path(storage_root: &Path) -> PathBuf {
    storage_root.join(storage::INCOMING_DIR_NAME)
}

/// Build a unique in-flight copy file path
pub fn partial_file_path(storage_root: &Path, transfer_id: &str) -> PathBuf {
    incoming_dir_path(storage_root).join(format!(
        "{}.{}",
        transfer_id,
        storage::PARTIAL_FILE_EXTENSION
    ))
}

/// Build config directory path in user's home directory
pub fn user_config_dir_path(home_dir: &Path) -> PathBuf {
    nearby_dir_path(home_dir)
}

/// Build config file path in user's home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    user_config_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build local config file path in current directory
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    nearby_dir_path(current_dir).join(CONFIG_FILE_NAME)
}
