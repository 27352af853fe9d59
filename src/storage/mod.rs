//! On-disk placement of received resources.
//!
//! Two areas live under the storage root:
//!
//! - **staging** (`pending_action/`): resources that arrived with action info,
//!   left for the application to handle explicitly
//! - **archive** (`received/`): resources with no action info, kept permanently
//!   with collision-safe names
//!
//! Bytes are first copied into `.incoming/` and renamed into place only once
//! the copy succeeded, so a failed or cancelled copy never leaves a truncated
//! destination file behind.

pub mod destination;
pub mod store;


pub use destination::*;
pub use store::*;

use std::path::PathBuf;

/// Reasons a resource name cannot be mapped into a storage area
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PathRejection {
    #[error("name is empty")]
    Empty,
    #[error("name contains a null byte")]
    NullByte,
    #[error("name is an absolute path")]
    AbsolutePath,
    #[error("name contains a parent directory (..) component")]
    ParentDir,
}

/// Errors while placing a received resource
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The resource name cannot be turned into a safe relative path
    #[error("Unsafe resource name {name:?}: {reason}")]
    PathResolution { name: String, reason: PathRejection },

    /// Moving bytes to the destination failed
    #[error("Failed to copy {} to {}: {source}", .source_path.display(), .destination.display())]
    Copy {
        source_path: PathBuf,
        destination: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The copy was abandoned because the session is shutting down
    #[error("Copy of {0:?} cancelled by shutdown")]
    Cancelled(String),
}
