use crate::action_info::ActionInfo;
use crate::env;
use crate::storage::{Destination, FileDestinationResolver, StorageArea, StorageError};
use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Places received resources into their storage area
#[derive(Debug)]
pub struct ResourceStore {
    storage_root: PathBuf,
    resolver: FileDestinationResolver,
    // Held from destination resolution until the rename lands, so two
    // placements never pick the same archive path.
    placement_lock: Mutex<()>,
}

impl ResourceStore {
    pub fn new(storage_root: PathBuf, resolver: FileDestinationResolver) -> Self {
        Self {
            storage_root,
            resolver,
            placement_lock: Mutex::new(()),
        }
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    pub fn resolver(&self) -> &FileDestinationResolver {
        &self.resolver
    }

    /// Create the storage areas and drop partial files left by an earlier run
    pub async fn prepare(&self) -> std::io::Result<usize> {
        let incoming_dir = env::incoming_dir_path(&self.storage_root);
        for dir in [
            self.resolver.staging_dir(),
            self.resolver.archive_dir(),
            incoming_dir.as_path(),
        ] {
            async_fs::create_dir_all(dir).await?;
        }

        let mut removed = 0;
        let mut entries = async_fs::read_dir(&incoming_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str())
                == Some(env::storage::PARTIAL_FILE_EXTENSION)
            {
                match async_fs::remove_file(&path).await {
                    Ok(()) => removed += 1,
                    Err(e) => warn!("Failed to remove stale partial file {}: {}", path.display(), e),
                }
            }
        }

        if removed > 0 {
            info!("Removed {} stale partial files", removed);
        }
        Ok(removed)
    }

    /// Copy `source` into the area chosen for `resource_name` and return the final path.
    ///
    /// The name is validated before any I/O. On failure or cancellation no
    /// destination file exists and the partial copy is removed.
    pub async fn place(
        &self,
        source: &Path,
        resource_name: &str,
        action_info: Option<&ActionInfo>,
        cancel: &CancellationToken,
    ) -> Result<Destination, StorageError> {
        crate::storage::sanitize_resource_name(resource_name)?;
        let area = StorageArea::for_action_info(action_info);

        let partial = env::partial_file_path(&self.storage_root, &Uuid::new_v4().to_string());
        let copy_error = |destination: &Path, source_error| StorageError::Copy {
            source_path: source.to_path_buf(),
            destination: destination.to_path_buf(),
            source: source_error,
        };

        let copied = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StorageError::Cancelled(resource_name.to_string())),
            result = copy_file(source, &partial) => result.map_err(|e| copy_error(partial.as_path(), e)),
        };

        let bytes = match copied {
            Ok(bytes) => bytes,
            Err(e) => {
                discard_partial(&partial).await;
                return Err(e);
            }
        };
        debug!(resource = %resource_name, ?area, bytes, "Copied resource to partial file");

        let _placement = self.placement_lock.lock().await;
        let destination = match self.resolver.resolve(resource_name, action_info) {
            Ok(destination) => destination,
            Err(e) => {
                discard_partial(&partial).await;
                return Err(e);
            }
        };

        if let Err(e) = commit_partial(&partial, destination.path()).await {
            discard_partial(&partial).await;
            return Err(copy_error(destination.path(), e));
        }

        info!(
            resource = %resource_name,
            ?area,
            bytes,
            "Placed resource at {}",
            destination.path().display()
        );
        Ok(destination)
    }
}

async fn copy_file(source: &Path, partial: &Path) -> std::io::Result<u64> {
    if let Some(parent) = partial.parent() {
        async_fs::create_dir_all(parent).await?;
    }

    let mut reader = async_fs::File::open(source).await?;
    let mut writer = async_fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(partial)
        .await?;

    let bytes = tokio::io::copy(&mut reader, &mut writer).await?;
    writer.flush().await?;
    writer.sync_all().await?;
    Ok(bytes)
}

async fn commit_partial(partial: &Path, destination: &Path) -> std::io::Result<()> {
    if let Some(parent) = destination.parent() {
        async_fs::create_dir_all(parent).await?;
    }
    async_fs::rename(partial, destination).await
}

async fn discard_partial(partial: &Path) {
    match async_fs::remove_file(partial).await {
        Ok(()) => debug!("Removed partial file {}", partial.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial file {}: {}", partial.display(), e),
    }
}
