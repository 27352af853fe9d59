use crate::action_info::ActionInfo;
use crate::env;
use crate::storage::{PathRejection, StorageError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which storage area a resource lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageArea {
    /// Arrived with action info; the application handles it afterwards
    Staging,
    /// Arrived without action info; kept permanently
    Archive,
}

impl StorageArea {
    pub fn for_action_info(action_info: Option<&ActionInfo>) -> Self {
        if action_info.is_some() {
            Self::Staging
        } else {
            Self::Archive
        }
    }
}

/// Resolved destination of a received resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub area: StorageArea,
    pub path: PathBuf,
}

impl Destination {
    pub fn area(&self) -> StorageArea {
        self.area
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

/// Decides where a finished resource goes
#[derive(Debug, Clone)]
pub struct FileDestinationResolver {
    staging_dir: PathBuf,
    archive_dir: PathBuf,
}

impl FileDestinationResolver {
    pub fn new(storage_root: &Path, staging_dir_name: &str, archive_dir_name: &str) -> Self {
        Self {
            staging_dir: env::storage_area_path(storage_root, staging_dir_name),
            archive_dir: env::storage_area_path(storage_root, archive_dir_name),
        }
    }

    /// Resolver using the default area names under `storage_root`
    pub fn with_default_areas(storage_root: &Path) -> Self {
        Self::new(
            storage_root,
            env::storage::STAGING_DIR_NAME,
            env::storage::ARCHIVE_DIR_NAME,
        )
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    pub fn area_dir(&self, area: StorageArea) -> &Path {
        match area {
            StorageArea::Staging => &self.staging_dir,
            StorageArea::Archive => &self.archive_dir,
        }
    }

    /// Resolve the destination for `resource_name`.
    ///
    /// With action info the resource is staged at a fixed path (a previous
    /// staged file of the same name is replaced). Without it the resource is
    /// archived, and an existing file at the archive path pushes the result to
    /// the first free `name (N).ext`.
    pub fn resolve(
        &self,
        resource_name: &str,
        action_info: Option<&ActionInfo>,
    ) -> Result<Destination, StorageError> {
        let relative = sanitize_resource_name(resource_name)?;
        let area = StorageArea::for_action_info(action_info);
        let path = self.area_dir(area).join(relative);

        let path = match area {
            StorageArea::Staging => path,
            StorageArea::Archive => find_available_path(path),
        };

        Ok(Destination { area, path })
    }
}

/// Map an untrusted resource name to a relative path that stays inside its area.
///
/// Both `/` and `\` separate components; empty and `.` components are dropped
/// and `:` is replaced with `_`.
pub fn sanitize_resource_name(resource_name: &str) -> Result<PathBuf, StorageError> {
    let reject = |reason| StorageError::PathResolution {
        name: resource_name.to_string(),
        reason,
    };

    if resource_name.trim().is_empty() {
        return Err(reject(PathRejection::Empty));
    }

    // rust uses C-style APIs so \0 can end a path early
    if resource_name.contains('\0') {
        return Err(reject(PathRejection::NullByte));
    }

    let normalized = resource_name.replace('\\', "/");
    if normalized.starts_with('/') {
        return Err(reject(PathRejection::AbsolutePath));
    }

    let mut relative = PathBuf::new();
    for component in normalized.split('/') {
        match component {
            "" | "." => continue,
            ".." => return Err(reject(PathRejection::ParentDir)),
            // `C:` prefixes and `file:stream` names are not portable
            c if c.contains(':') => relative.push(c.replace(':', "_")),
            c => relative.push(c),
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(reject(PathRejection::Empty));
    }

    Ok(relative)
}

/// Finds an available path by appending a ` (N)` suffix if the target already exists.
/// Returns the original path unchanged if nothing is there.
///
/// Everything from the first dot on counts as the extension, so
/// `backup.tar.gz` becomes `backup (1).tar.gz`. A name that already ends in
/// ` (N)` continues counting from N + 1.
pub fn find_available_path(path: PathBuf) -> PathBuf {
    if !path.exists() {
        return path;
    }

    let filename = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("unnamed")
        .to_string();

    let parent_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let (base_name, extensions) = match filename.find('.') {
        Some(dot_pos) if dot_pos > 0 => (
            filename[..dot_pos].to_string(),
            filename[dot_pos..].to_string(),
        ),
        _ => (filename, String::new()),
    };

    let (mut stem, mut counter) = split_counter_suffix(&base_name);

    loop {
        let candidate = parent_dir.join(format!("{} ({}){}", stem, counter, extensions));
        if !candidate.exists() {
            return candidate;
        }
        counter = match counter.checked_add(1) {
            Some(next) => next,
            None => {
                // Counter exhausted: nest a fresh ` (N)` inside the full name
                stem = format!("{} ({})", stem, counter);
                1
            }
        };
    }
}

fn split_counter_suffix(base_name: &str) -> (String, u32) {
    if let Some(paren_pos) = base_name.rfind(" (")
        && base_name.ends_with(')')
        && let Ok(number) = base_name[paren_pos + 2..base_name.len() - 1].parse::<u32>()
        && let Some(next) = number.checked_add(1)
    {
        return (base_name[..paren_pos].to_string(), next);
    }
    (base_name.to_string(), 1)
}
