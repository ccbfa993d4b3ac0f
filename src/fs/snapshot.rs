use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::fs::source::DirectorySource;

/// Final component of `path` as display text, or the whole path for roots.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// Sibling ordering used everywhere a listing is shown.
///
/// Case-insensitive by name, with the raw name as tie-breaker so that
/// `Readme` and `readme` keep a stable relative order.
pub fn compare_names(a: &Path, b: &Path) -> Ordering {
    let a = display_name(a);
    let b = display_name(b);
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(&b))
}

/// Sort paths in place by [`compare_names`].
pub fn sort_paths(paths: &mut [PathBuf]) {
    paths.sort_by(|a, b| compare_names(a, b));
}

/// Point-in-time listing of one directory's direct children.
///
/// Never mutated after construction: a changed directory yields a new
/// snapshot that replaces this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderSnapshot {
    pub path: PathBuf,
    /// False for synthetic roots that cannot be watched.
    pub watchable: bool,
    /// Child directories, sorted by [`compare_names`].
    pub subfolders: Vec<PathBuf>,
    /// Child files, sorted by [`compare_names`].
    pub files: Vec<PathBuf>,
    /// Total entry count.
    pub size: usize,
    /// False when enumeration failed and the listing was degraded to empty.
    pub readable: bool,
}

impl FolderSnapshot {
    /// Build a snapshot from unsorted listings.
    pub fn new(path: PathBuf, mut subfolders: Vec<PathBuf>, mut files: Vec<PathBuf>) -> Self {
        sort_paths(&mut subfolders);
        sort_paths(&mut files);
        let size = subfolders.len() + files.len();
        Self {
            path,
            watchable: true,
            subfolders,
            files,
            size,
            readable: true,
        }
    }

    /// Empty placeholder for a folder whose listing has not arrived yet.
    pub fn pending(path: PathBuf) -> Self {
        Self::new(path, Vec::new(), Vec::new())
    }

    /// Empty listing standing in for a directory that could not be read.
    pub fn unreadable(path: PathBuf) -> Self {
        Self {
            readable: false,
            ..Self::pending(path)
        }
    }

    /// Mark this snapshot as not backed by a watchable directory.
    pub fn synthetic(mut self) -> Self {
        self.watchable = false;
        self
    }

    /// Enumerate `path` through `source`.
    pub fn read(source: &dyn DirectorySource, path: &Path) -> Result<Self> {
        let listing = source
            .list(path)
            .map_err(|err| AppError::DirectoryUnreadable {
                path: path.to_path_buf(),
                source: err,
            })?;
        let snapshot = Self::new(path.to_path_buf(), listing.subfolders, listing.files);
        if source.watchable(path) {
            Ok(snapshot)
        } else {
            Ok(snapshot.synthetic())
        }
    }

    /// Like [`FolderSnapshot::read`], but degrades failures to an empty,
    /// unreadable snapshot.
    pub fn read_or_empty(source: &dyn DirectorySource, path: &Path) -> Self {
        match Self::read(source, path) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "treating directory as empty");
                Self::unreadable(path.to_path_buf())
            }
        }
    }
}
