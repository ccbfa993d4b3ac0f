use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Direct children of one directory, unsorted.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Listing {
    pub subfolders: Vec<PathBuf>,
    pub files: Vec<PathBuf>,
}

/// Directory enumeration and existence checks.
///
/// Calls may block; the registry runs them on tokio's blocking pool.
pub trait DirectorySource: Send + Sync {
    /// Enumerate the direct children of `path`.
    fn list(&self, path: &Path) -> io::Result<Listing>;

    /// Whether `path` currently exists.
    fn exists(&self, path: &Path) -> bool;

    /// Whether `path` is a real directory the OS can watch.
    fn watchable(&self, _path: &Path) -> bool {
        true
    }
}

/// The local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl DirectorySource for LocalFs {
    /// Entries that fail to stat are skipped; symlinks to directories count
    /// as folders.
    fn list(&self, path: &Path) -> io::Result<Listing> {
        let mut listing = Listing::default();
        for entry in fs::read_dir(path)? {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            let child = entry.path();
            if child.is_dir() {
                listing.subfolders.push(child);
            } else {
                listing.files.push(child);
            }
        }
        Ok(listing)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
