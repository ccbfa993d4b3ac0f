use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::fs::snapshot::{display_name, FolderSnapshot};
use crate::fs::source::{DirectorySource, LocalFs};

/// One filesystem entry for static browsing.
///
/// A folder's children are listed on first access and cached for the life
/// of the node. To see fresh contents, build a new node.
#[derive(Debug, Clone)]
pub enum FileTreeNode {
    Folder {
        path: PathBuf,
        children: OnceLock<Vec<FileTreeNode>>,
    },
    File {
        path: PathBuf,
    },
}

impl FileTreeNode {
    /// Classify `path` by what is on disk right now.
    pub fn new(path: &Path) -> Self {
        if path.is_dir() {
            Self::folder(path.to_path_buf())
        } else {
            Self::file(path.to_path_buf())
        }
    }

    pub fn folder(path: PathBuf) -> Self {
        Self::Folder {
            path,
            children: OnceLock::new(),
        }
    }

    pub fn file(path: PathBuf) -> Self {
        Self::File { path }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Folder { path, .. } | Self::File { path } => path,
        }
    }

    pub fn name(&self) -> String {
        display_name(self.path())
    }

    pub fn has_children(&self) -> bool {
        matches!(self, Self::Folder { .. })
    }

    /// Children from the local filesystem: folders first, then files.
    pub fn children(&self) -> &[FileTreeNode] {
        self.children_from(&LocalFs)
    }

    /// Children listed through `source` on first call; later calls return
    /// the cached list regardless of `source`.
    pub fn children_from(&self, source: &dyn DirectorySource) -> &[FileTreeNode] {
        match self {
            Self::File { .. } => &[],
            Self::Folder { path, children } => children.get_or_init(|| {
                let snapshot = FolderSnapshot::read_or_empty(source, path);
                snapshot
                    .subfolders
                    .into_iter()
                    .map(Self::folder)
                    .chain(snapshot.files.into_iter().map(Self::file))
                    .collect()
            }),
        }
    }
}
