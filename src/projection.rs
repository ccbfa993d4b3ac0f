//! Flattening of the active subtree into rows for linear rendering.
//!
//! The root itself produces no row; its children sit at level 1. Every
//! opened folder contributes its own row followed by its children one level
//! deeper. Closed folders contribute only their row.

use std::path::{Path, PathBuf};

use crate::fs::registry::ActiveView;
use crate::fs::snapshot::{display_name, FolderSnapshot};

/// How a row should be drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewItemState {
    File,
    OpenedFolder,
    ClosedFolder,
}

/// One row of the flattened tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewItem {
    /// Nesting depth, 1 for the root's children.
    pub level: usize,
    pub name: String,
    pub path: PathBuf,
    pub state: PreviewItemState,
    /// Path to toggle; `None` for files.
    pub key: Option<PathBuf>,
    /// Opened folder whose listing failed and is shown empty.
    pub unreadable: bool,
}

impl PreviewItem {
    fn file(path: &Path, level: usize) -> Self {
        Self {
            level,
            name: display_name(path),
            path: path.to_path_buf(),
            state: PreviewItemState::File,
            key: None,
            unreadable: false,
        }
    }

    fn folder(path: &Path, level: usize, opened: Option<&FolderSnapshot>) -> Self {
        Self {
            level,
            name: display_name(path),
            path: path.to_path_buf(),
            state: if opened.is_some() {
                PreviewItemState::OpenedFolder
            } else {
                PreviewItemState::ClosedFolder
            },
            key: Some(path.to_path_buf()),
            unreadable: opened.is_some_and(|s| !s.readable),
        }
    }

    pub fn is_folder(&self) -> bool {
        self.key.is_some()
    }
}

/// Rows for the active subtree under `root`, folders before files at every
/// level, each group in listing order.
///
/// Empty when `root` is not active.
pub fn project(view: &ActiveView, root: &Path) -> Vec<PreviewItem> {
    let mut items = Vec::new();
    if let Some(snapshot) = view.get(root) {
        push_children(view, snapshot, 1, &mut items);
    }
    items
}

fn push_children(
    view: &ActiveView,
    snapshot: &FolderSnapshot,
    level: usize,
    items: &mut Vec<PreviewItem>,
) {
    for sub in &snapshot.subfolders {
        let opened = view.get(sub).map(|s| s.as_ref());
        items.push(PreviewItem::folder(sub, level, opened));
        if let Some(child) = opened {
            push_children(view, child, level + 1, items);
        }
    }
    items.extend(snapshot.files.iter().map(|f| PreviewItem::file(f, level)));
}

/// Number of rows [`project`] would produce, without building them.
pub fn measure(view: &ActiveView, root: &Path) -> usize {
    fn count(view: &ActiveView, snapshot: &FolderSnapshot) -> usize {
        let folders: usize = snapshot
            .subfolders
            .iter()
            .map(|sub| 1 + view.get(sub).map_or(0, |child| count(view, child)))
            .sum();
        folders + snapshot.files.len()
    }
    view.get(root).map_or(0, |snapshot| count(view, snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn snap(path: &Path, dirs: &[&str], files: &[&str]) -> Arc<FolderSnapshot> {
        Arc::new(FolderSnapshot::new(
            path.to_path_buf(),
            dirs.iter().map(|d| path.join(d)).collect(),
            files.iter().map(|f| path.join(f)).collect(),
        ))
    }

    fn rows(items: &[PreviewItem]) -> Vec<(usize, &str, PreviewItemState)> {
        items
            .iter()
            .map(|i| (i.level, i.name.as_str(), i.state))
            .collect()
    }

    /// root/
    ///   Beta/ (active): z.txt, 10.log, 9.log
    ///   alpha/ (closed)
    ///   src/ (active): lib/ (active, empty), main.rs
    ///   README, a.txt
    fn sample_view() -> (PathBuf, ActiveView) {
        let root = PathBuf::from("/w");
        let mut view = ActiveView::new();
        view.insert(
            root.clone(),
            snap(&root, &["src", "alpha", "Beta"], &["README", "a.txt"]),
        );
        let beta = root.join("Beta");
        view.insert(beta.clone(), snap(&beta, &[], &["z.txt", "9.log", "10.log"]));
        let src = root.join("src");
        view.insert(src.clone(), snap(&src, &["lib"], &["main.rs"]));
        let lib = src.join("lib");
        view.insert(lib.clone(), snap(&lib, &[], &[]));
        (root, view)
    }

    #[test]
    fn project_orders_folders_first_alphabetically_at_every_level() {
        use PreviewItemState::*;
        let (root, view) = sample_view();
        let items = project(&view, &root);
        assert_eq!(
            rows(&items),
            vec![
                (1, "alpha", ClosedFolder),
                (1, "Beta", OpenedFolder),
                (2, "10.log", File),
                (2, "9.log", File),
                (2, "z.txt", File),
                (1, "src", OpenedFolder),
                (2, "lib", OpenedFolder),
                (2, "main.rs", File),
                (1, "a.txt", File),
                (1, "README", File),
            ]
        );
    }

    #[test]
    fn folder_rows_carry_keys_and_files_do_not() {
        let (root, view) = sample_view();
        let items = project(&view, &root);
        for item in &items {
            match item.state {
                PreviewItemState::File => assert!(item.key.is_none()),
                _ => assert_eq!(item.key.as_deref(), Some(item.path.as_path())),
            }
        }
    }

    #[test]
    fn inactive_root_projects_nothing() {
        let view = ActiveView::new();
        assert!(project(&view, Path::new("/w")).is_empty());
        assert_eq!(measure(&view, Path::new("/w")), 0);
    }

    #[test]
    fn inactive_folder_is_not_expanded_even_if_descendants_are_active() {
        let (root, mut view) = sample_view();
        view.remove(&root.join("src"));
        let items = project(&view, &root);
        assert!(items.iter().all(|i| !i.path.starts_with(root.join("src/lib"))));
        let src = items.iter().find(|i| i.name == "src").unwrap();
        assert_eq!(src.state, PreviewItemState::ClosedFolder);
    }

    #[test]
    fn measure_matches_projection_length() {
        let (root, view) = sample_view();
        assert_eq!(measure(&view, &root), project(&view, &root).len());
    }

    #[test]
    fn unreadable_folder_is_flagged() {
        let (root, mut view) = sample_view();
        let alpha = root.join("alpha");
        view.insert(alpha.clone(), Arc::new(FolderSnapshot::unreadable(alpha)));
        let items = project(&view, &root);
        let row = items.iter().find(|i| i.name == "alpha").unwrap();
        assert_eq!(row.state, PreviewItemState::OpenedFolder);
        assert!(row.unreadable);
    }
}
