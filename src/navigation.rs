//! Keyboard-style cursor over the latest rows.
//!
//! The selection is a path rather than an index, so it survives rows being
//! inserted or removed around it. When the selected path is not among the
//! rows (its parent was just collapsed, say), relative moves do nothing.

use std::path::{Path, PathBuf};

use crate::projection::PreviewItem;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Selection {
    selected: Option<PathBuf>,
}

impl Selection {
    pub fn selected(&self) -> Option<&Path> {
        self.selected.as_deref()
    }

    /// Select `path` directly, as a click does.
    pub fn select(&mut self, path: &Path) {
        self.selected = Some(path.to_path_buf());
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    /// Row index of the selection within `items`, if present.
    pub fn index_in(&self, items: &[PreviewItem]) -> Option<usize> {
        let selected = self.selected.as_deref()?;
        items.iter().position(|i| i.path == selected)
    }

    /// The selected row, if present in `items`.
    pub fn item<'a>(&self, items: &'a [PreviewItem]) -> Option<&'a PreviewItem> {
        self.index_in(items).map(|i| &items[i])
    }

    pub fn select_first(&mut self, items: &[PreviewItem]) {
        if let Some(first) = items.first() {
            self.select(&first.path);
        }
    }

    pub fn select_last(&mut self, items: &[PreviewItem]) {
        if let Some(last) = items.last() {
            self.select(&last.path);
        }
    }

    pub fn select_previous(&mut self, items: &[PreviewItem]) {
        let Some(selected) = self.selected.as_deref() else {
            self.select_first(items);
            return;
        };
        let previous = items
            .windows(2)
            .find(|pair| pair[1].path == selected)
            .map(|pair| pair[0].path.clone());
        if let Some(path) = previous {
            self.selected = Some(path);
        }
    }

    pub fn select_next(&mut self, items: &[PreviewItem]) {
        let Some(selected) = self.selected.as_deref() else {
            self.select_first(items);
            return;
        };
        let next = items
            .windows(2)
            .find(|pair| pair[0].path == selected)
            .map(|pair| pair[1].path.clone());
        if let Some(path) = next {
            self.selected = Some(path);
        }
    }

    /// Folder to toggle for the current selection; `None` for files and for
    /// selections not among `items`.
    pub fn toggle_target(&self, items: &[PreviewItem]) -> Option<PathBuf> {
        self.item(items).and_then(|item| item.key.clone())
    }

    /// After `folder` was collapsed, move a selection that was inside it up
    /// to the folder itself.
    pub fn follow_collapse(&mut self, folder: &Path) {
        let inside = self
            .selected
            .as_deref()
            .is_some_and(|s| s != folder && s.starts_with(folder));
        if inside {
            self.select(folder);
        }
    }
}
