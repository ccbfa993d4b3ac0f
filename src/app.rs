use std::path::{Path, PathBuf};
use std::time::Instant;

use ratatui::layout::Rect;

use crate::browser::Browser;
use crate::fs::node::FileTreeNode;
use crate::fs::registry::Toggle;
use crate::navigation::Selection;
use crate::projection::PreviewItem;
use crate::theme::ThemeColors;

/// How long a status message stays on screen.
const STATUS_TTL_SECS: u64 = 3;

/// Main application state.
pub struct App {
    pub browser: Browser,
    /// Rows from the latest published change.
    pub items: Vec<PreviewItem>,
    pub selection: Selection,
    /// Root folder, for the title.
    pub root: FileTreeNode,
    /// Listed node for the selected folder while it is closed, for the
    /// child count in the status bar. Filled by [`Event::Details`].
    ///
    /// [`Event::Details`]: crate::event::Event::Details
    pub details: Option<FileTreeNode>,
    pub scroll_offset: usize,
    /// Inner tree area from the last draw, for mouse hit-testing.
    pub tree_area: Rect,
    pub theme: ThemeColors,
    pub use_icons: bool,
    pub watcher_active: bool,
    pub should_quit: bool,
    pub status_message: Option<(String, Instant)>,
    last_index: usize,
}

impl App {
    pub fn new(browser: Browser, theme: ThemeColors, use_icons: bool, watcher_active: bool) -> Self {
        let root = FileTreeNode::new(browser.root());
        Self {
            browser,
            items: Vec::new(),
            selection: Selection::default(),
            root,
            details: None,
            scroll_offset: 0,
            tree_area: Rect::default(),
            theme,
            use_icons,
            watcher_active,
            should_quit: false,
            status_message: None,
            last_index: 0,
        }
    }

    /// Take the rows of a published change.
    ///
    /// A selection that vanished (its entry was deleted) moves to the row now
    /// at its old position. No selection stays no selection.
    pub fn apply_change(&mut self, items: Vec<PreviewItem>) {
        self.items = items;
        match self.selection.index_in(&self.items) {
            Some(index) => self.last_index = index,
            None if self.selection.selected().is_none() => {}
            None if self.items.is_empty() => self.selection.clear(),
            None => {
                let index = self.last_index.min(self.items.len() - 1);
                self.selection.select(&self.items[index].path);
            }
        }
        // The folder may have changed on disk even if the selection did not.
        self.refresh_details(true);
    }

    /// Take a listed folder node, if it is still the one selected.
    pub fn apply_details(&mut self, node: FileTreeNode) {
        if self.selected_folder().as_deref() == Some(node.path()) {
            self.details = Some(node);
        }
    }

    /// Children of the selected folder: from the live snapshot when the
    /// folder is open, otherwise from the last listed node. `None` for files
    /// and while a listing is on its way.
    pub fn selected_entry_count(&self) -> Option<usize> {
        let folder = self.selected_folder()?;
        if let Some(snapshot) = self.browser.registry().snapshot(&folder) {
            return Some(snapshot.size);
        }
        self.details
            .as_ref()
            .filter(|node| node.path() == folder)
            .map(|node| node.children().len())
    }

    pub fn selected_item(&self) -> Option<&PreviewItem> {
        self.selection.item(&self.items)
    }

    pub fn select_first(&mut self) {
        self.selection.select_first(&self.items);
        self.after_move();
    }

    pub fn select_last(&mut self) {
        self.selection.select_last(&self.items);
        self.after_move();
    }

    pub fn select_next(&mut self) {
        self.selection.select_next(&self.items);
        self.after_move();
    }

    pub fn select_previous(&mut self) {
        self.selection.select_previous(&self.items);
        self.after_move();
    }

    pub fn select(&mut self, path: &Path) {
        self.selection.select(path);
        self.after_move();
    }

    /// Open or close the selected folder. Files are left alone.
    pub fn toggle_selected(&mut self) {
        let Some(folder) = self.selection.toggle_target(&self.items) else {
            return;
        };
        match self.browser.toggle(&folder) {
            Toggle::Activated(_) => {}
            Toggle::Deactivated => {
                self.selection.follow_collapse(&folder);
                self.after_move();
            }
            Toggle::Ignored => {
                self.set_status_message(format!("{} no longer exists", folder.display()));
            }
        }
    }

    /// Left click at a terminal cell. Clicking the selected folder toggles it.
    pub fn click(&mut self, column: u16, row: u16) {
        let area = self.tree_area;
        let inside = column >= area.x
            && column < area.x + area.width
            && row >= area.y
            && row < area.y + area.height;
        if !inside {
            return;
        }
        let index = self.scroll_offset + (row - area.y) as usize;
        let Some(path) = self.items.get(index).map(|i| i.path.clone()) else {
            return;
        };
        if self.selection.selected() == Some(path.as_path()) {
            self.toggle_selected();
        } else {
            self.select(&path);
        }
    }

    /// Keep the selected row within a window of `visible_height` rows.
    pub fn update_scroll(&mut self, visible_height: usize) {
        if visible_height == 0 {
            return;
        }
        let max_offset = self.items.len().saturating_sub(visible_height);
        if let Some(index) = self.selection.index_in(&self.items) {
            if index < self.scroll_offset {
                self.scroll_offset = index;
            } else if index >= self.scroll_offset + visible_height {
                self.scroll_offset = index + 1 - visible_height;
            }
        }
        self.scroll_offset = self.scroll_offset.min(max_offset);
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn set_status_message(&mut self, msg: String) {
        self.status_message = Some((msg, Instant::now()));
    }

    /// Drop the status message once it has been shown long enough.
    pub fn clear_expired_status(&mut self) {
        if let Some((_, ref created)) = self.status_message {
            if created.elapsed().as_secs() >= STATUS_TTL_SECS {
                self.status_message = None;
            }
        }
    }

    fn selected_folder(&self) -> Option<PathBuf> {
        self.selected_item()
            .filter(|item| item.is_folder())
            .map(|item| item.path.clone())
    }

    fn after_move(&mut self) {
        if let Some(index) = self.selection.index_in(&self.items) {
            self.last_index = index;
        }
        self.refresh_details(false);
    }

    /// Ask for a fresh listing of the selected closed folder. With `force`
    /// off, a node already listed for it is kept.
    fn refresh_details(&mut self, force: bool) {
        let Some(folder) = self.selected_folder() else {
            self.details = None;
            return;
        };
        if self.browser.registry().is_active(&folder) {
            return;
        }
        let listed = self.details.as_ref().is_some_and(|d| d.path() == folder);
        if force || !listed {
            self.browser.describe(&folder);
        }
    }
}
