use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Widget},
};

use crate::projection::{PreviewItem, PreviewItemState};
use crate::theme::ThemeColors;

/// Columns of indentation per nesting level.
const INDENT: usize = 2;

/// Renders projected rows, indented by level, with the selected path
/// highlighted.
pub struct TreeWidget<'a> {
    items: &'a [PreviewItem],
    selected: Option<usize>,
    scroll_offset: usize,
    theme: &'a ThemeColors,
    use_icons: bool,
    block: Option<Block<'a>>,
}

impl<'a> TreeWidget<'a> {
    pub fn new(items: &'a [PreviewItem], theme: &'a ThemeColors, use_icons: bool) -> Self {
        Self {
            items,
            selected: None,
            scroll_offset: 0,
            theme,
            use_icons,
            block: None,
        }
    }

    pub fn selected(mut self, selected: Option<usize>) -> Self {
        self.selected = selected;
        self
    }

    pub fn scroll_offset(mut self, offset: usize) -> Self {
        self.scroll_offset = offset;
        self
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }

    fn indicator(&self, item: &PreviewItem) -> &'static str {
        match (self.use_icons, item.state) {
            (true, PreviewItemState::OpenedFolder) => "\u{f115} ",
            (true, PreviewItemState::ClosedFolder) => "\u{f114} ",
            (true, PreviewItemState::File) => Self::file_icon_by_ext(&item.name),
            (false, PreviewItemState::OpenedFolder) => "v ",
            (false, PreviewItemState::ClosedFolder) => "> ",
            (false, PreviewItemState::File) => "  ",
        }
    }

    /// Nerd Font glyph by extension.
    fn file_icon_by_ext(name: &str) -> &'static str {
        let ext = name.rsplit('.').next().unwrap_or("").to_lowercase();
        match ext.as_str() {
            "rs" => "\u{e7a8} ",
            "py" => "\u{e606} ",
            "js" | "jsx" | "ts" | "tsx" => "\u{e74e} ",
            "json" | "toml" | "yaml" | "yml" => "\u{e615} ",
            "md" | "txt" => "\u{f48a} ",
            "sh" | "bash" | "zsh" => "\u{f489} ",
            "png" | "jpg" | "jpeg" | "gif" | "svg" => "\u{f1c5} ",
            "zip" | "tar" | "gz" | "xz" => "\u{f410} ",
            _ => "\u{f15b} ",
        }
    }

    /// Text of one row, without styling.
    fn row_text(&self, item: &PreviewItem) -> String {
        let indent = " ".repeat(item.level.saturating_sub(1) * INDENT);
        let suffix = if item.unreadable { " (unreadable)" } else { "" };
        format!("{}{}{}{}", indent, self.indicator(item), item.name, suffix)
    }

    fn row_style(&self, item: &PreviewItem, is_selected: bool) -> Style {
        if is_selected {
            Style::default()
                .bg(self.theme.tree_selected_bg)
                .fg(self.theme.tree_selected_fg)
                .add_modifier(Modifier::BOLD)
        } else if item.unreadable {
            Style::default().fg(self.theme.dim_fg)
        } else if item.is_folder() {
            Style::default()
                .fg(self.theme.tree_dir_fg)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(self.theme.tree_file_fg)
        }
    }
}

impl Widget for TreeWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner = match &self.block {
            Some(block) => {
                let inner = block.inner(area);
                block.clone().render(area, buf);
                inner
            }
            None => area,
        };

        let visible_height = inner.height as usize;
        if visible_height == 0 {
            return;
        }
        buf.set_style(inner, Style::default().fg(self.theme.tree_fg));
        if self.items.is_empty() {
            let hint = Span::styled("(empty)", Style::default().fg(self.theme.dim_fg));
            buf.set_line(inner.x, inner.y, &Line::from(hint), inner.width);
            return;
        }

        let rows = self
            .items
            .iter()
            .enumerate()
            .skip(self.scroll_offset)
            .take(visible_height);
        for (i, (idx, item)) in rows.enumerate() {
            let style = self.row_style(item, self.selected == Some(idx));
            let y = inner.y + i as u16;
            // Fill the whole line so the highlight spans the width.
            buf.set_style(Rect::new(inner.x, y, inner.width, 1), style);
            let line = Line::from(Span::styled(self.row_text(item), style));
            buf.set_line(inner.x, y, &line, inner.width);
        }
    }
}
