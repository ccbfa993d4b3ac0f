use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::Style,
    widgets::{Block, Borders},
    Frame,
};

use crate::app::App;
use crate::components::status_bar::StatusBarWidget;
use crate::components::tree::TreeWidget;

/// Render the application UI: the tree above a one-line status bar.
pub fn render(app: &mut App, frame: &mut Frame) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(frame.area());

    let block = Block::default()
        .title(format!(" {} ", app.root.name()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(app.theme.border_fg));
    let inner = block.inner(chunks[0]);
    app.tree_area = inner;
    app.update_scroll(inner.height as usize);

    let tree = TreeWidget::new(&app.items, &app.theme, app.use_icons)
        .selected(app.selection.index_in(&app.items))
        .scroll_offset(app.scroll_offset)
        .block(block);
    frame.render_widget(tree, chunks[0]);

    let path_str = app
        .selection
        .selected()
        .unwrap_or(app.root.path())
        .display()
        .to_string();
    let entry_info = match (app.selected_entry_count(), app.selected_item()) {
        (Some(1), _) => "1 entry".to_string(),
        (Some(n), _) => format!("{} entries", n),
        (None, Some(item)) if !item.is_folder() => "file".to_string(),
        (None, _) => String::new(),
    };
    let watcher = if app.watcher_active { "live" } else { "static" };

    let mut status =
        StatusBarWidget::new(&path_str, &entry_info, &app.theme).watcher_status(watcher);
    if let Some((msg, _)) = &app.status_message {
        status = status.status_message(msg);
    }
    frame.render_widget(status, chunks[1]);
}
