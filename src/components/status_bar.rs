use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};

use crate::theme::ThemeColors;

const KEY_HINTS: &str = " j/k:move  space:open  q:quit ";

/// One-line bar: selected path, entry info, watcher state and key hints.
/// A status message, when set, replaces everything else.
pub struct StatusBarWidget<'a> {
    path_str: &'a str,
    entry_info: &'a str,
    theme: &'a ThemeColors,
    status_message: Option<&'a str>,
    watcher_status: Option<&'a str>,
}

impl<'a> StatusBarWidget<'a> {
    pub fn new(path_str: &'a str, entry_info: &'a str, theme: &'a ThemeColors) -> Self {
        Self {
            path_str,
            entry_info,
            theme,
            status_message: None,
            watcher_status: None,
        }
    }

    pub fn status_message(mut self, msg: &'a str) -> Self {
        self.status_message = Some(msg);
        self
    }

    pub fn watcher_status(mut self, status: &'a str) -> Self {
        self.watcher_status = Some(status);
        self
    }
}

/// Keep the last `budget` characters, marking the cut with `...`.
fn truncate_left(s: &str, budget: usize) -> String {
    let len = s.chars().count();
    if len <= budget {
        return s.to_string();
    }
    if budget <= 3 {
        return s.chars().take(budget).collect();
    }
    let tail: String = s.chars().skip(len - (budget - 3)).collect();
    format!("...{}", tail)
}

impl Widget for StatusBarWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }
        let width = area.width as usize;
        buf.set_style(
            Rect::new(area.x, area.y, area.width, 1),
            Style::default().bg(self.theme.status_bg),
        );

        if let Some(msg) = self.status_message {
            let style = Style::default()
                .bg(self.theme.status_bg)
                .fg(self.theme.warning_fg);
            let shown: String = msg.chars().take(width).collect();
            let line = Line::from(Span::styled(shown, style));
            buf.set_line(area.x, area.y, &line, area.width);
            return;
        }

        let watcher = self.watcher_status.unwrap_or("");
        let fixed = KEY_HINTS.len() + self.entry_info.chars().count() + watcher.len() + 2;
        let path_display = truncate_left(self.path_str, width.saturating_sub(fixed));

        let base = Style::default().bg(self.theme.status_bg);
        let mut spans = vec![
            Span::styled(path_display, base.fg(self.theme.status_fg)),
            Span::styled(" ", base),
            Span::styled(self.entry_info.to_string(), base.fg(self.theme.success_fg)),
        ];
        if !watcher.is_empty() {
            spans.push(Span::styled(" ", base));
            spans.push(Span::styled(
                watcher.to_string(),
                base.fg(self.theme.warning_fg).add_modifier(Modifier::BOLD),
            ));
        }

        let used: usize = spans.iter().map(|s| s.content.chars().count()).sum();
        let pad = width.saturating_sub(used).saturating_sub(KEY_HINTS.len());
        if pad > 0 {
            spans.push(Span::styled(" ".repeat(pad), base));
        }
        spans.push(Span::styled(
            KEY_HINTS,
            base.fg(self.theme.dim_fg).add_modifier(Modifier::DIM),
        ));

        buf.set_line(area.x, area.y, &Line::from(spans), area.width);
    }
}
