//! Window list sidebar: rendering, keyboard selection and mouse hit-testing.

pub mod layout;

use std::time::Duration;

use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::Widget;
use tracing::debug;

use self::layout::{build_sidebar_layout, SidebarLayout, SidebarLine};
use crate::compositor::layer::Layer;
use crate::compositor::Z_SIDEBAR;
use crate::state::window::{Mode, Window};
use crate::state::{NotificationLevel, Os};
use crate::theme;

/// Leftmost columns that open the sidebar on hover while it is hidden
pub const SIDEBAR_HOVER_ZONE_WIDTH: i32 = 5;

const SIDEBAR_HINT: &str = "Sidebar: ↑↓ navigate, Enter select, Esc close";
const FOOTER: &str = "↑↓ move  ⏎ open  Esc close";

impl Os {
    pub fn sidebar_width(&self) -> u16 {
        layout::sidebar_width(self.render_width(), &self.config.sidebar)
    }

    /// Screen row of the sidebar's first line
    pub fn sidebar_origin_y(&self) -> u16 {
        self.top_margin()
    }

    pub fn sidebar_layout(&self) -> SidebarLayout {
        build_sidebar_layout(&self.windows, self.render_width(), &self.config.sidebar)
    }

    /// Window list entry text: number, minimized marker and a name cut to fit
    fn sidebar_item_text(&self, index: usize, window: &Window, width: u16) -> String {
        let max_len = (width as usize).saturating_sub(8);
        let name = window.display_name();
        let name = if name.chars().count() > max_len {
            let kept: String = name.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        } else {
            name.to_string()
        };
        if window.minimized {
            format!("{}  [m] {name}", index + 1)
        } else {
            format!("{}  {name}", index + 1)
        }
    }

    fn sidebar_item_style(&self, window: &Window) -> Style {
        let selected = self.sidebar_focused && self.sidebar_selected.as_deref() == Some(window.id.as_str());
        let focused = self.focused.as_deref() == Some(window.id.as_str())
            && window.workspace == self.current_workspace;

        if selected {
            Style::default()
                .bg(theme::SIDEBAR_SELECTED)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD)
        } else if focused {
            Style::default().bg(theme::SIDEBAR_FOCUSED).fg(Color::White)
        } else if window.minimized {
            Style::default()
                .fg(theme::SIDEBAR_DIM)
                .add_modifier(Modifier::ITALIC)
        } else {
            Style::default().fg(theme::SIDEBAR_NORMAL)
        }
    }

    /// Sidebar layer, or `None` while hidden
    pub fn render_sidebar(&self) -> Option<Layer> {
        if !self.sidebar_visible {
            return None;
        }
        let layout = self.sidebar_layout();
        let width = layout.width;
        let height = self.usable_height();
        if width < 3 || height == 0 {
            return None;
        }

        let area = Rect::new(0, 0, width, height);
        let mut buf = Buffer::empty(area);
        buf.set_style(area, Style::default().bg(theme::SIDEBAR_BACKGROUND));
        for y in 0..height {
            buf[(width - 1, y)]
                .set_symbol("│")
                .set_fg(theme::SIDEBAR_BORDER);
        }

        // Row background spans the inner width; text sits inside one column of padding
        let inner = width - 1;
        for entry in &layout.lines {
            if entry.start_y < 0 || entry.start_y >= height as i32 {
                continue;
            }
            let y = entry.start_y as u16;
            let (text, style, alignment) = match entry.role {
                SidebarLine::Header => (
                    "WINDOWS".to_string(),
                    Style::default()
                        .fg(Color::White)
                        .bg(theme::SIDEBAR_HEADER_BACKGROUND)
                        .add_modifier(Modifier::BOLD),
                    Alignment::Center,
                ),
                SidebarLine::WorkspaceHeader(workspace) => {
                    let marker = if workspace == self.current_workspace { " *" } else { "" };
                    (
                        format!("--- Workspace {workspace}{marker} ---"),
                        Style::default()
                            .fg(theme::SIDEBAR_WORKSPACE)
                            .add_modifier(Modifier::BOLD),
                        Alignment::Left,
                    )
                }
                SidebarLine::WindowItem(index) => {
                    let Some(window) = self.windows.get(index) else {
                        continue;
                    };
                    (
                        self.sidebar_item_text(index, window, width),
                        self.sidebar_item_style(window),
                        Alignment::Left,
                    )
                }
                SidebarLine::EmptyState(line) => (
                    if line == 0 { "No windows" } else { "Press 'n' to create" }.to_string(),
                    Style::default()
                        .fg(theme::SIDEBAR_DIM)
                        .add_modifier(Modifier::ITALIC),
                    Alignment::Center,
                ),
                SidebarLine::Footer => (
                    FOOTER.to_string(),
                    Style::default().fg(theme::SIDEBAR_DIM),
                    Alignment::Left,
                ),
                SidebarLine::Blank | SidebarLine::Gap => continue,
            };

            let row = Rect::new(0, y, inner, 1);
            buf.set_style(row, style);
            let text_area = Rect::new(1, y, inner.saturating_sub(2), 1);
            Line::styled(text, style)
                .alignment(alignment)
                .render(text_area, &mut buf);
        }

        Some(Layer::new(
            buf,
            0,
            self.sidebar_origin_y() as i32,
            Z_SIDEBAR,
            "sidebar",
        ))
    }

    /// Open (focused, on the focused window) or close the sidebar
    pub fn toggle_sidebar(&mut self) {
        self.sidebar_visible = !self.sidebar_visible;
        if self.sidebar_visible {
            self.sidebar_focused = true;
            self.sidebar_selected = self.focused.clone();
            let duration = Duration::from_millis(self.config.notification_ms);
            self.show_notification(SIDEBAR_HINT, NotificationLevel::Info, duration);
        } else {
            self.sidebar_focused = false;
            self.sidebar_selected = None;
        }
    }

    pub fn sidebar_selected_index(&self) -> Option<usize> {
        self.sidebar_selected
            .as_deref()
            .and_then(|id| self.index_of(id))
    }

    fn sidebar_step(&mut self, forward: bool) {
        let order: Vec<usize> = self.sidebar_layout().items().collect();
        if order.is_empty() {
            return;
        }
        let current = self
            .sidebar_selected_index()
            .and_then(|index| order.iter().position(|&i| i == index));
        let next = match (current, forward) {
            (Some(pos), true) => (pos + 1) % order.len(),
            (None, true) => 0,
            (Some(0) | None, false) => order.len() - 1,
            (Some(pos), false) => pos - 1,
        };
        self.sidebar_selected = Some(self.windows[order[next]].id.clone());
    }

    /// Move the selection down, wrapping to the first entry
    pub fn sidebar_select_next(&mut self) {
        self.sidebar_step(true);
    }

    /// Move the selection up, wrapping to the last entry
    pub fn sidebar_select_prev(&mut self) {
        self.sidebar_step(false);
    }

    pub fn sidebar_confirm_selection(&mut self) {
        if let Some(index) = self.sidebar_selected_index() {
            self.sidebar_confirm_index(index);
        }
    }

    /// Switch to the window at `index`: its workspace, restored, focused, in
    /// terminal mode. Out of range does nothing.
    pub fn sidebar_confirm_index(&mut self, index: usize) {
        let Some(window) = self.windows.get(index) else {
            return;
        };
        let (workspace, minimized) = (window.workspace, window.minimized);
        debug!(window = %window.id, "sidebar selection confirmed");

        if workspace != self.current_workspace {
            self.switch_to_workspace(workspace);
        }
        if minimized {
            self.restore_window(index);
        }
        self.focus_window(index);

        self.sidebar_visible = false;
        self.sidebar_focused = false;
        self.sidebar_selected = None;
        self.mode = Mode::Terminal;
    }

    pub fn close_sidebar(&mut self) {
        self.sidebar_visible = false;
        self.sidebar_focused = false;
        self.sidebar_selected = None;
    }

    /// Window index of the sidebar entry at screen cell (`x`, `y`)
    pub fn find_sidebar_item_clicked(&self, x: i32, y: i32) -> Option<usize> {
        if !self.sidebar_visible || x < 0 {
            return None;
        }
        let layout = self.sidebar_layout();
        if x >= layout.width as i32 {
            return None;
        }
        layout.item_at(y - self.sidebar_origin_y() as i32)
    }

    pub fn is_sidebar_hover_zone(&self, x: i32, _y: i32) -> bool {
        !self.sidebar_visible && x < SIDEBAR_HOVER_ZONE_WIDTH
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DockPosition};

    fn row(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width).map(|x| buf[(x, y)].symbol()).collect()
    }

    /// a, b on workspace 1 and c on workspace 3
    fn os() -> Os {
        let mut os = Os::new(Config::default(), 150, 30);
        os.spawn_window("alpha");
        os.spawn_window("beta");
        os.current_workspace = 3;
        os.spawn_window("gamma");
        os.switch_to_workspace(1);
        os
    }

    #[test]
    fn test_click_resolves_same_row_as_render() {
        let mut os = os();
        os.config.dock_position = DockPosition::Top;
        os.sidebar_visible = true;

        let layer = os.render_sidebar().unwrap();
        assert_eq!(layer.y(), 1);
        assert_eq!(layer.z(), Z_SIDEBAR);
        assert_eq!(layer.width(), 30);

        let layout = os.sidebar_layout();
        let gamma_row = layout.item_y(2).unwrap();
        assert!(row(layer.content(), gamma_row as u16).contains("3  gamma"));

        let screen_y = layer.y() + gamma_row;
        assert_eq!(os.find_sidebar_item_clicked(3, screen_y), Some(2));
        assert_eq!(os.find_sidebar_item_clicked(3, screen_y + 1), None);
        assert_eq!(os.find_sidebar_item_clicked(30, screen_y), None);
    }

    #[test]
    fn test_hidden_sidebar_has_no_targets() {
        let os = os();
        assert!(os.render_sidebar().is_none());
        assert_eq!(os.find_sidebar_item_clicked(3, 3), None);
        assert!(os.is_sidebar_hover_zone(4, 10));
        assert!(!os.is_sidebar_hover_zone(5, 10));
    }

    #[test]
    fn test_toggle_selects_focused_and_hints() {
        let mut os = os();
        os.toggle_sidebar();
        assert!(os.sidebar_visible && os.sidebar_focused);
        assert_eq!(os.sidebar_selected_index(), Some(1));
        assert_eq!(os.notifications.len(), 1);
        assert!(!os.is_sidebar_hover_zone(0, 0));

        os.toggle_sidebar();
        assert!(!os.sidebar_visible);
        assert_eq!(os.sidebar_selected, None);
    }

    #[test]
    fn test_selection_wraps_in_display_order() {
        let mut os = os();
        os.toggle_sidebar();

        os.sidebar_select_next();
        assert_eq!(os.sidebar_selected_index(), Some(2));
        os.sidebar_select_next();
        assert_eq!(os.sidebar_selected_index(), Some(0));
        os.sidebar_select_prev();
        assert_eq!(os.sidebar_selected_index(), Some(2));
    }

    #[test]
    fn test_confirm_switches_restores_and_focuses() {
        let mut os = os();
        os.minimize_window(2);
        os.toggle_sidebar();
        os.sidebar_selected = Some(os.windows[2].id.clone());

        os.sidebar_confirm_selection();
        assert_eq!(os.current_workspace, 3);
        assert!(!os.windows[2].minimized);
        assert_eq!(os.focused_index(), Some(2));
        assert!(!os.sidebar_visible);
        assert_eq!(os.mode, Mode::Terminal);
    }

    #[test]
    fn test_confirm_out_of_range_is_noop() {
        let mut os = os();
        os.sidebar_visible = true;
        os.sidebar_confirm_index(42);
        assert!(os.sidebar_visible);
        assert_eq!(os.mode, Mode::Window);
    }

    #[test]
    fn test_long_names_are_truncated() {
        let mut os = Os::new(Config::default(), 100, 30);
        os.spawn_window("a-really-long-window-title-here");
        let text = os.sidebar_item_text(0, &os.windows[0], 25);
        assert_eq!(text, "1  a-really-long-...");
        os.windows[0].minimized = true;
        assert!(os.sidebar_item_text(0, &os.windows[0], 25).starts_with("1  [m] "));
    }
}
