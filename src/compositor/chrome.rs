// Window borders, title bar, dock and notification overlays

use crate::config::DockPosition;
use crate::state::Os;
use crate::state::window::{Mode, Window};
use crate::theme;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Paragraph, Widget};

use super::layer::Layer;
use super::{Z_DOCK, Z_OVERLAY};

/// Title bar decoration for one window box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chrome<'a> {
    pub focused: bool,
    pub terminal_mode: bool,
    /// Rename buffer to show in place of the title while renaming
    pub rename: Option<&'a str>,
    pub auto_tiling: bool,
}

fn title_line(window: &Window, chrome: &Chrome<'_>) -> Line<'static> {
    match chrome.rename {
        Some(buffer) => Line::from(vec![
            Span::raw(" "),
            Span::styled(
                format!("{buffer}\u{2588}"),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
        ]),
        None => Line::from(format!(" {} ", window.display_name())),
    }
}

fn controls_line(auto_tiling: bool) -> Line<'static> {
    let controls = if auto_tiling { " ─ × " } else { " ─ □ × " };
    Line::from(controls).right_aligned()
}

/// Bordered box of `window.width` x `window.height` cells around `content`
pub fn render_window_box(window: &Window, content: Text<'static>, chrome: Chrome<'_>) -> Buffer {
    let area = Rect::new(0, 0, window.width, window.height);
    let mut buf = Buffer::empty(area);
    if area.is_empty() {
        return buf;
    }

    let border = Style::default().fg(theme::border_color(chrome.focused, chrome.terminal_mode));
    let block = Block::bordered()
        .border_style(border)
        .title_top(title_line(window, &chrome))
        .title_top(controls_line(chrome.auto_tiling));

    Paragraph::new(content)
        .style(Style::default().fg(theme::WINDOW_FOREGROUND))
        .block(block)
        .render(area, &mut buf);
    buf
}

/// Dock row for the current workspace: workspace badge, mode and minimized windows
pub fn render_dock(os: &Os) -> Option<Layer> {
    let height = os.config.dock_height;
    let width = os.render_width();
    if os.config.dock_position == DockPosition::Hidden || height == 0 || width == 0 {
        return None;
    }

    let y = match os.config.dock_position {
        DockPosition::Top => 0,
        _ => os.render_height().saturating_sub(height) as i32,
    };

    let base = Style::default()
        .fg(theme::DOCK_FOREGROUND)
        .bg(theme::DOCK_BACKGROUND);
    let mode = match os.mode {
        Mode::Window => "WINDOW",
        Mode::Terminal => "TERMINAL",
    };

    let mut spans = vec![
        Span::styled(
            format!(" [{}] ", os.current_workspace),
            base.add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("{mode} "), base.fg(theme::SIDEBAR_WORKSPACE)),
    ];
    for window in os
        .windows
        .iter()
        .filter(|w| w.workspace == os.current_workspace && w.minimized)
    {
        spans.push(Span::styled(
            format!(" {} ", window.display_name()),
            base.fg(theme::SIDEBAR_DIM).add_modifier(Modifier::ITALIC),
        ));
    }

    let area = Rect::new(0, 0, width, height);
    let mut buf = Buffer::empty(area);
    buf.set_style(area, base);
    Paragraph::new(Line::from(spans))
        .style(base)
        .render(area, &mut buf);
    Some(Layer::new(buf, 0, y, Z_DOCK, "dock"))
}

/// Active notifications stacked down the top-right corner
pub fn render_notifications(os: &Os) -> Vec<Layer> {
    let width = os.render_width() as i32;
    let mut y = os.top_margin() as i32;
    let mut layers = Vec::with_capacity(os.notifications.len());

    for (i, notification) in os.notifications.iter().enumerate() {
        let text_width = notification.message.chars().count() as i32;
        let box_width = (text_width + 4).min(width);
        if box_width < 3 {
            break;
        }
        let area = Rect::new(0, 0, box_width as u16, 3);
        let mut buf = Buffer::empty(area);
        let style = theme::notification_style(notification.level);
        Paragraph::new(notification.message.clone())
            .style(style)
            .block(Block::bordered().border_style(style))
            .render(area, &mut buf);

        let x = (width - box_width - 1).max(0);
        layers.push(Layer::new(buf, x, y, Z_OVERLAY, format!("notification-{i}")));
        y += 3;
    }
    layers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::state::NotificationLevel;
    use std::time::Duration;

    fn row(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width).map(|x| buf[(x, y)].symbol()).collect()
    }

    fn chrome() -> Chrome<'static> {
        Chrome {
            focused: true,
            terminal_mode: false,
            rename: None,
            auto_tiling: false,
        }
    }

    #[test]
    fn test_box_has_title_and_controls() {
        let window = Window::new("w", "htop", 1).with_geometry(0, 0, 20, 4);
        let buf = render_window_box(&window, Text::raw("hello"), chrome());

        assert_eq!(buf.area, Rect::new(0, 0, 20, 4));
        let top = row(&buf, 0);
        assert!(top.contains("htop"), "{top}");
        assert!(top.contains("□ ×"), "{top}");
        assert_eq!(row(&buf, 1), "│hello             │");
        assert_eq!(buf[(0, 0)].fg, theme::BORDER_FOCUSED_WINDOW);
    }

    #[test]
    fn test_rename_and_tiling_change_title_bar() {
        let window = Window::new("w", "htop", 1).with_geometry(0, 0, 24, 3);
        let buf = render_window_box(
            &window,
            Text::default(),
            Chrome {
                rename: Some("logs"),
                auto_tiling: true,
                ..chrome()
            },
        );

        let top = row(&buf, 0);
        assert!(top.contains("logs\u{2588}"), "{top}");
        assert!(!top.contains("htop"));
        assert!(!top.contains('□'));
    }

    #[test]
    fn test_dock_position_follows_config() {
        let mut os = Os::new(Config::default(), 40, 10);
        let dock = render_dock(&os).unwrap();
        assert_eq!((dock.y(), dock.z()), (9, Z_DOCK));

        os.config.dock_position = DockPosition::Top;
        assert_eq!(render_dock(&os).unwrap().y(), 0);

        os.config.dock_position = DockPosition::Hidden;
        assert!(render_dock(&os).is_none());
    }

    #[test]
    fn test_notifications_stack_top_right() {
        let mut os = Os::new(Config::default(), 40, 10);
        os.show_notification("saved", NotificationLevel::Info, Duration::from_secs(5));
        os.show_notification("oops", NotificationLevel::Error, Duration::from_secs(5));

        let layers = render_notifications(&os);
        assert_eq!(layers.len(), 2);
        assert_eq!((layers[0].x(), layers[0].y()), (40 - 9 - 1, 0));
        assert_eq!(layers[1].y(), 3);
        assert!(layers.iter().all(|l| l.z() == Z_OVERLAY));
    }
}
