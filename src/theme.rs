// Colour palette shared by window chrome, dock and sidebar

use ratatui::style::{Color, Modifier, Style};

pub const BORDER_FOCUSED_TERMINAL: Color = Color::Rgb(0x4e, 0xc9, 0xb0);
pub const BORDER_FOCUSED_WINDOW: Color = Color::Rgb(0x48, 0x65, 0xf2);
pub const BORDER_UNFOCUSED: Color = Color::Rgb(0x5a, 0x5a, 0x6e);
pub const WINDOW_FOREGROUND: Color = Color::Rgb(0xff, 0xff, 0xff);

pub const SIDEBAR_BACKGROUND: Color = Color::Rgb(0x1a, 0x1a, 0x2e);
pub const SIDEBAR_BORDER: Color = Color::Rgb(0x3a, 0x3a, 0x5e);
pub const SIDEBAR_HEADER_BACKGROUND: Color = Color::Rgb(0x2a, 0x2a, 0x4e);
pub const SIDEBAR_WORKSPACE: Color = Color::Rgb(0x80, 0x80, 0x90);
pub const SIDEBAR_SELECTED: Color = Color::Rgb(0x48, 0x65, 0xf2);
pub const SIDEBAR_FOCUSED: Color = Color::Rgb(0x3a, 0x3a, 0x5e);
pub const SIDEBAR_NORMAL: Color = Color::Rgb(0xa0, 0xa0, 0xb0);
pub const SIDEBAR_DIM: Color = Color::Rgb(0x60, 0x60, 0x70);

pub const DOCK_BACKGROUND: Color = Color::Rgb(0x1e, 0x1e, 0x2e);
pub const DOCK_FOREGROUND: Color = Color::Rgb(0xc0, 0xc0, 0xd0);

/// Border colour for a window given focus and input mode
pub fn border_color(focused: bool, terminal_mode: bool) -> Color {
    match (focused, terminal_mode) {
        (true, true) => BORDER_FOCUSED_TERMINAL,
        (true, false) => BORDER_FOCUSED_WINDOW,
        (false, _) => BORDER_UNFOCUSED,
    }
}

pub fn notification_style(level: crate::state::NotificationLevel) -> Style {
    use crate::state::NotificationLevel;
    let bg = match level {
        NotificationLevel::Info => Color::Rgb(0x2a, 0x2a, 0x4e),
        NotificationLevel::Warning => Color::Rgb(0x6e, 0x5a, 0x1e),
        NotificationLevel::Error => Color::Rgb(0x6e, 0x1e, 0x2a),
    };
    Style::default()
        .fg(Color::White)
        .bg(bg)
        .add_modifier(Modifier::BOLD)
}
