//! Terminal content collaborators.
//!
//! The compositor only needs read access to a window's rendered viewport and a
//! few pieces of metadata, expressed by [`TerminalView`]. [`PlainTerminal`] is a
//! deliberately small line-buffer implementation used by the interactive driver:
//! it understands printable text, CR/LF/BS/TAB, screen clears and the alternate
//! screen switch, and hands graphics escapes back to the caller untouched.

pub mod scanner;

use ratatui::text::{Line, Text};
use std::collections::VecDeque;

pub use scanner::{GraphicsSequence, Scanner, Token};

/// Parameters for one content render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderRequest {
    pub width: u16,
    pub height: u16,
    /// Lines scrolled back from the live bottom
    pub scroll_offset: usize,
    pub focused: bool,
    pub terminal_mode: bool,
}

/// View of an embedded terminal emulator. The compositor only uses the
/// read side; `feed` and `resize` are for whoever owns the session.
pub trait TerminalView {
    fn render(&self, request: RenderRequest) -> Text<'static>;
    fn scrollback_len(&self) -> usize;
    fn is_alt_screen(&self) -> bool;

    /// Lines discarded from the top of the current screen since it was
    /// created. Never decreases, so `lines_dropped + scrollback_len` is a
    /// stable absolute index for the first live row.
    fn lines_dropped(&self) -> u64 {
        0
    }

    /// Consume session output, returning any graphics escapes found in it
    fn feed(&mut self, _bytes: &[u8]) -> Vec<GraphicsEvent> {
        Vec::new()
    }

    fn resize(&mut self, _cols: u16, _rows: u16) {}
}

/// Cursor position in screen coordinates (0-based, relative to the content area)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub col: u16,
    pub row: u16,
}

/// Graphics escape found in output, with where the cursor was when it arrived
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphicsEvent {
    pub sequence: GraphicsSequence,
    pub cursor: Cursor,
    pub scrollback_len: usize,
    pub lines_dropped: u64,
    pub alt_screen: bool,
}

const MAX_SCROLLBACK: usize = 2000;

#[derive(Debug)]
struct Screen {
    lines: VecDeque<String>,
    cursor_line: usize,
    col: usize,
    dropped: u64,
}

impl Screen {
    fn new() -> Self {
        let mut lines = VecDeque::new();
        lines.push_back(String::new());
        Self {
            lines,
            cursor_line: 0,
            col: 0,
            dropped: 0,
        }
    }
}

#[derive(Debug)]
pub struct PlainTerminal {
    cols: u16,
    rows: u16,
    primary: Screen,
    alternate: Option<Screen>,
    scanner: Scanner,
}

impl PlainTerminal {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            cols: cols.max(1),
            rows: rows.max(1),
            primary: Screen::new(),
            alternate: None,
            scanner: Scanner::new(),
        }
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.cols = cols.max(1);
        self.rows = rows.max(1);
    }

    fn screen(&self) -> &Screen {
        self.alternate.as_ref().unwrap_or(&self.primary)
    }

    fn screen_mut(&mut self) -> &mut Screen {
        self.alternate.as_mut().unwrap_or(&mut self.primary)
    }

    /// Cursor relative to the top of the live screen
    pub fn cursor(&self) -> Cursor {
        let screen = self.screen();
        let top = screen.lines.len().saturating_sub(self.rows as usize);
        Cursor {
            col: screen.col.min(u16::MAX as usize) as u16,
            row: screen.cursor_line.saturating_sub(top).min(u16::MAX as usize) as u16,
        }
    }

    /// Feed raw PTY output. Returns graphics escapes for the passthrough layer.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<GraphicsEvent> {
        let mut events = Vec::new();
        for token in self.scanner.feed(bytes) {
            match token {
                Token::Text(text) => {
                    for ch in text.chars() {
                        self.put_char(ch);
                    }
                }
                Token::Control(b) => self.control(b),
                Token::Csi { params, action } => self.csi(&params, action),
                Token::Graphics(sequence) => events.push(GraphicsEvent {
                    sequence,
                    cursor: self.cursor(),
                    scrollback_len: self.scrollback_len(),
                    lines_dropped: self.lines_dropped(),
                    alt_screen: self.is_alt_screen(),
                }),
            }
        }
        events
    }

    fn put_char(&mut self, ch: char) {
        let cols = self.cols as usize;
        if self.screen().col >= cols {
            self.line_feed();
            self.screen_mut().col = 0;
        }
        let screen = self.screen_mut();
        let col = screen.col;
        let line = &mut screen.lines[screen.cursor_line];
        let len = line.chars().count();
        if col < len {
            let mut chars: Vec<char> = line.chars().collect();
            chars[col] = ch;
            *line = chars.into_iter().collect();
        } else {
            line.extend(std::iter::repeat(' ').take(col - len));
            line.push(ch);
        }
        screen.col += 1;
    }

    fn control(&mut self, b: u8) {
        match b {
            b'\n' | 0x0b | 0x0c => self.line_feed(),
            b'\r' => self.screen_mut().col = 0,
            0x08 => {
                let screen = self.screen_mut();
                screen.col = screen.col.saturating_sub(1);
            }
            b'\t' => {
                let cols = self.cols as usize;
                let screen = self.screen_mut();
                screen.col = ((screen.col / 8 + 1) * 8).min(cols.saturating_sub(1));
            }
            _ => {}
        }
    }

    fn line_feed(&mut self) {
        let keep_history = self.alternate.is_none();
        let rows = self.rows as usize;
        let screen = self.screen_mut();
        screen.cursor_line += 1;
        if screen.cursor_line >= screen.lines.len() {
            screen.lines.push_back(String::new());
        }
        let limit = if keep_history { MAX_SCROLLBACK + rows } else { rows };
        while screen.lines.len() > limit {
            screen.lines.pop_front();
            screen.cursor_line = screen.cursor_line.saturating_sub(1);
            screen.dropped += 1;
        }
    }

    fn csi(&mut self, params: &str, action: char) {
        match (params, action) {
            ("?1049" | "?1047" | "?47", 'h') => {
                if self.alternate.is_none() {
                    self.alternate = Some(Screen::new());
                }
            }
            ("?1049" | "?1047" | "?47", 'l') => self.alternate = None,
            ("2", 'J') => {
                // Push the visible screen into history, like a real clear does
                let rows = self.rows as usize;
                for _ in 0..rows {
                    self.line_feed();
                }
                let screen = self.screen_mut();
                screen.cursor_line = screen.lines.len() - 1;
                screen.col = 0;
            }
            ("3", 'J') => {
                let rows = self.rows as usize;
                let screen = self.screen_mut();
                let drop = screen.lines.len().saturating_sub(rows);
                screen.lines.drain(..drop);
                screen.cursor_line = screen.cursor_line.saturating_sub(drop);
                screen.dropped += drop as u64;
            }
            ("" | "0", 'K') => {
                let screen = self.screen_mut();
                let col = screen.col;
                let line = &mut screen.lines[screen.cursor_line];
                *line = line.chars().take(col).collect();
            }
            _ => {}
        }
    }
}

impl TerminalView for PlainTerminal {
    fn render(&self, request: RenderRequest) -> Text<'static> {
        let screen = self.screen();
        let height = request.height as usize;
        let width = request.width as usize;
        let bottom = screen
            .lines
            .len()
            .saturating_sub(request.scroll_offset.min(self.scrollback_len()));
        let top = bottom.saturating_sub(height);
        let lines: Vec<Line<'static>> = screen
            .lines
            .range(top..bottom)
            .map(|line| Line::raw(line.chars().take(width).collect::<String>()))
            .collect();
        Text::from(lines)
    }

    fn scrollback_len(&self) -> usize {
        self.screen()
            .lines
            .len()
            .saturating_sub(self.rows as usize)
    }

    fn is_alt_screen(&self) -> bool {
        self.alternate.is_some()
    }

    fn lines_dropped(&self) -> u64 {
        self.screen().dropped
    }

    fn feed(&mut self, bytes: &[u8]) -> Vec<GraphicsEvent> {
        PlainTerminal::feed(self, bytes)
    }

    fn resize(&mut self, cols: u16, rows: u16) {
        PlainTerminal::resize(self, cols, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(width: u16, height: u16) -> RenderRequest {
        RenderRequest {
            width,
            height,
            scroll_offset: 0,
            focused: true,
            terminal_mode: true,
        }
    }

    fn rendered(term: &PlainTerminal, width: u16, height: u16, scroll_offset: usize) -> Vec<String> {
        term.render(RenderRequest {
            scroll_offset,
            ..request(width, height)
        })
        .lines
        .iter()
        .map(|l| l.to_string())
        .collect()
    }

    #[test]
    fn test_scrollback_grows_past_screen() {
        let mut term = PlainTerminal::new(10, 3);
        term.feed(b"a\r\nb\r\nc\r\nd\r\ne");
        assert_eq!(term.scrollback_len(), 2);
        assert_eq!(rendered(&term, 10, 3, 0), vec!["c", "d", "e"]);
        assert_eq!(rendered(&term, 10, 3, 2), vec!["a", "b", "c"]);
        assert_eq!(term.cursor(), Cursor { col: 1, row: 2 });
    }

    #[test]
    fn test_alt_screen_hides_primary() {
        let mut term = PlainTerminal::new(10, 3);
        term.feed(b"shell");
        term.feed(b"\x1b[?1049hvim");
        assert!(term.is_alt_screen());
        assert_eq!(rendered(&term, 10, 3, 0), vec!["vim"]);
        term.feed(b"\x1b[?1049l");
        assert!(!term.is_alt_screen());
        assert_eq!(rendered(&term, 10, 3, 0), vec!["shell"]);
    }

    #[test]
    fn test_graphics_event_carries_cursor() {
        let mut term = PlainTerminal::new(20, 5);
        let events = term.feed(b"line\r\n  \x1b_Ga=T,f=100;AAAA\x1b\\");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].cursor, Cursor { col: 2, row: 1 });
        assert_eq!(events[0].scrollback_len, 0);
        assert!(!events[0].alt_screen);
    }

    #[test]
    fn test_clear_scrollback_drops_history() {
        let mut term = PlainTerminal::new(10, 2);
        term.feed(b"1\r\n2\r\n3\r\n4");
        assert_eq!(term.scrollback_len(), 2);
        term.feed(b"\x1b[3J");
        assert_eq!(term.scrollback_len(), 0);
        assert_eq!(term.lines_dropped(), 2);
    }

    #[test]
    fn test_lines_dropped_keeps_counting_past_history_cap() {
        let mut term = PlainTerminal::new(20, 5);
        for i in 0..2100 {
            term.feed(format!("{i}\r\n").as_bytes());
        }
        assert_eq!(term.scrollback_len(), MAX_SCROLLBACK);
        let dropped = term.lines_dropped();
        assert_eq!(dropped + term.scrollback_len() as u64, 2096);

        term.feed(b"a\r\nb\r\nc\r\n");
        assert_eq!(term.scrollback_len(), MAX_SCROLLBACK);
        assert_eq!(term.lines_dropped(), dropped + 3);
    }
}
