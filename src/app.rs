// Interactive driver state: ties windows to their PTY sessions, routes
// input, and runs one frame at a time.

use std::time::{Duration, Instant};

use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent,
    MouseEventKind,
};
use ratatui::backend::Backend;
use ratatui::Terminal;
use tracing::{debug, info, warn};

use crate::compositor::compose_frame;
use crate::compositor::layer::LayerPool;
use crate::config::Config;
use crate::error::AppError;
use crate::graphics::GraphicsPassthrough;
use crate::pty::PtyManager;
use crate::state::window::Mode;
use crate::state::{NotificationLevel, Os};
use crate::term::PlainTerminal;

const FRAME_POLL: Duration = Duration::from_millis(16);

pub struct App {
    pub os: Os,
    pub ptys: PtyManager,
    pub graphics: GraphicsPassthrough,
    pool: LayerPool,
    shell: String,
    /// Window being dragged by its title bar, with the grab offset
    drag: Option<(String, i32, i32)>,
    pub should_quit: bool,
}

impl App {
    pub fn new(config: Config, width: u16, height: u16) -> Self {
        let graphics = GraphicsPassthrough::new(&config.graphics);
        let shell = config.shell_command();
        Self {
            os: Os::new(config, width, height),
            ptys: PtyManager::new(),
            graphics,
            pool: LayerPool::new(),
            shell,
            drag: None,
            should_quit: false,
        }
    }

    /// Draw frames and handle input until asked to quit
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        self.new_window();
        while !self.should_quit {
            self.tick(terminal)?;
            if event::poll(FRAME_POLL)? {
                let event = event::read()?;
                self.handle_event(event);
            }
        }
        info!("shutting down");
        self.ptys.close_all();
        Ok(())
    }

    fn tick<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        self.drain_output();
        self.os.prune_animations();
        self.os.prune_notifications(Instant::now());

        let canvas = compose_frame(&mut self.os, &self.pool, true);
        terminal.draw(|frame| canvas.render_into(frame.buffer_mut()))?;

        if self.graphics.present(&self.os) {
            // Sixel pixels were erased behind the cell renderer's back
            terminal.clear()?;
            let ids: Vec<String> = self.os.windows.iter().map(|w| w.id.clone()).collect();
            for id in &ids {
                self.graphics.mark_stale(id);
            }
        }
        Ok(())
    }

    // ===== Sessions =====

    pub fn new_window(&mut self) {
        let title = self
            .shell
            .rsplit('/')
            .next()
            .unwrap_or(self.shell.as_str())
            .to_string();
        let id = self.os.spawn_window(title);
        let Some(window) = self.os.window_mut(&id) else {
            return;
        };
        let cols = window.width.saturating_sub(2);
        let rows = window.height.saturating_sub(2);
        window.terminal = Some(Box::new(PlainTerminal::new(cols, rows)));

        if let Err(e) = self.ptys.spawn(&id, &self.shell, cols, rows) {
            warn!("{e}");
            self.os.close_window(&id);
            self.notify(e.to_string(), NotificationLevel::Error);
        }
    }

    pub fn close_window(&mut self, id: &str) {
        if self.os.close_window(id).is_none() {
            return;
        }
        if self.ptys.has_session(id) {
            if let Err(e) = self.ptys.close(id) {
                warn!("{e}");
            }
        }
        self.graphics.remove_window(id);
    }

    /// Pull pending output from every session into its window
    fn drain_output(&mut self) {
        let ids: Vec<String> = self.os.windows.iter().map(|w| w.id.clone()).collect();
        let mut exited = Vec::new();

        for id in ids {
            if !self.ptys.has_session(&id) {
                continue;
            }
            let bytes = match self.ptys.read(&id) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("{e}");
                    continue;
                }
            };
            if bytes.is_empty() {
                if !self.ptys.is_alive(&id) {
                    exited.push(id);
                }
                continue;
            }

            let Some(window) = self.os.window_mut(&id) else {
                continue;
            };
            let events = window
                .terminal
                .as_mut()
                .map(|t| t.feed(&bytes))
                .unwrap_or_default();
            window.mark_content_dirty();
            self.graphics.mark_stale(&id);

            for event in &events {
                if let Some(reply) = self.graphics.ingest(&id, event) {
                    if let Err(e) = self.ptys.write(&id, &reply) {
                        debug!("graphics reply dropped: {e}");
                    }
                }
            }
        }

        for id in exited {
            info!(window = %id, "shell exited");
            self.close_window(&id);
        }
    }

    fn notify(&mut self, message: impl Into<String>, level: NotificationLevel) {
        let duration = Duration::from_millis(self.os.config.notification_ms);
        self.os.show_notification(message, level, duration);
    }

    // ===== Input =====

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) if key.kind != KeyEventKind::Release => self.handle_key(key),
            Event::Mouse(mouse) => self.handle_mouse(mouse),
            Event::Resize(width, height) => {
                debug!(width, height, "screen resized");
                self.os.resize_screen(width, height);
            }
            _ => {}
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            if let KeyCode::Char(c) = key.code {
                if self.handle_command(c.to_ascii_lowercase()) {
                    return;
                }
            }
        }

        if self.os.sidebar_focused {
            self.handle_sidebar_key(key);
        } else if self.os.renaming {
            self.handle_rename_key(key);
        } else {
            match self.os.mode {
                Mode::Terminal => self.handle_terminal_key(key),
                Mode::Window => self.handle_window_key(key),
            }
        }
    }

    /// Global Ctrl chords. Returns false for chords that belong to the shell.
    fn handle_command(&mut self, c: char) -> bool {
        match c {
            'q' => self.should_quit = true,
            'n' => self.new_window(),
            'b' => self.os.toggle_sidebar(),
            'w' => {
                if let Some(id) = self.os.focused.clone() {
                    self.close_window(&id);
                }
            }
            'z' => {
                if let Some(index) = self.os.focused_index() {
                    self.os.minimize_window(index);
                }
            }
            't' => {
                self.os.mode = match self.os.mode {
                    Mode::Window => Mode::Terminal,
                    Mode::Terminal => Mode::Window,
                };
                self.mark_focused_dirty();
            }
            _ => return false,
        }
        true
    }

    /// Border colour and title both follow mode and rename state
    fn mark_focused_dirty(&mut self) {
        if let Some(index) = self.os.focused_index() {
            self.os.windows[index].mark_dirty();
        }
    }

    fn handle_sidebar_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.os.sidebar_select_prev(),
            KeyCode::Down | KeyCode::Char('j') => self.os.sidebar_select_next(),
            KeyCode::Enter => self.os.sidebar_confirm_selection(),
            KeyCode::Esc => self.os.close_sidebar(),
            _ => {}
        }
    }

    fn handle_rename_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => {
                let name = std::mem::take(&mut self.os.rename_buffer);
                if let Some(index) = self.os.focused_index() {
                    self.os.windows[index].custom_name = (!name.trim().is_empty()).then_some(name);
                }
                self.os.renaming = false;
            }
            KeyCode::Esc => {
                self.os.rename_buffer.clear();
                self.os.renaming = false;
            }
            KeyCode::Backspace => {
                self.os.rename_buffer.pop();
            }
            KeyCode::Char(c) => self.os.rename_buffer.push(c),
            _ => return,
        }
        self.mark_focused_dirty();
    }

    fn handle_window_key(&mut self, key: KeyEvent) {
        let Some(index) = self.os.focused_index() else {
            if key.code == KeyCode::Char('n') {
                self.new_window();
            }
            return;
        };
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);
        let (x, y, width, height) = {
            let w = &self.os.windows[index];
            (w.x, w.y, w.width, w.height)
        };

        match key.code {
            KeyCode::Char('n') => self.new_window(),
            KeyCode::Char('r') => {
                self.os.rename_buffer = self.os.windows[index].display_name().to_string();
                self.os.renaming = true;
                self.os.windows[index].mark_dirty();
            }
            KeyCode::Enter | KeyCode::Char('i') => {
                self.os.mode = Mode::Terminal;
                self.os.windows[index].mark_dirty();
            }
            KeyCode::Tab => self.focus_next(),
            KeyCode::Char(c @ '1'..='9') => {
                self.os.switch_to_workspace(c as u32 - '0' as u32);
            }
            KeyCode::Left if shift => self.resize_focused(width.saturating_sub(2), height),
            KeyCode::Right if shift => self.resize_focused(width.saturating_add(2), height),
            KeyCode::Up if shift => self.resize_focused(width, height.saturating_sub(1)),
            KeyCode::Down if shift => self.resize_focused(width, height.saturating_add(1)),
            KeyCode::Left => self.os.move_window(index, x - 2, y),
            KeyCode::Right => self.os.move_window(index, x + 2, y),
            KeyCode::Up => self.os.move_window(index, x, y - 1),
            KeyCode::Down => self.os.move_window(index, x, y + 1),
            _ => {}
        }
    }

    fn handle_terminal_key(&mut self, key: KeyEvent) {
        let Some(index) = self.os.focused_index() else {
            return;
        };
        if key.modifiers.contains(KeyModifiers::SHIFT) {
            let page = self.os.windows[index].height.saturating_sub(2).max(1) as usize;
            match key.code {
                KeyCode::PageUp => return self.scroll_focused(index, page as isize),
                KeyCode::PageDown => return self.scroll_focused(index, -(page as isize)),
                _ => {}
            }
        }

        let Some(bytes) = key_to_bytes(key) else {
            return;
        };
        let window = &mut self.os.windows[index];
        if window.scroll_offset != 0 {
            window.scroll_offset = 0;
            window.mark_content_dirty();
        }
        let id = window.id.clone();
        if let Err(e) = self.ptys.write(&id, &bytes) {
            debug!("{e}");
        }
    }

    fn scroll_focused(&mut self, index: usize, delta: isize) {
        let window = &mut self.os.windows[index];
        let max = window.scrollback_len();
        let offset = window.scroll_offset.saturating_add_signed(delta).min(max);
        if offset != window.scroll_offset {
            window.scroll_offset = offset;
            window.mark_content_dirty();
        }
    }

    fn resize_focused(&mut self, width: u16, height: u16) {
        let Some(index) = self.os.focused_index() else {
            return;
        };
        let (width, height) = (width.max(10), height.max(4));
        self.os.resize_window(index, width, height);
        let id = self.os.windows[index].id.clone();
        if self.ptys.has_session(&id) {
            if let Err(e) = self.ptys.resize(&id, width - 2, height - 2) {
                warn!("{e}");
            }
        }
    }

    /// Focus the next window of the current workspace in list order
    fn focus_next(&mut self) {
        let candidates: Vec<usize> = self
            .os
            .windows
            .iter()
            .enumerate()
            .filter(|(_, w)| w.workspace == self.os.current_workspace && !w.minimized)
            .map(|(i, _)| i)
            .collect();
        if candidates.is_empty() {
            return;
        }
        let next = self
            .os
            .focused_index()
            .and_then(|current| candidates.iter().position(|&i| i == current))
            .map_or(0, |pos| (pos + 1) % candidates.len());
        self.os.focus_window(candidates[next]);
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        let (x, y) = (mouse.column as i32, mouse.row as i32);
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(index) = self.os.find_sidebar_item_clicked(x, y) {
                    self.os.sidebar_confirm_index(index);
                } else if self.os.sidebar_visible && x < self.os.sidebar_width() as i32 {
                    // Sidebar paints over windows; nothing beneath takes the click
                } else if let Some(index) = self.window_at(x, y) {
                    self.os.focus_window(index);
                    let window = &self.os.windows[index];
                    if y == window.y {
                        self.drag = Some((window.id.clone(), x - window.x, y - window.y));
                        self.os.set_manipulating(index, true);
                    }
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                let Some((id, dx, dy)) = self.drag.clone() else {
                    return;
                };
                if let Some(index) = self.os.index_of(&id) {
                    self.os.move_window(index, x - dx, y - dy);
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                if let Some((id, _, _)) = self.drag.take() {
                    if let Some(index) = self.os.index_of(&id) {
                        self.os.set_manipulating(index, false);
                    }
                }
            }
            MouseEventKind::Moved if self.os.is_sidebar_hover_zone(x, y) => {
                self.os.toggle_sidebar();
            }
            _ => {}
        }
    }

    /// Topmost visible window of the current workspace under a cell
    fn window_at(&self, x: i32, y: i32) -> Option<usize> {
        self.os
            .windows
            .iter()
            .enumerate()
            .filter(|(_, w)| w.workspace == self.os.current_workspace && !w.minimized)
            .filter(|(_, w)| w.rect().contains_point(x, y))
            .max_by_key(|(_, w)| w.z)
            .map(|(i, _)| i)
    }
}

/// Bytes a key press sends to a shell
pub fn key_to_bytes(key: KeyEvent) -> Option<Vec<u8>> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let mut bytes = match key.code {
        KeyCode::Char(c) if ctrl => match c.to_ascii_lowercase() {
            c @ 'a'..='z' => vec![c as u8 - b'a' + 1],
            ' ' | '@' => vec![0],
            '[' => vec![0x1b],
            '\\' => vec![0x1c],
            ']' => vec![0x1d],
            _ => return None,
        },
        KeyCode::Char(c) => c.to_string().into_bytes(),
        KeyCode::Enter => vec![b'\r'],
        KeyCode::Backspace => vec![0x7f],
        KeyCode::Tab => vec![b'\t'],
        KeyCode::BackTab => b"\x1b[Z".to_vec(),
        KeyCode::Esc => vec![0x1b],
        KeyCode::Up => b"\x1b[A".to_vec(),
        KeyCode::Down => b"\x1b[B".to_vec(),
        KeyCode::Right => b"\x1b[C".to_vec(),
        KeyCode::Left => b"\x1b[D".to_vec(),
        KeyCode::Home => b"\x1b[H".to_vec(),
        KeyCode::End => b"\x1b[F".to_vec(),
        KeyCode::PageUp => b"\x1b[5~".to_vec(),
        KeyCode::PageDown => b"\x1b[6~".to_vec(),
        KeyCode::Insert => b"\x1b[2~".to_vec(),
        KeyCode::Delete => b"\x1b[3~".to_vec(),
        KeyCode::F(n @ 1..=4) => vec![0x1b, b'O', b'P' + n - 1],
        KeyCode::F(n) => {
            let code = match n {
                5 => 15,
                6..=10 => n + 11,
                11 | 12 => n + 12,
                _ => return None,
            };
            format!("\x1b[{code}~").into_bytes()
        }
        _ => return None,
    };
    if key.modifiers.contains(KeyModifiers::ALT) {
        bytes.insert(0, 0x1b);
    }
    Some(bytes)
}

/// Current host terminal size, falling back to 80x24
pub fn screen_size() -> (u16, u16) {
    match crossterm::terminal::size() {
        Ok(size) => size,
        Err(e) => {
            warn!("cannot query terminal size: {e}");
            (80, 24)
        }
    }
}
