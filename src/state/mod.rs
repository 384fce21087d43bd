use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

use self::window::{Animation, Mode, Window};
use crate::config::{Config, DockPosition};

pub mod window;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

#[derive(Clone, Debug)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
    pub expires_at: Instant,
}

/// Top-level UI state. Read by the compositor every frame; the compositor only
/// writes back window caches and dirty flags.
pub struct Os {
    pub windows: Vec<Window>,
    pub window_stack: Vec<String>, // Window IDs, bottom to top
    pub focused: Option<String>,
    pub current_workspace: u32,
    pub mode: Mode,
    pub animations: Vec<Animation>,
    pub sidebar_visible: bool,
    pub sidebar_focused: bool,
    pub sidebar_selected: Option<String>,
    pub renaming: bool,
    pub rename_buffer: String,
    pub auto_tiling: bool,
    pub notifications: Vec<Notification>,
    pub config: Config,
    width: u16,
    height: u16,
}

impl Os {
    pub fn new(config: Config, width: u16, height: u16) -> Self {
        Self {
            windows: Vec::new(),
            window_stack: Vec::new(),
            focused: None,
            current_workspace: 1,
            mode: Mode::Window,
            animations: Vec::new(),
            sidebar_visible: false,
            sidebar_focused: false,
            sidebar_selected: None,
            renaming: false,
            rename_buffer: String::new(),
            auto_tiling: false,
            notifications: Vec::new(),
            config,
            width,
            height,
        }
    }

    // ===== Screen geometry =====

    pub fn render_width(&self) -> u16 {
        self.width
    }

    pub fn render_height(&self) -> u16 {
        self.height
    }

    /// Rows taken by chrome above the window area
    pub fn top_margin(&self) -> u16 {
        match self.config.dock_position {
            DockPosition::Top => self.config.dock_height,
            DockPosition::Bottom | DockPosition::Hidden => 0,
        }
    }

    /// Rows available to windows
    pub fn usable_height(&self) -> u16 {
        match self.config.dock_position {
            DockPosition::Hidden => self.height,
            DockPosition::Top | DockPosition::Bottom => {
                self.height.saturating_sub(self.config.dock_height)
            }
        }
    }

    pub fn resize_screen(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        for window in &mut self.windows {
            window.mark_dirty();
        }
    }

    // ===== Lookup =====

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.windows.iter().position(|w| w.id == id)
    }

    pub fn window(&self, id: &str) -> Option<&Window> {
        self.windows.iter().find(|w| w.id == id)
    }

    pub fn window_mut(&mut self, id: &str) -> Option<&mut Window> {
        self.windows.iter_mut().find(|w| w.id == id)
    }

    /// Index of the focused window, resolved for this frame only
    pub fn focused_index(&self) -> Option<usize> {
        self.focused.as_deref().and_then(|id| self.index_of(id))
    }

    // ===== Window lifecycle =====

    /// Spawn a new window in the current workspace, cascaded from the last one
    pub fn spawn_window(&mut self, title: impl Into<String>) -> String {
        let id = Uuid::new_v4().to_string();
        let cascade = self
            .windows
            .iter()
            .filter(|w| w.workspace == self.current_workspace)
            .count() as i32;
        let width = (self.width as u32 * 3 / 5).max(20).min(u16::MAX as u32) as u16;
        let height = (self.usable_height() as u32 * 3 / 5).max(8).min(u16::MAX as u32) as u16;
        let window = Window::new(id.clone(), title, self.current_workspace).with_geometry(
            2 + cascade * 2,
            self.top_margin() as i32 + 1 + cascade,
            width,
            height,
        );
        self.add_window(window);
        id
    }

    /// Insert a window on top of the stack and focus it
    pub fn add_window(&mut self, window: Window) {
        let id = window.id.clone();
        debug!(window = %id, workspace = window.workspace, "adding window");
        self.windows.push(window);
        self.window_stack.push(id);
        let index = self.windows.len() - 1;
        self.focus_window(index);
    }

    /// Close a window, returning it so the caller can tear down its session
    pub fn close_window(&mut self, id: &str) -> Option<Window> {
        let index = self.index_of(id)?;
        let removed = self.windows.remove(index);

        if let Some(pos) = self.window_stack.iter().position(|x| x == id) {
            self.window_stack.remove(pos);
        }
        self.animations.retain(|a| a.window_id != id);
        if self.sidebar_selected.as_deref() == Some(id) {
            self.sidebar_selected = None;
        }
        if self.focused.as_deref() == Some(id) {
            self.focused = None;
            if let Some(next) = self.topmost_in_workspace(self.current_workspace) {
                self.focus_window(next);
            }
        }
        self.normalize_stack();
        debug!(window = %id, "closed window");
        Some(removed)
    }

    /// Focus the window at `index` and raise it to the top of the stack
    pub fn focus_window(&mut self, index: usize) {
        let Some(window) = self.windows.get_mut(index) else {
            return;
        };
        window.mark_dirty();
        let id = window.id.clone();

        if let Some(previous) = self.focused.replace(id.clone()) {
            if previous != id {
                if let Some(prev) = self.window_mut(&previous) {
                    prev.mark_dirty();
                }
            }
        }
        if let Some(pos) = self.window_stack.iter().position(|x| *x == id) {
            let raised = self.window_stack.remove(pos);
            self.window_stack.push(raised);
        }
        self.normalize_stack();
    }

    pub fn minimize_window(&mut self, index: usize) {
        let Some(window) = self.windows.get_mut(index) else {
            return;
        };
        window.minimized = true;
        window.mark_dirty();
        let id = window.id.clone();
        if self.focused.as_deref() == Some(id.as_str()) {
            self.focused = None;
            if let Some(next) = self.topmost_in_workspace(self.current_workspace) {
                self.focus_window(next);
            }
        }
    }

    pub fn restore_window(&mut self, index: usize) {
        if let Some(window) = self.windows.get_mut(index) {
            window.minimized = false;
            window.mark_dirty();
            window.mark_position_dirty();
        }
    }

    /// Make `workspace` the visible one and focus its topmost window
    pub fn switch_to_workspace(&mut self, workspace: u32) {
        if workspace == self.current_workspace {
            return;
        }
        debug!(from = self.current_workspace, to = workspace, "switching workspace");
        self.current_workspace = workspace;
        self.focused = None;
        if let Some(next) = self.topmost_in_workspace(workspace) {
            self.focus_window(next);
        }
    }

    pub fn move_window(&mut self, index: usize, x: i32, y: i32) {
        if let Some(window) = self.windows.get_mut(index) {
            if window.x != x || window.y != y {
                window.x = x;
                window.y = y;
                window.mark_position_dirty();
            }
        }
    }

    pub fn resize_window(&mut self, index: usize, width: u16, height: u16) {
        if let Some(window) = self.windows.get_mut(index) {
            window.width = width;
            window.height = height;
            window.mark_position_dirty();
            window.mark_dirty();
            if let Some(terminal) = window.terminal.as_mut() {
                terminal.resize(width.saturating_sub(2), height.saturating_sub(2));
            }
        }
    }

    pub fn set_manipulating(&mut self, index: usize, manipulating: bool) {
        if let Some(window) = self.windows.get_mut(index) {
            window.is_being_manipulated = manipulating;
        }
    }

    /// Topmost non-minimized window of `workspace`, by stacking order
    fn topmost_in_workspace(&self, workspace: u32) -> Option<usize> {
        self.window_stack.iter().rev().find_map(|id| {
            let index = self.index_of(id)?;
            let window = &self.windows[index];
            (window.workspace == workspace && !window.minimized).then_some(index)
        })
    }

    /// Renumber z so the stack reads 1..=n from bottom to top
    fn normalize_stack(&mut self) {
        for (i, win_id) in self.window_stack.iter().enumerate() {
            if let Some(win) = self.windows.iter_mut().find(|w| w.id == *win_id) {
                win.z = (i as i32) + 1;
            }
        }
    }

    // ===== Animations =====

    pub fn start_animation(&mut self, window_id: &str) {
        self.animations.push(Animation {
            window_id: window_id.to_string(),
            complete: false,
        });
    }

    pub fn finish_animation(&mut self, window_id: &str) {
        for anim in self.animations.iter_mut().filter(|a| a.window_id == window_id) {
            anim.complete = true;
        }
    }

    pub fn prune_animations(&mut self) {
        self.animations.retain(|a| !a.complete);
    }

    /// True while any incomplete animation references the window
    pub fn is_animating(&self, window_id: &str) -> bool {
        is_animating(&self.animations, window_id)
    }

    // ===== Notifications =====

    pub fn show_notification(
        &mut self,
        message: impl Into<String>,
        level: NotificationLevel,
        duration: Duration,
    ) {
        self.notifications.push(Notification {
            message: message.into(),
            level,
            expires_at: Instant::now() + duration,
        });
    }

    pub fn prune_notifications(&mut self, now: Instant) {
        self.notifications.retain(|n| n.expires_at > now);
    }
}

pub(crate) fn is_animating(animations: &[Animation], window_id: &str) -> bool {
    animations
        .iter()
        .any(|a| a.window_id == window_id && !a.complete)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os() -> Os {
        Os::new(Config::default(), 120, 40)
    }

    #[test]
    fn test_spawn_focuses_and_stacks() {
        let mut os = os();
        let a = os.spawn_window("a");
        let b = os.spawn_window("b");

        assert_eq!(os.focused.as_deref(), Some(b.as_str()));
        assert_eq!(os.window(&a).unwrap().z, 1);
        assert_eq!(os.window(&b).unwrap().z, 2);
        assert_eq!(os.window(&b).unwrap().x, 4); // cascaded
    }

    #[test]
    fn test_focus_raises_and_normalizes() {
        let mut os = os();
        let a = os.spawn_window("a");
        let b = os.spawn_window("b");
        let c = os.spawn_window("c");
        for window in &mut os.windows {
            window.clear_dirty_flags();
        }

        os.focus_window(0);
        assert_eq!(os.window(&a).unwrap().z, 3);
        assert_eq!(os.window(&b).unwrap().z, 1);
        assert_eq!(os.window(&c).unwrap().z, 2);
        assert!(os.window(&c).unwrap().dirty, "previous focus must repaint its border");
    }

    #[test]
    fn test_close_moves_focus_to_topmost() {
        let mut os = os();
        let a = os.spawn_window("a");
        let b = os.spawn_window("b");
        let c = os.spawn_window("c");
        os.sidebar_selected = Some(c.clone());

        let removed = os.close_window(&c).unwrap();
        assert_eq!(removed.id, c);
        assert_eq!(os.focused.as_deref(), Some(b.as_str()));
        assert!(os.sidebar_selected.is_none());
        assert_eq!(os.window(&a).unwrap().z, 1);
        assert_eq!(os.window(&b).unwrap().z, 2);
        assert!(os.close_window(&c).is_none());
    }

    #[test]
    fn test_minimize_skips_in_focus_fallback() {
        let mut os = os();
        let a = os.spawn_window("a");
        os.spawn_window("b");

        os.minimize_window(1);
        assert_eq!(os.focused.as_deref(), Some(a.as_str()));
        os.minimize_window(0);
        assert!(os.focused.is_none());
    }

    #[test]
    fn test_workspace_switch_focuses_that_workspace() {
        let mut os = os();
        os.spawn_window("one");
        os.current_workspace = 2;
        let two = os.spawn_window("two");
        os.current_workspace = 1;

        os.switch_to_workspace(2);
        assert_eq!(os.focused.as_deref(), Some(two.as_str()));
    }

    #[test]
    fn test_animation_tracking_by_id() {
        let mut os = os();
        let a = os.spawn_window("a");
        os.start_animation(&a);
        os.start_animation(&a);
        assert!(os.is_animating(&a));

        os.finish_animation(&a);
        assert!(!os.is_animating(&a));
        os.prune_animations();
        assert!(os.animations.is_empty());
    }

    #[test]
    fn test_margins_follow_dock_position() {
        let mut os = os();
        assert_eq!(os.top_margin(), 0);
        assert_eq!(os.usable_height(), 39);

        os.config.dock_position = DockPosition::Top;
        assert_eq!(os.top_margin(), 1);
        assert_eq!(os.usable_height(), 39);

        os.config.dock_position = DockPosition::Hidden;
        assert_eq!(os.usable_height(), 40);
    }
}
