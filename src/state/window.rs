use crate::compositor::layer::Layer;
use crate::geometry::CellRect;
use crate::term::TerminalView;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Input mode of the whole environment
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub enum Mode {
    /// Window management keys are live; the focused terminal gets no input
    #[default]
    Window,
    /// Keys go to the focused terminal
    Terminal,
}

/// An in-flight transition for one window. The animation driver owns the
/// timeline; the compositor only reads `complete`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Animation {
    pub window_id: String,
    pub complete: bool,
}

/// A window's memoized layer and the geometry it was rendered from. The
/// layer itself may sit elsewhere once clipped, so the source origin is kept
/// alongside it.
#[derive(Clone, Debug)]
pub struct CachedLayer {
    pub layer: Arc<Layer>,
    pub x: i32,
    pub y: i32,
}

impl CachedLayer {
    pub fn new(layer: Arc<Layer>, x: i32, y: i32) -> Self {
        Self { layer, x, y }
    }

    /// Z the layer was tagged with (elevated while animating)
    pub fn z(&self) -> i32 {
        self.layer.z()
    }
}

/// One terminal session shown as a pane
pub struct Window {
    pub id: String,                  // Stable UUID
    pub title: String,               // Title reported by the session
    pub custom_name: Option<String>, // Name set by the user, wins over title
    pub x: i32,
    pub y: i32,
    pub width: u16,
    pub height: u16,
    pub z: i32,
    pub workspace: u32,
    pub minimized: bool,
    pub is_being_manipulated: bool, // Dragged or resized right now
    pub dirty: bool,
    pub content_dirty: bool,
    pub position_dirty: bool,
    /// Last rendered layer. Replaced on redraw, never edited in place.
    pub cached_layer: Option<CachedLayer>,
    /// Lines scrolled back from the live bottom
    pub scroll_offset: usize,
    pub terminal: Option<Box<dyn TerminalView>>,
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("rect", &self.rect())
            .field("z", &self.z)
            .field("workspace", &self.workspace)
            .field("minimized", &self.minimized)
            .finish_non_exhaustive()
    }
}

impl Window {
    pub fn new(id: impl Into<String>, title: impl Into<String>, workspace: u32) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            custom_name: None,
            x: 0,
            y: 0,
            width: 80,
            height: 24,
            z: 0,
            workspace,
            minimized: false,
            is_being_manipulated: false,
            dirty: true,
            content_dirty: true,
            position_dirty: true,
            cached_layer: None,
            scroll_offset: 0,
            terminal: None,
        }
    }

    pub fn with_geometry(mut self, x: i32, y: i32, width: u16, height: u16) -> Self {
        self.x = x;
        self.y = y;
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_terminal(mut self, terminal: Box<dyn TerminalView>) -> Self {
        self.terminal = Some(terminal);
        self
    }

    pub fn rect(&self) -> CellRect {
        CellRect::new(self.x, self.y, self.width as i32, self.height as i32)
    }

    /// Custom name if set, otherwise the session title
    pub fn display_name(&self) -> &str {
        match self.custom_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.title,
        }
    }

    pub fn scrollback_len(&self) -> usize {
        self.terminal.as_ref().map_or(0, |t| t.scrollback_len())
    }

    pub fn lines_dropped(&self) -> u64 {
        self.terminal.as_ref().map_or(0, |t| t.lines_dropped())
    }

    pub fn is_alt_screen(&self) -> bool {
        self.terminal.as_ref().is_some_and(|t| t.is_alt_screen())
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mark_content_dirty(&mut self) {
        self.content_dirty = true;
    }

    pub fn mark_position_dirty(&mut self) {
        self.position_dirty = true;
    }

    pub fn clear_dirty_flags(&mut self) {
        self.dirty = false;
        self.content_dirty = false;
        self.position_dirty = false;
    }
}
