// Per-window frame decision: skip it, reuse its cached layer, or redraw it.

use crate::config::Config;
use crate::state::window::Window;

/// Screen area windows are composited into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: i32,
    /// Rows available to windows, not counting `top_margin`
    pub height: i32,
    pub top_margin: i32,
}

/// Culling margins around the viewport, in cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Margins {
    pub resting: i32,
    pub animating: i32,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            resting: 5,
            animating: 20,
        }
    }
}

impl From<&Config> for Margins {
    fn from(config: &Config) -> Self {
        Self {
            resting: config.visibility_margin,
            animating: config.animating_margin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDecision {
    /// Emit nothing; the cache is left alone
    Skip,
    /// Emit the cached layer as is
    Reuse,
    /// Render a fresh layer and replace the cache
    Redraw,
}

/// Window bounds intersect the viewport grown by `margin` on every side
pub fn is_visible(window: &Window, viewport: &Viewport, margin: i32) -> bool {
    let (x, y) = (window.x, window.y);
    let (w, h) = (window.width as i32, window.height as i32);
    x + w >= -margin
        && x <= viewport.width + margin
        && y + h >= -margin
        && y <= viewport.height + viewport.top_margin + margin
}

/// Window lies entirely inside the window area, below the top margin
pub fn is_fully_visible(window: &Window, viewport: &Viewport) -> bool {
    let (x, y) = (window.x, window.y);
    let (w, h) = (window.width as i32, window.height as i32);
    x >= 0
        && y >= viewport.top_margin
        && x + w <= viewport.width
        && y + h <= viewport.height + viewport.top_margin
}

/// Cache missing, any dirty flag set, or cached geometry differs from the window's
pub fn needs_redraw(window: &Window) -> bool {
    match &window.cached_layer {
        None => true,
        Some(cache) => {
            window.dirty
                || window.content_dirty
                || window.position_dirty
                || cache.x != window.x
                || cache.y != window.y
                || cache.z() != window.z
        }
    }
}

/// Decide what to do with `window` this frame. The caller has already
/// filtered out windows from other workspaces.
///
/// Unfocused windows that hang off screen and only changed geometry keep
/// their cached layer for the frame, even when stale; focused, fully
/// visible, content-dirty and grabbed windows always redraw.
pub fn decide(
    window: &Window,
    viewport: &Viewport,
    margins: Margins,
    focused: bool,
    animating: bool,
) -> FrameDecision {
    if window.minimized && !animating {
        return FrameDecision::Skip;
    }

    let margin = if animating {
        margins.animating
    } else {
        margins.resting
    };
    if !is_visible(window, viewport, margin) {
        return FrameDecision::Skip;
    }

    if !needs_redraw(window) {
        return FrameDecision::Reuse;
    }

    let suppress = window.cached_layer.is_some()
        && !focused
        && !is_fully_visible(window, viewport)
        && !window.content_dirty
        && !window.is_being_manipulated;
    if suppress {
        FrameDecision::Reuse
    } else {
        FrameDecision::Redraw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::layer::Layer;
    use crate::state::window::CachedLayer;
    use ratatui::buffer::Buffer;
    use ratatui::layout::Rect;
    use std::sync::Arc;

    const VIEWPORT: Viewport = Viewport {
        width: 80,
        height: 23,
        top_margin: 0,
    };

    /// Window with a cache matching its geometry and no dirty flags
    fn cached(x: i32, y: i32, w: u16, h: u16, z: i32) -> Window {
        let mut window = Window::new("w", "shell", 1).with_geometry(x, y, w, h);
        window.z = z;
        let content = Buffer::empty(Rect::new(0, 0, w, h));
        let layer = Arc::new(Layer::new(content, x.max(0), y.max(0), z, "w"));
        window.cached_layer = Some(CachedLayer::new(layer, x, y));
        window.clear_dirty_flags();
        window
    }

    #[test]
    fn test_minimized_skips_unless_animating() {
        let mut window = cached(0, 0, 10, 5, 1);
        window.minimized = true;
        assert_eq!(decide(&window, &VIEWPORT, Margins::default(), false, false), FrameDecision::Skip);
        assert_eq!(decide(&window, &VIEWPORT, Margins::default(), false, true), FrameDecision::Reuse);
    }

    #[test]
    fn test_margin_widens_while_animating() {
        // 10 cells right of the viewport edge
        let window = cached(90, 0, 10, 5, 1);
        assert_eq!(decide(&window, &VIEWPORT, Margins::default(), false, false), FrameDecision::Skip);
        assert_eq!(decide(&window, &VIEWPORT, Margins::default(), false, true), FrameDecision::Reuse);
    }

    #[test]
    fn test_clean_cache_is_reused() {
        let window = cached(5, 2, 20, 10, 3);
        assert_eq!(decide(&window, &VIEWPORT, Margins::default(), true, false), FrameDecision::Reuse);
    }

    #[test]
    fn test_missing_cache_redraws() {
        let window = Window::new("w", "shell", 1).with_geometry(0, 0, 10, 5);
        assert_eq!(decide(&window, &VIEWPORT, Margins::default(), false, false), FrameDecision::Redraw);
    }

    #[test]
    fn test_z_only_change_on_partial_background_window_reuses() {
        let mut window = cached(-3, 4, 20, 10, 2);
        window.z = 5;
        assert!(needs_redraw(&window));
        assert_eq!(decide(&window, &VIEWPORT, Margins::default(), false, false), FrameDecision::Reuse);
    }

    #[test]
    fn test_suppression_never_applies_to_privileged_windows() {
        let base = || {
            let mut window = cached(-3, 4, 20, 10, 2);
            window.z = 5;
            window
        };

        // focused
        assert_eq!(decide(&base(), &VIEWPORT, Margins::default(), true, false), FrameDecision::Redraw);

        // content changed
        let mut window = base();
        window.content_dirty = true;
        assert_eq!(decide(&window, &VIEWPORT, Margins::default(), false, false), FrameDecision::Redraw);

        // being dragged
        let mut window = base();
        window.is_being_manipulated = true;
        assert_eq!(decide(&window, &VIEWPORT, Margins::default(), false, false), FrameDecision::Redraw);

        // fully on screen
        let mut window = cached(3, 4, 20, 10, 2);
        window.z = 5;
        assert_eq!(decide(&window, &VIEWPORT, Margins::default(), false, false), FrameDecision::Redraw);
    }

    #[test]
    fn test_visibility_respects_top_margin() {
        let viewport = Viewport {
            width: 80,
            height: 22,
            top_margin: 1,
        };
        let window = cached(0, 0, 10, 5, 1);
        assert!(!is_fully_visible(&window, &viewport));
        let window = cached(0, 1, 10, 22, 1);
        assert!(is_fully_visible(&window, &viewport));
    }
}
