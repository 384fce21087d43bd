//! Frame composition.
//!
//! Every frame, each window of the current workspace goes through the redraw
//! policy; the survivors become layers (fresh or cached) and are stacked with
//! the chrome above them onto one [`Canvas`].

pub mod chrome;
pub mod clip;
pub mod layer;
pub mod policy;

use std::sync::Arc;
use tracing::trace;

use self::chrome::Chrome;
use self::clip::clip_window_content;
use self::layer::{Canvas, Layer, LayerPool};
use self::policy::{FrameDecision, Margins, Viewport};
use crate::state::window::{CachedLayer, Mode};
use crate::state::{is_animating, Os};
use crate::term::RenderRequest;
use ratatui::text::Text;

/// Windows in flight paint above every resting window
pub const Z_ANIMATING: i32 = 999;
pub const Z_OVERLAY: i32 = 1000;
pub const Z_DOCK: i32 = 1002;
pub const Z_SIDEBAR: i32 = 1003;

impl Os {
    pub fn viewport(&self) -> Viewport {
        Viewport {
            width: self.render_width() as i32,
            height: self.usable_height() as i32,
            top_margin: self.top_margin() as i32,
        }
    }
}

/// Compose one frame. With `render_chrome` off only window layers are
/// produced (no notifications, dock or sidebar).
pub fn compose_frame(os: &mut Os, pool: &LayerPool, render_chrome: bool) -> Canvas {
    let viewport = os.viewport();
    let margins = Margins::from(&os.config);
    let terminal_mode = os.mode == Mode::Terminal;
    let focused_id = os.focused.clone();

    let mut layers = pool.get();
    let mut canvas = Canvas::new();

    for window in os.windows.iter_mut() {
        if window.workspace != os.current_workspace {
            continue;
        }

        let animating = is_animating(&os.animations, &window.id);
        let focused = focused_id.as_deref() == Some(window.id.as_str());

        match policy::decide(window, &viewport, margins, focused, animating) {
            FrameDecision::Skip => continue,
            FrameDecision::Reuse => {
                if let Some(cache) = &window.cached_layer {
                    layers.push(Arc::clone(&cache.layer));
                }
                continue;
            }
            FrameDecision::Redraw => {}
        }

        trace!(window = %window.id, "redrawing window");
        let content = match &window.terminal {
            Some(terminal) => terminal.render(RenderRequest {
                width: window.width.saturating_sub(2),
                height: window.height.saturating_sub(2),
                scroll_offset: window.scroll_offset,
                focused,
                terminal_mode,
            }),
            None => Text::default(),
        };

        let rename = (os.renaming && focused).then_some(os.rename_buffer.as_str());
        let boxed = chrome::render_window_box(
            window,
            content,
            Chrome {
                focused,
                terminal_mode,
                rename,
                auto_tiling: os.auto_tiling,
            },
        );

        let z = if animating { Z_ANIMATING } else { window.z };
        let clipped = clip_window_content(
            &boxed,
            window.x,
            window.y,
            viewport.width.max(0) as u16,
            (viewport.height + viewport.top_margin).max(0) as u16,
        );

        let layer = Arc::new(Layer::new(
            clipped.content,
            clipped.x,
            clipped.y,
            z,
            window.id.clone(),
        ));
        window.cached_layer = Some(CachedLayer::new(Arc::clone(&layer), window.x, window.y));
        layers.push(layer);
        window.clear_dirty_flags();
    }

    if render_chrome {
        for overlay in chrome::render_notifications(os) {
            layers.push(Arc::new(overlay));
        }
        if let Some(dock) = chrome::render_dock(os) {
            layers.push(Arc::new(dock));
        }
        if os.sidebar_visible {
            if let Some(sidebar) = os.render_sidebar() {
                layers.push(Arc::new(sidebar));
            }
        }
    }

    canvas.add_layers(&layers);
    canvas
}
