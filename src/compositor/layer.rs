// Layers, the canvas they are composited onto, and the per-frame layer pool.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use std::cell::RefCell;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Positioned, z-ordered block of rendered cells. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    content: Buffer,
    x: i32,
    y: i32,
    z: i32,
    id: String,
}

impl Layer {
    /// `content` is re-based to a (0, 0) origin; placement comes from `x`/`y`
    pub fn new(mut content: Buffer, x: i32, y: i32, z: i32, id: impl Into<String>) -> Self {
        content.area.x = 0;
        content.area.y = 0;
        Self {
            content,
            x,
            y,
            z,
            id: id.into(),
        }
    }

    pub fn content(&self) -> &Buffer {
        &self.content
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn z(&self) -> i32 {
        self.z
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn width(&self) -> u16 {
        self.content.area.width
    }

    pub fn height(&self) -> u16 {
        self.content.area.height
    }
}

/// Layers for one frame, painted by z ascending. Equal z paints in insertion
/// order, so a later layer covers an earlier one.
#[derive(Debug, Default)]
pub struct Canvas {
    layers: Vec<Arc<Layer>>,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_layers(&mut self, layers: &[Arc<Layer>]) {
        self.layers.extend(layers.iter().cloned());
    }

    pub fn layers(&self) -> &[Arc<Layer>] {
        &self.layers
    }

    pub fn layer(&self, id: &str) -> Option<&Arc<Layer>> {
        self.layers.iter().find(|l| l.id() == id)
    }

    /// Layers in paint order
    pub fn paint_order(&self) -> Vec<&Arc<Layer>> {
        let mut ordered: Vec<&Arc<Layer>> = self.layers.iter().collect();
        // stable sort keeps insertion order among equal z
        ordered.sort_by_key(|l| l.z());
        ordered
    }

    pub fn render(&self, area: Rect) -> Buffer {
        let mut buf = Buffer::empty(area);
        self.render_into(&mut buf);
        buf
    }

    /// Paint every layer into `buf`, clipping to its area
    pub fn render_into(&self, buf: &mut Buffer) {
        let area = buf.area;
        for layer in self.paint_order() {
            let content = layer.content();
            for row in 0..content.area.height {
                let y = layer.y() + row as i32;
                if y < area.y as i32 || y >= area.bottom() as i32 {
                    continue;
                }
                for col in 0..content.area.width {
                    let x = layer.x() + col as i32;
                    if x < area.x as i32 || x >= area.right() as i32 {
                        continue;
                    }
                    if let Some(cell) = buf.cell_mut((x as u16, y as u16)) {
                        *cell = content[(col, row)].clone();
                    }
                }
            }
        }
    }
}

/// Recycles the per-frame layer list. [`LayerPool::get`] hands out a guard that
/// gives its buffer back when dropped, whatever path the frame leaves by.
#[derive(Debug, Default)]
pub struct LayerPool {
    free: RefCell<Vec<Vec<Arc<Layer>>>>,
}

impl LayerPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> PooledLayers<'_> {
        let layers = self.free.borrow_mut().pop().unwrap_or_default();
        PooledLayers { pool: self, layers }
    }

    /// Buffers currently parked in the pool
    pub fn available(&self) -> usize {
        self.free.borrow().len()
    }
}

pub struct PooledLayers<'a> {
    pool: &'a LayerPool,
    layers: Vec<Arc<Layer>>,
}

impl Deref for PooledLayers<'_> {
    type Target = Vec<Arc<Layer>>;

    fn deref(&self) -> &Self::Target {
        &self.layers
    }
}

impl DerefMut for PooledLayers<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.layers
    }
}

impl Drop for PooledLayers<'_> {
    fn drop(&mut self) {
        let mut layers = std::mem::take(&mut self.layers);
        layers.clear();
        self.pool.free.borrow_mut().push(layers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(width: u16, height: u16, symbol: &str) -> Buffer {
        let mut buf = Buffer::empty(Rect::new(0, 0, width, height));
        for y in 0..height {
            for x in 0..width {
                buf[(x, y)].set_symbol(symbol);
            }
        }
        buf
    }

    #[test]
    fn test_paint_order_by_z_then_insertion() {
        let mut canvas = Canvas::new();
        canvas.add_layers(&[
            Arc::new(Layer::new(filled(2, 1, "a"), 0, 0, 5, "a")),
            Arc::new(Layer::new(filled(2, 1, "b"), 0, 0, 1, "b")),
            Arc::new(Layer::new(filled(2, 1, "c"), 1, 0, 5, "c")),
        ]);

        let ids: Vec<&str> = canvas.paint_order().iter().map(|l| l.id()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);

        let buf = canvas.render(Rect::new(0, 0, 3, 1));
        assert_eq!(buf[(0, 0)].symbol(), "a");
        assert_eq!(buf[(1, 0)].symbol(), "c");
        assert_eq!(buf[(2, 0)].symbol(), "c");
    }

    #[test]
    fn test_render_clips_offscreen_layers() {
        let mut canvas = Canvas::new();
        canvas.add_layers(&[Arc::new(Layer::new(filled(4, 4, "x"), -2, 2, 1, "w"))]);

        let buf = canvas.render(Rect::new(0, 0, 3, 3));
        assert_eq!(buf[(0, 2)].symbol(), "x");
        assert_eq!(buf[(1, 2)].symbol(), "x");
        assert_eq!(buf[(2, 2)].symbol(), " ");
        assert_eq!(buf[(0, 1)].symbol(), " ");
    }

    #[test]
    fn test_pool_returns_buffer_once_per_guard() {
        let pool = LayerPool::new();
        {
            let mut layers = pool.get();
            layers.push(Arc::new(Layer::new(filled(1, 1, "a"), 0, 0, 0, "a")));
            assert_eq!(pool.available(), 0);
        }
        assert_eq!(pool.available(), 1);

        let layers = pool.get();
        assert!(layers.is_empty());
        assert!(layers.capacity() >= 1, "buffer is reused, not reallocated");
        drop(layers);
        assert_eq!(pool.available(), 1);
    }
}
